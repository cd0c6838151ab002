//! Headless player: keeps pressing random unclaimed cells.

use crate::game::ClientGameState;
use crate::network::{ClientError, Connection};
use log::{debug, info};
use rand::seq::SliceRandom;
use rand::Rng;
use shared::{ClientCommand, Outcome};
use std::time::Duration;
use tokio::time::{sleep, Instant};

#[derive(Debug, Clone)]
pub struct BotConfig {
    /// How long each cell is held before letting go.
    pub hold: Duration,
    /// Stop after this many holds even if the round is still running.
    pub max_holds: usize,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            hold: Duration::from_millis(2500),
            max_holds: 20,
        }
    }
}

/// How a bot run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotReport {
    pub holds: usize,
    pub outcome: Option<Outcome>,
}

/// Play until the round ends, the server hangs up, or `max_holds` is reached.
pub async fn run<R: Rng>(
    conn: &mut Connection,
    state: &mut ClientGameState,
    config: &BotConfig,
    rng: &mut R,
) -> Result<BotReport, ClientError> {
    let mut holds = 0;

    while holds < config.max_holds && !state.is_over() {
        while let Some(message) = conn.try_recv() {
            state.apply(&message);
        }
        if state.is_over() {
            break;
        }

        let Some(&cell) = state.unclaimed_cells().choose(rng) else {
            // Board is full; the outcome is on its way.
            let message = conn.recv().await?;
            state.apply(&message);
            continue;
        };

        debug!("Holding {} for {:?}", cell, config.hold);
        conn.send(&ClientCommand::HoldStart(cell)).await?;
        holds += 1;

        match pump_until(conn, state, Instant::now() + config.hold).await {
            Ok(()) => {}
            Err(ClientError::Closed) => break,
            Err(e) => return Err(e),
        }
        if state.is_over() {
            break;
        }
        conn.send(&ClientCommand::HoldEnd(cell)).await?;
        info!(
            "Released {}: {} now, scores {} - {}",
            cell,
            state.cell(cell).as_str(),
            state.scores.0,
            state.scores.1
        );
    }

    Ok(BotReport {
        holds,
        outcome: state.outcome,
    })
}

/// Apply incoming messages until `deadline` or the round ends.
async fn pump_until(
    conn: &mut Connection,
    state: &mut ClientGameState,
    deadline: Instant,
) -> Result<(), ClientError> {
    let timer = sleep(deadline.saturating_duration_since(Instant::now()));
    tokio::pin!(timer);

    loop {
        tokio::select! {
            _ = &mut timer => return Ok(()),
            message = conn.recv() => {
                let message = message?;
                state.apply(&message);
                if state.is_over() {
                    return Ok(());
                }
            }
        }
    }
}
