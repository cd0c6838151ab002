//! Deferred claim timers, one per singly-held cell.
//!
//! A scheduled timer is a tokio task that sleeps for the dwell time and then
//! posts [`GameCommand::FinalizeClaim`] into the coordinator queue. Every
//! timer carries a fresh [`TimerId`]. Cancelling aborts the task and forgets
//! the id, so a finalize message that was already in the queue is recognised
//! as stale when it arrives and never acts.

use crate::game::GameCommand;
use log::debug;
use shared::Cell;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

struct PendingClaim {
    id: TimerId,
    task: JoinHandle<()>,
}

pub struct ClaimScheduler {
    dwell: Duration,
    commands: mpsc::UnboundedSender<GameCommand>,
    pending: HashMap<Cell, PendingClaim>,
    next_id: u64,
}

impl ClaimScheduler {
    pub fn new(dwell: Duration, commands: mpsc::UnboundedSender<GameCommand>) -> Self {
        Self {
            dwell,
            commands,
            pending: HashMap::new(),
            next_id: 1,
        }
    }

    /// Start the claim timer for `cell`, replacing any timer it already has.
    pub fn schedule(&mut self, cell: Cell) -> TimerId {
        self.cancel(cell);

        let id = TimerId(self.next_id);
        self.next_id += 1;

        let dwell = self.dwell;
        let commands = self.commands.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(dwell).await;
            // The coordinator may already be gone during shutdown.
            let _ = commands.send(GameCommand::FinalizeClaim { cell, timer: id });
        });

        debug!("Claim timer {:?} scheduled for {}", id, cell);
        self.pending.insert(cell, PendingClaim { id, task });
        id
    }

    /// Drop the timer for `cell`. Returns false if there was none.
    pub fn cancel(&mut self, cell: Cell) -> bool {
        match self.pending.remove(&cell) {
            Some(claim) => {
                claim.task.abort();
                debug!("Claim timer {:?} cancelled for {}", claim.id, cell);
                true
            }
            None => false,
        }
    }

    /// Accept a fired timer. Returns true only if `timer` is still the live
    /// timer for `cell`, and forgets it.
    pub fn complete(&mut self, cell: Cell, timer: TimerId) -> bool {
        match self.pending.get(&cell) {
            Some(claim) if claim.id == timer => {
                self.pending.remove(&cell);
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self, cell: Cell) -> bool {
        self.pending.contains_key(&cell)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn cancel_all(&mut self) {
        for (_, claim) in self.pending.drain() {
            claim.task.abort();
        }
    }
}

impl Drop for ClaimScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
