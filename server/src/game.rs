use crate::board::{Board, BoardEvent};
use crate::broadcast::{Broadcaster, Outbound};
use crate::registry::{JoinRejected, SessionId, SessionRegistry};
use crate::scheduler::{ClaimScheduler, TimerId};
use crate::win;
use log::{debug, info, warn};
use shared::{Cell, Outcome, ServerMessage, Team};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Everything the coordinator can be asked to do.
#[derive(Debug)]
pub enum GameCommand {
    Join {
        name: String,
        team: Team,
        outbound: Outbound,
        reply: oneshot::Sender<Result<SessionId, JoinRejected>>,
    },
    Leave {
        session: SessionId,
    },
    Hold {
        session: SessionId,
        cell: Cell,
    },
    Release {
        session: SessionId,
        cell: Cell,
    },
    Chat {
        session: SessionId,
        text: String,
    },
    CheckCapacity {
        reply: oneshot::Sender<bool>,
    },
    TeamStatus {
        reply: oneshot::Sender<(usize, usize)>,
    },
    /// Posted by the claim scheduler once a dwell has elapsed.
    FinalizeClaim {
        cell: Cell,
        timer: TimerId,
    },
}

/// The whole game: board, claim timers, players and their outboxes.
///
/// Owned by a single coordinator task, so each command runs to completion,
/// broadcasts included, before the next one starts.
pub struct GameState {
    board: Board,
    scheduler: ClaimScheduler,
    registry: SessionRegistry,
    broadcaster: Broadcaster,
    rounds_played: u64,
}

impl GameState {
    /// Start the coordinator task with a fresh game and return its queue.
    ///
    /// The task runs until aborted; the scheduler keeps a sender alive.
    pub fn spawn(claim_dwell: Duration) -> (mpsc::UnboundedSender<GameCommand>, JoinHandle<()>) {
        let (commands, mut queue) = mpsc::unbounded_channel();
        let mut state = GameState::new(claim_dwell, commands.clone());
        let handle = tokio::spawn(async move {
            info!("Game coordinator started (claim dwell {:?})", claim_dwell);
            while let Some(cmd) = queue.recv().await {
                state.handle(cmd);
            }
        });
        (commands, handle)
    }

    pub fn new(claim_dwell: Duration, commands: mpsc::UnboundedSender<GameCommand>) -> Self {
        Self {
            board: Board::new(),
            scheduler: ClaimScheduler::new(claim_dwell, commands),
            registry: SessionRegistry::new(),
            broadcaster: Broadcaster::new(),
            rounds_played: 0,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &ClaimScheduler {
        &self.scheduler
    }

    pub fn rounds_played(&self) -> u64 {
        self.rounds_played
    }

    pub fn handle(&mut self, cmd: GameCommand) {
        match cmd {
            GameCommand::Join {
                name,
                team,
                outbound,
                reply,
            } => {
                let result = self.join(&name, team, outbound);
                if reply.send(result).is_err() {
                    // The worker gave up waiting; treat it as an immediate disconnect.
                    if let Ok(id) = result {
                        self.leave(id);
                    }
                }
            }
            GameCommand::Leave { session } => self.leave(session),
            GameCommand::Hold { session, cell } => self.hold(session, cell),
            GameCommand::Release { session, cell } => self.release(session, cell),
            GameCommand::Chat { session, text } => self.chat(session, &text),
            GameCommand::CheckCapacity { reply } => {
                let _ = reply.send(self.registry.has_capacity());
            }
            GameCommand::TeamStatus { reply } => {
                let _ = reply.send(self.registry.status());
            }
            GameCommand::FinalizeClaim { cell, timer } => self.finalize_claim(cell, timer),
        }
        self.drop_dead_sessions();
    }

    /// Seat a player and bring them up to date.
    pub fn join(
        &mut self,
        name: &str,
        team: Team,
        outbound: Outbound,
    ) -> Result<SessionId, JoinRejected> {
        let id = match self.registry.join(name, team) {
            Ok(id) => id,
            Err(rejected) => {
                warn!("Rejected {} joining {}: {}", name, team, rejected);
                return Err(rejected);
            }
        };
        self.broadcaster.register(id, outbound);

        self.broadcaster.send_to(
            id,
            &ServerMessage::TeamAssignment {
                team,
                name: name.to_string(),
            },
        );
        self.broadcaster
            .send_to_all(&ServerMessage::Chat(format!("{name} connected")));
        self.broadcast_team_lists();
        self.broadcaster
            .send_to(id, &ServerMessage::GameState(self.board.snapshot()));
        self.broadcaster.send_to(
            id,
            &ServerMessage::InitialHeldState(self.board.held_snapshot()),
        );
        self.broadcast_scores();
        Ok(id)
    }

    /// Remove a player, first letting go of everything they were still holding.
    ///
    /// Safe to call more than once for the same session.
    pub fn leave(&mut self, id: SessionId) {
        self.broadcaster.unregister(id);
        let Some(team) = self.registry.get(id).map(|s| s.team) else {
            return;
        };

        for cell in self.registry.take_holds(id) {
            debug!("Releasing {} held by departing {}", cell, id);
            let events = self.board.release(team, cell);
            self.apply(events);
            if self.registry.get(id).is_none() {
                // That release ended the round and everyone was reset.
                return;
            }
        }

        if let Some(session) = self.registry.leave(id) {
            self.broadcaster
                .send_to_all(&ServerMessage::Chat(format!("{} disconnected", session.name)));
            self.broadcast_team_lists();
            self.broadcast_scores();
        }
    }

    pub fn hold(&mut self, id: SessionId, cell: Cell) {
        let Some(team) = self.team_of(id) else {
            warn!("Hold from unknown {}", id);
            return;
        };
        if !self.board.is_unclaimed(cell) {
            debug!("{} pressed already claimed {}", id, cell);
            return;
        }
        self.registry.record_hold(id, cell);
        let events = self.board.hold(team, cell);
        self.apply(events);
    }

    pub fn release(&mut self, id: SessionId, cell: Cell) {
        let Some(team) = self.team_of(id) else {
            warn!("Release from unknown {}", id);
            return;
        };
        if !self.registry.record_release(id, cell) {
            debug!("{} released {} without holding it", id, cell);
            return;
        }
        let events = self.board.release(team, cell);
        self.apply(events);
    }

    pub fn chat(&mut self, id: SessionId, text: &str) {
        let Some(session) = self.registry.get(id) else {
            warn!("Chat from unknown {}", id);
            return;
        };
        let line = format!("{}: {}", session.name, text);
        self.broadcaster.send_to_all(&ServerMessage::Chat(line));
    }

    pub fn finalize_claim(&mut self, cell: Cell, timer: TimerId) {
        if !self.scheduler.complete(cell, timer) {
            debug!("Discarding stale claim timer {:?} for {}", timer, cell);
            return;
        }
        let events = self.board.finalize_timed_claim(cell);
        if events.is_empty() {
            debug!("Timed claim of {} superseded", cell);
        }
        self.apply(events);
    }

    /// Put the board, timers and rosters back to their initial state and
    /// close every session.
    pub fn reset(&mut self) {
        self.board.reset();
        self.scheduler.cancel_all();
        self.registry.clear();
        self.broadcaster.clear();
    }

    fn team_of(&self, id: SessionId) -> Option<Team> {
        self.registry.get(id).map(|s| s.team)
    }

    fn apply(&mut self, events: Vec<BoardEvent>) {
        for event in events {
            match event {
                BoardEvent::HoldStarted { cell, team } => {
                    debug!("{} started holding {}", team, cell);
                    self.broadcaster
                        .send_to_all(&ServerMessage::HoldStart { cell, team });
                }
                BoardEvent::HoldEnded { cell, team } => {
                    debug!("{} stopped holding {}", team, cell);
                    self.broadcaster
                        .send_to_all(&ServerMessage::HoldEnd { cell, team });
                }
                BoardEvent::StartTimer(cell) => {
                    self.scheduler.schedule(cell);
                }
                BoardEvent::CancelTimer(cell) => {
                    self.scheduler.cancel(cell);
                }
                BoardEvent::Claimed { cell, team } => self.on_claimed(cell, team),
            }
        }
    }

    fn on_claimed(&mut self, cell: Cell, team: Team) {
        info!("{} claimed {}", team, cell);
        self.scheduler.cancel(cell);
        self.registry.forget_cell(cell);

        self.broadcaster
            .send_to_all(&ServerMessage::GameState(self.board.snapshot()));
        self.broadcast_scores();

        if let Some(outcome) = win::check_win(&self.board) {
            self.end_round(outcome);
        }
    }

    fn end_round(&mut self, outcome: Outcome) {
        self.rounds_played += 1;
        info!("Round {} over: {}", self.rounds_played, outcome);
        self.broadcaster
            .send_to_all(&ServerMessage::GameOver(outcome));
        self.reset();
    }

    fn broadcast_scores(&mut self) {
        let (team_a, team_b) = win::scores(&self.board);
        self.broadcaster
            .send_to_all(&ServerMessage::TeamScores { team_a, team_b });
    }

    fn broadcast_team_lists(&mut self) {
        let (team_a, team_b) = self.registry.rosters();
        self.broadcaster
            .send_to_all(&ServerMessage::TeamLists { team_a, team_b });
    }

    /// Run the leave sequence for sessions whose outbox turned out to be closed.
    fn drop_dead_sessions(&mut self) {
        loop {
            let dead = self.broadcaster.take_dead();
            if dead.is_empty() {
                break;
            }
            for id in dead {
                self.leave(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{CellState, GRID_SIZE};
    use tokio::sync::mpsc::error::TryRecvError;
    use tokio::time::sleep;

    const DWELL: Duration = Duration::from_millis(2000);

    struct Harness {
        state: GameState,
        commands: mpsc::UnboundedReceiver<GameCommand>,
    }

    impl Harness {
        fn new() -> Self {
            let (tx, rx) = mpsc::unbounded_channel();
            Self {
                state: GameState::new(DWELL, tx),
                commands: rx,
            }
        }

        fn join(&mut self, name: &str, team: Team) -> (SessionId, mpsc::UnboundedReceiver<String>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let id = self.state.join(name, team, tx).unwrap();
            (id, rx)
        }

        /// Wait for the next scheduler message and process it.
        async fn fire_next_timer(&mut self) {
            let cmd = self.commands.recv().await.expect("scheduler channel closed");
            assert!(matches!(cmd, GameCommand::FinalizeClaim { .. }));
            self.state.handle(cmd);
        }

        fn assert_invariants(&self) {
            let board = self.state.board();
            for c in Cell::all() {
                let holders = board.holders(c);
                if board.cell(c) != CellState::Unclaimed {
                    assert!(holders.is_empty(), "owned {c} still held");
                }
                assert_eq!(
                    self.state.scheduler().is_pending(c),
                    holders.team_count() == 1,
                    "timer/hold mismatch at {c}"
                );
            }
        }
    }

    fn cell(row: usize, col: usize) -> Cell {
        Cell::new(row, col).unwrap()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn owned(state: &GameState, c: Cell) -> CellState {
        state.board().cell(c)
    }

    #[tokio::test]
    async fn test_join_sends_welcome_sequence() {
        let mut h = Harness::new();
        let (_, mut alice_rx) = h.join("alice", Team::A);

        let msgs = drain(&mut alice_rx);
        assert_eq!(msgs.len(), 6);
        assert_eq!(msgs[0], "TEAM_ASSIGNMENT TEAM_A alice");
        assert_eq!(msgs[1], "CHAT alice connected");
        assert_eq!(msgs[2], "TEAM_LISTS alice ");
        assert!(msgs[3].starts_with("GAME_STATE UNCLAIMED"));
        assert!(msgs[4].starts_with("INITIAL_HELD_STATE NONE"));
        assert_eq!(msgs[5], "TEAM_SCORES 0 0");

        let (_, _bob_rx) = h.join("bob", Team::B);
        let msgs = drain(&mut alice_rx);
        assert_eq!(
            msgs,
            vec!["CHAT bob connected", "TEAM_LISTS alice bob", "TEAM_SCORES 0 0"]
        );
    }

    #[tokio::test]
    async fn test_join_sees_current_holds() {
        let mut h = Harness::new();
        let (alice, _alice_rx) = h.join("alice", Team::A);
        h.state.hold(alice, cell(0, 2));

        let (_, mut bob_rx) = h.join("bob", Team::B);
        let held = drain(&mut bob_rx)
            .into_iter()
            .find(|m| m.starts_with("INITIAL_HELD_STATE"))
            .unwrap();
        let tokens: Vec<&str> = held.split(' ').collect();
        assert_eq!(tokens[3], "TEAM_A");
        assert_eq!(tokens[1], "NONE");
    }

    #[tokio::test]
    async fn test_capacity_rejections() {
        let mut h = Harness::new();
        let mut outboxes = Vec::new();
        for name in ["a1", "a2", "a3"] {
            outboxes.push(h.join(name, Team::A).1);
        }
        let (tx, _rx) = mpsc::unbounded_channel();
        assert_eq!(
            h.state.join("a4", Team::A, tx),
            Err(JoinRejected::TeamFull(Team::A))
        );

        for name in ["b1", "b2", "b3"] {
            outboxes.push(h.join(name, Team::B).1);
        }
        let (tx, _rx) = mpsc::unbounded_channel();
        assert_eq!(
            h.state.join("late", Team::B, tx),
            Err(JoinRejected::ServerFull)
        );

        let (reply, answer) = oneshot::channel();
        h.state.handle(GameCommand::CheckCapacity { reply });
        assert!(!answer.await.unwrap());

        let (reply, answer) = oneshot::channel();
        h.state.handle(GameCommand::TeamStatus { reply });
        assert_eq!(answer.await.unwrap(), (3, 3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_claim_after_dwell() {
        let mut h = Harness::new();
        let (alice, mut alice_rx) = h.join("alice", Team::A);
        drain(&mut alice_rx);
        let c = cell(3, 3);

        h.state.hold(alice, c);
        assert!(h.state.scheduler().is_pending(c));
        h.assert_invariants();
        assert_eq!(drain(&mut alice_rx), vec!["HOLD_START 3 3 TEAM_A"]);

        h.fire_next_timer().await;
        assert_eq!(owned(&h.state, c), CellState::Owned(Team::A));
        h.assert_invariants();

        let msgs = drain(&mut alice_rx);
        assert_eq!(msgs.len(), 2);
        assert!(msgs[0].starts_with("GAME_STATE"));
        assert_eq!(msgs[0].split(' ').nth(34), Some("TEAM_A"));
        assert_eq!(msgs[1], "TEAM_SCORES 1 0");

        // The holder's eventual release is a no-op.
        h.state.release(alice, c);
        assert!(drain(&mut alice_rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tug_of_war_release_hands_cell_to_other_team() {
        let mut h = Harness::new();
        let (alice, mut alice_rx) = h.join("alice", Team::A);
        let (bob, _bob_rx) = h.join("bob", Team::B);
        let c = cell(5, 5);

        h.state.hold(alice, c);
        h.state.hold(bob, c);
        assert!(!h.state.scheduler().is_pending(c));
        h.assert_invariants();

        // Contested cells are never claimed by timeout.
        sleep(DWELL * 3).await;
        assert!(matches!(h.commands.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(owned(&h.state, c), CellState::Unclaimed);

        drain(&mut alice_rx);
        h.state.release(alice, c);
        assert_eq!(owned(&h.state, c), CellState::Owned(Team::B));
        h.assert_invariants();

        let msgs = drain(&mut alice_rx);
        assert_eq!(msgs[0], "HOLD_END 5 5 TEAM_A");
        assert!(msgs[1].starts_with("GAME_STATE"));
        assert_eq!(msgs[2], "TEAM_SCORES 0 1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_contest_while_teammates_hold() {
        let mut h = Harness::new();
        let (a1, _r1) = h.join("a1", Team::A);
        let (a2, _r2) = h.join("a2", Team::A);
        let (b1, _r3) = h.join("b1", Team::B);
        let c = cell(0, 9);

        h.state.hold(a1, c);
        h.state.hold(a2, c);
        h.assert_invariants();
        h.state.hold(b1, c);
        h.assert_invariants();

        // One A player letting go leaves A present; the contest continues.
        h.state.release(a1, c);
        assert_eq!(owned(&h.state, c), CellState::Unclaimed);
        h.assert_invariants();

        // B gives up; A takes the cell at once.
        h.state.release(b1, c);
        assert_eq!(owned(&h.state, c), CellState::Owned(Team::A));
        h.assert_invariants();
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_timer_loses_race_with_release() {
        let mut h = Harness::new();
        let (alice, _rx) = h.join("alice", Team::A);
        let c = cell(1, 2);

        h.state.hold(alice, c);
        let fired = h.commands.recv().await.unwrap();

        // The release is processed before the already-queued finalize.
        h.state.release(alice, c);
        h.state.handle(fired);

        assert_eq!(owned(&h.state, c), CellState::Unclaimed);
        assert!(h.state.board().holders(c).is_empty());
        h.assert_invariants();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_does_not_claim_for_new_holder() {
        let mut h = Harness::new();
        let (alice, _ra) = h.join("alice", Team::A);
        let (bob, _rb) = h.join("bob", Team::B);
        let c = cell(8, 8);

        h.state.hold(alice, c);
        let stale = h.commands.recv().await.unwrap();
        h.state.release(alice, c);
        h.state.hold(bob, c);

        h.state.handle(stale);
        assert_eq!(owned(&h.state, c), CellState::Unclaimed);
        assert!(h.state.scheduler().is_pending(c));

        h.fire_next_timer().await;
        assert_eq!(owned(&h.state, c), CellState::Owned(Team::B));
        h.assert_invariants();
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_own_holds_can_be_released() {
        let mut h = Harness::new();
        let (a1, _r1) = h.join("a1", Team::A);
        let (a2, _r2) = h.join("a2", Team::A);
        let c = cell(2, 7);

        h.state.hold(a1, c);
        h.state.release(a2, c);
        assert_eq!(h.state.board().holders(c).count(Team::A), 1);
        assert!(h.state.scheduler().is_pending(c));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_releases_holds() {
        let mut h = Harness::new();
        let (alice, _ra) = h.join("alice", Team::A);
        let (bob, mut bob_rx) = h.join("bob", Team::B);
        let lone = cell(0, 0);
        let contested = cell(0, 1);

        h.state.hold(alice, lone);
        h.state.hold(alice, contested);
        h.state.hold(bob, contested);
        drain(&mut bob_rx);

        h.state.handle(GameCommand::Leave { session: alice });

        assert!(h.state.board().holders(lone).is_empty());
        assert!(!h.state.scheduler().is_pending(lone));
        assert_eq!(owned(&h.state, contested), CellState::Owned(Team::B));
        assert!(h.state.registry().get(alice).is_none());
        h.assert_invariants();

        let msgs = drain(&mut bob_rx);
        assert!(msgs.contains(&"HOLD_END 0 0 TEAM_A".to_string()));
        assert!(msgs.contains(&"HOLD_END 0 1 TEAM_A".to_string()));
        assert!(msgs.contains(&"CHAT alice disconnected".to_string()));
        assert!(msgs.contains(&"TEAM_LISTS  bob".to_string()));

        // Nothing left behind to fire later.
        sleep(DWELL * 2).await;
        assert!(matches!(h.commands.try_recv(), Err(TryRecvError::Empty)));

        // Leaving twice is harmless.
        h.state.leave(alice);
        assert_eq!(h.state.registry().len(), 1);
    }

    #[tokio::test]
    async fn test_dead_outbox_triggers_leave() {
        let mut h = Harness::new();
        let (_, alice_rx) = h.join("alice", Team::A);
        let (bob, mut bob_rx) = h.join("bob", Team::B);
        drop(alice_rx);
        drain(&mut bob_rx);

        h.state.handle(GameCommand::Chat {
            session: bob,
            text: "anyone there?".to_string(),
        });

        assert_eq!(h.state.registry().status(), (0, 1));
        let msgs = drain(&mut bob_rx);
        assert_eq!(msgs[0], "CHAT bob: anyone there?");
        assert!(msgs.contains(&"CHAT alice disconnected".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ten_in_a_row_ends_round_and_resets() {
        let mut h = Harness::new();
        let (alice, mut alice_rx) = h.join("alice", Team::A);
        let (_bob, mut bob_rx) = h.join("bob", Team::B);

        for col in 0..GRID_SIZE {
            h.state.hold(alice, cell(4, col));
        }
        for _ in 0..GRID_SIZE {
            h.fire_next_timer().await;
        }

        let msgs = drain(&mut bob_rx);
        assert!(msgs.contains(&"TEAM_SCORES 10 0".to_string()));
        assert_eq!(msgs.last().map(String::as_str), Some("GAME_OVER TEAM_A"));
        drain(&mut alice_rx);

        assert_eq!(h.state.rounds_played(), 1);
        assert_eq!(h.state.board(), &Board::new());
        assert!(h.state.registry().is_empty());
        assert_eq!(h.state.scheduler().pending_count(), 0);
        // Sessions are closed for the next round.
        assert!(matches!(alice_rx.try_recv(), Err(TryRecvError::Disconnected)));
        assert!(matches!(bob_rx.try_recv(), Err(TryRecvError::Disconnected)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_board_tie() {
        let mut h = Harness::new();
        let (alice, _ra) = h.join("alice", Team::A);
        let (bob, mut bob_rx) = h.join("bob", Team::B);

        // Alternate in pairs of rows so neither side gets a run above two.
        for c in Cell::all() {
            let player = if (c.row() / 2 + c.col()) % 2 == 0 { alice } else { bob };
            h.state.hold(player, c);
        }
        for _ in 0..shared::CELL_COUNT {
            h.fire_next_timer().await;
        }

        let msgs = drain(&mut bob_rx);
        assert!(msgs.contains(&"TEAM_SCORES 2 2".to_string()));
        assert_eq!(msgs.last().map(String::as_str), Some("GAME_OVER TIE"));
        assert_eq!(h.state.rounds_played(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_round_trip() {
        let mut h = Harness::new();
        let (alice, _ra) = h.join("alice", Team::A);
        let (bob, _rb) = h.join("bob", Team::B);
        h.state.hold(alice, cell(0, 0));
        h.state.hold(bob, cell(9, 9));
        h.fire_next_timer().await;

        h.state.reset();
        assert_eq!(h.state.board(), &Board::new());
        assert_eq!(h.state.registry().rosters(), (vec![], vec![]));
        assert_eq!(h.state.scheduler().pending_count(), 0);

        // A timer that fired before the reset is discarded when it arrives.
        while let Ok(cmd) = h.commands.try_recv() {
            h.state.handle(cmd);
        }
        assert_eq!(h.state.board(), &Board::new());

        sleep(DWELL * 2).await;
        assert!(matches!(h.commands.try_recv(), Err(TryRecvError::Empty)));
    }
}
