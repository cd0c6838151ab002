//! Fan-out of server messages to session outboxes.
//!
//! Each session owns the receiving end of an unbounded queue that its worker
//! drains onto the socket. Sending never blocks. A send only fails once the
//! worker has gone away; that session is dropped here and remembered so the
//! coordinator can run the normal leave sequence for it.

use crate::registry::SessionId;
use log::{debug, warn};
use shared::ServerMessage;
use std::collections::BTreeMap;
use tokio::sync::mpsc;

/// Encoded frames queued for one session's socket.
pub type Outbound = mpsc::UnboundedSender<String>;

#[derive(Default)]
pub struct Broadcaster {
    outboxes: BTreeMap<SessionId, Outbound>,
    dead: Vec<SessionId>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: SessionId, outbound: Outbound) {
        self.outboxes.insert(id, outbound);
    }

    /// Stop delivering to a session. Dropping its sender lets the worker finish.
    pub fn unregister(&mut self, id: SessionId) -> bool {
        self.outboxes.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.outboxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outboxes.is_empty()
    }

    /// Deliver to one session. Returns false if it could not be reached.
    pub fn send_to(&mut self, id: SessionId, message: &ServerMessage) -> bool {
        let text = message.encode();
        match self.outboxes.get(&id) {
            Some(outbound) if outbound.send(text).is_ok() => true,
            Some(_) => {
                self.mark_dead(id);
                false
            }
            None => false,
        }
    }

    /// Deliver to every session. Unreachable sessions are skipped and marked
    /// dead; the rest still receive the message. Returns the number reached.
    pub fn send_to_all(&mut self, message: &ServerMessage) -> usize {
        let text = message.encode();
        debug!("Broadcast: {}", text);

        let mut failed = Vec::new();
        for (id, outbound) in &self.outboxes {
            if outbound.send(text.clone()).is_err() {
                failed.push(*id);
            }
        }
        for id in &failed {
            self.mark_dead(*id);
        }
        self.outboxes.len()
    }

    fn mark_dead(&mut self, id: SessionId) {
        warn!("Delivery to {} failed, dropping session", id);
        self.outboxes.remove(&id);
        self.dead.push(id);
    }

    /// Sessions whose delivery failed since the last call.
    pub fn take_dead(&mut self) -> Vec<SessionId> {
        std::mem::take(&mut self.dead)
    }

    /// Drop every outbox, closing all sessions.
    pub fn clear(&mut self) {
        self.outboxes.clear();
        self.dead.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SessionRegistry;
    use shared::Team;

    fn sessions(n: usize) -> Vec<SessionId> {
        let mut registry = SessionRegistry::new();
        (0..n)
            .map(|i| {
                let team = if i % 2 == 0 { Team::A } else { Team::B };
                registry.join(&format!("p{i}"), team).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_send_to_all_reaches_everyone() {
        let ids = sessions(3);
        let mut broadcaster = Broadcaster::new();
        let mut receivers = Vec::new();
        for id in &ids {
            let (tx, rx) = mpsc::unbounded_channel();
            broadcaster.register(*id, tx);
            receivers.push(rx);
        }

        let reached = broadcaster.send_to_all(&ServerMessage::TeamScores {
            team_a: 2,
            team_b: 1,
        });
        assert_eq!(reached, 3);
        for rx in &mut receivers {
            assert_eq!(rx.try_recv().unwrap(), "TEAM_SCORES 2 1");
        }
    }

    #[test]
    fn test_dead_session_does_not_block_others() {
        let ids = sessions(3);
        let mut broadcaster = Broadcaster::new();
        let (tx0, mut rx0) = mpsc::unbounded_channel();
        let (tx1, rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        broadcaster.register(ids[0], tx0);
        broadcaster.register(ids[1], tx1);
        broadcaster.register(ids[2], tx2);
        drop(rx1);

        let reached = broadcaster.send_to_all(&ServerMessage::Chat("hi".to_string()));
        assert_eq!(reached, 2);
        assert_eq!(rx0.try_recv().unwrap(), "CHAT hi");
        assert_eq!(rx2.try_recv().unwrap(), "CHAT hi");
        assert_eq!(broadcaster.take_dead(), vec![ids[1]]);
        assert!(broadcaster.take_dead().is_empty());
        assert_eq!(broadcaster.len(), 2);
    }

    #[test]
    fn test_send_to_single_session() {
        let ids = sessions(2);
        let mut broadcaster = Broadcaster::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        broadcaster.register(ids[0], tx);

        assert!(broadcaster.send_to(ids[0], &ServerMessage::TeamFull));
        assert_eq!(rx.try_recv().unwrap(), "TEAM_FULL");
        assert!(!broadcaster.send_to(ids[1], &ServerMessage::TeamFull));
        assert!(broadcaster.take_dead().is_empty());

        drop(rx);
        assert!(!broadcaster.send_to(ids[0], &ServerMessage::TeamFull));
        assert_eq!(broadcaster.take_dead(), vec![ids[0]]);
    }

    #[test]
    fn test_clear_closes_outboxes() {
        let ids = sessions(1);
        let mut broadcaster = Broadcaster::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        broadcaster.register(ids[0], tx);
        broadcaster.send_to_all(&ServerMessage::GameOver(shared::Outcome::Tie));

        broadcaster.clear();
        assert!(broadcaster.is_empty());
        assert_eq!(rx.try_recv().unwrap(), "GAME_OVER TIE");
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }
}
