//! Connected players, team rosters and capacity enforcement
//!
//! This module tracks who is playing and on which side:
//! - Join/leave lifecycle with per-team and server-wide limits
//! - Roster order, which is also the display order sent to clients
//! - The cells each session is currently pressing, so a departing player's
//!   holds can be released on their behalf
//!
//! Teams are never rebalanced. A full team is a hard rejection.

use log::info;
use shared::{Cell, Team, MAX_PLAYERS_PER_TEAM, MAX_TOTAL_PLAYERS};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Server-assigned identity of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Session_{}", self.0)
    }
}

/// Why a join request was refused.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum JoinRejected {
    #[error("server is full ({max} players)", max = MAX_TOTAL_PLAYERS)]
    ServerFull,
    #[error("{0} is full ({max} players)", max = MAX_PLAYERS_PER_TEAM)]
    TeamFull(Team),
}

/// A player who has been assigned to a team
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    /// Self-declared display name; not required to be unique
    pub name: String,
    pub team: Team,
    /// Cells this player is pressing, with how many unmatched presses each
    holds: HashMap<Cell, u32>,
}

impl Session {
    fn new(id: SessionId, name: String, team: Team) -> Self {
        Self {
            id,
            name,
            team,
            holds: HashMap::new(),
        }
    }

    pub fn is_holding(&self, cell: Cell) -> bool {
        self.holds.contains_key(&cell)
    }
}

/// All sessions plus the two ordered rosters.
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
    /// Join order per team, indexed by `Team::index`
    rosters: [Vec<SessionId>; 2],
    next_session_id: u64,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            rosters: [Vec::new(), Vec::new()],
            next_session_id: 1,
        }
    }

    /// Adds a player to the team they asked for.
    ///
    /// The capacity check and the roster append happen in the same call, so
    /// two joins can never both take the last seat.
    pub fn join(&mut self, name: &str, team: Team) -> Result<SessionId, JoinRejected> {
        if self.sessions.len() >= MAX_TOTAL_PLAYERS {
            return Err(JoinRejected::ServerFull);
        }
        if self.rosters[team.index()].len() >= MAX_PLAYERS_PER_TEAM {
            return Err(JoinRejected::TeamFull(team));
        }

        let id = SessionId(self.next_session_id);
        self.next_session_id += 1;

        self.rosters[team.index()].push(id);
        self.sessions
            .insert(id, Session::new(id, name.to_string(), team));
        info!("{} ({}) assigned to {}", id, name, team);

        Ok(id)
    }

    /// Removes a player from their roster. Returns `None` if they were already gone.
    pub fn leave(&mut self, id: SessionId) -> Option<Session> {
        let session = self.sessions.remove(&id)?;
        self.rosters[session.team.index()].retain(|member| *member != id);
        info!("Player {} left {}", session.name, session.team);
        Some(session)
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn has_capacity(&self) -> bool {
        self.sessions.len() < MAX_TOTAL_PLAYERS
    }

    /// Player counts as `(team A, team B)`.
    pub fn status(&self) -> (usize, usize) {
        (self.rosters[0].len(), self.rosters[1].len())
    }

    /// Player names per team in join order.
    pub fn rosters(&self) -> (Vec<String>, Vec<String>) {
        let names = |team: Team| -> Vec<String> {
            self.rosters[team.index()]
                .iter()
                .filter_map(|id| self.sessions.get(id))
                .map(|s| s.name.clone())
                .collect()
        };
        (names(Team::A), names(Team::B))
    }

    /// Note one more press of `cell` by this session.
    pub fn record_hold(&mut self, id: SessionId, cell: Cell) {
        if let Some(session) = self.sessions.get_mut(&id) {
            *session.holds.entry(cell).or_insert(0) += 1;
        }
    }

    /// Note one release of `cell`. Returns false if the session was not holding it.
    pub fn record_release(&mut self, id: SessionId, cell: Cell) -> bool {
        let Some(session) = self.sessions.get_mut(&id) else {
            return false;
        };
        match session.holds.get_mut(&cell) {
            Some(count) if *count > 1 => {
                *count -= 1;
                true
            }
            Some(_) => {
                session.holds.remove(&cell);
                true
            }
            None => false,
        }
    }

    /// Forget every press on `cell`, once it has been claimed.
    pub fn forget_cell(&mut self, cell: Cell) {
        for session in self.sessions.values_mut() {
            session.holds.remove(&cell);
        }
    }

    /// Take all presses a session still has, one entry per press.
    pub fn take_holds(&mut self, id: SessionId) -> Vec<Cell> {
        let Some(session) = self.sessions.get_mut(&id) else {
            return Vec::new();
        };
        let mut cells: Vec<Cell> = session
            .holds
            .drain()
            .flat_map(|(cell, count)| std::iter::repeat(cell).take(count as usize))
            .collect();
        cells.sort();
        cells
    }

    /// Remove every session and empty both rosters.
    pub fn clear(&mut self) -> Vec<Session> {
        self.rosters = [Vec::new(), Vec::new()];
        self.sessions.drain().map(|(_, session)| session).collect()
    }
}
