//! Types and wire protocol shared by the tug-of-war server and its clients.
//!
//! The grid is a fixed 10×10 board contested by exactly two teams. Everything
//! that crosses the network is defined here: the closed set of teams, cell
//! coordinates, cell ownership tokens, the text commands of [`protocol`] and
//! the length-prefixed frames of [`framing`].

pub mod framing;
pub mod protocol;

pub use protocol::{ClientCommand, ProtocolError, ServerMessage};

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const GRID_SIZE: usize = 10;
pub const CELL_COUNT: usize = GRID_SIZE * GRID_SIZE;
pub const MAX_PLAYERS_PER_TEAM: usize = 3;
pub const MAX_TOTAL_PLAYERS: usize = 6;
/// Length of a same-team run that wins the round outright.
pub const WIN_RUN_LENGTH: usize = 10;
/// How long a cell must be held by a single team before it is claimed.
pub const CLAIM_DWELL: Duration = Duration::from_millis(2000);
pub const DEFAULT_PORT: u16 = 12345;

/// One of the two teams. The protocol spells them `TEAM_A` and `TEAM_B`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Team {
    A,
    B,
}

impl Team {
    pub const ALL: [Team; 2] = [Team::A, Team::B];

    pub fn index(self) -> usize {
        match self {
            Team::A => 0,
            Team::B => 1,
        }
    }

    pub fn other(self) -> Team {
        match self {
            Team::A => Team::B,
            Team::B => Team::A,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Team::A => "TEAM_A",
            Team::B => "TEAM_B",
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Team {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TEAM_A" => Ok(Team::A),
            "TEAM_B" => Ok(Team::B),
            other => Err(ProtocolError::InvalidTeam(other.to_string())),
        }
    }
}

/// A grid position. Construction through [`Cell::new`] guarantees it is on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    row: usize,
    col: usize,
}

impl Cell {
    pub fn new(row: usize, col: usize) -> Option<Self> {
        (row < GRID_SIZE && col < GRID_SIZE).then_some(Cell { row, col })
    }

    pub fn row(self) -> usize {
        self.row
    }

    pub fn col(self) -> usize {
        self.col
    }

    /// Row-major position, 0..CELL_COUNT.
    pub fn index(self) -> usize {
        self.row * GRID_SIZE + self.col
    }

    /// Every cell in row-major order.
    pub fn all() -> impl Iterator<Item = Cell> {
        (0..GRID_SIZE).flat_map(|row| (0..GRID_SIZE).map(move |col| Cell { row, col }))
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Ownership of a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellState {
    #[default]
    Unclaimed,
    Owned(Team),
}

impl CellState {
    pub fn as_str(self) -> &'static str {
        match self {
            CellState::Unclaimed => "UNCLAIMED",
            CellState::Owned(team) => team.as_str(),
        }
    }
}

impl FromStr for CellState {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNCLAIMED" => Ok(CellState::Unclaimed),
            other => other
                .parse::<Team>()
                .map(CellState::Owned)
                .map_err(|_| ProtocolError::InvalidCellToken(other.to_string())),
        }
    }
}

/// Result of a finished round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Winner(Team),
    Tie,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Winner(team) => team.as_str(),
            Outcome::Tie => "TIE",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TIE" => Ok(Outcome::Tie),
            other => other.parse::<Team>().map(Outcome::Winner),
        }
    }
}
