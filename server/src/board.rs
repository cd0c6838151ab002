//! Authoritative cell ownership and in-progress holds.
//!
//! The board never talks to the network or to timers directly. Each mutating
//! call returns the [`BoardEvent`]s it caused, in order, and the caller turns
//! those into broadcasts and scheduler calls. That keeps the tug-of-war rules
//! testable without a runtime.

use shared::{Cell, CellState, Team, GRID_SIZE};

/// Number of players per team currently pressing one cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HoldSet {
    counts: [u32; 2],
}

impl HoldSet {
    pub fn count(&self, team: Team) -> u32 {
        self.counts[team.index()]
    }

    pub fn contains(&self, team: Team) -> bool {
        self.count(team) > 0
    }

    /// Holding teams in `TEAM_A`, `TEAM_B` order.
    pub fn teams(&self) -> Vec<Team> {
        Team::ALL.into_iter().filter(|t| self.contains(*t)).collect()
    }

    /// Number of distinct teams present. Player counts do not matter.
    pub fn team_count(&self) -> usize {
        Team::ALL.iter().filter(|t| self.contains(**t)).count()
    }

    /// The only team present, if exactly one is.
    pub fn sole_team(&self) -> Option<Team> {
        match self.teams().as_slice() {
            [team] => Some(*team),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.team_count() == 0
    }

    fn clear(&mut self) {
        self.counts = [0; 2];
    }
}

/// Something a board mutation did, for the caller to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardEvent {
    /// A team gained its first holder on a cell.
    HoldStarted { cell: Cell, team: Team },
    /// A team lost its last holder on a cell.
    HoldEnded { cell: Cell, team: Team },
    /// The cell just became held by a single team; start its claim timer.
    StartTimer(Cell),
    /// The cell is no longer held by exactly one team; drop its claim timer.
    CancelTimer(Cell),
    /// The cell now belongs to a team. Its holds have been cleared.
    Claimed { cell: Cell, team: Team },
}

/// The 10×10 grid with its per-cell hold counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    cells: [[CellState; GRID_SIZE]; GRID_SIZE],
    holds: [[HoldSet; GRID_SIZE]; GRID_SIZE],
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        Self {
            cells: [[CellState::Unclaimed; GRID_SIZE]; GRID_SIZE],
            holds: [[HoldSet::default(); GRID_SIZE]; GRID_SIZE],
        }
    }

    /// A board with the given ownership and no holds.
    pub fn from_cells(cells: [[CellState; GRID_SIZE]; GRID_SIZE]) -> Self {
        Self {
            cells,
            holds: [[HoldSet::default(); GRID_SIZE]; GRID_SIZE],
        }
    }

    pub fn cell(&self, cell: Cell) -> CellState {
        self.cells[cell.row()][cell.col()]
    }

    pub fn holders(&self, cell: Cell) -> &HoldSet {
        &self.holds[cell.row()][cell.col()]
    }

    fn holders_mut(&mut self, cell: Cell) -> &mut HoldSet {
        &mut self.holds[cell.row()][cell.col()]
    }

    pub fn is_unclaimed(&self, cell: Cell) -> bool {
        self.cell(cell) == CellState::Unclaimed
    }

    /// True once no cell is left unclaimed.
    pub fn is_full(&self) -> bool {
        self.cells
            .iter()
            .flatten()
            .all(|c| *c != CellState::Unclaimed)
    }

    /// Ownership of every cell, row-major.
    pub fn snapshot(&self) -> Vec<CellState> {
        self.cells.iter().flatten().copied().collect()
    }

    /// Holding teams of every cell, row-major.
    pub fn held_snapshot(&self) -> Vec<Vec<Team>> {
        self.holds.iter().flatten().map(HoldSet::teams).collect()
    }

    /// One more `team` player presses `cell`. Ignored unless the cell is unclaimed.
    pub fn hold(&mut self, team: Team, cell: Cell) -> Vec<BoardEvent> {
        let mut events = Vec::new();
        if !self.is_unclaimed(cell) {
            return events;
        }

        let holders = self.holders_mut(cell);
        holders.counts[team.index()] += 1;
        if holders.count(team) > 1 {
            // Another teammate on an already held cell changes nothing visible.
            return events;
        }

        events.push(BoardEvent::HoldStarted { cell, team });
        match holders.team_count() {
            1 => events.push(BoardEvent::StartTimer(cell)),
            _ => events.push(BoardEvent::CancelTimer(cell)),
        }
        events
    }

    /// One `team` player lets go of `cell`. Ignored unless `team` is holding it.
    ///
    /// When the last holder of one side lets go of a contested cell, the
    /// remaining side takes the cell immediately.
    pub fn release(&mut self, team: Team, cell: Cell) -> Vec<BoardEvent> {
        let mut events = Vec::new();
        let holders = self.holders_mut(cell);
        if !holders.contains(team) {
            return events;
        }

        holders.counts[team.index()] -= 1;
        if holders.contains(team) {
            return events;
        }

        events.push(BoardEvent::HoldEnded { cell, team });
        events.push(BoardEvent::CancelTimer(cell));
        if let Some(winner) = holders.sole_team() {
            self.claim(cell, winner);
            events.push(BoardEvent::Claimed { cell, team: winner });
        }
        events
    }

    /// Award a cell to its sole holder once the claim timer fires.
    ///
    /// Re-checks that exactly one team still holds the cell; if the cell was
    /// contested or abandoned in the meantime this does nothing.
    pub fn finalize_timed_claim(&mut self, cell: Cell) -> Vec<BoardEvent> {
        if !self.is_unclaimed(cell) {
            return Vec::new();
        }
        match self.holders(cell).sole_team() {
            Some(team) => {
                self.claim(cell, team);
                vec![BoardEvent::Claimed { cell, team }]
            }
            None => Vec::new(),
        }
    }

    fn claim(&mut self, cell: Cell, team: Team) {
        self.cells[cell.row()][cell.col()] = CellState::Owned(team);
        self.holders_mut(cell).clear();
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
