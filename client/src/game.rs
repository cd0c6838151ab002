use log::debug;
use shared::{Cell, CellState, Outcome, ServerMessage, Team, CELL_COUNT};

/// Client-side mirror of the game, rebuilt from server messages only.
#[derive(Debug, Clone)]
pub struct ClientGameState {
    pub name: Option<String>,
    pub team: Option<Team>,
    cells: Vec<CellState>,
    /// Teams currently pressing each cell, row-major.
    held: Vec<Vec<Team>>,
    pub scores: (usize, usize),
    pub rosters: (Vec<String>, Vec<String>),
    pub chat_log: Vec<String>,
    pub outcome: Option<Outcome>,
}

impl Default for ClientGameState {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientGameState {
    pub fn new() -> Self {
        Self {
            name: None,
            team: None,
            cells: vec![CellState::Unclaimed; CELL_COUNT],
            held: vec![Vec::new(); CELL_COUNT],
            scores: (0, 0),
            rosters: (Vec::new(), Vec::new()),
            chat_log: Vec::new(),
            outcome: None,
        }
    }

    pub fn apply(&mut self, message: &ServerMessage) {
        match message {
            ServerMessage::TeamAssignment { team, name } => {
                self.team = Some(*team);
                self.name = Some(name.clone());
            }
            ServerMessage::GameState(cells) if cells.len() == CELL_COUNT => {
                self.cells.clone_from(cells);
                for (held, state) in self.held.iter_mut().zip(&self.cells) {
                    if *state != CellState::Unclaimed {
                        held.clear();
                    }
                }
            }
            ServerMessage::InitialHeldState(held) if held.len() == CELL_COUNT => {
                self.held.clone_from(held);
            }
            ServerMessage::HoldStart { cell, team } => {
                let held = &mut self.held[cell.index()];
                if !held.contains(team) {
                    held.push(*team);
                }
            }
            ServerMessage::HoldEnd { cell, team } => {
                self.held[cell.index()].retain(|t| t != team);
            }
            ServerMessage::TeamScores { team_a, team_b } => {
                self.scores = (*team_a, *team_b);
            }
            ServerMessage::TeamLists { team_a, team_b } => {
                self.rosters = (team_a.clone(), team_b.clone());
            }
            ServerMessage::Chat(text) => self.chat_log.push(text.clone()),
            ServerMessage::GameOver(outcome) => self.outcome = Some(*outcome),
            other => debug!("Ignoring {:?}", other),
        }
    }

    pub fn cell(&self, cell: Cell) -> CellState {
        self.cells[cell.index()]
    }

    pub fn held_by(&self, cell: Cell) -> &[Team] {
        &self.held[cell.index()]
    }

    pub fn unclaimed_cells(&self) -> Vec<Cell> {
        Cell::all()
            .filter(|c| self.cells[c.index()] == CellState::Unclaimed)
            .collect()
    }

    pub fn is_over(&self) -> bool {
        self.outcome.is_some()
    }

    /// Score of our own team, once assigned.
    pub fn my_score(&self) -> Option<usize> {
        self.team.map(|team| match team {
            Team::A => self.scores.0,
            Team::B => self.scores.1,
        })
    }
}
