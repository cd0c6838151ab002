//! Longest-run scoring and round-end detection.

use crate::board::Board;
use shared::{Cell, CellState, Outcome, Team, WIN_RUN_LENGTH};

/// Scan orientations as (row step, col step): rows, columns, ↘ and ↙ diagonals.
const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

fn step(cell: Cell, (dr, dc): (isize, isize)) -> Option<Cell> {
    let row = cell.row().checked_add_signed(dr)?;
    let col = cell.col().checked_add_signed(dc)?;
    Cell::new(row, col)
}

fn back(cell: Cell, (dr, dc): (isize, isize)) -> Option<Cell> {
    step(cell, (-dr, -dc))
}

/// Longest line of contiguous `team` cells along any of the four orientations.
pub fn longest_run(board: &Board, team: Team) -> usize {
    let owned = CellState::Owned(team);
    let mut longest = 0;

    for direction in DIRECTIONS {
        // Walk every line once, starting from the cell that has no predecessor.
        for start in Cell::all().filter(|c| back(*c, direction).is_none()) {
            let mut run = 0;
            let mut current = Some(start);
            while let Some(cell) = current {
                if board.cell(cell) == owned {
                    run += 1;
                    longest = longest.max(run);
                } else {
                    run = 0;
                }
                current = step(cell, direction);
            }
        }
    }

    longest
}

/// Both teams' scores as sent in `TEAM_SCORES`.
pub fn scores(board: &Board) -> (usize, usize) {
    (longest_run(board, Team::A), longest_run(board, Team::B))
}

/// Decide whether the round is over.
///
/// A run of [`WIN_RUN_LENGTH`] wins outright, checking team A first. A full
/// board goes to the longer run, or is a tie when both are equal.
pub fn check_win(board: &Board) -> Option<Outcome> {
    let (max_a, max_b) = scores(board);
    if max_a >= WIN_RUN_LENGTH {
        Some(Outcome::Winner(Team::A))
    } else if max_b >= WIN_RUN_LENGTH {
        Some(Outcome::Winner(Team::B))
    } else if board.is_full() {
        Some(match max_a.cmp(&max_b) {
            std::cmp::Ordering::Greater => Outcome::Winner(Team::A),
            std::cmp::Ordering::Less => Outcome::Winner(Team::B),
            std::cmp::Ordering::Equal => Outcome::Tie,
        })
    } else {
        None
    }
}
