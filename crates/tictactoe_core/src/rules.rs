//! Board representation and the stateless rules engine.
//!
//! The rules are pure functions over a [`Board`]. They never fail and never
//! mutate; the game aggregate is responsible for range-checking indices
//! before asking about a cell.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Side length of the playable board.
pub const BOARD_SIZE: usize = 3;

/// Number of cells on the board.
pub const CELL_COUNT: usize = BOARD_SIZE * BOARD_SIZE;

/// Every winning line on a 3x3 board, as row-major cell indices.
pub const WIN_LINES: [[usize; 3]; 8] = [
    // Rows
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    // Columns
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    // Diagonals
    [0, 4, 8],
    [2, 4, 6],
];

/// A player's mark.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    strum::EnumString,
    strum::EnumIter,
)]
pub enum Mark {
    /// Played by the first player.
    X,
    /// Played by the second player.
    O,
}

impl Mark {
    /// Returns the other mark.
    pub fn opponent(self) -> Self {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }
}

/// A single cell of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cell {
    /// Nobody has played here.
    Empty,
    /// Occupied by a mark.
    Marked(Mark),
}

/// 3x3 board in row-major order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    cells: [Cell; CELL_COUNT],
}

impl Board {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self {
            cells: [Cell::Empty; CELL_COUNT],
        }
    }

    /// Creates a board from explicit cells.
    pub fn from_cells(cells: [Cell; CELL_COUNT]) -> Self {
        Self { cells }
    }

    /// Returns the cell at `index`, or `None` when off the board.
    pub fn cell(&self, index: usize) -> Option<Cell> {
        self.cells.get(index).copied()
    }

    /// Returns all cells.
    pub fn cells(&self) -> &[Cell; CELL_COUNT] {
        &self.cells
    }

    /// Number of occupied cells.
    pub fn marked_count(&self) -> usize {
        self.cells.iter().filter(|c| **c != Cell::Empty).count()
    }

    /// Writes `mark` into `index`. Callers range-check first.
    pub(crate) fn place(&mut self, index: usize, mark: Mark) {
        if let Some(cell) = self.cells.get_mut(index) {
            *cell = Cell::Marked(mark);
        }
    }

    /// Formats the board as a human-readable grid.
    ///
    /// Free cells show their index so a player can read off a move.
    pub fn display(&self) -> String {
        let mut out = String::new();
        for row in 0..BOARD_SIZE {
            for col in 0..BOARD_SIZE {
                let index = row * BOARD_SIZE + col;
                match self.cells[index] {
                    Cell::Empty => out.push_str(&index.to_string()),
                    Cell::Marked(mark) => out.push_str(&mark.to_string()),
                }
                if col + 1 < BOARD_SIZE {
                    out.push('|');
                }
            }
            if row + 1 < BOARD_SIZE {
                out.push_str("\n-+-+-\n");
            }
        }
        out
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

/// True iff the cell at `index` is empty.
///
/// Indices outside the board are never free.
#[instrument(skip(board))]
pub fn is_cell_free(board: &Board, index: usize) -> bool {
    matches!(board.cell(index), Some(Cell::Empty))
}

/// True iff no cell is free.
#[instrument(skip(board))]
pub fn is_board_full(board: &Board) -> bool {
    (0..CELL_COUNT).all(|index| !is_cell_free(board, index))
}

/// True iff `mark` holds any complete line.
#[instrument(skip(board))]
pub fn is_winner(board: &Board, mark: Mark) -> bool {
    WIN_LINES.iter().any(|line| {
        line.iter()
            .all(|&index| board.cell(index) == Some(Cell::Marked(mark)))
    })
}
