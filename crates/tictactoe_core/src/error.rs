//! Domain error types.

use derive_more::{Display, Error};
use tracing::instrument;

use crate::UserId;

/// Why a game no longer accepts moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Inactive {
    /// The game ended in a win or a tie.
    #[display("already over")]
    Over,
    /// The game was cancelled.
    #[display("cancelled")]
    Cancelled,
}

/// Recoverable failure of a league operation.
///
/// Every variant is a request-level problem the gateway turns into a
/// user-facing message. None of them leaves an aggregate modified.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum GameError {
    /// A referenced user or game does not exist.
    #[display("{} not found", _0)]
    NotFound(String),

    /// A user with that name is already registered.
    #[display("{}", _0)]
    Conflict(String),

    /// The request is malformed (blank name, same player twice, ...).
    #[display("Invalid request: {}", _0)]
    Validation(String),

    /// The actor is not the player whose turn it is.
    #[display("Not your turn: {} tried to move, waiting for {}", actor, expected)]
    OutOfTurn {
        /// Who tried to move.
        actor: UserId,
        /// Who was expected to move.
        expected: UserId,
    },

    /// The cell index is not on the board.
    #[display("Cell {} is off the board (must be 0-8)", _0)]
    OutOfRange(usize),

    /// The cell already holds a mark.
    #[display("Cell {} is already taken", _0)]
    CellOccupied(usize),

    /// The game is over or cancelled.
    #[display("Game is {}", _0)]
    GameNotActive(Inactive),
}

impl std::error::Error for GameError {}

/// Persisted state that no legal sequence of operations could produce.
#[derive(Debug, Clone, Display, Error)]
#[display("Invariant violation: {} at {}:{}", message, file, line)]
pub struct InvariantViolation {
    /// What was inconsistent.
    pub message: String,
    /// Line number where the violation was detected.
    pub line: u32,
    /// Source file where the violation was detected.
    pub file: &'static str,
}

impl InvariantViolation {
    /// Creates a new violation with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}
