//! Tic-tac-toe league core - pure game logic.
//!
//! Everything in this crate is an in-memory value: no I/O, no clocks, no
//! persistence. The server crate loads and saves these aggregates.
//!
//! # Architecture
//!
//! - **Rules**: stateless board predicates (free cell, full board, winner)
//! - **Game**: the game aggregate (board, turn order, lifecycle, history)
//! - **User**: cumulative player statistics and registration
//! - **Score**: immutable outcome record produced when a game ends
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use tictactoe_core::{Game, MoveOutcome, UserId};
//!
//! let alice = UserId::new(1);
//! let bob = UserId::new(2);
//! let mut game = Game::new(alice, bob).unwrap();
//! let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
//!
//! let outcome = game.apply_move(alice, 4, today).unwrap();
//! assert!(matches!(outcome, MoveOutcome::Continue));
//! assert_eq!(game.next_to_move(), bob);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod game;
mod ids;
mod rules;
mod score;
mod user;

pub use error::{GameError, Inactive, InvariantViolation};
pub use game::{CancelOutcome, Game, GameStatus, MoveOutcome, PlacedMark, Settlement};
pub use ids::{GameId, UserId};
pub use rules::{
    BOARD_SIZE, Board, CELL_COUNT, Cell, Mark, WIN_LINES, is_board_full, is_cell_free, is_winner,
};
pub use score::{PlayerResult, ScoreRecord, ScoreResult};
pub use user::{NewUser, StatUpdate, UserStats};
