//! Service-level error type.

use derive_more::Display;
use tictactoe_core::{GameError, GameId};

use crate::db::DbError;

/// Failure of a service operation.
#[derive(Debug, Clone, Display)]
pub enum ServiceError {
    /// A domain rule rejected the request.
    #[display("{}", _0)]
    Game(GameError),

    /// The store failed or returned corrupt data.
    #[display("{}", _0)]
    Db(DbError),

    /// Every commit attempt lost to a concurrent writer.
    #[display("Game {} is busy; gave up after {} attempts", game_id, attempts)]
    Contention {
        /// The contended game.
        game_id: GameId,
        /// Commit attempts made.
        attempts: u32,
    },

    /// A blocking worker task did not complete.
    #[display("Background task failed: {}", _0)]
    Task(String),
}

impl std::error::Error for ServiceError {}

impl From<GameError> for ServiceError {
    fn from(err: GameError) -> Self {
        Self::Game(err)
    }
}

impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        Self::Db(err)
    }
}

impl From<tokio::task::JoinError> for ServiceError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}
