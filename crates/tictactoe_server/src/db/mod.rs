//! Database persistence layer for users, games and scores.

mod error;
mod models;
mod repository;
mod schema; // Diesel generated schema - internal use only

pub use error::{DbError, DbErrorKind};
pub use models::{Score, StoredGame, User};
pub use repository::GameRepository;
