//! Tic-tac-toe league server.
//!
//! Persists users, games and scores in SQLite and exposes the league over a
//! REST API and as MCP tools.
//!
//! # Architecture
//!
//! - **db**: Diesel repository with version-checked game commits
//! - **service**: [`GameService`], the request-level operations
//! - **http**: axum router over the service
//! - **mcp**: rmcp tool server over the service
//! - **jobs**: periodic average-moves refresh and reminder runs
//!
//! The service is synchronous; async callers run it on the blocking pool.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod cache;
mod config;
mod db;
mod error;
mod http;
mod jobs;
mod mcp;
mod reminders;
mod service;
mod views;

pub use cache::AverageMovesCache;
pub use config::{ConfigError, ServerConfig};
pub use db::{DbError, DbErrorKind, GameRepository, Score, StoredGame, User};
pub use error::ServiceError;
pub use http::{ApiError, AppState, router};
pub use jobs::{spawn_cache_refresher, spawn_reminder_job};
pub use mcp::LeagueToolServer;
pub use reminders::{LogNotifier, Notifier, NotifyError, Reminder, send_reminders};
pub use service::{DEFAULT_COMMIT_ATTEMPTS, GameService};
pub use views::{
    GameListView, GameRequest, GameView, MakeMoveBody, MakeMoveRequest, MessageView, MoveView,
    NewGameRequest, RankingEntry, RankingsView, RegisterUserRequest, RegisteredView, ScoreView,
    ScoresView, UserRequest, UserScoreView, UserScoresView, UserView,
};
