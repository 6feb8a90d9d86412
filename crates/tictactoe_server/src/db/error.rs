//! Database error types.

use derive_more::{Display, Error};
use tracing::instrument;

use tictactoe_core::InvariantViolation;

/// Broad category of a database failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DbErrorKind {
    /// A unique constraint rejected the write.
    #[display("unique violation")]
    UniqueViolation,
    /// Stored rows describe a state the domain cannot produce.
    #[display("corrupt data")]
    Corrupt,
    /// Anything else (connection, SQL, migration).
    #[display("backend")]
    Backend,
}

/// Database error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Database error ({}): {} at {}:{}", kind, message, file, line)]
pub struct DbError {
    /// Failure category.
    pub kind: DbErrorKind,
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl DbError {
    /// Creates a new backend error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_kind(DbErrorKind::Backend, message)
    }

    /// Creates an error for rows that fail domain invariants.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::with_kind(DbErrorKind::Corrupt, message)
    }

    #[track_caller]
    fn with_kind(kind: DbErrorKind, message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// True if a unique constraint rejected the write.
    pub fn is_unique_violation(&self) -> bool {
        self.kind == DbErrorKind::UniqueViolation
    }
}

impl From<diesel::result::Error> for DbError {
    #[track_caller]
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};
        match err {
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => Self::with_kind(
                DbErrorKind::UniqueViolation,
                format!("Unique violation: {}", info.message()),
            ),
            other => Self::new(format!("Diesel error: {}", other)),
        }
    }
}

impl From<diesel::ConnectionError> for DbError {
    #[track_caller]
    fn from(err: diesel::ConnectionError) -> Self {
        Self::new(format!("Connection error: {}", err))
    }
}

impl From<InvariantViolation> for DbError {
    #[track_caller]
    fn from(err: InvariantViolation) -> Self {
        Self::corrupt(err.to_string())
    }
}
