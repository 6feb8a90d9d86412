//! Identity types for league entities.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Identity of a registered user.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
)]
#[display("user#{}", _0)]
#[serde(transparent)]
pub struct UserId(i32);

impl UserId {
    /// Wraps a raw database identifier.
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier.
    pub const fn get(self) -> i32 {
        self.0
    }
}

/// Identity of a stored game.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
)]
#[display("game#{}", _0)]
#[serde(transparent)]
pub struct GameId(i32);

impl GameId {
    /// Wraps a raw database identifier.
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier.
    pub const fn get(self) -> i32 {
        self.0
    }
}
