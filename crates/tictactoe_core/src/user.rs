//! Player registration and cumulative statistics.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{GameError, InvariantViolation};

/// A registration request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct NewUser {
    name: String,
    email: Option<String>,
}

impl NewUser {
    /// Validates a registration.
    ///
    /// Names are the unique identity key, so surrounding whitespace is
    /// stripped and an empty name is rejected. A blank email is treated as
    /// absent. Uniqueness is checked by the store, which reports
    /// [`GameError::Conflict`].
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Validation`] if the name is blank.
    #[instrument]
    pub fn register(name: &str, email: Option<&str>) -> Result<Self, GameError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GameError::Validation("user name must not be empty".to_string()));
        }
        let email = email
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string);
        Ok(Self {
            name: name.to_string(),
            email,
        })
    }
}

/// Statistics change owed to one player when a game ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatUpdate {
    /// The player won.
    Win,
    /// The player lost.
    Loss,
    /// The game was tied.
    Tie,
}

/// Cumulative per-player counters.
///
/// Counters only ever grow, and `wins + ties <= games_played` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct UserStats {
    wins: u32,
    ties: u32,
    games_played: u32,
}

impl UserStats {
    /// Rebuilds statistics from stored counters.
    ///
    /// # Errors
    ///
    /// Returns [`InvariantViolation`] if wins and ties exceed games played.
    pub fn from_counts(wins: u32, ties: u32, games_played: u32) -> Result<Self, InvariantViolation> {
        if u64::from(wins) + u64::from(ties) > u64::from(games_played) {
            return Err(InvariantViolation::new(format!(
                "wins ({wins}) + ties ({ties}) exceed games played ({games_played})"
            )));
        }
        Ok(Self {
            wins,
            ties,
            games_played,
        })
    }

    /// Records a won game.
    pub fn add_win(&mut self) {
        self.wins += 1;
        self.games_played += 1;
    }

    /// Records a tied game.
    pub fn add_tie(&mut self) {
        self.ties += 1;
        self.games_played += 1;
    }

    /// Records a lost game.
    pub fn add_loss(&mut self) {
        self.games_played += 1;
    }

    /// Applies a settlement entry.
    pub fn apply(&mut self, update: StatUpdate) {
        match update {
            StatUpdate::Win => self.add_win(),
            StatUpdate::Loss => self.add_loss(),
            StatUpdate::Tie => self.add_tie(),
        }
    }

    /// Games that were neither won nor tied.
    pub fn losses(&self) -> u32 {
        self.games_played - self.wins - self.ties
    }

    /// Ranking points: two per win, one per tie.
    pub fn points(&self) -> u32 {
        2 * self.wins + self.ties
    }

    /// Fraction of games won, 0 with no games.
    pub fn win_rate(&self) -> f64 {
        ratio(self.wins, self.games_played)
    }

    /// Fraction of games not lost, 0 with no games.
    pub fn no_lose_rate(&self) -> f64 {
        ratio(self.wins + self.ties, self.games_played)
    }
}

fn ratio(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        f64::from(part) / f64::from(whole)
    }
}
