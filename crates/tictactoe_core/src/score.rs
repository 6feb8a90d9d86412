//! Immutable record of a finished game.

use chrono::NaiveDate;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

use crate::UserId;

/// Result of a finished game.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::AsRefStr,
    strum::Display,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ScoreResult {
    /// The X player won.
    PlayerXWon,
    /// The O player won.
    PlayerOWon,
    /// Nobody won.
    Tie,
}

/// A finished game from one participant's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PlayerResult {
    /// The participant won.
    Won,
    /// The participant lost.
    Lost,
    /// The game was tied.
    Tied,
}

/// Outcome of one completed game.
///
/// Only the game aggregate's termination path builds these; everything a
/// leaderboard needs is carried here so the game itself is not required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct ScoreRecord {
    player_x: UserId,
    player_o: UserId,
    result: ScoreResult,
    date: NaiveDate,
}

impl ScoreRecord {
    pub(crate) fn new(
        player_x: UserId,
        player_o: UserId,
        result: ScoreResult,
        date: NaiveDate,
    ) -> Self {
        Self {
            player_x,
            player_o,
            result,
            date,
        }
    }

    /// The winning player, if any.
    pub fn winner(&self) -> Option<UserId> {
        match self.result {
            ScoreResult::PlayerXWon => Some(self.player_x),
            ScoreResult::PlayerOWon => Some(self.player_o),
            ScoreResult::Tie => None,
        }
    }

    /// The game as seen by `user`, or `None` if they did not play.
    pub fn result_for(&self, user: UserId) -> Option<PlayerResult> {
        let is_x = if user == self.player_x {
            true
        } else if user == self.player_o {
            false
        } else {
            return None;
        };
        Some(self.result.for_side(is_x))
    }
}

impl ScoreResult {
    /// The result for the X side (`is_x`) or the O side.
    pub fn for_side(self, is_x: bool) -> PlayerResult {
        match (self, is_x) {
            (ScoreResult::Tie, _) => PlayerResult::Tied,
            (ScoreResult::PlayerXWon, true) | (ScoreResult::PlayerOWon, false) => PlayerResult::Won,
            _ => PlayerResult::Lost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn record(result: ScoreResult) -> ScoreRecord {
        ScoreRecord::new(
            UserId::new(1),
            UserId::new(2),
            result,
            NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
        )
    }

    #[test]
    fn test_result_for_participants() {
        let won = record(ScoreResult::PlayerOWon);
        assert_eq!(won.winner(), Some(UserId::new(2)));
        assert_eq!(won.result_for(UserId::new(1)), Some(PlayerResult::Lost));
        assert_eq!(won.result_for(UserId::new(2)), Some(PlayerResult::Won));
        assert_eq!(won.result_for(UserId::new(3)), None);
    }

    #[test]
    fn test_tie_has_no_winner() {
        let tie = record(ScoreResult::Tie);
        assert_eq!(tie.winner(), None);
        assert_eq!(tie.result_for(UserId::new(1)), Some(PlayerResult::Tied));
    }

    #[test]
    fn test_result_storage_names() {
        assert_eq!(ScoreResult::PlayerXWon.as_ref(), "player_x_won");
        assert_eq!(ScoreResult::from_str("tie").unwrap(), ScoreResult::Tie);
        assert!(ScoreResult::from_str("draw").is_err());
    }
}
