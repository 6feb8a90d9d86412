//! Database models and their mapping to domain aggregates.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use derive_getters::Getters;
use diesel::prelude::*;
use tictactoe_core::{
    Game, GameId, GameStatus, Mark, PlacedMark, PlayerResult, ScoreRecord, ScoreResult, UserId,
    UserStats,
};
use tracing::instrument;

use crate::db::{DbError, schema};

/// User profile database model.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters)]
#[diesel(table_name = schema::users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct User {
    id: i32,
    name: String,
    email: Option<String>,
    wins: i32,
    ties: i32,
    games_played: i32,
    created_at: NaiveDateTime,
}

impl User {
    /// Domain identity of this user.
    pub fn user_id(&self) -> UserId {
        UserId::new(self.id)
    }

    /// Parses the stored counters into [`UserStats`].
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a counter is negative or the totals are
    /// inconsistent.
    #[instrument(skip(self), fields(user_id = self.id))]
    pub fn stats(&self) -> Result<UserStats, DbError> {
        let wins = counter("wins", self.wins)?;
        let ties = counter("ties", self.ties)?;
        let games_played = counter("games_played", self.games_played)?;
        Ok(UserStats::from_counts(wins, ties, games_played)?)
    }
}

fn counter(column: &str, value: i32) -> Result<u32, DbError> {
    u32::try_from(value)
        .map_err(|_| DbError::corrupt(format!("negative {column} counter: {value}")))
}

/// Insertable user model for registering new users.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::users)]
pub struct NewUserRow {
    name: String,
    email: Option<String>,
}

impl From<&tictactoe_core::NewUser> for NewUserRow {
    fn from(user: &tictactoe_core::NewUser) -> Self {
        Self {
            name: user.name().clone(),
            email: user.email().clone(),
        }
    }
}

/// Game header row. The move history lives in `game_moves`.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = schema::games)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub(crate) struct GameRow {
    pub(crate) id: i32,
    pub(crate) player_x_id: i32,
    pub(crate) player_o_id: i32,
    pub(crate) next_to_move_id: i32,
    pub(crate) game_over: bool,
    pub(crate) cancelled: bool,
    pub(crate) tie: bool,
    pub(crate) winner_id: Option<i32>,
    pub(crate) version: i32,
    pub(crate) created_at: NaiveDateTime,
    pub(crate) updated_at: NaiveDateTime,
}

/// The flag columns of a game, as written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StatusFlags {
    pub(crate) game_over: bool,
    pub(crate) cancelled: bool,
    pub(crate) tie: bool,
    pub(crate) winner_id: Option<i32>,
}

impl From<GameStatus> for StatusFlags {
    fn from(status: GameStatus) -> Self {
        let (game_over, cancelled, tie, winner_id) = match status {
            GameStatus::Active => (false, false, false, None),
            GameStatus::Won(winner) => (true, false, false, Some(winner.get())),
            GameStatus::Tied => (true, false, true, None),
            GameStatus::Cancelled => (false, true, false, None),
        };
        Self {
            game_over,
            cancelled,
            tie,
            winner_id,
        }
    }
}

impl StatusFlags {
    fn status(self) -> Result<GameStatus, DbError> {
        match (self.game_over, self.cancelled, self.tie, self.winner_id) {
            (false, false, false, None) => Ok(GameStatus::Active),
            (true, false, false, Some(winner)) => Ok(GameStatus::Won(UserId::new(winner))),
            (true, false, true, None) => Ok(GameStatus::Tied),
            (false, true, false, None) => Ok(GameStatus::Cancelled),
            _ => Err(DbError::corrupt(format!("contradictory game flags: {self:?}"))),
        }
    }
}

/// Insertable game header.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::games)]
pub(crate) struct NewGameRow {
    player_x_id: i32,
    player_o_id: i32,
    next_to_move_id: i32,
    game_over: bool,
    cancelled: bool,
    tie: bool,
    winner_id: Option<i32>,
    version: i32,
}

impl From<&Game> for NewGameRow {
    fn from(game: &Game) -> Self {
        let flags = StatusFlags::from(game.status());
        Self {
            player_x_id: game.player_x().get(),
            player_o_id: game.player_o().get(),
            next_to_move_id: game.next_to_move().get(),
            game_over: flags.game_over,
            cancelled: flags.cancelled,
            tie: flags.tie,
            winner_id: flags.winner_id,
            version: 0,
        }
    }
}

/// One history entry.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = schema::game_moves)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub(crate) struct MoveRow {
    pub(crate) game_id: i32,
    pub(crate) seq: i32,
    pub(crate) mark: String,
    pub(crate) cell: i32,
}

impl MoveRow {
    pub(crate) fn new(game_id: i32, seq: usize, placed: PlacedMark) -> Result<Self, DbError> {
        Ok(Self {
            game_id,
            seq: i32::try_from(seq).map_err(|_| DbError::new(format!("move seq {seq} too large")))?,
            mark: placed.mark.to_string(),
            cell: i32::try_from(placed.cell)
                .map_err(|_| DbError::new(format!("cell {} too large", placed.cell)))?,
        })
    }

    fn placed(&self) -> Result<PlacedMark, DbError> {
        let mark = Mark::from_str(&self.mark)
            .map_err(|_| DbError::corrupt(format!("unknown mark '{}'", self.mark)))?;
        let cell = usize::try_from(self.cell)
            .map_err(|_| DbError::corrupt(format!("negative cell {}", self.cell)))?;
        Ok(PlacedMark { mark, cell })
    }
}

/// A game as loaded from the store, with its optimistic-lock version.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct StoredGame {
    id: GameId,
    version: i32,
    game: Game,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl StoredGame {
    /// Rebuilds the aggregate from its header and ordered moves.
    #[instrument(skip(row, moves), fields(game_id = row.id, moves = moves.len()))]
    pub(crate) fn hydrate(row: GameRow, moves: &[MoveRow]) -> Result<Self, DbError> {
        let flags = StatusFlags {
            game_over: row.game_over,
            cancelled: row.cancelled,
            tie: row.tie,
            winner_id: row.winner_id,
        };
        let history = moves
            .iter()
            .enumerate()
            .map(|(expected, m)| {
                if usize::try_from(m.seq).ok() != Some(expected) {
                    return Err(DbError::corrupt(format!(
                        "game {} has a gap in its history at seq {}",
                        row.id, m.seq
                    )));
                }
                m.placed()
            })
            .collect::<Result<Vec<_>, _>>()?;

        let game = Game::restore(
            UserId::new(row.player_x_id),
            UserId::new(row.player_o_id),
            UserId::new(row.next_to_move_id),
            flags.status()?,
            history,
        )?;

        Ok(Self {
            id: GameId::new(row.id),
            version: row.version,
            game,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Score board row.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters)]
#[diesel(table_name = schema::scores)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Score {
    id: i32,
    game_id: i32,
    player_x_id: i32,
    player_o_id: i32,
    result: String,
    played_on: NaiveDate,
}

impl Score {
    /// Parses the stored result.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the string is not a known result.
    #[instrument(skip(self), fields(result = %self.result))]
    pub fn parse_result(&self) -> Result<ScoreResult, DbError> {
        ScoreResult::from_str(&self.result)
            .map_err(|_| DbError::corrupt(format!("Invalid result: '{}'", self.result)))
    }

    /// The game as seen by `user`, or `None` if they did not play.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the stored result is invalid.
    pub fn result_for(&self, user: UserId) -> Result<Option<PlayerResult>, DbError> {
        let result = self.parse_result()?;
        Ok(if user.get() == self.player_x_id {
            Some(result.for_side(true))
        } else if user.get() == self.player_o_id {
            Some(result.for_side(false))
        } else {
            None
        })
    }
}

/// Insertable score row.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::scores)]
pub(crate) struct NewScore {
    game_id: i32,
    player_x_id: i32,
    player_o_id: i32,
    result: String,
    played_on: NaiveDate,
}

impl NewScore {
    pub(crate) fn new(game_id: GameId, record: &ScoreRecord) -> Self {
        Self {
            game_id: game_id.get(),
            player_x_id: record.player_x().get(),
            player_o_id: record.player_o().get(),
            result: record.result().as_ref().to_string(),
            played_on: *record.date(),
        }
    }
}
