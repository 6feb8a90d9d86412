//! Database repository for users, games and scores.

use std::collections::HashMap;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tictactoe_core::{Game, GameId, NewUser, Settlement, UserId, UserStats};
use tracing::{debug, error, info, instrument, warn};

use crate::db::models::{GameRow, MoveRow, NewGameRow, NewScore, NewUserRow, StatusFlags};
use crate::db::{DbError, Score, StoredGame, User, schema};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Milliseconds a connection waits on a locked database before failing.
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Database repository for user, game and score operations.
#[derive(Debug, Clone)]
pub struct GameRepository {
    db_path: String,
}

impl GameRepository {
    /// Creates a new repository for the database at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the path is empty.
    #[instrument(skip(db_path), fields(db_path = %db_path))]
    pub fn new(db_path: String) -> Result<Self, DbError> {
        if db_path.trim().is_empty() {
            return Err(DbError::new("database path must not be empty"));
        }
        info!(path = %db_path, "Creating GameRepository");
        Ok(Self { db_path })
    }

    /// Path of the backing database.
    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    /// Establishes a database connection.
    #[instrument(skip(self))]
    fn connection(&self) -> Result<SqliteConnection, DbError> {
        debug!(path = %self.db_path, "Establishing connection");
        let mut conn = SqliteConnection::establish(&self.db_path).map_err(|e| {
            DbError::new(format!("Failed to connect to '{}': {}", self.db_path, e))
        })?;
        conn.batch_execute(&format!(
            "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = {BUSY_TIMEOUT_MS};"
        ))?;
        Ok(conn)
    }

    /// Applies any pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a migration fails.
    #[instrument(skip(self))]
    pub fn run_migrations(&self) -> Result<(), DbError> {
        let mut conn = self.connection()?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| DbError::new(format!("Migration failed: {}", e)))?;
        info!(count = applied.len(), "Migrations applied");
        Ok(())
    }

    /// Creates a new user profile.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] (kind `UniqueViolation`) if the name is taken.
    #[instrument(skip(self, user), fields(name = %user.name()))]
    pub fn create_user(&self, user: &NewUser) -> Result<User, DbError> {
        debug!("Creating user");
        let mut conn = self.connection()?;

        let user = diesel::insert_into(schema::users::table)
            .values(&NewUserRow::from(user))
            .returning(User::as_returning())
            .get_result(&mut conn)?;

        info!(user_id = user.id(), name = %user.name(), "User created");
        Ok(user)
    }

    /// Gets a user by name. Returns `None` if not found.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn get_user_by_name(&self, name: &str) -> Result<Option<User>, DbError> {
        let mut conn = self.connection()?;
        let user = schema::users::table
            .filter(schema::users::name.eq(name))
            .select(User::as_select())
            .first(&mut conn)
            .optional()?;

        debug!(found = user.is_some(), "User lookup by name");
        Ok(user)
    }

    /// Gets a user by id. Returns `None` if not found.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn get_user(&self, id: UserId) -> Result<Option<User>, DbError> {
        let mut conn = self.connection()?;
        let user = schema::users::table
            .find(id.get())
            .select(User::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(user)
    }

    /// Gets several users at once, keyed by id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub fn get_users(&self, ids: &[UserId]) -> Result<HashMap<UserId, User>, DbError> {
        let mut conn = self.connection()?;
        let raw: Vec<i32> = ids.iter().map(|id| id.get()).collect();
        let users = schema::users::table
            .filter(schema::users::id.eq_any(raw))
            .select(User::as_select())
            .load(&mut conn)?;
        Ok(users.into_iter().map(|u| (u.user_id(), u)).collect())
    }

    /// Lists all user profiles, ordered by creation.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn list_users(&self) -> Result<Vec<User>, DbError> {
        let mut conn = self.connection()?;
        let users = schema::users::table
            .order(schema::users::id.asc())
            .select(User::as_select())
            .load(&mut conn)?;

        info!(count = users.len(), "Users loaded");
        Ok(users)
    }

    /// Stores a freshly created game.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self, game), fields(player_x = %game.player_x(), player_o = %game.player_o()))]
    pub fn insert_game(&self, game: &Game) -> Result<StoredGame, DbError> {
        let mut conn = self.connection()?;
        let stored = conn.transaction::<_, DbError, _>(|conn| {
            let row = diesel::insert_into(schema::games::table)
                .values(&NewGameRow::from(game))
                .returning(GameRow::as_returning())
                .get_result(conn)?;
            let moves = insert_moves(conn, row.id, game, 0)?;
            StoredGame::hydrate(row, &moves)
        })?;

        info!(game_id = %stored.id(), "Game stored");
        Ok(stored)
    }

    /// Loads a game. Returns `None` if not found.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs or the rows are corrupt.
    #[instrument(skip(self))]
    pub fn load_game(&self, id: GameId) -> Result<Option<StoredGame>, DbError> {
        let mut conn = self.connection()?;
        load_game(&mut conn, id)
    }

    /// Lists games where the user sits on either side, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs or the rows are corrupt.
    #[instrument(skip(self))]
    pub fn list_games_for_user(&self, user: UserId) -> Result<Vec<StoredGame>, DbError> {
        let mut conn = self.connection()?;
        let rows = schema::games::table
            .filter(
                schema::games::player_x_id
                    .eq(user.get())
                    .or(schema::games::player_o_id.eq(user.get())),
            )
            .order(schema::games::id.asc())
            .select(GameRow::as_select())
            .load(&mut conn)?;

        let games = hydrate_all(&mut conn, rows)?;
        info!(user_id = %user, count = games.len(), "User games loaded");
        Ok(games)
    }

    /// Lists games that still accept moves.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs or the rows are corrupt.
    #[instrument(skip(self))]
    pub fn list_active_games(&self) -> Result<Vec<StoredGame>, DbError> {
        let mut conn = self.connection()?;
        let rows = schema::games::table
            .filter(schema::games::game_over.eq(false))
            .filter(schema::games::cancelled.eq(false))
            .order(schema::games::id.asc())
            .select(GameRow::as_select())
            .load(&mut conn)?;
        hydrate_all(&mut conn, rows)
    }

    /// Lists cancelled games.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs or the rows are corrupt.
    #[instrument(skip(self))]
    pub fn list_cancelled_games(&self) -> Result<Vec<StoredGame>, DbError> {
        let mut conn = self.connection()?;
        let rows = schema::games::table
            .filter(schema::games::cancelled.eq(true))
            .order(schema::games::id.asc())
            .select(GameRow::as_select())
            .load(&mut conn)?;
        hydrate_all(&mut conn, rows)
    }

    /// Writes a new state of `previous` in one transaction.
    ///
    /// The game header is only updated if its version still matches
    /// `previous`; new history entries are appended; when `settlement` is
    /// present both players' counters are bumped and the score row is
    /// inserted. Returns `None`, writing nothing, if another writer got there
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs. Nothing is written.
    #[instrument(
        skip(self, previous, game, settlement),
        fields(game_id = %previous.id(), version = previous.version(), settles = settlement.is_some())
    )]
    pub fn commit_game(
        &self,
        previous: &StoredGame,
        game: &Game,
        settlement: Option<&Settlement>,
    ) -> Result<Option<StoredGame>, DbError> {
        use schema::games::dsl as g;

        let id = previous.id().get();
        let version = *previous.version();
        let flags = StatusFlags::from(game.status());
        let mut conn = self.connection()?;

        let committed = conn.transaction::<_, DbError, _>(|conn| {
            let updated = diesel::update(g::games.filter(g::id.eq(id)).filter(g::version.eq(version)))
                .set((
                    g::next_to_move_id.eq(game.next_to_move().get()),
                    g::game_over.eq(flags.game_over),
                    g::cancelled.eq(flags.cancelled),
                    g::tie.eq(flags.tie),
                    g::winner_id.eq(flags.winner_id),
                    g::version.eq(version + 1),
                    g::updated_at.eq(chrono::Utc::now().naive_utc()),
                ))
                .execute(conn)?;

            if updated == 0 {
                return Ok(false);
            }

            insert_moves(conn, id, game, previous.game().history().len())?;

            if let Some(settlement) = settlement {
                for (user, update) in settlement.updates() {
                    let mut delta = UserStats::default();
                    delta.apply(update);
                    let wins = i32::try_from(*delta.wins())
                        .map_err(|_| DbError::new("win delta out of range"))?;
                    let ties = i32::try_from(*delta.ties())
                        .map_err(|_| DbError::new("tie delta out of range"))?;
                    let rows = diesel::update(schema::users::table.find(user.get()))
                        .set((
                            schema::users::wins.eq(schema::users::wins + wins),
                            schema::users::ties.eq(schema::users::ties + ties),
                            schema::users::games_played.eq(schema::users::games_played + 1),
                        ))
                        .execute(conn)?;
                    if rows != 1 {
                        error!(user_id = %user, "Settlement player missing");
                        return Err(DbError::corrupt(format!(
                            "user {} missing during settlement of game {}",
                            user, id
                        )));
                    }
                }
                diesel::insert_into(schema::scores::table)
                    .values(&NewScore::new(*previous.id(), settlement.score()))
                    .execute(conn)?;
                info!(result = %settlement.score().result(), "Settlement recorded");
            }
            Ok(true)
        })?;

        if !committed {
            warn!("Stale game version, commit skipped");
            return Ok(None);
        }

        let stored = load_game(&mut conn, *previous.id())?
            .ok_or_else(|| DbError::new(format!("game {} vanished after commit", id)))?;
        debug!(version = stored.version(), "Game committed");
        Ok(Some(stored))
    }

    /// Lists all scores, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn list_scores(&self) -> Result<Vec<Score>, DbError> {
        let mut conn = self.connection()?;
        let scores = schema::scores::table
            .order((schema::scores::played_on.desc(), schema::scores::id.desc()))
            .select(Score::as_select())
            .load(&mut conn)?;
        info!(count = scores.len(), "Scores loaded");
        Ok(scores)
    }

    /// Lists scores of games the user played, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn list_scores_for_user(&self, user: UserId) -> Result<Vec<Score>, DbError> {
        let mut conn = self.connection()?;
        let scores = schema::scores::table
            .filter(
                schema::scores::player_x_id
                    .eq(user.get())
                    .or(schema::scores::player_o_id.eq(user.get())),
            )
            .order((schema::scores::played_on.desc(), schema::scores::id.desc()))
            .select(Score::as_select())
            .load(&mut conn)?;
        info!(user_id = %user, count = scores.len(), "User scores loaded");
        Ok(scores)
    }
}

/// Appends history entries from index `from` onward.
fn insert_moves(
    conn: &mut SqliteConnection,
    game_id: i32,
    game: &Game,
    from: usize,
) -> Result<Vec<MoveRow>, DbError> {
    let mut rows = Vec::new();
    for (seq, placed) in game.history().iter().enumerate().skip(from) {
        let row = MoveRow::new(game_id, seq, *placed)?;
        diesel::insert_into(schema::game_moves::table)
            .values(&row)
            .execute(conn)?;
        rows.push(row);
    }
    Ok(rows)
}

fn load_game(conn: &mut SqliteConnection, id: GameId) -> Result<Option<StoredGame>, DbError> {
    let row = schema::games::table
        .find(id.get())
        .select(GameRow::as_select())
        .first(conn)
        .optional()?;

    let Some(row) = row else {
        debug!(game_id = %id, "Game not found");
        return Ok(None);
    };

    let moves = schema::game_moves::table
        .filter(schema::game_moves::game_id.eq(row.id))
        .order(schema::game_moves::seq.asc())
        .select(MoveRow::as_select())
        .load(conn)?;
    StoredGame::hydrate(row, &moves).map(Some)
}

fn hydrate_all(conn: &mut SqliteConnection, rows: Vec<GameRow>) -> Result<Vec<StoredGame>, DbError> {
    let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
    let all_moves = schema::game_moves::table
        .filter(schema::game_moves::game_id.eq_any(ids))
        .order((schema::game_moves::game_id.asc(), schema::game_moves::seq.asc()))
        .select(MoveRow::as_select())
        .load(conn)?;

    let mut by_game: HashMap<i32, Vec<MoveRow>> = HashMap::new();
    for m in all_moves {
        by_game.entry(m.game_id).or_default().push(m);
    }

    rows.into_iter()
        .map(|row| {
            let moves = by_game.remove(&row.id).unwrap_or_default();
            StoredGame::hydrate(row, &moves)
        })
        .collect()
}
