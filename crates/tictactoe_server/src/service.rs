//! League business logic layer.
//!
//! [`GameService`] wraps [`GameRepository`] with the request-level
//! operations: it resolves names to users, runs the domain operation on an
//! in-memory copy of the game, and commits the result with an optimistic
//! version check, retrying when a concurrent writer got there first.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use tictactoe_core::{
    CancelOutcome, Game, GameError, GameId, MoveOutcome, NewUser, ScoreResult, Settlement, UserId,
};
use tracing::{debug, info, instrument, warn};

use crate::cache::AverageMovesCache;
use crate::db::{DbError, GameRepository, Score, StoredGame, User};
use crate::reminders::{Reminder, reminders_for};
use crate::views::{
    GameListView, GameView, MessageView, MoveView, RankingEntry, RankingsView, RegisteredView,
    ScoreView, ScoresView, UserScoreView, UserScoresView, UserView, cell_label,
};
use crate::ServiceError;

/// Commit attempts per mutating request unless configured otherwise.
pub const DEFAULT_COMMIT_ATTEMPTS: u32 = 3;

/// Result of running a domain operation on a loaded game.
struct Applied<T> {
    value: T,
    settlement: Option<Settlement>,
    changed: bool,
}

/// Service layer for league operations.
#[derive(Debug, Clone)]
pub struct GameService {
    repository: GameRepository,
    cache: AverageMovesCache,
    commit_attempts: u32,
}

impl GameService {
    /// Creates a service backed by the given repository.
    #[instrument(skip(repository))]
    pub fn new(repository: GameRepository) -> Self {
        info!("Creating GameService");
        Self {
            repository,
            cache: AverageMovesCache::new(),
            commit_attempts: DEFAULT_COMMIT_ATTEMPTS,
        }
    }

    /// Sets how many times a contended commit is attempted (at least once).
    pub fn with_commit_attempts(mut self, attempts: u32) -> Self {
        self.commit_attempts = attempts.max(1);
        self
    }

    /// Returns the underlying repository.
    pub fn repository(&self) -> &GameRepository {
        &self.repository
    }

    /// Returns the average-moves cache.
    pub fn cache(&self) -> &AverageMovesCache {
        &self.cache
    }

    /// Registers a new user.
    ///
    /// # Errors
    ///
    /// [`GameError::Validation`] for a blank name, [`GameError::Conflict`]
    /// if the name is taken.
    #[instrument(skip(self))]
    pub fn register_user(
        &self,
        name: &str,
        email: Option<&str>,
    ) -> Result<RegisteredView, ServiceError> {
        let new_user = NewUser::register(name, email)?;
        let conflict = || {
            GameError::Conflict(format!(
                "A user named '{}' already exists",
                new_user.name()
            ))
        };

        if self.repository.get_user_by_name(new_user.name())?.is_some() {
            warn!("Duplicate user name");
            return Err(conflict().into());
        }

        let user = self.repository.create_user(&new_user).map_err(|e| {
            if e.is_unique_violation() {
                ServiceError::from(conflict())
            } else {
                ServiceError::from(e)
            }
        })?;

        let stats = user.stats()?;
        info!(user_id = user.id(), "User registered");
        Ok(RegisteredView {
            user: UserView::new(user.name().clone(), &stats),
            message: format!("User {} created!", user.name()),
        })
    }

    /// Starts a game between two registered users; `user_x` moves first.
    ///
    /// # Errors
    ///
    /// [`GameError::NotFound`] for an unknown user, [`GameError::Validation`]
    /// if both names are the same user.
    #[instrument(skip(self))]
    pub fn new_game(&self, user_x: &str, user_o: &str) -> Result<GameView, ServiceError> {
        let x = self.require_user(user_x)?;
        let o = self.require_user(user_o)?;
        let game = Game::new(x.user_id(), o.user_id())?;
        let stored = self.repository.insert_game(&game)?;

        self.schedule_average_refresh();
        self.view_game(&stored, "Good luck playing Tic Tac Toe")
    }

    /// Returns the current state of a game.
    ///
    /// # Errors
    ///
    /// [`GameError::NotFound`] if the game does not exist.
    #[instrument(skip(self))]
    pub fn get_game(&self, id: GameId) -> Result<GameView, ServiceError> {
        let stored = self.require_game(id)?;
        let game = stored.game();
        let message = if game.is_over() {
            "Game already over!"
        } else if game.is_cancelled() {
            "This game is cancelled"
        } else {
            "Time to make a move!"
        };
        self.view_game(&stored, message)
    }

    /// Cancels an active game. Ended games are reported, not changed.
    ///
    /// # Errors
    ///
    /// [`GameError::NotFound`] if the game does not exist.
    #[instrument(skip(self))]
    pub fn cancel_game(&self, id: GameId) -> Result<GameView, ServiceError> {
        let (stored, outcome) = self.update_game(id, |game| {
            let outcome = game.cancel();
            Ok(Applied {
                value: outcome,
                settlement: None,
                changed: outcome == CancelOutcome::Cancelled,
            })
        })?;
        self.view_game(&stored, outcome.message())
    }

    /// Plays `user_name`'s mark into `cell`.
    ///
    /// When the move ends the game, the game state, both players' statistics
    /// and the score record are committed together.
    ///
    /// # Errors
    ///
    /// [`GameError::NotFound`], [`GameError::GameNotActive`],
    /// [`GameError::OutOfTurn`], [`GameError::OutOfRange`],
    /// [`GameError::CellOccupied`], or [`ServiceError::Contention`].
    #[instrument(skip(self))]
    pub fn make_move(
        &self,
        id: GameId,
        user_name: &str,
        cell: usize,
    ) -> Result<GameView, ServiceError> {
        let user = self.require_user(user_name)?;
        let actor = user.user_id();
        let today = today();

        let (stored, outcome) = self.update_game(id, |game| {
            let outcome = game.apply_move(actor, cell, today)?;
            let settlement = match &outcome {
                MoveOutcome::Finished(settlement) => Some(settlement.clone()),
                MoveOutcome::Continue => None,
            };
            Ok(Applied {
                value: outcome,
                settlement,
                changed: true,
            })
        })?;

        let message = match outcome {
            MoveOutcome::Finished(_) if stored.game().is_tie() => "Game tied!".to_string(),
            MoveOutcome::Finished(_) => "You won the game!".to_string(),
            MoveOutcome::Continue => {
                let next = self
                    .repository
                    .get_user(stored.game().next_to_move())?
                    .map(|u| u.name().clone())
                    .unwrap_or_else(|| stored.game().next_to_move().to_string());
                format!("Move accepted, waiting for {next}")
            }
        };
        info!(%message, "Move applied");
        self.view_game(&stored, &message)
    }

    /// Lists every game the user played or is playing.
    ///
    /// # Errors
    ///
    /// [`GameError::NotFound`] if the user does not exist.
    #[instrument(skip(self))]
    pub fn user_games(&self, user_name: &str) -> Result<GameListView, ServiceError> {
        let user = self.require_user(user_name)?;
        let games = self.repository.list_games_for_user(user.user_id())?;
        let names = self.names_for(games.iter().flat_map(|g| {
            [g.game().player_x(), g.game().player_o()]
        }))?;

        let games = games
            .iter()
            .map(|g| build_game_view(g, &names, ""))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(GameListView { games })
    }

    /// The score board, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] on store failure.
    #[instrument(skip(self))]
    pub fn scores(&self) -> Result<ScoresView, ServiceError> {
        let scores = self.repository.list_scores()?;
        let names = self.names_for(scores.iter().flat_map(|s| {
            [UserId::new(*s.player_x_id()), UserId::new(*s.player_o_id())]
        }))?;
        let items = scores
            .iter()
            .map(|s| build_score_view(s, &names))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ScoresView { items })
    }

    /// One user's finished games, newest first.
    ///
    /// # Errors
    ///
    /// [`GameError::NotFound`] if the user does not exist.
    #[instrument(skip(self))]
    pub fn user_scores(&self, user_name: &str) -> Result<UserScoresView, ServiceError> {
        let user = self.require_user(user_name)?;
        let id = user.user_id();
        let scores = self.repository.list_scores_for_user(id)?;
        let names = self.names_for(scores.iter().flat_map(|s| {
            [UserId::new(*s.player_x_id()), UserId::new(*s.player_o_id())]
        }))?;

        let mut items = Vec::with_capacity(scores.len());
        for score in &scores {
            let Some(outcome) = score.result_for(id)? else {
                continue;
            };
            let opponent_id = if *score.player_x_id() == id.get() {
                *score.player_o_id()
            } else {
                *score.player_x_id()
            };
            items.push(UserScoreView {
                user_name: user.name().clone(),
                opponent: name_of(&names, UserId::new(opponent_id))?,
                outcome: outcome.to_string(),
                date: score.played_on().to_string(),
            });
        }
        Ok(UserScoresView { items })
    }

    /// All users ordered by points, then win rate, then name.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] on store failure or corrupt counters.
    #[instrument(skip(self))]
    pub fn rankings(&self) -> Result<RankingsView, ServiceError> {
        let users = self.repository.list_users()?;
        let mut ranked = users
            .iter()
            .map(|u| Ok((u.name().clone(), u.stats()?)))
            .collect::<Result<Vec<_>, ServiceError>>()?;

        ranked.sort_by(|(a_name, a), (b_name, b)| {
            b.points()
                .cmp(&a.points())
                .then_with(|| b.win_rate().total_cmp(&a.win_rate()))
                .then_with(|| a_name.cmp(b_name))
        });

        let users = ranked
            .into_iter()
            .enumerate()
            .map(|(i, (name, stats))| RankingEntry {
                rank: i + 1,
                user: UserView::new(name, &stats),
            })
            .collect();
        Ok(RankingsView { users })
    }

    /// The cached average-moves message; empty until first computed.
    #[instrument(skip(self))]
    pub fn average_moves_remaining(&self) -> MessageView {
        MessageView::new(self.cache.get().unwrap_or_default())
    }

    /// Recomputes the average free cells across active games.
    ///
    /// With no active games the cached value is left as it was and `None`
    /// is returned.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] on store failure.
    #[instrument(skip(self))]
    pub fn refresh_average_moves(&self) -> Result<Option<f64>, ServiceError> {
        let games = self.repository.list_active_games()?;
        if games.is_empty() {
            debug!("No active games, cache left unchanged");
            return Ok(None);
        }
        let total: usize = games.iter().map(|g| g.game().remaining_moves()).sum();
        let average = total as f64 / games.len() as f64;
        self.cache.store(average);
        info!(average, games = games.len(), "Average moves refreshed");
        Ok(Some(average))
    }

    /// Reminders owed to players of active and cancelled games.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] on store failure.
    #[instrument(skip(self))]
    pub fn reminders(&self) -> Result<Vec<Reminder>, ServiceError> {
        let mut games = self.repository.list_active_games()?;
        games.extend(self.repository.list_cancelled_games()?);

        let ids: Vec<UserId> = games
            .iter()
            .flat_map(|g| [g.game().player_x(), g.game().player_o()])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let users = self.repository.get_users(&ids)?;

        let reminders: Vec<Reminder> = games
            .iter()
            .flat_map(|g| reminders_for(g, &users))
            .collect();
        info!(count = reminders.len(), "Reminders collected");
        Ok(reminders)
    }

    /// Runs the average refresh off the request path when a runtime is
    /// available, inline otherwise.
    fn schedule_average_refresh(&self) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let service = self.clone();
                drop(handle.spawn_blocking(move || {
                    if let Err(e) = service.refresh_average_moves() {
                        warn!(error = %e, "Average refresh failed");
                    }
                }));
            }
            Err(_) => {
                if let Err(e) = self.refresh_average_moves() {
                    warn!(error = %e, "Average refresh failed");
                }
            }
        }
    }

    /// Loads, mutates and commits a game, retrying on version conflicts.
    fn update_game<T>(
        &self,
        id: GameId,
        mut apply: impl FnMut(&mut Game) -> Result<Applied<T>, GameError>,
    ) -> Result<(StoredGame, T), ServiceError> {
        for attempt in 1..=self.commit_attempts {
            let stored = self.require_game(id)?;
            let mut game = stored.game().clone();
            let applied = apply(&mut game)?;

            if !applied.changed {
                return Ok((stored, applied.value));
            }

            match self
                .repository
                .commit_game(&stored, &game, applied.settlement.as_ref())?
            {
                Some(saved) => return Ok((saved, applied.value)),
                None => warn!(attempt, game_id = %id, "Concurrent update, retrying"),
            }
        }
        Err(ServiceError::Contention {
            game_id: id,
            attempts: self.commit_attempts,
        })
    }

    fn require_user(&self, name: &str) -> Result<User, ServiceError> {
        self.repository
            .get_user_by_name(name.trim())?
            .ok_or_else(|| GameError::NotFound(format!("User '{}'", name)).into())
    }

    fn require_game(&self, id: GameId) -> Result<StoredGame, ServiceError> {
        self.repository
            .load_game(id)?
            .ok_or_else(|| GameError::NotFound(format!("Game {}", id.get())).into())
    }

    fn names_for(
        &self,
        ids: impl IntoIterator<Item = UserId>,
    ) -> Result<HashMap<UserId, String>, ServiceError> {
        let ids: Vec<UserId> = ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        let users = self.repository.get_users(&ids)?;
        Ok(users
            .into_iter()
            .map(|(id, user)| (id, user.name().clone()))
            .collect())
    }

    fn view_game(&self, stored: &StoredGame, message: &str) -> Result<GameView, ServiceError> {
        let game = stored.game();
        let names = self.names_for([game.player_x(), game.player_o()])?;
        build_game_view(stored, &names, message)
    }
}

fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

fn name_of(names: &HashMap<UserId, String>, id: UserId) -> Result<String, ServiceError> {
    names.get(&id).cloned().ok_or_else(|| {
        ServiceError::Db(DbError::corrupt(format!(
            "{} is referenced but does not exist",
            id
        )))
    })
}

fn build_game_view(
    stored: &StoredGame,
    names: &HashMap<UserId, String>,
    message: &str,
) -> Result<GameView, ServiceError> {
    let game = stored.game();
    let next_to_move = if game.is_active() {
        Some(name_of(names, game.next_to_move())?)
    } else {
        None
    };
    let winner = game.winner().map(|w| name_of(names, w)).transpose()?;

    Ok(GameView {
        game_id: stored.id().get(),
        player_x: name_of(names, game.player_x())?,
        player_o: name_of(names, game.player_o())?,
        next_to_move,
        board: game.board().cells().iter().map(|c| cell_label(*c)).collect(),
        history: game
            .history()
            .iter()
            .map(|p| MoveView {
                mark: p.mark.to_string(),
                cell: p.cell,
            })
            .collect(),
        game_over: game.is_over(),
        cancelled: game.is_cancelled(),
        tie: game.is_tie(),
        winner,
        remaining_moves: game.remaining_moves(),
        message: message.to_string(),
    })
}

fn build_score_view(
    score: &Score,
    names: &HashMap<UserId, String>,
) -> Result<ScoreView, ServiceError> {
    let result = score.parse_result()?;
    let player_x = UserId::new(*score.player_x_id());
    let player_o = UserId::new(*score.player_o_id());
    let winner = match result {
        ScoreResult::PlayerXWon => Some(name_of(names, player_x)?),
        ScoreResult::PlayerOWon => Some(name_of(names, player_o)?),
        ScoreResult::Tie => None,
    };
    Ok(ScoreView {
        game_id: *score.game_id(),
        player_x: name_of(names, player_x)?,
        player_o: name_of(names, player_o)?,
        result: result.as_ref().to_string(),
        winner,
        date: score.played_on().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn setup(attempts: u32) -> (NamedTempFile, GameService, UserId, GameId) {
        let db_file = NamedTempFile::new().expect("Failed to create temp file");
        let db_path = db_file.path().to_str().expect("Invalid path").to_string();
        let repo = GameRepository::new(db_path).expect("Failed to create repository");
        repo.run_migrations().expect("Migrations failed");
        let svc = GameService::new(repo).with_commit_attempts(attempts);

        svc.register_user("alice", None).expect("Register failed");
        svc.register_user("bob", None).expect("Register failed");
        let game = svc.new_game("alice", "bob").expect("New game failed");
        let alice = svc.require_user("alice").expect("alice missing").user_id();
        (db_file, svc, alice, GameId::new(game.game_id))
    }

    /// Commits a move by `actor` on the current version of the game.
    fn rival_move(repo: &GameRepository, id: GameId, actor: UserId, cell: usize) {
        let current = repo.load_game(id).unwrap().unwrap();
        let mut game = current.game().clone();
        game.apply_move(actor, cell, today()).unwrap();
        repo.commit_game(&current, &game, None).unwrap().unwrap();
    }

    fn cancel_with_rival(
        svc: &GameService,
        id: GameId,
        alice: UserId,
        rival_turns: usize,
    ) -> (Result<(StoredGame, CancelOutcome), ServiceError>, usize) {
        let repo = svc.repository().clone();
        let mut calls = 0;
        let result = svc.update_game(id, |game| {
            calls += 1;
            if calls <= rival_turns {
                rival_move(&repo, id, alice, 4);
            }
            let outcome = game.cancel();
            Ok(Applied {
                value: outcome,
                settlement: None,
                changed: true,
            })
        });
        (result, calls)
    }

    #[test]
    fn test_exhausted_retries_report_contention() {
        let (_db, svc, alice, id) = setup(1);

        let (result, calls) = cancel_with_rival(&svc, id, alice, 1);
        assert_eq!(calls, 1);
        assert!(matches!(
            result,
            Err(ServiceError::Contention { game_id, attempts: 1 }) if game_id == id
        ));

        let stored = svc.repository().load_game(id).unwrap().unwrap();
        assert!(!stored.game().is_cancelled());
        assert_eq!(stored.game().history().len(), 1);
        assert_eq!(*stored.version(), 1);
    }

    #[test]
    fn test_stale_commit_is_retried_on_fresh_state() {
        let (_db, svc, alice, id) = setup(DEFAULT_COMMIT_ATTEMPTS);

        let (result, calls) = cancel_with_rival(&svc, id, alice, 1);
        assert_eq!(calls, 2);
        let (stored, outcome) = result.expect("Retry should succeed");
        assert_eq!(outcome, CancelOutcome::Cancelled);
        assert!(stored.game().is_cancelled());
        assert_eq!(stored.game().history().len(), 1);
        assert_eq!(*stored.version(), 2);
    }

    #[test]
    fn test_commit_attempts_are_at_least_one() {
        let (_db, svc, _, _) = setup(0);
        assert_eq!(svc.commit_attempts, 1);
    }
}
