//! The game aggregate: board, turn order, lifecycle and history.
//!
//! A game starts `Active` and ends either `Won`, `Tied` or `Cancelled`. The
//! terminal transition of a move produces a [`Settlement`]: the score record
//! and the statistics owed to each participant. The caller commits the new
//! game state and the settlement together.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::rules::{Board, CELL_COUNT, Mark, is_board_full, is_cell_free, is_winner};
use crate::score::{ScoreRecord, ScoreResult};
use crate::user::{StatUpdate, UserStats};
use crate::{GameError, Inactive, InvariantViolation, UserId};

/// Lifecycle state of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    /// Moves are accepted.
    Active,
    /// Ended with a winner.
    Won(UserId),
    /// Ended with a full board and no winner.
    Tied,
    /// Abandoned before it finished.
    Cancelled,
}

/// One entry of the move history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlacedMark {
    /// The mark written.
    pub mark: Mark,
    /// Where it was written.
    pub cell: usize,
}

/// What a finished game owes its participants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    score: ScoreRecord,
    x_update: StatUpdate,
    o_update: StatUpdate,
}

impl Settlement {
    fn new(score: ScoreRecord) -> Self {
        let (x_update, o_update) = match score.result() {
            ScoreResult::PlayerXWon => (StatUpdate::Win, StatUpdate::Loss),
            ScoreResult::PlayerOWon => (StatUpdate::Loss, StatUpdate::Win),
            ScoreResult::Tie => (StatUpdate::Tie, StatUpdate::Tie),
        };
        Self {
            score,
            x_update,
            o_update,
        }
    }

    /// The score record to append.
    pub fn score(&self) -> &ScoreRecord {
        &self.score
    }

    /// One statistics update per participant, X first.
    pub fn updates(&self) -> [(UserId, StatUpdate); 2] {
        [
            (*self.score.player_x(), self.x_update),
            (*self.score.player_o(), self.o_update),
        ]
    }

    /// The update owed to `user`, if they played.
    pub fn update_for(&self, user: UserId) -> Option<StatUpdate> {
        self.updates()
            .into_iter()
            .find(|(id, _)| *id == user)
            .map(|(_, update)| update)
    }

    /// Applies the settlement to both players' statistics.
    pub fn apply(&self, x_stats: &mut UserStats, o_stats: &mut UserStats) {
        x_stats.apply(self.x_update);
        o_stats.apply(self.o_update);
    }
}

/// Result of a successful move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The game goes on with the other player.
    Continue,
    /// The move ended the game.
    Finished(Settlement),
}

/// Result of a cancel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The game was active and is now cancelled.
    Cancelled,
    /// Nothing changed: the game had already ended.
    AlreadyOver,
    /// Nothing changed: the game was cancelled earlier.
    AlreadyCancelled,
}

impl CancelOutcome {
    /// Status line for the player.
    pub fn message(self) -> &'static str {
        match self {
            CancelOutcome::Cancelled => "Game cancelled!",
            CancelOutcome::AlreadyOver => "Game already over!",
            CancelOutcome::AlreadyCancelled => "Game already cancelled!",
        }
    }
}

/// A two-player game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    player_x: UserId,
    player_o: UserId,
    next_to_move: UserId,
    status: GameStatus,
    board: Board,
    history: Vec<PlacedMark>,
}

impl Game {
    /// Starts a game. X moves first.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Validation`] if both seats name the same user.
    #[instrument]
    pub fn new(player_x: UserId, player_o: UserId) -> Result<Self, GameError> {
        if player_x == player_o {
            warn!("Rejected game against self");
            return Err(GameError::Validation(
                "a game needs two different players".to_string(),
            ));
        }
        info!("New game created");
        Ok(Self {
            player_x,
            player_o,
            next_to_move: player_x,
            status: GameStatus::Active,
            board: Board::new(),
            history: Vec::new(),
        })
    }

    /// Rebuilds a game from persisted parts by replaying its history.
    ///
    /// # Errors
    ///
    /// Returns [`InvariantViolation`] if the parts are not a state the game
    /// could have reached.
    #[instrument(skip(history), fields(moves = history.len()))]
    pub fn restore(
        player_x: UserId,
        player_o: UserId,
        next_to_move: UserId,
        status: GameStatus,
        history: Vec<PlacedMark>,
    ) -> Result<Self, InvariantViolation> {
        if player_x == player_o {
            return Err(InvariantViolation::new("game has the same player on both sides"));
        }

        let mut board = Board::new();
        for (seq, placed) in history.iter().enumerate() {
            let expected = if seq % 2 == 0 { Mark::X } else { Mark::O };
            if placed.mark != expected {
                return Err(InvariantViolation::new(format!(
                    "move {seq} is {} but {expected} was due",
                    placed.mark
                )));
            }
            if !is_cell_free(&board, placed.cell) {
                return Err(InvariantViolation::new(format!(
                    "move {seq} targets unavailable cell {}",
                    placed.cell
                )));
            }
            if is_winner(&board, Mark::X) || is_winner(&board, Mark::O) {
                return Err(InvariantViolation::new(format!(
                    "move {seq} was played after the game was won"
                )));
            }
            board.place(placed.cell, placed.mark);
        }

        let game = Self {
            player_x,
            player_o,
            next_to_move,
            status,
            board,
            history,
        };
        game.check_status()?;
        debug!(status = ?game.status, "Game restored");
        Ok(game)
    }

    fn check_status(&self) -> Result<(), InvariantViolation> {
        let decided = is_winner(&self.board, Mark::X) || is_winner(&self.board, Mark::O);
        let full = is_board_full(&self.board);
        let last_mover = self.history.last().map(|p| self.player_with(p.mark));
        let due = if self.history.len() % 2 == 0 {
            self.player_x
        } else {
            self.player_o
        };

        let consistent = match self.status {
            GameStatus::Active | GameStatus::Cancelled => {
                !decided && !full && self.next_to_move == due
            }
            GameStatus::Won(winner) => match self.mark_of(winner) {
                Some(mark) => {
                    is_winner(&self.board, mark)
                        && last_mover == Some(winner)
                        && self.next_to_move == winner
                }
                None => false,
            },
            GameStatus::Tied => full && !decided && self.next_to_move == self.player_x,
        };

        if consistent {
            Ok(())
        } else {
            Err(InvariantViolation::new(format!(
                "status {:?} does not match board after {} moves",
                self.status,
                self.history.len()
            )))
        }
    }

    /// The X player.
    pub fn player_x(&self) -> UserId {
        self.player_x
    }

    /// The O player.
    pub fn player_o(&self) -> UserId {
        self.player_o
    }

    /// The player whose turn it is (the last mover once the game is over).
    pub fn next_to_move(&self) -> UserId {
        self.next_to_move
    }

    /// Lifecycle state.
    pub fn status(&self) -> GameStatus {
        self.status
    }

    /// The board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Moves in the order they were played.
    pub fn history(&self) -> &[PlacedMark] {
        &self.history
    }

    /// True while moves are accepted.
    pub fn is_active(&self) -> bool {
        self.status == GameStatus::Active
    }

    /// True once the game was won or tied.
    pub fn is_over(&self) -> bool {
        matches!(self.status, GameStatus::Won(_) | GameStatus::Tied)
    }

    /// True if the game was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.status == GameStatus::Cancelled
    }

    /// True if the game ended without a winner.
    pub fn is_tie(&self) -> bool {
        self.status == GameStatus::Tied
    }

    /// The winner, if the game was won.
    pub fn winner(&self) -> Option<UserId> {
        match self.status {
            GameStatus::Won(winner) => Some(winner),
            _ => None,
        }
    }

    /// Why the game rejects moves, or `None` while active.
    pub fn inactive(&self) -> Option<Inactive> {
        match self.status {
            GameStatus::Active => None,
            GameStatus::Won(_) | GameStatus::Tied => Some(Inactive::Over),
            GameStatus::Cancelled => Some(Inactive::Cancelled),
        }
    }

    /// The mark `user` plays, or `None` if they are not in this game.
    pub fn mark_of(&self, user: UserId) -> Option<Mark> {
        if user == self.player_x {
            Some(Mark::X)
        } else if user == self.player_o {
            Some(Mark::O)
        } else {
            None
        }
    }

    /// The player holding `mark`.
    pub fn player_with(&self, mark: Mark) -> UserId {
        match mark {
            Mark::X => self.player_x,
            Mark::O => self.player_o,
        }
    }

    /// The other participant, or `None` if `user` is not in this game.
    pub fn opponent_of(&self, user: UserId) -> Option<UserId> {
        self.mark_of(user).map(|mark| self.player_with(mark.opponent()))
    }

    /// True if `user` sits on either side.
    pub fn involves(&self, user: UserId) -> bool {
        self.mark_of(user).is_some()
    }

    /// Free cells left in an active game; zero once it has ended.
    pub fn remaining_moves(&self) -> usize {
        if self.is_active() {
            CELL_COUNT - self.board.marked_count()
        } else {
            0
        }
    }

    /// Plays `actor`'s mark into `cell`.
    ///
    /// Checks run in order: the game is active, it is `actor`'s turn, the
    /// cell is on the board, the cell is free. A failed check leaves the
    /// game untouched.
    ///
    /// # Errors
    ///
    /// [`GameError::GameNotActive`], [`GameError::OutOfTurn`],
    /// [`GameError::OutOfRange`] or [`GameError::CellOccupied`].
    #[instrument(skip(self), fields(next_to_move = %self.next_to_move))]
    pub fn apply_move(
        &mut self,
        actor: UserId,
        cell: usize,
        today: NaiveDate,
    ) -> Result<MoveOutcome, GameError> {
        if let Some(inactive) = self.inactive() {
            warn!(%inactive, "Move on inactive game");
            return Err(GameError::GameNotActive(inactive));
        }
        if actor != self.next_to_move {
            warn!("Move out of turn");
            return Err(GameError::OutOfTurn {
                actor,
                expected: self.next_to_move,
            });
        }
        if cell >= CELL_COUNT {
            warn!("Move off the board");
            return Err(GameError::OutOfRange(cell));
        }
        if !is_cell_free(&self.board, cell) {
            warn!("Move on occupied cell");
            return Err(GameError::CellOccupied(cell));
        }

        let mark = if actor == self.player_x { Mark::X } else { Mark::O };
        self.board.place(cell, mark);
        self.history.push(PlacedMark { mark, cell });
        debug!(%mark, "Mark placed");

        if is_winner(&self.board, mark) {
            self.status = GameStatus::Won(actor);
            let result = match mark {
                Mark::X => ScoreResult::PlayerXWon,
                Mark::O => ScoreResult::PlayerOWon,
            };
            info!(winner = %actor, "Game won");
            return Ok(MoveOutcome::Finished(self.settle(result, today)));
        }

        if is_board_full(&self.board) {
            self.status = GameStatus::Tied;
            info!("Game tied");
            return Ok(MoveOutcome::Finished(self.settle(ScoreResult::Tie, today)));
        }

        self.next_to_move = if actor == self.player_x {
            self.player_o
        } else {
            self.player_x
        };
        Ok(MoveOutcome::Continue)
    }

    fn settle(&self, result: ScoreResult, today: NaiveDate) -> Settlement {
        Settlement::new(ScoreRecord::new(self.player_x, self.player_o, result, today))
    }

    /// Cancels an active game. Ended games are left as they are.
    #[instrument(skip(self), fields(status = ?self.status))]
    pub fn cancel(&mut self) -> CancelOutcome {
        match self.status {
            GameStatus::Active => {
                self.status = GameStatus::Cancelled;
                info!("Game cancelled");
                CancelOutcome::Cancelled
            }
            GameStatus::Won(_) | GameStatus::Tied => CancelOutcome::AlreadyOver,
            GameStatus::Cancelled => CancelOutcome::AlreadyCancelled,
        }
    }
}
