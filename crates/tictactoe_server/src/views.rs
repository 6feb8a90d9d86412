//! Request and response messages shared by the REST API and the MCP tools.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tictactoe_core::{Cell, UserStats};

/// Request for registering a user.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RegisterUserRequest {
    /// Unique user name.
    pub user_name: String,
    /// Optional contact address for reminders.
    #[serde(default)]
    pub email: Option<String>,
}

/// Request for starting a game.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NewGameRequest {
    /// User playing X (moves first).
    pub user_x: String,
    /// User playing O.
    pub user_o: String,
}

/// Body of a move submission.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MakeMoveBody {
    /// User making the move.
    pub user_name: String,
    /// Cell on the board (0-8, row-major, 0=top-left).
    pub cell: usize,
}

/// Move submission addressed to a game (MCP form).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MakeMoveRequest {
    /// Game identifier.
    pub game_id: i32,
    /// User making the move.
    pub user_name: String,
    /// Cell on the board (0-8, row-major, 0=top-left).
    pub cell: usize,
}

/// Request naming a game.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GameRequest {
    /// Game identifier.
    pub game_id: i32,
}

/// Request naming a user.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UserRequest {
    /// User name.
    pub user_name: String,
}

/// A single status line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MessageView {
    /// Status text.
    pub message: String,
}

impl MessageView {
    /// Wraps a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// One played move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MoveView {
    /// "X" or "O".
    pub mark: String,
    /// Cell index.
    pub cell: usize,
}

/// Game state returned to players.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GameView {
    /// Game identifier.
    pub game_id: i32,
    /// X player's name.
    pub player_x: String,
    /// O player's name.
    pub player_o: String,
    /// Whose turn it is; absent once the game has ended or was cancelled.
    pub next_to_move: Option<String>,
    /// Nine cells, row-major: "X", "O" or "".
    pub board: Vec<String>,
    /// Moves in play order.
    pub history: Vec<MoveView>,
    /// Won or tied.
    pub game_over: bool,
    /// Cancelled before it ended.
    pub cancelled: bool,
    /// Ended without a winner.
    pub tie: bool,
    /// Winner's name.
    pub winner: Option<String>,
    /// Free cells while active.
    pub remaining_moves: usize,
    /// Status line for the caller.
    pub message: String,
}

/// Games of one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GameListView {
    /// Games, oldest first.
    pub games: Vec<GameView>,
}

/// A registered user and their record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UserView {
    /// User name.
    pub user_name: String,
    /// Games won.
    pub wins: u32,
    /// Games tied.
    pub ties: u32,
    /// Games lost.
    pub losses: u32,
    /// Games finished.
    pub games_played: u32,
    /// Two per win, one per tie.
    pub points: u32,
    /// Wins per game played.
    pub win_rate: f64,
    /// Wins and ties per game played.
    pub no_lose_rate: f64,
}

impl UserView {
    /// Builds the view from a name and statistics.
    pub fn new(user_name: impl Into<String>, stats: &UserStats) -> Self {
        Self {
            user_name: user_name.into(),
            wins: *stats.wins(),
            ties: *stats.ties(),
            losses: stats.losses(),
            games_played: *stats.games_played(),
            points: stats.points(),
            win_rate: stats.win_rate(),
            no_lose_rate: stats.no_lose_rate(),
        }
    }
}

/// Registration result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RegisteredView {
    /// The new user.
    pub user: UserView,
    /// Status line.
    pub message: String,
}

/// One row of the rankings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RankingEntry {
    /// 1-based position.
    pub rank: usize,
    /// The user's record.
    #[serde(flatten)]
    pub user: UserView,
}

/// Users ordered by points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RankingsView {
    /// Best first.
    pub users: Vec<RankingEntry>,
}

/// One finished game on the score board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ScoreView {
    /// Originating game.
    pub game_id: i32,
    /// X player's name.
    pub player_x: String,
    /// O player's name.
    pub player_o: String,
    /// "player_x_won", "player_o_won" or "tie".
    pub result: String,
    /// Winner's name.
    pub winner: Option<String>,
    /// Day the game ended (YYYY-MM-DD).
    pub date: String,
}

/// Score board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ScoresView {
    /// Newest first.
    pub items: Vec<ScoreView>,
}

/// One finished game from a user's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UserScoreView {
    /// The user.
    pub user_name: String,
    /// Who they played.
    pub opponent: String,
    /// "won", "lost" or "tied".
    pub outcome: String,
    /// Day the game ended (YYYY-MM-DD).
    pub date: String,
}

/// A user's score history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UserScoresView {
    /// Newest first.
    pub items: Vec<UserScoreView>,
}

/// Renders a cell for [`GameView::board`].
pub(crate) fn cell_label(cell: Cell) -> String {
    match cell {
        Cell::Empty => String::new(),
        Cell::Marked(mark) => mark.to_string(),
    }
}
