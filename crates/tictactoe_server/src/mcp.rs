//! MCP tool server exposing league operations to agents.

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use serde::Serialize;
use tictactoe_core::GameId;
use tracing::{error, info, instrument, warn};

use crate::views::{
    GameRequest, MakeMoveRequest, NewGameRequest, RegisterUserRequest, UserRequest,
};
use crate::{GameService, ServiceError};

/// MCP server handler for the league.
#[derive(Clone)]
pub struct LeagueToolServer {
    service: GameService,
    tool_router: ToolRouter<Self>,
}

/// Maps a service failure to an MCP error.
///
/// Request problems become invalid params; store failures are logged and
/// reported without detail.
fn to_mcp_error(err: ServiceError) -> McpError {
    match err {
        ServiceError::Game(_) | ServiceError::Contention { .. } => {
            warn!(error = %err, "Tool call rejected");
            McpError::invalid_params(err.to_string(), None)
        }
        ServiceError::Db(_) | ServiceError::Task(_) => {
            error!(error = %err, "Tool call failed");
            McpError::internal_error("Internal server error", None)
        }
    }
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

#[tool_router]
impl LeagueToolServer {
    /// Creates a tool server over the given service.
    #[instrument(skip(service))]
    pub fn new(service: GameService) -> Self {
        info!("Creating league tool server");
        Self {
            service,
            tool_router: Self::tool_router(),
        }
    }

    async fn call<T, F>(&self, call: F) -> Result<CallToolResult, McpError>
    where
        T: Serialize + Send + 'static,
        F: FnOnce(GameService) -> Result<T, ServiceError> + Send + 'static,
    {
        let service = self.service.clone();
        let value = tokio::task::spawn_blocking(move || call(service))
            .await
            .map_err(|e| to_mcp_error(e.into()))?
            .map_err(to_mcp_error)?;
        json_result(&value)
    }

    /// Registers a user.
    #[instrument(skip(self, req), fields(user_name = %req.user_name))]
    #[tool(description = "Register a new player. Names are unique; email is optional and used for reminders.")]
    pub async fn register_user(
        &self,
        Parameters(req): Parameters<RegisterUserRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.call(move |svc| svc.register_user(&req.user_name, req.email.as_deref()))
            .await
    }

    /// Starts a game.
    #[instrument(skip(self, req), fields(user_x = %req.user_x, user_o = %req.user_o))]
    #[tool(description = "Start a game between two registered players. user_x plays X and moves first.")]
    pub async fn new_game(
        &self,
        Parameters(req): Parameters<NewGameRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.call(move |svc| svc.new_game(&req.user_x, &req.user_o))
            .await
    }

    /// Returns a game.
    #[instrument(skip(self, req), fields(game_id = req.game_id))]
    #[tool(description = "Get the board, turn and status of a game.")]
    pub async fn get_game(
        &self,
        Parameters(req): Parameters<GameRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.call(move |svc| svc.get_game(GameId::new(req.game_id)))
            .await
    }

    /// Plays a move.
    #[instrument(skip(self, req), fields(game_id = req.game_id, user_name = %req.user_name, cell = req.cell))]
    #[tool(description = "Place your mark. Cells are 0-8, row-major, 0=top-left, 8=bottom-right.")]
    pub async fn make_move(
        &self,
        Parameters(req): Parameters<MakeMoveRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.call(move |svc| svc.make_move(GameId::new(req.game_id), &req.user_name, req.cell))
            .await
    }

    /// Cancels a game.
    #[instrument(skip(self, req), fields(game_id = req.game_id))]
    #[tool(description = "Cancel an active game. Finished games are left as they are.")]
    pub async fn cancel_game(
        &self,
        Parameters(req): Parameters<GameRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.call(move |svc| svc.cancel_game(GameId::new(req.game_id)))
            .await
    }

    /// Lists a user's games.
    #[instrument(skip(self, req), fields(user_name = %req.user_name))]
    #[tool(description = "List every game a player has played or is playing.")]
    pub async fn get_user_games(
        &self,
        Parameters(req): Parameters<UserRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.call(move |svc| svc.user_games(&req.user_name))
            .await
    }

    /// Returns the score board.
    #[instrument(skip(self))]
    #[tool(description = "Get the results of all finished games, newest first.")]
    pub async fn get_scores(&self) -> Result<CallToolResult, McpError> {
        self.call(|svc| svc.scores()).await
    }

    /// Returns one user's results.
    #[instrument(skip(self, req), fields(user_name = %req.user_name))]
    #[tool(description = "Get one player's finished games, newest first.")]
    pub async fn get_user_scores(
        &self,
        Parameters(req): Parameters<UserRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.call(move |svc| svc.user_scores(&req.user_name))
            .await
    }

    /// Returns the rankings.
    #[instrument(skip(self))]
    #[tool(description = "Rank all players by points (2 per win, 1 per tie), then win rate.")]
    pub async fn get_rankings(&self) -> Result<CallToolResult, McpError> {
        self.call(|svc| svc.rankings()).await
    }

    /// Returns the cached average.
    #[instrument(skip(self))]
    #[tool(description = "Get the average number of free cells across active games.")]
    pub async fn get_average_moves(&self) -> Result<CallToolResult, McpError> {
        json_result(&self.service.average_moves_remaining())
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for LeagueToolServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Tic-tac-toe league: register players, start games, play moves, read scores and rankings"
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbError;
    use tictactoe_core::GameError;

    #[test]
    fn test_store_failures_are_redacted() {
        let err = to_mcp_error(ServiceError::Db(DbError::new("disk on fire")));
        assert!(!err.message.contains("disk"));
    }

    #[test]
    fn test_rule_violations_keep_their_message() {
        let err = to_mcp_error(GameError::CellOccupied(4).into());
        assert!(err.message.contains("Cell 4 is already taken"));
    }
}
