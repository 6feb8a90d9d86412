//! REST API over [`GameService`].

use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tictactoe_core::{GameError, GameId};
use tower::ServiceBuilder;
use tracing::{error, info, instrument, warn};

use crate::views::{
    GameListView, GameView, MakeMoveBody, MessageView, NewGameRequest, RankingsView,
    RegisterUserRequest, RegisteredView, ScoresView, UserScoresView,
};
use crate::{GameService, ServiceError};

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    service: GameService,
}

/// Builds the league router.
#[instrument(skip(service))]
pub fn router(service: GameService) -> Router {
    info!("Building HTTP router");
    Router::new()
        .route("/health", get(health))
        .route("/user", post(register_user))
        .route("/user/{name}/games", get(user_games))
        .route("/game", post(new_game))
        .route("/game/{id}", get(get_game).post(make_move))
        .route("/game/{id}/cancel", post(cancel_game))
        .route("/games/average_moves", get(average_moves))
        .route("/scores", get(scores))
        .route("/scores/user/{name}", get(user_scores))
        .route("/rankings", get(rankings))
        .layer(
            ServiceBuilder::new()
                .map_request(log_request)
                .map_response(log_response),
        )
        .with_state(AppState { service })
}

/// Error response: status plus a `{"error", "message"}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            "Internal server error",
        )
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::Game(game) => match game {
                GameError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, "not_found", message),
                GameError::Conflict(_) => Self::new(StatusCode::CONFLICT, "conflict", message),
                GameError::Validation(_) => {
                    Self::new(StatusCode::BAD_REQUEST, "validation", message)
                }
                GameError::OutOfRange(_) => {
                    Self::new(StatusCode::BAD_REQUEST, "out_of_range", message)
                }
                GameError::OutOfTurn { .. } => {
                    Self::new(StatusCode::CONFLICT, "out_of_turn", message)
                }
                GameError::CellOccupied(_) => {
                    Self::new(StatusCode::CONFLICT, "cell_occupied", message)
                }
                GameError::GameNotActive(_) => {
                    Self::new(StatusCode::CONFLICT, "game_not_active", message)
                }
            },
            ServiceError::Contention { .. } => {
                Self::new(StatusCode::CONFLICT, "contention", message)
            }
            ServiceError::Db(_) | ServiceError::Task(_) => {
                error!(error = %message, "Request failed internally");
                Self::internal()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(status = %self.status, code = self.code, message = %self.message, "Request rejected");
        (
            self.status,
            Json(json!({"error": self.code, "message": self.message})),
        )
            .into_response()
    }
}

/// Runs a blocking service call on the blocking pool.
async fn blocking<T, F>(state: &AppState, call: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(GameService) -> Result<T, ServiceError> + Send + 'static,
{
    let service = state.service.clone();
    match tokio::task::spawn_blocking(move || call(service)).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(e) => Err(ServiceError::from(e).into()),
    }
}

fn log_request(req: Request) -> Request {
    info!(method = %req.method(), uri = %req.uri(), "Incoming HTTP request");
    req
}

fn log_response(resp: Response) -> Response {
    info!(status = %resp.status(), "Response sent");
    resp
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

async fn register_user(
    State(state): State<AppState>,
    Json(req): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<RegisteredView>), ApiError> {
    let view = blocking(&state, move |svc| {
        svc.register_user(&req.user_name, req.email.as_deref())
    })
    .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn new_game(
    State(state): State<AppState>,
    Json(req): Json<NewGameRequest>,
) -> Result<(StatusCode, Json<GameView>), ApiError> {
    let view = blocking(&state, move |svc| svc.new_game(&req.user_x, &req.user_o)).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn get_game(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<GameView>, ApiError> {
    let view = blocking(&state, move |svc| svc.get_game(GameId::new(id))).await?;
    Ok(Json(view))
}

async fn make_move(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<MakeMoveBody>,
) -> Result<Json<GameView>, ApiError> {
    let view = blocking(&state, move |svc| {
        svc.make_move(GameId::new(id), &body.user_name, body.cell)
    })
    .await?;
    Ok(Json(view))
}

async fn cancel_game(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<GameView>, ApiError> {
    let view = blocking(&state, move |svc| svc.cancel_game(GameId::new(id))).await?;
    Ok(Json(view))
}

async fn user_games(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<GameListView>, ApiError> {
    let view = blocking(&state, move |svc| svc.user_games(&name)).await?;
    Ok(Json(view))
}

async fn scores(State(state): State<AppState>) -> Result<Json<ScoresView>, ApiError> {
    let view = blocking(&state, |svc| svc.scores()).await?;
    Ok(Json(view))
}

async fn user_scores(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<UserScoresView>, ApiError> {
    let view = blocking(&state, move |svc| svc.user_scores(&name)).await?;
    Ok(Json(view))
}

async fn rankings(State(state): State<AppState>) -> Result<Json<RankingsView>, ApiError> {
    let view = blocking(&state, |svc| svc.rankings()).await?;
    Ok(Json(view))
}

async fn average_moves(State(state): State<AppState>) -> Json<MessageView> {
    Json(state.service.average_moves_remaining())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tictactoe_core::Inactive;
    use tictactoe_core::UserId;

    fn status_of(err: ServiceError) -> (StatusCode, &'static str) {
        let api = ApiError::from(err);
        (api.status, api.code)
    }

    #[test]
    fn test_rule_violations_map_to_conflict() {
        assert_eq!(
            status_of(GameError::CellOccupied(4).into()),
            (StatusCode::CONFLICT, "cell_occupied")
        );
        assert_eq!(
            status_of(
                GameError::OutOfTurn {
                    actor: UserId::new(2),
                    expected: UserId::new(1),
                }
                .into()
            ),
            (StatusCode::CONFLICT, "out_of_turn")
        );
        assert_eq!(
            status_of(GameError::GameNotActive(Inactive::Over).into()),
            (StatusCode::CONFLICT, "game_not_active")
        );
    }

    #[test]
    fn test_input_errors_map_to_bad_request() {
        assert_eq!(
            status_of(GameError::OutOfRange(9).into()),
            (StatusCode::BAD_REQUEST, "out_of_range")
        );
        assert_eq!(
            status_of(GameError::Validation("blank".into()).into()),
            (StatusCode::BAD_REQUEST, "validation")
        );
    }

    #[test]
    fn test_internal_errors_are_redacted() {
        let api = ApiError::from(ServiceError::Task("secret detail".into()));
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!api.message.contains("secret"));
    }

    #[test]
    fn test_logging_layer_passes_traffic_through() {
        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/game/7")
            .body(axum::body::Body::empty())
            .expect("Invalid request");
        let req = log_request(req);
        assert_eq!(req.method(), "POST");
        assert_eq!(req.uri(), "/game/7");

        let resp = log_response(StatusCode::CREATED.into_response());
        assert_eq!(resp.status(), StatusCode::CREATED);
    }
}
