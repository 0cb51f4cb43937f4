//! API handlers for the server.

use crate::{database::BoardRecord, database::Database, evolution::EvolutionService, job_manager::JobManager};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use life_core::{BoardId, EvolutionConfig, RunOutcome};
use life_engine::{advance, next_state, parse_state, patterns, Grid};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::num::NonZeroU32;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub job_manager: Arc<JobManager>,
    pub evolution: Arc<EvolutionService>,
    pub db: Database,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/boards", get(list_boards).post(create_board))
        .route("/api/v1/boards/:id", get(show_board).delete(delete_board))
        .route("/api/v1/boards/:id/next", get(next_generation))
        .route("/api/v1/boards/:id/steps/:n", get(steps_away))
        .route("/api/v1/boards/:id/final", get(final_state))
        .route("/api/v1/boards/:id/step/:number", get(show_step))
        .route("/api/v1/stats", get(get_stats))
        .route("/api/v1/config", get(get_config).put(update_config))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
}

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// List all boards
pub async fn list_boards(State(state): State<AppState>) -> Result<Json<Vec<BoardRecord>>, ApiError> {
    Ok(Json(state.db.list_boards().await?))
}

#[derive(Deserialize)]
pub struct CreateBoardRequest {
    board: BoardParams,
}

#[derive(Deserialize)]
pub struct BoardParams {
    #[serde(default)]
    state: Value,
    /// Name of a built-in pattern, used when no state is given
    pattern: Option<String>,
}

#[derive(Serialize)]
pub struct CreateBoardResponse {
    id: BoardId,
}

/// Store a board and start evolving it in the background
pub async fn create_board(
    State(state): State<AppState>,
    Json(req): Json<CreateBoardRequest>,
) -> Result<(StatusCode, Json<CreateBoardResponse>), ApiError> {
    let grid = match (&req.board.state, req.board.pattern.as_deref()) {
        (Value::Null, Some(name)) => patterns::by_name(name).ok_or_else(|| {
            ApiError::Unprocessable(vec![format!(
                "Pattern must be one of: {}",
                patterns::NAMES.join(", ")
            )])
        })?,
        (state, _) => parse_state(state)?,
    };

    let id = state.db.create_board(&grid).await?;
    info!("Created board {} ({}x{})", id, grid.rows(), grid.cols());

    state.job_manager.dispatch(id, state.evolution.clone());

    Ok((StatusCode::CREATED, Json(CreateBoardResponse { id })))
}

#[derive(Serialize)]
pub struct BoardResponse {
    #[serde(flatten)]
    board: BoardRecord,
    steps_count: u64,
    /// Whether a run is currently evolving this board
    running: bool,
}

/// Board details with evolution progress
pub async fn show_board(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<BoardResponse>, ApiError> {
    let board = find_board(&state, id).await?;
    let steps_count = state.db.count_steps(board.id).await?;
    let running = state.job_manager.is_active(board.id);
    Ok(Json(BoardResponse {
        board,
        steps_count,
        running,
    }))
}

/// Delete a board, stopping its run if one is active
pub async fn delete_board(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let board_id = BoardId(id);
    state.job_manager.cancel(board_id);

    if state.db.delete_board(board_id).await? {
        info!("Deleted board {}", board_id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::board_not_found())
    }
}

#[derive(Serialize)]
pub struct StateResponse {
    state: Grid,
}

/// The generation after the board's initial state
pub async fn next_generation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<StateResponse>, ApiError> {
    let board = find_board(&state, id).await?;
    Ok(Json(StateResponse {
        state: next_state(&board.state),
    }))
}

/// The board's state after `n` generations
pub async fn steps_away(
    State(state): State<AppState>,
    Path((id, n)): Path<(i64, String)>,
) -> Result<Json<StateResponse>, ApiError> {
    let board = find_board(&state, id).await?;
    let generations = n
        .trim()
        .parse::<u32>()
        .ok()
        .and_then(NonZeroU32::new)
        .ok_or_else(|| {
            ApiError::BadRequest("Number of steps (n) must be a positive integer.".to_string())
        })?;

    let grid = board.state;
    let result = tokio::task::spawn_blocking(move || advance(&grid, generations))
        .await
        .map_err(|e| ApiError::Internal(format!("Step computation failed: {}", e)))?;

    Ok(Json(StateResponse { state: result }))
}

#[derive(Serialize)]
pub struct FinalStateResponse {
    state: Grid,
    status: RunOutcome,
}

/// Search for the board's stable or oscillating state
pub async fn final_state(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<FinalStateResponse>, ApiError> {
    let board = find_board(&state, id).await?;
    let report = state.evolution.settle(board.state).await?;

    match report.outcome {
        RunOutcome::BudgetExhausted => Err(ApiError::UnprocessableMessage(format!(
            "Board did not reach a final state after {} attempts.",
            report.max_attempts
        ))),
        outcome => Ok(Json(FinalStateResponse {
            state: report.terminal,
            status: outcome,
        })),
    }
}

#[derive(Serialize)]
pub struct StepResponse {
    number: u64,
    state: Grid,
}

/// A persisted generation of the board
pub async fn show_step(
    State(state): State<AppState>,
    Path((id, number)): Path<(i64, String)>,
) -> Result<Json<StepResponse>, ApiError> {
    let board = find_board(&state, id).await?;
    let number = number.trim().parse::<u64>().map_err(|_| {
        ApiError::BadRequest("Step number must be a non-negative integer.".to_string())
    })?;
    let step = state
        .db
        .get_step(board.id, number)
        .await?
        .ok_or_else(|| ApiError::NotFound("Step not found".to_string()))?;

    Ok(Json(StepResponse {
        number: step.number,
        state: step.state,
    }))
}

/// Get server statistics
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let runs = state.job_manager.get_stats();
    let total_boards = state.db.count_boards().await?;

    Ok(Json(json!({
        "total_boards": total_boards,
        "runs": runs,
    })))
}

/// Get current evolution configuration
pub async fn get_config(State(state): State<AppState>) -> Json<EvolutionConfig> {
    Json(state.evolution.get_config())
}

#[derive(Deserialize)]
pub struct UpdateConfigRequest {
    max_attempts: i64,
}

/// Change the attempt cap used by runs started from now on
pub async fn update_config(
    State(state): State<AppState>,
    Json(req): Json<UpdateConfigRequest>,
) -> Result<Json<EvolutionConfig>, ApiError> {
    let max_attempts = u32::try_from(req.max_attempts)
        .ok()
        .and_then(NonZeroU32::new)
        .ok_or_else(|| {
            ApiError::Unprocessable(vec!["Max attempts must be a positive integer".to_string()])
        })?;

    let config = EvolutionConfig { max_attempts };
    state.evolution.update_config(config.clone());
    Ok(Json(config))
}

async fn find_board(state: &AppState, id: i64) -> Result<BoardRecord, ApiError> {
    state
        .db
        .get_board(BoardId(id))
        .await?
        .ok_or_else(ApiError::board_not_found)
}

// Error handling
#[derive(Debug)]
pub enum ApiError {
    Internal(String),
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    /// Validation failures, rendered as `{"errors": [...]}`
    Unprocessable(Vec<String>),
    /// A single failure, rendered as `{"error": ...}`
    UnprocessableMessage(String),
}

impl ApiError {
    fn board_not_found() -> Self {
        ApiError::NotFound("Board not found".to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg })),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            ApiError::Unprocessable(errors) => {
                (StatusCode::UNPROCESSABLE_ENTITY, json!({ "errors": errors }))
            }
            ApiError::UnprocessableMessage(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, json!({ "error": msg }))
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<life_core::Error> for ApiError {
    fn from(err: life_core::Error) -> Self {
        match err {
            life_core::Error::Validation(msg) => ApiError::Unprocessable(vec![msg]),
            life_core::Error::NotFound(msg) => ApiError::NotFound(msg),
            life_core::Error::AlreadyExists(msg) => ApiError::Conflict(msg),
            err => {
                error!("Core error: {}", err);
                ApiError::Internal(err.message())
            }
        }
    }
}
