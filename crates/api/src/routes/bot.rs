//! Pipeline lifecycle routes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;

use relay_common::error::AppError;
use relay_engine::supervisor::{Lifecycle, PipelineStatus, StartOutcome, StopOutcome};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/start-bot", post(start_bot))
        .route("/stop-bot", post(stop_bot))
        .route("/status", get(status))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub bot_running: bool,
    pub state: Lifecycle,
    pub run_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
}

impl From<PipelineStatus> for StatusResponse {
    fn from(status: PipelineStatus) -> Self {
        Self {
            bot_running: status.is_running(),
            state: status.state,
            run_id: status.run_id,
            started_at: status.started_at,
        }
    }
}

/// POST /start-bot: start the pipeline unless it is already active.
async fn start_bot(State(state): State<AppState>) -> Result<(StatusCode, Json<Value>), AppError> {
    let response = match state.supervisor.start().await? {
        StartOutcome::Started { run_id } => {
            tracing::info!(run_id = %run_id, "Start requested via API");
            (
                StatusCode::ACCEPTED,
                Json(json!({ "status": "Bot is starting..." })),
            )
        }
        StartOutcome::AlreadyRunning(_) => (
            StatusCode::OK,
            Json(json!({ "status": "Bot is already running." })),
        ),
        StartOutcome::Cancelled => (
            StatusCode::OK,
            Json(json!({ "status": "Bot start was cancelled." })),
        ),
    };
    Ok(response)
}

/// POST /stop-bot: stop the pipeline and wait for it to wind down.
async fn stop_bot(State(state): State<AppState>) -> Json<Value> {
    let message = match state.supervisor.stop().await {
        StopOutcome::Stopped => "Bot stopped successfully.",
        StopOutcome::NotRunning => "Bot is not running.",
    };
    Json(json!({ "status": message }))
}

/// GET /status
async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(state.supervisor.status().into())
}
