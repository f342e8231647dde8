//! Ingestion trigger, status, and top-senders endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use enron_ingest::{EpochReport, SenderCount};

use crate::state::AppState;

use super::{ingest_error, ApiError};

#[derive(Serialize)]
pub struct StartResponse {
    pub message: &'static str,
    pub epoch: u64,
}

/// `POST /api/enron/start`: begin a new epoch; 409 if one is running.
pub async fn start_ingestion(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StartResponse>, ApiError> {
    let epoch = state.ingestion.start().map_err(ingest_error)?;
    Ok(Json(StartResponse {
        message: "Ingestion started.",
        epoch,
    }))
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub finished: bool,
    #[serde(rename = "messagesProcessed")]
    pub messages_processed: u64,
    pub epoch: u64,
    pub report: EpochReport,
}

/// `GET /api/enron/status`: 400 until the first start.
pub async fn ingestion_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, ApiError> {
    let job = &state.ingestion;
    let finished = job.is_finished().map_err(ingest_error)?;
    let messages_processed = job.total_messages().map_err(ingest_error)?;
    let report = job.report().map_err(ingest_error)?;
    Ok(Json(StatusResponse {
        finished,
        messages_processed,
        epoch: report.epoch,
        report,
    }))
}

/// `GET /api/enron/top-senders`: up to ten senders, busiest first.
pub async fn top_senders(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SenderCount>>, ApiError> {
    state
        .ingestion
        .top_senders()
        .map(Json)
        .map_err(ingest_error)
}
