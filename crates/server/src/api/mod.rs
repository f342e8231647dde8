//! HTTP endpoint handlers.
//!
//! Shared error type and the ingestion error mapping live here in mod.rs.

mod health;
mod ingestion;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use enron_ingest::IngestError;

// ── Shared types ─────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map a caller-facing ingestion error onto its HTTP status.
pub(crate) fn ingest_error(e: IngestError) -> ApiError {
    let status = match e {
        IngestError::ConflictingOperation => StatusCode::CONFLICT,
        IngestError::NotYetStarted => StatusCode::BAD_REQUEST,
    };
    (status, Json(ErrorResponse { error: e.to_string() }))
}

// ── Re-exports ───────────────────────────────────────────────────

pub use health::health;
pub use ingestion::{ingestion_status, start_ingestion, top_senders};
