//! Read-only health view over the storage gateway.
//!
//! Three projections: liveness (`/healthz`), the queue head
//! (`/jobs/peek`) and counters (`/stats`). Enabled by `WORKER_DEV_HTTP`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tracing::info;

use vindex_db::{JobSource, Storage, StoreResult};

use crate::error::WorkerResult;

/// How many pending jobs the peek endpoint returns.
const PEEK_LIMIT: i64 = 10;

#[derive(Clone)]
pub struct HealthState {
    pub source: Arc<dyn JobSource>,
    pub storage: Arc<dyn Storage>,
}

pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/jobs/peek", get(peek_jobs))
        .route("/stats", get(stats))
        .with_state(state)
}

/// Serve the health view until the process exits.
pub async fn serve(state: HealthState, port: u16) -> WorkerResult<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Health server listening on port {port}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn healthz(State(state): State<HealthState>) -> Response {
    match state.storage.ping().await {
        Ok(()) => Json(json!({"ok": true, "status": "healthy"})).into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"ok": false, "status": "unhealthy", "error": e.to_string()})),
        )
            .into_response(),
    }
}

async fn peek_jobs(State(state): State<HealthState>) -> Response {
    match peek_payload(state.source.as_ref()).await {
        Ok(payload) => Json(payload).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

async fn stats(State(state): State<HealthState>) -> Response {
    match stats_payload(state.storage.as_ref()).await {
        Ok(payload) => Json(payload).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

async fn peek_payload(source: &dyn JobSource) -> StoreResult<serde_json::Value> {
    let jobs = source.peek_pending(PEEK_LIMIT).await?;
    Ok(json!({
        "pending_jobs": jobs.len(),
        "jobs": jobs,
    }))
}

async fn stats_payload(storage: &dyn Storage) -> StoreResult<serde_json::Value> {
    let stats = storage.stats().await?;
    Ok(json!({
        "jobs": stats.jobs,
        "videos": stats.videos,
        "processing": {
            "videos_with_transcripts": stats.videos_with_transcripts,
            "total_segments": stats.total_segments,
            "total_frames": stats.total_frames,
            "total_captions": stats.total_captions,
        }
    }))
}
