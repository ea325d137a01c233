mod check;
mod error;
mod sync_status;

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use taint_core::{QueryService, SharedScannerStatus};

// ==============================================================================
// Application State
// ==============================================================================

#[derive(Clone, Serialize, Default)]
pub struct ConfigSummary {
    #[serde(rename = "chunkSizeBlocks")]
    pub chunk_size_blocks: u32,
    #[serde(rename = "batchSize")]
    pub batch_size: usize,
    #[serde(rename = "idleIntervalMs")]
    pub idle_interval_ms: u64,
    #[serde(rename = "parentCacheMax")]
    pub parent_cache_max: usize,
    #[serde(rename = "queryTimeoutMs")]
    pub query_timeout_ms: u64,
}

pub struct AppState {
    pub query: QueryService,
    pub status: SharedScannerStatus,
    pub config: ConfigSummary,
}

type SharedState = Arc<AppState>;

// ==============================================================================
// Router
// ==============================================================================

pub fn build_router(state: AppState) -> Router {
    let shared = Arc::new(state);

    Router::new()
        .route("/check/{address}", get(check::check_address))
        .route("/sync-status", get(sync_status::sync_status))
        .route("/healthz", get(health))
        .with_state(shared)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
