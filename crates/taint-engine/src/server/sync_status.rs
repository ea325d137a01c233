use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::SharedState;

#[derive(Serialize)]
pub(super) struct SyncStatusResponse {
    #[serde(rename = "isRunning")]
    is_running: bool,
    #[serde(rename = "isSyncing")]
    is_syncing: bool,
    #[serde(rename = "lastProcessedBlock")]
    last_processed_block: Option<u32>,
    #[serde(rename = "currentHeight")]
    current_height: Option<u32>,
    #[serde(rename = "blocksBehind")]
    blocks_behind: u64,
    progress: f64,
    stats: StatsSummary,
    config: super::ConfigSummary,
}

#[derive(Serialize)]
pub(super) struct StatsSummary {
    #[serde(rename = "blocksProcessed")]
    blocks_processed: u64,
    #[serde(rename = "taintedOutputsWritten")]
    tainted_outputs_written: u64,
    #[serde(rename = "addressesUpdated")]
    addresses_updated: u64,
    errors: u64,
}

pub(super) async fn sync_status(State(state): State<SharedState>) -> Json<SyncStatusResponse> {
    let status = state.status.read().await;
    let progress = match status.current_height {
        Some(tip) if tip.0 > 0 => {
            let processed = status.last_processed_block.map(|h| h.0).unwrap_or(0);
            (processed as f64 / tip.0 as f64).min(1.0)
        }
        _ => 0.0,
    };

    Json(SyncStatusResponse {
        is_running: status.is_running,
        is_syncing: status.blocks_behind > 0,
        last_processed_block: status.last_processed_block.map(|h| h.0),
        current_height: status.current_height.map(|h| h.0),
        blocks_behind: status.blocks_behind,
        progress,
        stats: StatsSummary {
            blocks_processed: status.stats.blocks_processed,
            tainted_outputs_written: status.stats.tainted_outputs_written,
            addresses_updated: status.stats.addresses_updated,
            errors: status.stats.errors,
        },
        config: state.config.clone(),
    })
}
