//! RPC-specific types that do not belong to the shared domain model.

use serde::Deserialize;

/// Chain state as reported by `getblockchaininfo`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainInfo {
    pub chain: String,
    pub blocks: u32,
    #[serde(rename = "initialblockdownload")]
    pub is_initial_sync: bool,
    #[serde(rename = "verificationprogress")]
    pub verification_progress: f64,
}
