//! Error types for the taint propagation engine.

use bitcoin::{OutPoint, Txid};

// ==============================================================================
// RPC Errors
// ==============================================================================

/// Structured errors from the Bitcoin Core JSON-RPC layer.
///
/// Each variant captures a specific failure mode rather than collapsing
/// everything into a single `String`, so the retry layer can tell a
/// transient transport failure apart from a terminal server-side error.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("HTTP transport: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("JSON-RPC error: code={code}, message={message}")]
    ServerError { code: i64, message: String },

    #[error("invalid JSON-RPC response: {0}")]
    InvalidResponse(String),

    #[error("batch response missing item id={id}")]
    MissingBatchItem { id: u64 },

    #[error("node is still in initial block download ({progress:.4} complete)")]
    NodeSyncing { progress: f64 },

    #[error("height {0} is beyond the current chain tip")]
    NotFound(u32),
}

impl RpcError {
    /// Whether retrying the same call is worth attempting. Mirrors the
    /// Transient/Node-policy split in the error handling design: transport
    /// failures and server-side 5xx-shaped errors are retried, everything
    /// else (bad params, syncing node) is not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RpcError::Transport(_) | RpcError::InvalidResponse(_) | RpcError::MissingBatchItem { .. }
        )
    }
}

// ==============================================================================
// Taint Engine Errors
// ==============================================================================

/// Top-level error type for the taint-core crate.
#[derive(Debug, thiserror::Error)]
pub enum TaintError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("transaction not found: {0}")]
    TxNotFound(Txid),

    #[error("invalid block data: {0}")]
    InvalidBlockData(String),

    #[error("invalid node configuration: {0}")]
    Config(String),

    /// A store read/write violated a monotonicity or ordering invariant the
    /// scanner relies on. Fatal: the scanner aborts rather than risk
    /// propagating corruption.
    #[error("invariant violation: {0}")]
    Invariant(String),

    /// The query service's store read did not complete within its
    /// configured timeout, or the blocking lookup task panicked. Distinct
    /// from [`TaintError::Invariant`]: this is a caller-facing availability
    /// problem, not evidence of store corruption.
    #[error("query service unavailable: {0}")]
    QueryUnavailable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TaintError {
    /// Block-local errors are retried from the same height on the next
    /// scanner tick rather than escalated. Invariant violations are never
    /// block-local: they indicate corruption and must abort the scanner.
    #[must_use]
    pub fn is_block_local(&self) -> bool {
        !matches!(self, TaintError::Invariant(_))
    }
}

// ==============================================================================
// Taint Store Errors
// ==============================================================================

/// Errors from the embedded ordered KV store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(#[from] sled::Error),

    #[error("failed to (de)serialize store value: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("outpoint {0} is missing from the store")]
    OutpointNotFound(OutPoint),

    #[error("write batch commit failed: {0}")]
    CommitFailed(String),
}
