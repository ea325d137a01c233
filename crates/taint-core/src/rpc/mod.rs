//! Bitcoin Core RPC abstraction layer: the Node Client.
//!
//! Defines the [`NodeClient`] trait and provides an HTTP JSON-RPC
//! implementation ([`HttpNodeClient`]) plus a test mock (`mock::MockNodeClient`).

mod http_adapter;
#[cfg(test)]
pub mod mock;
pub mod retry;
pub mod types;

pub use http_adapter::HttpNodeClient;
pub use types::ChainInfo;

use async_trait::async_trait;
use bitcoin::BlockHash;

use crate::error::RpcError;
use crate::types::{BlockData, BlockHeight};

/// Minimal trait covering the Bitcoin Core RPC surface the engine needs.
///
/// Implementations are expected to handle authentication, connection
/// management, retry/backoff, and response deserialization internally, so
/// callers never see a raw transport error escape this boundary.
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Current chain tip height, initial-sync state, and verification progress.
    async fn chain_info(&self) -> Result<ChainInfo, RpcError>;

    /// Block hash at a given height. Fails with `RpcError::NotFound` for
    /// heights beyond the current tip.
    async fn block_hash(&self, height: BlockHeight) -> Result<BlockHash, RpcError>;

    /// The verbose-with-prevouts block: every transaction expanded with all
    /// inputs (each annotated by the spent output's script and value), all
    /// outputs, and output scripts. The scanner never needs a second RPC to
    /// resolve an input's address.
    async fn block(&self, hash: BlockHash, height: BlockHeight) -> Result<BlockData, RpcError>;
}
