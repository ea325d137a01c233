//! Mock [`NodeClient`] implementation for unit tests.
//!
//! Uses a builder pattern (`MockNodeClient::builder()`) to register canned
//! blocks before the mock is consumed, mirroring how real blocks arrive in
//! height order from a Bitcoin Core node.

use std::collections::HashMap;

use async_trait::async_trait;
use bitcoin::BlockHash;

use crate::error::RpcError;
use crate::types::{BlockData, BlockHeight};

use super::types::ChainInfo;
use super::NodeClient;

/// A mock Node Client backed by an in-memory map of canned blocks, keyed by
/// height. Returns `RpcError::NotFound` for any height beyond the highest
/// block registered.
pub struct MockNodeClient {
    blocks: HashMap<u32, BlockData>,
    chain_info: ChainInfo,
}

impl MockNodeClient {
    pub fn builder() -> MockNodeClientBuilder {
        MockNodeClientBuilder {
            blocks: HashMap::new(),
            chain_info: ChainInfo {
                chain: "regtest".into(),
                blocks: 0,
                is_initial_sync: false,
                verification_progress: 1.0,
            },
        }
    }
}

/// Builder for configuring a [`MockNodeClient`] with canned blocks.
pub struct MockNodeClientBuilder {
    blocks: HashMap<u32, BlockData>,
    chain_info: ChainInfo,
}

impl MockNodeClientBuilder {
    /// Register a block, keyed by its height. Updates the mock's reported
    /// tip height if this block is higher than any registered so far.
    #[must_use]
    pub fn with_block(mut self, block: BlockData) -> Self {
        let height = block.height.0;
        if height >= self.chain_info.blocks {
            self.chain_info.blocks = height + 1;
        }
        self.blocks.insert(height, block);
        self
    }

    #[must_use]
    pub fn with_chain_info(mut self, info: ChainInfo) -> Self {
        self.chain_info = info;
        self
    }

    #[must_use]
    pub fn build(self) -> MockNodeClient {
        MockNodeClient {
            blocks: self.blocks,
            chain_info: self.chain_info,
        }
    }
}

#[async_trait]
impl NodeClient for MockNodeClient {
    async fn chain_info(&self) -> Result<ChainInfo, RpcError> {
        Ok(self.chain_info.clone())
    }

    async fn block_hash(&self, height: BlockHeight) -> Result<BlockHash, RpcError> {
        self.blocks
            .get(&height.0)
            .map(|b| b.hash)
            .ok_or(RpcError::NotFound(height.0))
    }

    async fn block(&self, hash: BlockHash, height: BlockHeight) -> Result<BlockData, RpcError> {
        let block = self
            .blocks
            .get(&height.0)
            .cloned()
            .ok_or(RpcError::NotFound(height.0))?;
        if block.hash != hash {
            return Err(RpcError::InvalidResponse(format!(
                "hash mismatch at height {}",
                height.0
            )));
        }
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::*;

    #[tokio::test]
    async fn reports_tip_from_highest_registered_block() {
        let rpc = MockNodeClient::builder()
            .with_block(make_block(0, vec![make_coinbase_tx(0, vec![50_0000_0000])]))
            .with_block(make_block(1, vec![make_coinbase_tx(1, vec![50_0000_0000])]))
            .build();
        let info = rpc.chain_info().await.unwrap();
        assert_eq!(info.blocks, 2);
    }

    #[tokio::test]
    async fn block_hash_not_found_beyond_tip() {
        let rpc = MockNodeClient::builder()
            .with_block(make_block(0, vec![make_coinbase_tx(0, vec![50_0000_0000])]))
            .build();
        let err = rpc.block_hash(BlockHeight(5)).await.unwrap_err();
        assert!(matches!(err, RpcError::NotFound(5)));
    }

    #[tokio::test]
    async fn fetches_registered_block_by_height_and_hash() {
        let block = make_block(3, vec![make_coinbase_tx(3, vec![50_0000_0000])]);
        let hash = block.hash;
        let rpc = MockNodeClient::builder().with_block(block).build();
        let fetched = rpc.block(hash, BlockHeight(3)).await.unwrap();
        assert_eq!(fetched.height, BlockHeight(3));
    }
}
