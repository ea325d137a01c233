//! One-shot materialization of the Satoshi seed set.
//!
//! Reads a curated list of block heights, fetches each block's coinbase
//! transaction, and writes the resulting addresses and outpoints into the
//! Taint Store as degree-0 seeds. Idempotent: a completed run leaves
//! `satoshi_coinbase_initialized` set, and every subsequent call returns
//! immediately after a single point read.

use std::time::{SystemTime, UNIX_EPOCH};

use bitcoin::Network;
use tracing::{info, warn};

use crate::error::TaintError;
use crate::rpc::NodeClient;
use crate::script::address_from_script;
use crate::store::TaintStore;
use crate::types::{BlockHeight, Degree, SeedInitFlag, TaintRecord, TaintedOutpoint};

/// A curated, ordered list of block heights believed mined by Satoshi.
#[derive(Debug, Clone)]
pub struct SeedHeights(Vec<u32>);

impl SeedHeights {
    pub fn from_lines(text: &str) -> Self {
        let heights = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.parse::<u32>().ok())
            .collect();
        Self(heights)
    }

    /// The heights shipped with this binary. See `data/patoshi_heights.txt`
    /// for provenance and scope notes.
    pub fn bundled() -> Self {
        Self::from_lines(include_str!("../data/patoshi_heights.txt"))
    }

    pub fn heights(&self) -> &[u32] {
        &self.0
    }
}

/// Drives one-shot population of the seed keyspace.
pub struct SeedBuilder<'a, C> {
    node: &'a C,
    store: &'a TaintStore,
    network: Network,
    heights: SeedHeights,
}

impl<'a, C: NodeClient> SeedBuilder<'a, C> {
    pub fn new(node: &'a C, store: &'a TaintStore, network: Network, heights: SeedHeights) -> Self {
        Self {
            node,
            store,
            network,
            heights,
        }
    }

    /// Materialize the seed set if it has not already been built.
    pub async fn run(&self) -> Result<(), TaintError> {
        if self.store.get_seed_init_flag()?.is_some() {
            info!("seed set already initialized, skipping");
            return Ok(());
        }

        let total_heights = self.heights.heights().len();
        let mut outpoint_count: u64 = 0;
        for (i, &height) in self.heights.heights().iter().enumerate() {
            outpoint_count += self.seed_block(BlockHeight(height)).await?;
            if i % 1000 == 0 {
                info!(height, progress = i, total = total_heights, "seeding in progress");
            }
        }

        let flag = SeedInitFlag {
            timestamp: now_unix(),
            outpoint_count,
        };
        self.store.put_seed_init_flag(&flag)?;
        info!(outpoint_count, "seed set materialized");
        Ok(())
    }

    /// Seed a single block's coinbase outputs, returning how many outpoints
    /// were written.
    async fn seed_block(&self, height: BlockHeight) -> Result<u64, TaintError> {
        let hash = self.node.block_hash(height).await?;
        let block = self.node.block(hash, height).await?;
        let Some(coinbase) = block.transactions.first() else {
            warn!(height = height.0, "seed block has no transactions");
            return Ok(0);
        };

        let mut written = 0u64;
        for (i, output) in coinbase.outputs.iter().enumerate() {
            let address = address_from_script(&output.script_pubkey, self.network);

            self.store.put_tainted_outpoint(
                bitcoin::OutPoint::new(coinbase.txid, i as u32),
                &TaintedOutpoint {
                    degree: Degree::SEED,
                    address: address.clone(),
                    source_height: height,
                },
            )?;
            written += 1;

            if let Some(address) = address {
                self.store.put_taint_record(
                    &address,
                    &TaintRecord {
                        address: address.clone(),
                        seed_address: address.clone(),
                        degree: Degree::SEED,
                        path: vec![],
                        source_tx: None,
                        amount_sat: output.value.to_sat(),
                        last_updated: now_unix(),
                    },
                )?;
            }
        }

        Ok(written)
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
