//! The Taint Scanner: walks blocks in height order, classifying every
//! output as tainted or not by tracing spends of previously tainted
//! outputs, and persists the resulting address-level taint records.

pub mod cache;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use bitcoin::{Network, OutPoint};
use tokio::sync::{watch, RwLock};
use tracing::error;

use crate::error::TaintError;
use crate::rpc::NodeClient;
use crate::script::address_from_script;
use crate::store::{keys, TaintStore};
use crate::types::{BlockHeight, Degree, PathHop, ScanProgress, TaintRecord, TaintedOutpoint, TxData, TxRecord};

use cache::ParentTaintCache;

// ==============================================================================
// Configuration & Status
// ==============================================================================

/// Tunables mapped from the `scanner.*` and `node.max_parallel` configuration
/// keys.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub network: Network,
    pub chunk_size_blocks: u32,
    pub batch_size: usize,
    pub batch_flush: Duration,
    pub parent_cache_max: usize,
    pub idle_interval: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            network: Network::Bitcoin,
            chunk_size_blocks: 100,
            batch_size: 1000,
            batch_flush: Duration::from_secs(5),
            parent_cache_max: 10_000,
            idle_interval: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerState {
    Init,
    Catchup,
    Tail,
    Idle,
}

#[derive(Debug, Clone, Default)]
pub struct ScannerStats {
    pub blocks_processed: u64,
    pub tainted_outputs_written: u64,
    pub addresses_updated: u64,
    pub errors: u64,
}

/// Snapshot of the Scanner's runtime state, published for `/sync-status`.
#[derive(Debug, Clone)]
pub struct ScannerStatus {
    pub state: ScannerState,
    pub is_running: bool,
    pub last_processed_block: Option<BlockHeight>,
    pub current_height: Option<BlockHeight>,
    pub blocks_behind: u64,
    pub stats: ScannerStats,
}

impl Default for ScannerStatus {
    fn default() -> Self {
        Self {
            state: ScannerState::Init,
            is_running: false,
            last_processed_block: None,
            current_height: None,
            blocks_behind: 0,
            stats: ScannerStats::default(),
        }
    }
}

/// Thread-safe handle to the Scanner's published status, cloned into the
/// HTTP surface without granting it access to any mutating operation.
pub type SharedScannerStatus = Arc<RwLock<ScannerStatus>>;

// ==============================================================================
// Scanner
// ==============================================================================

pub struct Scanner<C> {
    node: Arc<C>,
    store: TaintStore,
    cache: ParentTaintCache,
    config: ScannerConfig,
    status: SharedScannerStatus,
}

impl<C: NodeClient> Scanner<C> {
    pub fn new(node: Arc<C>, store: TaintStore, config: ScannerConfig) -> Self {
        let cache = ParentTaintCache::new(config.parent_cache_max);
        Self {
            node,
            store,
            cache,
            config,
            status: Arc::new(RwLock::new(ScannerStatus::default())),
        }
    }

    pub fn status_handle(&self) -> SharedScannerStatus {
        self.status.clone()
    }

    /// Run the scanner loop until `stop` is signalled. Transient and
    /// block-local errors back off and retry; an invariant violation aborts
    /// the loop immediately since it indicates store corruption.
    pub async fn run(&self, mut stop: watch::Receiver<bool>) {
        {
            let mut status = self.status.write().await;
            status.is_running = true;
            status.state = ScannerState::Catchup;
        }

        loop {
            if *stop.borrow() {
                break;
            }

            match self.run_window().await {
                Ok(blocks_behind) => {
                    let sleep_for = adaptive_sleep(blocks_behind, self.config.idle_interval);
                    let mut status = self.status.write().await;
                    status.state = if blocks_behind == 0 {
                        ScannerState::Tail
                    } else {
                        ScannerState::Catchup
                    };
                    status.blocks_behind = blocks_behind;
                    drop(status);

                    tokio::select! {
                        _ = tokio::time::sleep(sleep_for) => {}
                        _ = stop.changed() => {}
                    }
                }
                Err(err) if !err.is_block_local() => {
                    error!(error = %err, "invariant violation, aborting scanner");
                    let mut status = self.status.write().await;
                    status.state = ScannerState::Idle;
                    status.stats.errors += 1;
                    status.is_running = false;
                    break;
                }
                Err(err) => {
                    error!(error = %err, "scanner window failed, backing off");
                    let mut status = self.status.write().await;
                    status.state = ScannerState::Idle;
                    status.stats.errors += 1;
                    drop(status);

                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_secs(30)) => {}
                        _ = stop.changed() => {}
                    }
                }
            }
        }

        let mut status = self.status.write().await;
        status.is_running = false;
    }

    /// Process up to `chunk_size_blocks` blocks starting from the height
    /// after the last committed `scan_progress`, returning how many blocks
    /// remain behind the node's tip afterward.
    async fn run_window(&self) -> Result<u64, TaintError> {
        let chain_info = self.node.chain_info().await?;
        let tip_height = chain_info.blocks.saturating_sub(1);

        let start_height = match self.store.get_scan_progress()? {
            Some(progress) => progress.last_block.0 + 1,
            None => 0,
        };

        if start_height as u64 > tip_height as u64 {
            return Ok(0);
        }

        let end_height = start_height
            .saturating_add(self.config.chunk_size_blocks.saturating_sub(1))
            .min(tip_height);

        for height in start_height..=end_height {
            self.process_block(BlockHeight(height)).await?;

            let mut status = self.status.write().await;
            status.last_processed_block = Some(BlockHeight(height));
            status.current_height = Some(BlockHeight(tip_height));
            status.stats.blocks_processed += 1;
        }

        Ok(tip_height.saturating_sub(end_height) as u64)
    }

    /// Process a single block: classify every output, stage writes, and
    /// commit before advancing `scan_progress`.
    async fn process_block(&self, height: BlockHeight) -> Result<(), TaintError> {
        let hash = self.node.block_hash(height).await?;
        let block = self.node.block(hash, height).await?;

        let mut in_block: HashMap<OutPoint, (Degree, Option<String>)> = HashMap::new();
        let mut main_batch = self.store.main_batch();
        let mut scan_batch = self.store.scan_batch();
        let mut last_flush = Instant::now();
        let mut outputs_written = 0u64;
        let mut addresses_updated = 0u64;

        for tx in &block.transactions {
            self.process_tx(tx, height, &mut in_block, &mut main_batch, &mut scan_batch, &mut outputs_written, &mut addresses_updated)
                .await?;

            if main_batch.len() + scan_batch.len() >= self.config.batch_size
                || last_flush.elapsed() >= self.config.batch_flush
            {
                let flushed_main = std::mem::replace(&mut main_batch, self.store.main_batch());
                let flushed_scan = std::mem::replace(&mut scan_batch, self.store.scan_batch());
                flushed_main.commit()?;
                flushed_scan.commit()?;
                last_flush = Instant::now();
            }
        }

        main_batch.commit()?;

        if let Some(progress) = self.store.get_scan_progress()? {
            if height.0 <= progress.last_block.0 {
                return Err(TaintError::Invariant(format!(
                    "scan_progress would move backward: attempted to commit height {} after {}",
                    height.0, progress.last_block.0
                )));
            }
        }

        scan_batch.put(
            keys::SCAN_PROGRESS.as_bytes(),
            &ScanProgress {
                last_block: height,
                updated_at: now_unix(),
            },
        )?;
        scan_batch.commit()?;

        let mut status = self.status.write().await;
        status.stats.tainted_outputs_written += outputs_written;
        status.stats.addresses_updated += addresses_updated;

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_tx(
        &self,
        tx: &TxData,
        height: BlockHeight,
        in_block: &mut HashMap<OutPoint, (Degree, Option<String>)>,
        main_batch: &mut crate::store::WriteBatch<'_>,
        scan_batch: &mut crate::store::WriteBatch<'_>,
        outputs_written: &mut u64,
        addresses_updated: &mut u64,
    ) -> Result<(), TaintError> {
        let best_input = self.best_tainted_input(tx, in_block)?;
        let seed_triggered = self.any_output_pays_seed(tx)?;

        let (min_degree, source_address): (i64, Option<String>) = if seed_triggered {
            (-1, None)
        } else if let Some((degree, addr)) = best_input {
            (degree.0 as i64, addr)
        } else {
            return Ok(());
        };

        let current_degree = Degree((min_degree + 1).max(0) as u32);

        let source_record = match &source_address {
            Some(addr) => self.lookup_taint_record(addr).await?,
            None => None,
        };

        let mut output_addresses: Vec<Option<String>> = Vec::with_capacity(tx.outputs.len());

        for (j, output) in tx.outputs.iter().enumerate() {
            let address = address_from_script(&output.script_pubkey, self.config.network);
            output_addresses.push(address.clone());

            let outpoint = OutPoint::new(tx.txid, j as u32);
            if in_block.contains_key(&outpoint) || self.store.get_tainted_outpoint(outpoint)?.is_some() {
                continue;
            }

            scan_batch.put(
                &keys::tainted_outpoint(tx.txid, j as u32),
                &TaintedOutpoint {
                    degree: current_degree,
                    address: address.clone(),
                    source_height: height,
                },
            )?;
            in_block.insert(outpoint, (current_degree, address.clone()));
            *outputs_written += 1;

            let Some(address) = address else { continue };
            let Some(ref source) = source_record else { continue };

            let existing = self.lookup_taint_record(&address).await?;
            if let Some(existing) = &existing {
                if existing.is_seed() || existing.degree <= current_degree {
                    continue;
                }
            }

            let mut path = source.path.clone();
            path.push(PathHop {
                from: source.address.clone(),
                to: address.clone(),
                tx_id: tx.txid,
                amount_sat: output.value.to_sat(),
            });

            let record = TaintRecord {
                address: address.clone(),
                seed_address: source.seed_address.clone(),
                degree: current_degree,
                path,
                source_tx: Some(tx.txid),
                amount_sat: output.value.to_sat(),
                last_updated: now_unix(),
            };

            main_batch.put(&keys::tainted_address(&address), &record)?;
            self.cache.put(address, record).await;
            *addresses_updated += 1;
        }

        let inputs = tx
            .inputs
            .iter()
            .map(|input| match &input.prevout_script {
                Some(script) => address_from_script(script, self.config.network)
                    .unwrap_or_else(|| "unparseable".to_owned()),
                None => "coinbase".to_owned(),
            })
            .collect();

        let outputs = tx
            .outputs
            .iter()
            .zip(output_addresses)
            .enumerate()
            .map(|(i, (o, address))| (address.unwrap_or_else(|| format!("vout:{i}")), o.value.to_sat()))
            .collect();

        main_batch.put(
            &keys::tx_record(tx.txid),
            &TxRecord {
                txid: tx.txid,
                inputs,
                outputs,
                block_height: height,
                degree_at_store_time: current_degree,
            },
        )?;

        Ok(())
    }

    /// The minimum-degree tainted input of `tx`, preferring the in-block map
    /// over the store (a transaction may spend an output created earlier in
    /// the same block).
    fn best_tainted_input(
        &self,
        tx: &TxData,
        in_block: &HashMap<OutPoint, (Degree, Option<String>)>,
    ) -> Result<Option<(Degree, Option<String>)>, TaintError> {
        if tx.is_coinbase() {
            return Ok(None);
        }

        let mut best: Option<(Degree, Option<String>)> = None;
        for input in &tx.inputs {
            let Some(prevout) = input.prevout else { continue };

            let candidate = if let Some(entry) = in_block.get(&prevout) {
                Some(entry.clone())
            } else {
                self.store
                    .get_tainted_outpoint(prevout)?
                    .map(|t| (t.degree, t.address))
            };

            if let Some((degree, address)) = candidate {
                match &best {
                    Some((best_degree, _)) if degree >= *best_degree => {}
                    _ => best = Some((degree, address)),
                }
            }
        }

        Ok(best)
    }

    /// Whether any output of `tx` pays a known seed address, per the
    /// "output pays a seed address" also-tainting rule.
    fn any_output_pays_seed(&self, tx: &TxData) -> Result<bool, TaintError> {
        for output in &tx.outputs {
            let Some(address) = address_from_script(&output.script_pubkey, self.config.network) else {
                continue;
            };
            if let Some(record) = self.store.get_taint_record(&address)? {
                if record.is_seed() {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    async fn lookup_taint_record(&self, address: &str) -> Result<Option<TaintRecord>, TaintError> {
        if let Some(record) = self.cache.get(address).await {
            return Ok(Some(record));
        }
        let record = self.store.get_taint_record(address)?;
        if let Some(ref record) = record {
            self.cache.put(address.to_owned(), record.clone()).await;
        }
        Ok(record)
    }
}

/// Adaptive polling: the further behind the store is, the sooner the next
/// window runs.
fn adaptive_sleep(blocks_behind: u64, idle_interval: Duration) -> Duration {
    if blocks_behind > 1000 {
        Duration::from_secs(5)
    } else if blocks_behind > 100 {
        Duration::from_secs(30)
    } else if blocks_behind > 0 {
        Duration::from_secs(120)
    } else {
        idle_interval
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::mock::MockNodeClient;
    use crate::test_util::{make_block, make_coinbase_tx, make_spend_tx};
    use crate::types::{Degree, SeedInitFlag};

    fn seed_address_for_tag(tag: u8) -> String {
        crate::script::address_from_script(&crate::test_util::p2wpkh_script(tag), Network::Bitcoin)
            .expect("p2wpkh script must decode")
    }

    async fn seeded_store(seed_tag: u8) -> (TaintStore, String) {
        let store = TaintStore::temporary();
        let seed_address = seed_address_for_tag(seed_tag);
        store
            .put_taint_record(
                &seed_address,
                &TaintRecord {
                    address: seed_address.clone(),
                    seed_address: seed_address.clone(),
                    degree: Degree::SEED,
                    path: vec![],
                    source_tx: None,
                    amount_sat: 50_0000_0000,
                    last_updated: 0,
                },
            )
            .unwrap();
        store
            .put_tainted_outpoint(
                OutPoint::new(crate::test_util::txid_from_byte(0), 0),
                &TaintedOutpoint {
                    degree: Degree::SEED,
                    address: Some(seed_address.clone()),
                    source_height: BlockHeight(0),
                },
            )
            .unwrap();
        store
            .put_seed_init_flag(&SeedInitFlag {
                timestamp: 0,
                outpoint_count: 1,
            })
            .unwrap();
        store
            .put_scan_progress(&ScanProgress {
                last_block: BlockHeight(0),
                updated_at: 0,
            })
            .unwrap();
        (store, seed_address)
    }

    #[tokio::test]
    async fn direct_recipient_is_tainted_at_degree_one() {
        let (store, _seed) = seeded_store(10).await;
        let spend = make_spend_tx(1, vec![(crate::test_util::txid_from_byte(0), 0, 50_0000_0000, 10)], vec![(49_9999_0000, 20)]);
        let block = make_block(1, vec![spend]);
        let node = MockNodeClient::builder().with_block(block).build();
        let scanner = Scanner::new(Arc::new(node), store.clone(), ScannerConfig::default());

        scanner.run_window().await.unwrap();

        let a = seed_address_for_tag(20);
        let record = store.get_taint_record(&a).unwrap().unwrap();
        assert_eq!(record.degree, Degree(1));
        assert_eq!(record.path.len(), 1);
    }

    #[tokio::test]
    async fn two_hop_chain_across_blocks() {
        let (store, _seed) = seeded_store(10).await;
        let spend1 = make_spend_tx(1, vec![(crate::test_util::txid_from_byte(0), 0, 50_0000_0000, 10)], vec![(49_9999_0000, 20)]);
        let a_txid = spend1.txid;
        let spend2 = make_spend_tx(2, vec![(a_txid, 0, 49_9999_0000, 20)], vec![(49_9998_0000, 30)]);
        let block1 = make_block(1, vec![spend1]);
        let block2 = make_block(2, vec![spend2]);
        let node = MockNodeClient::builder().with_block(block1).with_block(block2).build();
        let scanner = Scanner::new(Arc::new(node), store.clone(), ScannerConfig::default());

        scanner.run_window().await.unwrap();

        let b = seed_address_for_tag(30);
        let record = store.get_taint_record(&b).unwrap().unwrap();
        assert_eq!(record.degree, Degree(2));
        assert_eq!(record.path.len(), 2);
    }

    #[tokio::test]
    async fn intra_block_chain_propagates_within_one_block() {
        let (store, _seed) = seeded_store(10).await;
        let t1 = make_spend_tx(1, vec![(crate::test_util::txid_from_byte(0), 0, 50_0000_0000, 10)], vec![(49_9999_0000, 20)]);
        let t1_txid = t1.txid;
        let t2 = make_spend_tx(2, vec![(t1_txid, 0, 49_9999_0000, 20)], vec![(49_9998_0000, 30)]);
        let block = make_block(1, vec![t1, t2]);
        let node = MockNodeClient::builder().with_block(block).build();
        let scanner = Scanner::new(Arc::new(node), store.clone(), ScannerConfig::default());

        scanner.run_window().await.unwrap();

        let x = seed_address_for_tag(20);
        let y = seed_address_for_tag(30);
        assert_eq!(store.get_taint_record(&x).unwrap().unwrap().degree, Degree(1));
        assert_eq!(store.get_taint_record(&y).unwrap().unwrap().degree, Degree(2));
    }

    #[tokio::test]
    async fn shorter_path_upgrade_lowers_degree() {
        let (store, _seed) = seeded_store(10).await;
        let spend1 = make_spend_tx(1, vec![(crate::test_util::txid_from_byte(0), 0, 50_0000_0000, 10)], vec![(49_9999_0000, 20)]);
        let a_txid = spend1.txid;
        let spend2 = make_spend_tx(2, vec![(a_txid, 0, 49_9999_0000, 20)], vec![(49_9998_0000, 30)]);
        // A block whose transaction spends the original seed outpoint directly
        // to B, arriving after the two-hop chain above.
        let direct = make_spend_tx(3, vec![(crate::test_util::txid_from_byte(0), 0, 50_0000_0000, 10)], vec![(49_9997_0000, 30)]);

        let node = MockNodeClient::builder()
            .with_block(make_block(1, vec![spend1]))
            .with_block(make_block(2, vec![spend2]))
            .with_block(make_block(3, vec![direct]))
            .build();
        let scanner = Scanner::new(Arc::new(node), store.clone(), ScannerConfig::default());
        scanner.run_window().await.unwrap();

        let b = seed_address_for_tag(30);
        let record = store.get_taint_record(&b).unwrap().unwrap();
        assert_eq!(record.degree, Degree(1));
        assert_eq!(record.path.len(), 1);
    }

    #[tokio::test]
    async fn multi_input_min_degree_wins() {
        let store = TaintStore::temporary();
        let addr_low = seed_address_for_tag(41);
        let addr_high = seed_address_for_tag(42);
        store
            .put_tainted_outpoint(
                OutPoint::new(crate::test_util::txid_from_byte(1), 0),
                &TaintedOutpoint {
                    degree: Degree(3),
                    address: Some(addr_low.clone()),
                    source_height: BlockHeight(1),
                },
            )
            .unwrap();
        store
            .put_taint_record(
                &addr_low,
                &TaintRecord {
                    address: addr_low.clone(),
                    seed_address: "bc1qseed".into(),
                    degree: Degree(3),
                    path: vec![],
                    source_tx: None,
                    amount_sat: 1,
                    last_updated: 0,
                },
            )
            .unwrap();
        store
            .put_tainted_outpoint(
                OutPoint::new(crate::test_util::txid_from_byte(2), 0),
                &TaintedOutpoint {
                    degree: Degree(5),
                    address: Some(addr_high.clone()),
                    source_height: BlockHeight(1),
                },
            )
            .unwrap();
        store
            .put_scan_progress(&ScanProgress {
                last_block: BlockHeight(1),
                updated_at: 0,
            })
            .unwrap();

        let spend = make_spend_tx(
            9,
            vec![
                (crate::test_util::txid_from_byte(1), 0, 1000, 41),
                (crate::test_util::txid_from_byte(2), 0, 1000, 42),
            ],
            vec![(1900, 50)],
        );
        let block = make_block(2, vec![spend]);
        let node = MockNodeClient::builder().with_block(block).build();
        let scanner = Scanner::new(Arc::new(node), store.clone(), ScannerConfig::default());

        scanner.run_window().await.unwrap();

        let z = seed_address_for_tag(50);
        assert_eq!(store.get_taint_record(&z).unwrap().unwrap().degree, Degree(4));
    }

    #[tokio::test]
    async fn reprocessing_an_already_committed_height_is_an_invariant_violation() {
        let (store, _seed) = seeded_store(10).await;
        let spend = make_spend_tx(1, vec![(crate::test_util::txid_from_byte(0), 0, 50_0000_0000, 10)], vec![(49_9999_0000, 20)]);
        let block = make_block(1, vec![spend]);
        let node = MockNodeClient::builder().with_block(block).build();
        let scanner = Scanner::new(Arc::new(node), store.clone(), ScannerConfig::default());

        store
            .put_scan_progress(&ScanProgress {
                last_block: BlockHeight(1),
                updated_at: 0,
            })
            .unwrap();

        let err = scanner.process_block(BlockHeight(1)).await.unwrap_err();
        assert!(!err.is_block_local(), "scan_progress moving backward must be fatal");
    }
}
