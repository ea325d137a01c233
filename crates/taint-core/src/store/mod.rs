//! Embedded ordered key-value store for taint records and scan metadata.
//!
//! Two `sled::Tree`s inside one `sled::Db` give the *main* store
//! (`tainted:`, `tx:`) and the *scan* store (`tainted_out:`,
//! `scan_progress`, `satoshi_coinbase_initialized`). Keeping them as
//! distinct trees lets each be compacted independently while still living
//! in a single on-disk database, matching how `bkunyiha-blockchain`
//! partitions chain data from chainstate inside one `sled::Db`.

pub mod keys;

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;
use crate::types::{ScanProgress, SeedInitFlag, TaintRecord, TaintedOutpoint, TxRecord};

/// Handle to the embedded taint database.
#[derive(Clone)]
pub struct TaintStore {
    main: sled::Tree,
    scan: sled::Tree,
}

impl TaintStore {
    pub fn open(base_path: &Path) -> Result<Self, StoreError> {
        let db = sled::open(base_path)?;
        let main = db.open_tree(b"main")?;
        let scan = db.open_tree(b"scan")?;
        Ok(Self { main, scan })
    }

    /// In-memory store for tests; never persisted.
    #[cfg(test)]
    pub fn temporary() -> Self {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .expect("temporary sled db must open");
        let main = db.open_tree(b"main").expect("open main tree");
        let scan = db.open_tree(b"scan").expect("open scan tree");
        Self { main, scan }
    }

    // ==========================================================================
    // TaintRecord (main store)
    // ==========================================================================

    pub fn get_taint_record(&self, address: &str) -> Result<Option<TaintRecord>, StoreError> {
        get_json(&self.main, &keys::tainted_address(address))
    }

    pub fn put_taint_record(&self, address: &str, record: &TaintRecord) -> Result<(), StoreError> {
        put_json(&self.main, &keys::tainted_address(address), record)
    }

    // ==========================================================================
    // TxRecord (main store, best-effort cache)
    // ==========================================================================

    pub fn get_tx_record(&self, txid: bitcoin::Txid) -> Result<Option<TxRecord>, StoreError> {
        get_json(&self.main, &keys::tx_record(txid))
    }

    pub fn put_tx_record(&self, record: &TxRecord) -> Result<(), StoreError> {
        put_json(&self.main, &keys::tx_record(record.txid), record)
    }

    // ==========================================================================
    // TaintedOutpoint (scan store)
    // ==========================================================================

    pub fn get_tainted_outpoint(
        &self,
        outpoint: bitcoin::OutPoint,
    ) -> Result<Option<TaintedOutpoint>, StoreError> {
        get_json(&self.scan, &keys::tainted_outpoint(outpoint.txid, outpoint.vout))
    }

    pub fn put_tainted_outpoint(
        &self,
        outpoint: bitcoin::OutPoint,
        value: &TaintedOutpoint,
    ) -> Result<(), StoreError> {
        put_json(&self.scan, &keys::tainted_outpoint(outpoint.txid, outpoint.vout), value)
    }

    // ==========================================================================
    // ScanProgress (scan store)
    // ==========================================================================

    pub fn get_scan_progress(&self) -> Result<Option<ScanProgress>, StoreError> {
        get_json(&self.scan, keys::SCAN_PROGRESS.as_bytes())
    }

    pub fn put_scan_progress(&self, progress: &ScanProgress) -> Result<(), StoreError> {
        put_json(&self.scan, keys::SCAN_PROGRESS.as_bytes(), progress)
    }

    // ==========================================================================
    // SeedInitFlag (scan store)
    // ==========================================================================

    pub fn get_seed_init_flag(&self) -> Result<Option<SeedInitFlag>, StoreError> {
        get_json(&self.scan, keys::SEED_INIT_FLAG.as_bytes())
    }

    pub fn put_seed_init_flag(&self, flag: &SeedInitFlag) -> Result<(), StoreError> {
        put_json(&self.scan, keys::SEED_INIT_FLAG.as_bytes(), flag)
    }

    /// Start a new staged batch of writes against the main store.
    pub fn main_batch(&self) -> WriteBatch<'_> {
        WriteBatch {
            tree: &self.main,
            batch: sled::Batch::default(),
            count: 0,
        }
    }

    /// Start a new staged batch of writes against the scan store. Includes
    /// `scan_progress` writes, so committing this batch is the atomic
    /// "commit outpoints, then publish progress" step of the scan loop.
    pub fn scan_batch(&self) -> WriteBatch<'_> {
        WriteBatch {
            tree: &self.scan,
            batch: sled::Batch::default(),
            count: 0,
        }
    }
}

/// A staged set of writes against one tree, applied all-or-nothing on
/// [`WriteBatch::commit`].
pub struct WriteBatch<'a> {
    tree: &'a sled::Tree,
    batch: sled::Batch,
    count: usize,
}

impl WriteBatch<'_> {
    pub fn put<T: Serialize>(&mut self, key: &[u8], value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value)?;
        self.batch.insert(key, bytes);
        self.count += 1;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn commit(self) -> Result<(), StoreError> {
        self.tree
            .apply_batch(self.batch)
            .map_err(|e| StoreError::CommitFailed(e.to_string()))
    }
}

fn get_json<T: DeserializeOwned>(tree: &sled::Tree, key: &[u8]) -> Result<Option<T>, StoreError> {
    match tree.get(key)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

fn put_json<T: Serialize>(tree: &sled::Tree, key: &[u8], value: &T) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec(value)?;
    tree.insert(key, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::txid_from_byte;
    use crate::types::{BlockHeight, Degree};

    #[test]
    fn round_trips_taint_record() {
        let store = TaintStore::temporary();
        let record = TaintRecord {
            address: "bc1qseed".into(),
            seed_address: "bc1qseed".into(),
            degree: Degree::SEED,
            path: vec![],
            source_tx: None,
            amount_sat: 50_0000_0000,
            last_updated: 1,
        };
        store.put_taint_record(&record.address, &record).unwrap();
        let fetched = store.get_taint_record("bc1qseed").unwrap().unwrap();
        assert_eq!(fetched.degree, Degree::SEED);
    }

    #[test]
    fn missing_taint_record_is_none() {
        let store = TaintStore::temporary();
        assert!(store.get_taint_record("bc1qnothing").unwrap().is_none());
    }

    #[test]
    fn scan_batch_commits_outpoints_and_progress_together() {
        let store = TaintStore::temporary();
        let outpoint = bitcoin::OutPoint::new(txid_from_byte(1), 0);
        let mut batch = store.scan_batch();
        batch
            .put(
                &keys::tainted_outpoint(outpoint.txid, outpoint.vout),
                &TaintedOutpoint {
                    degree: Degree::SEED,
                    address: Some("bc1qseed".into()),
                    source_height: BlockHeight(0),
                },
            )
            .unwrap();
        batch
            .put(
                keys::SCAN_PROGRESS.as_bytes(),
                &ScanProgress {
                    last_block: BlockHeight(0),
                    updated_at: 1,
                },
            )
            .unwrap();
        batch.commit().unwrap();

        assert!(store.get_tainted_outpoint(outpoint).unwrap().is_some());
        assert_eq!(
            store.get_scan_progress().unwrap().unwrap().last_block,
            BlockHeight(0)
        );
    }
}
