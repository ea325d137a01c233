//! Read-only address lookup. Independent of the Scanner's liveness: reads
//! go straight to the Taint Store and never touch the Node Client.

use std::time::Duration;

use tokio::time::timeout;

use crate::error::TaintError;
use crate::store::TaintStore;
use crate::types::{PathHop, TaintRecord, TxRecord};

/// The answer to "is this address reachable from a seed, and how".
#[derive(Debug, Clone, PartialEq)]
pub enum CheckResult {
    /// The address is itself a curated seed address.
    Seed,
    /// The address has a `TaintRecord` at the given degree and path.
    Tainted {
        degree: u32,
        path: Vec<PathHop>,
        transactions: Vec<TxRecord>,
    },
    /// No `TaintRecord` exists for this address.
    Unconnected,
}

pub struct QueryService {
    store: TaintStore,
    timeout: Duration,
}

impl QueryService {
    pub fn new(store: TaintStore, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Look up `address`, bounding the store read by the configured timeout
    /// so pathological store latency cannot hang a caller indefinitely.
    pub async fn check(&self, address: &str) -> Result<CheckResult, TaintError> {
        let store = self.store.clone();
        let address = address.to_owned();
        let lookup = tokio::task::spawn_blocking(move || Self::check_sync(&store, &address));

        match timeout(self.timeout, lookup).await {
            Ok(Ok(result)) => result,
            Ok(Err(_join_error)) => Err(TaintError::QueryUnavailable(
                "query lookup task panicked".to_owned(),
            )),
            Err(_elapsed) => Err(TaintError::QueryUnavailable(
                "query lookup exceeded its timeout".to_owned(),
            )),
        }
    }

    fn check_sync(store: &TaintStore, address: &str) -> Result<CheckResult, TaintError> {
        let Some(record) = store.get_taint_record(address)? else {
            return Ok(CheckResult::Unconnected);
        };

        if record.is_seed() {
            return Ok(CheckResult::Seed);
        }

        let transactions = resolve_path_transactions(store, &record)?;
        Ok(CheckResult::Tainted {
            degree: record.degree.0,
            path: record.path,
            transactions,
        })
    }
}

/// Best-effort enrichment of each path hop's transaction from the `tx:`
/// cache. A miss is not an error: the path itself already carries `amount`
/// and the hop addresses.
fn resolve_path_transactions(
    store: &TaintStore,
    record: &TaintRecord,
) -> Result<Vec<TxRecord>, TaintError> {
    let mut transactions = Vec::with_capacity(record.path.len());
    for hop in &record.path {
        if let Some(tx) = store.get_tx_record(hop.tx_id)? {
            transactions.push(tx);
        }
    }
    Ok(transactions)
}
