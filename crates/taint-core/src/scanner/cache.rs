//! Bounded parent-taint cache.
//!
//! A non-seed address's `TaintRecord` is re-read from the store every time
//! it is used as a path's source, which under heavy fan-out (many outputs
//! tracing back to the same recently-tainted address) would dominate store
//! read traffic. This cache trades a bounded amount of memory for those
//! repeat reads; eviction never affects correctness, only read amplification
//! (a cache miss just falls back to the store).

use std::num::NonZeroUsize;

use lru::LruCache;
use tokio::sync::Mutex;

use crate::types::TaintRecord;

pub struct ParentTaintCache {
    inner: Mutex<LruCache<String, TaintRecord>>,
}

impl ParentTaintCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub async fn get(&self, address: &str) -> Option<TaintRecord> {
        self.inner.lock().await.get(address).cloned()
    }

    pub async fn put(&self, address: String, record: TaintRecord) {
        self.inner.lock().await.put(address, record);
    }
}
