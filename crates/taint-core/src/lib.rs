//! Core library for the Satoshi taint propagation engine.
//!
//! Provides the domain types, the Node Client abstraction, the embedded
//! Taint Store, the one-shot Seed Builder, the Taint Scanner, and the
//! read-only Query Service. It is intentionally transport-agnostic: the
//! [`rpc::NodeClient`] trait can be backed by HTTP JSON-RPC or a mock.

pub mod error;
pub mod query;
pub mod rpc;
pub mod scanner;
pub mod script;
pub mod seed;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_util;

pub use error::{RpcError, StoreError, TaintError};
pub use query::{CheckResult, QueryService};
pub use scanner::{Scanner, ScannerConfig, ScannerState, ScannerStatus, SharedScannerStatus};
pub use seed::{SeedBuilder, SeedHeights};
pub use store::TaintStore;
