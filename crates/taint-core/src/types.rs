//! Domain types for the taint propagation engine.
//!
//! Contains the node-facing block/transaction shapes returned by the
//! [`crate::rpc::NodeClient`] ("verbose-with-prevouts"), and the store-facing
//! taint entities (`TaintRecord`, `TaintedOutpoint`, `ScanProgress`,
//! `SeedInitFlag`, `TxRecord`) persisted by the scanner.

use bitcoin::{Amount, OutPoint, ScriptBuf, Txid};
use serde::{Deserialize, Serialize};

// ==============================================================================
// Script Type Classification
// ==============================================================================

/// Classifies a script output type. Delegates detection to the `bitcoin`
/// crate's `Script::is_p2pkh()`, `is_p2sh()`, etc. methods, intentionally
/// avoiding a reimplementation of opcode-level pattern matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptType {
    P2pk,
    P2pkh,
    P2sh,
    P2wpkh,
    P2wsh,
    P2tr,
    BareMultisig,
    OpReturn,
    Unknown,
}

impl std::fmt::Display for ScriptType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::P2pk => write!(f, "p2pk"),
            Self::P2pkh => write!(f, "p2pkh"),
            Self::P2sh => write!(f, "p2sh"),
            Self::P2wpkh => write!(f, "p2wpkh"),
            Self::P2wsh => write!(f, "p2wsh"),
            Self::P2tr => write!(f, "p2tr"),
            Self::BareMultisig => write!(f, "bare_multisig"),
            Self::OpReturn => write!(f, "op_return"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

// ==============================================================================
// Block Height
// ==============================================================================

/// A Bitcoin block height, wrapped for type safety.
///
/// `#[serde(transparent)]` preserves the JSON representation as a bare
/// integer. `Deref<Target = u32>` minimises call-site churn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockHeight(pub u32);

impl From<u32> for BlockHeight {
    fn from(h: u32) -> Self {
        Self(h)
    }
}

impl From<BlockHeight> for u32 {
    fn from(h: BlockHeight) -> Self {
        h.0
    }
}

impl std::ops::Deref for BlockHeight {
    type Target = u32;
    fn deref(&self) -> &u32 {
        &self.0
    }
}

impl std::fmt::Display for BlockHeight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// ==============================================================================
// Degree
// ==============================================================================

/// Minimum number of on-chain transaction hops from any seed outpoint to the
/// entity in question. Seed entities are degree 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Degree(pub u32);

impl Degree {
    pub const SEED: Degree = Degree(0);

    #[must_use]
    pub fn next(self) -> Degree {
        Degree(self.0 + 1)
    }
}

impl std::fmt::Display for Degree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// ==============================================================================
// Node-facing block/transaction shapes ("verbose with prevouts")
// ==============================================================================

/// A full block as returned by the Node Client, with every input already
/// annotated by the prevout it spends. The scanner never issues a second RPC
/// to resolve an input's address or value.
#[derive(Debug, Clone)]
pub struct BlockData {
    pub height: BlockHeight,
    pub hash: bitcoin::BlockHash,
    pub transactions: Vec<TxData>,
}

/// A single transaction within a [`BlockData`].
#[derive(Debug, Clone)]
pub struct TxData {
    pub txid: Txid,
    pub inputs: Vec<TxInputData>,
    pub outputs: Vec<TxOutputData>,
}

impl TxData {
    /// A coinbase transaction has exactly one input whose prevout is `None`.
    #[must_use]
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].prevout.is_none()
    }
}

/// A transaction input together with the prevout it spends (already resolved
/// by the node; coinbase inputs carry no prevout).
#[derive(Debug, Clone)]
pub struct TxInputData {
    pub prevout: Option<OutPoint>,
    pub prevout_value: Option<Amount>,
    pub prevout_script: Option<ScriptBuf>,
}

/// A transaction output.
#[derive(Debug, Clone)]
pub struct TxOutputData {
    pub value: Amount,
    pub script_pubkey: ScriptBuf,
}

// ==============================================================================
// Store-facing taint entities
// ==============================================================================

/// One hop of a witness path: `from` spent an output paying `to` via `tx_id`,
/// moving `amount` satoshis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathHop {
    pub from: String,
    pub to: String,
    pub tx_id: Txid,
    pub amount_sat: u64,
}

/// The best-known tainting of an address (`tainted:<address>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaintRecord {
    pub address: String,
    pub seed_address: String,
    pub degree: Degree,
    pub path: Vec<PathHop>,
    pub source_tx: Option<Txid>,
    pub amount_sat: u64,
    pub last_updated: u64,
}

impl TaintRecord {
    #[must_use]
    pub fn is_seed(&self) -> bool {
        self.degree == Degree::SEED && self.path.is_empty()
    }
}

/// A specific (txid, vout) whose coins are tainted (`tainted_out:<txid>:<vout>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaintedOutpoint {
    pub degree: Degree,
    pub address: Option<String>,
    pub source_height: BlockHeight,
}

/// Cached compact transaction record on a taint-spreading path (`tx:<txid>`).
/// Best-effort: carries no invariant and exists only to serve the Query
/// Service's path enrichment without a second RPC round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRecord {
    pub txid: Txid,
    pub inputs: Vec<String>,
    pub outputs: Vec<(String, u64)>,
    pub block_height: BlockHeight,
    pub degree_at_store_time: Degree,
}

/// Last fully persisted block height (`scan_progress`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanProgress {
    pub last_block: BlockHeight,
    pub updated_at: u64,
}

/// One-shot idempotence marker for the Seed Builder (`satoshi_coinbase_initialized`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedInitFlag {
    pub timestamp: u64,
    pub outpoint_count: u64,
}
