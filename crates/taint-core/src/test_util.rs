//! Shared test helpers for `taint-core` unit tests.
//!
//! Consolidates builder functions for the node-facing block/transaction
//! shapes (`make_block`, `make_coinbase_tx`, `make_spend_tx`) so that tests
//! across modules share a single source of truth for dummy chain data.

use bitcoin::hashes::Hash;
use bitcoin::{Amount, BlockHash, OutPoint, ScriptBuf, Txid};

use crate::types::{BlockData, BlockHeight, TxData, TxInputData, TxOutputData};

// ==============================================================================
// Txid / Script Helpers
// ==============================================================================

/// Create a deterministic `Txid` from a single distinguishing byte.
pub fn txid_from_byte(b: u8) -> Txid {
    let mut bytes = [0u8; 32];
    bytes[0] = b;
    Txid::from_byte_array(bytes)
}

fn block_hash_from_height(height: u32) -> BlockHash {
    let mut bytes = [0u8; 32];
    bytes[..4].copy_from_slice(&height.to_le_bytes());
    BlockHash::from_byte_array(bytes)
}

/// A P2WPKH scriptPubKey distinguished by `tag`, so each tagged script
/// decodes to a distinct bech32 address.
pub fn p2wpkh_script(tag: u8) -> ScriptBuf {
    let mut bytes = vec![0x00, 0x14];
    bytes.extend_from_slice(&[tag; 20]);
    ScriptBuf::from_bytes(bytes)
}

// ==============================================================================
// Block / Transaction Builders
// ==============================================================================

/// Build a `BlockData` at the given height containing `transactions`.
pub fn make_block(height: u32, transactions: Vec<TxData>) -> BlockData {
    BlockData {
        height: BlockHeight(height),
        hash: block_hash_from_height(height),
        transactions,
    }
}

/// Build a coinbase transaction (no prevouts) paying `output_sats` to
/// distinctly-tagged P2WPKH scripts, one per entry.
pub fn make_coinbase_tx(txid_tag: u8, output_sats: Vec<u64>) -> TxData {
    TxData {
        txid: txid_from_byte(txid_tag),
        inputs: vec![TxInputData {
            prevout: None,
            prevout_value: None,
            prevout_script: None,
        }],
        outputs: output_sats
            .into_iter()
            .enumerate()
            .map(|(i, sats)| TxOutputData {
                value: Amount::from_sat(sats),
                script_pubkey: p2wpkh_script(txid_tag.wrapping_add(i as u8).wrapping_add(1)),
            })
            .collect(),
    }
}

/// Build a transaction spending `inputs` (funding txid, vout, value, script
/// tag) and paying `outputs` (value, script tag).
pub fn make_spend_tx(
    txid_tag: u8,
    inputs: Vec<(Txid, u32, u64, u8)>,
    outputs: Vec<(u64, u8)>,
) -> TxData {
    TxData {
        txid: txid_from_byte(txid_tag),
        inputs: inputs
            .into_iter()
            .map(|(funding_txid, vout, value, script_tag)| TxInputData {
                prevout: Some(OutPoint::new(funding_txid, vout)),
                prevout_value: Some(Amount::from_sat(value)),
                prevout_script: Some(p2wpkh_script(script_tag)),
            })
            .collect(),
        outputs: outputs
            .into_iter()
            .map(|(value, script_tag)| TxOutputData {
                value: Amount::from_sat(value),
                script_pubkey: p2wpkh_script(script_tag),
            })
            .collect(),
    }
}
