//! Key encoding for the two Taint Store namespaces.
//!
//! Keys are UTF-8 byte strings so the store's native ordered iteration can
//! be used directly for prefix scans (e.g. listing every `tainted_out:` entry
//! for a txid without decoding values).

use bitcoin::Txid;

pub const SCAN_PROGRESS: &str = "scan_progress";
pub const SEED_INIT_FLAG: &str = "satoshi_coinbase_initialized";

pub fn tainted_address(address: &str) -> Vec<u8> {
    format!("tainted:{address}").into_bytes()
}

pub fn tainted_outpoint(txid: Txid, vout: u32) -> Vec<u8> {
    format!("tainted_out:{txid}:{vout}").into_bytes()
}

pub fn tainted_outpoint_tx_prefix(txid: Txid) -> Vec<u8> {
    format!("tainted_out:{txid}:").into_bytes()
}

pub fn tx_record(txid: Txid) -> Vec<u8> {
    format!("tx:{txid}").into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::txid_from_byte;

    #[test]
    fn tainted_outpoint_key_is_prefixed_by_tx_prefix() {
        let txid = txid_from_byte(7);
        let key = tainted_outpoint(txid, 3);
        let prefix = tainted_outpoint_tx_prefix(txid);
        assert!(key.starts_with(&prefix));
    }

    #[test]
    fn tainted_address_key_round_trips_address_text() {
        let key = tainted_address("bc1qxyz");
        assert_eq!(key, b"tainted:bc1qxyz");
    }
}
