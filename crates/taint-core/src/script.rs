//! Script classification and address decoding.
//!
//! The Node Client's `address_from_script` operation delegates entirely to
//! the `bitcoin` crate rather than reimplementing opcode-level pattern
//! matching.

use bitcoin::{Network, Script};

use crate::types::ScriptType;

/// Classify a script using the `bitcoin` crate's built-in detection methods.
#[must_use]
pub fn classify_script(script: &Script) -> ScriptType {
    if script.is_p2pk() {
        ScriptType::P2pk
    } else if script.is_p2pkh() {
        ScriptType::P2pkh
    } else if script.is_p2sh() {
        ScriptType::P2sh
    } else if script.is_p2wpkh() {
        ScriptType::P2wpkh
    } else if script.is_p2wsh() {
        ScriptType::P2wsh
    } else if script.is_p2tr() {
        ScriptType::P2tr
    } else if script.is_multisig() {
        ScriptType::BareMultisig
    } else if script.is_op_return() {
        ScriptType::OpReturn
    } else {
        ScriptType::Unknown
    }
}

/// Decode the standard output types used on mainnet (P2PKH, P2SH, P2WPKH,
/// P2WSH, P2TR) into an address string. Returns `None` for non-standard
/// outputs (P2PK, bare multisig, OP_RETURN, anything unrecognized). The
/// engine never invents an address for scripts the node itself wouldn't
/// report one for.
#[must_use]
pub fn address_from_script(script: &Script, network: Network) -> Option<String> {
    bitcoin::Address::from_script(script, network)
        .ok()
        .map(|addr| addr.to_string())
}
