use bitcoin::{Amount, BlockHash, OutPoint, ScriptBuf, Txid};

use crate::error::TaintError;
use crate::types::{BlockData, BlockHeight, TxData, TxInputData, TxOutputData};

pub(super) fn parse_txid(value: Option<&serde_json::Value>, field: &str) -> Result<Txid, TaintError> {
    let value = value
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| TaintError::InvalidBlockData(format!("missing {field}")))?;
    value
        .parse()
        .map_err(|e| TaintError::InvalidBlockData(format!("invalid {field}: {e}")))
}

fn script_from_hex(hex_str: &str) -> Result<ScriptBuf, TaintError> {
    ScriptBuf::from_hex(hex_str)
        .map_err(|e| TaintError::InvalidBlockData(format!("invalid scriptPubKey hex: {e}")))
}

fn parse_script_pubkey_from_json(spk: &serde_json::Value) -> Result<ScriptBuf, TaintError> {
    let hex_str = spk
        .get("hex")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| TaintError::InvalidBlockData("missing hex in scriptPubKey".into()))?;
    script_from_hex(hex_str)
}

/// Parse a BTC amount from a JSON value.
///
/// Number values are parsed via `Amount::from_float_in` to support scientific
/// notation, while string values are parsed via `Amount::from_str_in`.
pub(super) fn parse_btc_amount(value: &serde_json::Value) -> Result<Amount, TaintError> {
    match value {
        serde_json::Value::Number(n) => {
            let parsed = n
                .as_f64()
                .ok_or_else(|| TaintError::InvalidBlockData(format!("invalid BTC amount `{value}`")))?;
            Amount::from_float_in(parsed, bitcoin::Denomination::Bitcoin)
                .map_err(|e| TaintError::InvalidBlockData(format!("invalid BTC amount `{value}`: {e}")))
        }
        serde_json::Value::String(s) => Amount::from_str_in(s, bitcoin::Denomination::Bitcoin)
            .map_err(|e| TaintError::InvalidBlockData(format!("invalid BTC amount `{s}`: {e}"))),
        _ => Err(TaintError::InvalidBlockData(format!(
            "expected numeric BTC amount, got: {value}"
        ))),
    }
}

fn parse_tx_input(input: &serde_json::Value) -> Result<TxInputData, TaintError> {
    let is_coinbase = input.get("coinbase").is_some();
    if is_coinbase {
        return Ok(TxInputData {
            prevout: None,
            prevout_value: None,
            prevout_script: None,
        });
    }

    let prev_txid = parse_txid(input.get("txid"), "vin.txid")?;
    let prev_vout = input
        .get("vout")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| TaintError::InvalidBlockData("missing vin.vout".into()))? as u32;

    let prevout = input.get("prevout");
    let prevout_value = prevout
        .and_then(|p| p.get("value"))
        .map(parse_btc_amount)
        .transpose()?;
    let prevout_script = prevout
        .and_then(|p| p.get("scriptPubKey"))
        .map(parse_script_pubkey_from_json)
        .transpose()?;

    Ok(TxInputData {
        prevout: Some(OutPoint::new(prev_txid, prev_vout)),
        prevout_value,
        prevout_script,
    })
}

fn parse_tx_output(output: &serde_json::Value) -> Result<TxOutputData, TaintError> {
    let value = parse_btc_amount(
        output
            .get("value")
            .ok_or_else(|| TaintError::InvalidBlockData("missing value in vout".into()))?,
    )?;
    let script_pubkey =
        parse_script_pubkey_from_json(output.get("scriptPubKey").ok_or_else(|| {
            TaintError::InvalidBlockData("missing scriptPubKey in vout".into())
        })?)?;

    Ok(TxOutputData {
        value,
        script_pubkey,
    })
}

pub(super) fn parse_tx_data(raw: &serde_json::Value) -> Result<TxData, TaintError> {
    let txid = parse_txid(raw.get("txid"), "txid")?;
    let vin = raw
        .get("vin")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| TaintError::InvalidBlockData("missing vin array".into()))?;
    let vout = raw
        .get("vout")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| TaintError::InvalidBlockData("missing vout array".into()))?;

    let inputs = vin.iter().map(parse_tx_input).collect::<Result<_, _>>()?;
    let outputs = vout.iter().map(parse_tx_output).collect::<Result<_, _>>()?;

    Ok(TxData {
        txid,
        inputs,
        outputs,
    })
}

/// Parse a `getblock <hash> 3` response into a [`BlockData`], verifying the
/// returned hash and height match what was requested.
pub(super) fn parse_block_data(
    raw: &serde_json::Value,
    expected_hash: BlockHash,
    expected_height: BlockHeight,
) -> Result<BlockData, TaintError> {
    let hash: BlockHash = raw
        .get("hash")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| TaintError::InvalidBlockData("missing block hash".into()))?
        .parse()
        .map_err(|e| TaintError::InvalidBlockData(format!("invalid block hash: {e}")))?;
    if hash != expected_hash {
        return Err(TaintError::InvalidBlockData(format!(
            "node returned block hash {hash} but {expected_hash} was requested"
        )));
    }

    let height = raw
        .get("height")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| TaintError::InvalidBlockData("missing block height".into()))? as u32;
    if height != expected_height.0 {
        return Err(TaintError::InvalidBlockData(format!(
            "node returned block height {height} but {} was requested",
            expected_height.0
        )));
    }

    let transactions = raw
        .get("tx")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| TaintError::InvalidBlockData("missing tx array".into()))?
        .iter()
        .map(parse_tx_data)
        .collect::<Result<_, _>>()?;

    Ok(BlockData {
        height: expected_height,
        hash,
        transactions,
    })
}
