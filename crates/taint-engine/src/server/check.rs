use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use taint_core::CheckResult;

use super::error::{map_query_error, AppError};
use super::SharedState;

#[derive(Serialize)]
pub(super) struct ConnectionHop {
    from: String,
    to: String,
    #[serde(rename = "txHash")]
    tx_hash: String,
    amount: u64,
}

#[derive(Serialize)]
pub(super) struct TransactionSummary {
    txid: String,
    #[serde(rename = "blockHeight")]
    block_height: u32,
    inputs: Vec<String>,
    outputs: Vec<(String, u64)>,
}

#[derive(Serialize)]
pub(super) struct CheckResponse {
    #[serde(rename = "isConnected")]
    is_connected: bool,
    #[serde(rename = "isSatoshiAddress")]
    is_satoshi_address: bool,
    degree: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
    #[serde(rename = "connectionPath")]
    connection_path: Vec<ConnectionHop>,
    transactions: Vec<TransactionSummary>,
}

pub(super) async fn check_address(
    State(state): State<SharedState>,
    Path(address): Path<String>,
) -> Result<Json<CheckResponse>, AppError> {
    let result = state.query.check(&address).await.map_err(map_query_error)?;

    let response = match result {
        CheckResult::Seed => CheckResponse {
            is_connected: true,
            is_satoshi_address: true,
            degree: 0,
            note: None,
            connection_path: vec![],
            transactions: vec![],
        },
        CheckResult::Unconnected => CheckResponse {
            is_connected: false,
            is_satoshi_address: false,
            degree: 0,
            note: None,
            connection_path: vec![],
            transactions: vec![],
        },
        CheckResult::Tainted {
            degree,
            path,
            transactions,
        } => {
            let blocks_behind = state.status.read().await.blocks_behind;
            CheckResponse {
                is_connected: true,
                is_satoshi_address: false,
                degree,
                note: (blocks_behind > 0)
                    .then(|| "scanner is still catching up to the chain tip".to_string()),
                connection_path: path
                    .into_iter()
                    .map(|hop| ConnectionHop {
                        from: hop.from,
                        to: hop.to,
                        tx_hash: hop.tx_id.to_string(),
                        amount: hop.amount_sat,
                    })
                    .collect(),
                transactions: transactions
                    .into_iter()
                    .map(|tx| TransactionSummary {
                        txid: tx.txid.to_string(),
                        block_height: tx.block_height.0,
                        inputs: tx.inputs,
                        outputs: tx.outputs,
                    })
                    .collect(),
            }
        }
    };

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::server::{build_router, AppState, ConfigSummary};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};
    use taint_core::{QueryService, TaintStore};

    fn temp_store() -> TaintStore {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!("taint-engine-test-{unique}"));
        TaintStore::open(&path).unwrap()
    }

    fn test_router() -> axum::Router {
        let store = temp_store();
        let state = AppState {
            query: QueryService::new(store, Duration::from_secs(5)),
            status: Default::default(),
            config: ConfigSummary::default(),
        };
        build_router(state)
    }

    #[tokio::test]
    async fn unconnected_address_reports_not_connected() {
        let router = test_router();
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/check/bc1qnobody")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["isConnected"], false);
        assert_eq!(json["isSatoshiAddress"], false);
    }
}
