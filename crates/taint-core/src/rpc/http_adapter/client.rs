use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bitcoin::BlockHash;
use reqwest::header;
use tokio::sync::Semaphore;
use tracing::{debug, trace};

use crate::error::{RpcError, TaintError};
use crate::types::{BlockData, BlockHeight};

use super::super::retry::{with_retry, RetryPolicy};
use super::super::types::ChainInfo;
use super::super::NodeClient;
use super::parsing::parse_block_data;
use super::protocol::{parse_jsonrpc_error, JsonRpcRequest, JsonRpcResponse};

/// Bitcoin Core JSON-RPC client over HTTP(S).
///
/// Issues plain (non-batched) calls, since the Node Client surface the
/// scanner needs is three calls per block at most, and bounds outstanding
/// in-flight requests with a semaphore so a burst of concurrent callers
/// never opens more connections than the node's RPC worker pool allows.
pub struct HttpNodeClient {
    client: reqwest::Client,
    url: String,
    auth: Option<(String, String)>,
    inflight: Arc<Semaphore>,
    retry_policy: RetryPolicy,
    next_id: AtomicU64,
}

impl HttpNodeClient {
    /// Create a new client for an HTTP(S) JSON-RPC endpoint.
    ///
    /// Authentication precedence:
    /// 1. explicit `user` + `pass`
    /// 2. cookie file (`username:password`) from `cookie_file`
    /// 3. no auth
    pub fn new(
        connection: &str,
        user: Option<&str>,
        pass: Option<&str>,
        cookie_file: Option<&Path>,
        max_concurrent_requests: usize,
        request_timeout: Duration,
        retry_policy: RetryPolicy,
    ) -> Result<Self, TaintError> {
        let url = validate_endpoint(connection)?;
        let auth = resolve_credentials(user, pass, cookie_file)?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(request_timeout)
            .pool_max_idle_per_host(32)
            .tcp_nodelay(true)
            .build()
            .expect("reqwest client builder uses valid static config");

        Ok(Self {
            client,
            url,
            auth,
            inflight: Arc::new(Semaphore::new(max_concurrent_requests.max(1))),
            retry_policy,
            next_id: AtomicU64::new(initial_request_id()),
        })
    }

    fn post_request(&self, request: &JsonRpcRequest) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .post(&self.url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(request);
        match &self.auth {
            Some((user, pass)) => builder.basic_auth(user, Some(pass)),
            None => builder,
        }
    }

    async fn rpc_call_once(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, RpcError> {
        let _permit = self
            .inflight
            .acquire()
            .await
            .expect("semaphore is never closed");

        let call_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        debug!(rpc.id = call_id, rpc.method = method, "dispatching rpc call");

        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: call_id,
            method,
            params,
        };
        let response = self
            .post_request(&request)
            .send()
            .await
            .map_err(RpcError::Transport)?;
        let status = response.status();
        let body = response.text().await.map_err(RpcError::Transport)?;

        trace!(
            rpc.id = call_id,
            rpc.method = method,
            %status,
            elapsed_ms = started.elapsed().as_millis(),
            body = %body,
            "rpc round trip complete"
        );

        let decoded: JsonRpcResponse = serde_json::from_str(&body).map_err(|e| {
            RpcError::InvalidResponse(format!("decode JSON-RPC response: {e}; body={body}"))
        })?;

        match decoded.error {
            Some(err) => Err(parse_jsonrpc_error(err)),
            None => Ok(decoded.result.unwrap_or(serde_json::Value::Null)),
        }
    }

    async fn rpc_call(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, RpcError> {
        with_retry(self.retry_policy, || self.rpc_call_once(method, params.clone())).await
    }
}

#[async_trait]
impl NodeClient for HttpNodeClient {
    async fn chain_info(&self) -> Result<ChainInfo, RpcError> {
        let raw = self.rpc_call("getblockchaininfo", Vec::new()).await?;
        let info: ChainInfo = serde_json::from_value(raw)
            .map_err(|e| RpcError::InvalidResponse(format!("invalid getblockchaininfo result: {e}")))?;
        if info.is_initial_sync {
            return Err(RpcError::NodeSyncing {
                progress: info.verification_progress,
            });
        }
        Ok(info)
    }

    async fn block_hash(&self, height: BlockHeight) -> Result<BlockHash, RpcError> {
        let raw = self
            .rpc_call("getblockhash", vec![serde_json::json!(height.0)])
            .await?;
        let hash_str = raw
            .as_str()
            .ok_or_else(|| RpcError::InvalidResponse("getblockhash did not return a string".into()))?;
        hash_str
            .parse()
            .map_err(|e| RpcError::InvalidResponse(format!("invalid block hash: {e}")))
    }

    async fn block(&self, hash: BlockHash, height: BlockHeight) -> Result<BlockData, RpcError> {
        let raw = self
            .rpc_call(
                "getblock",
                vec![serde_json::json!(hash.to_string()), serde_json::json!(3)],
            )
            .await?;
        parse_block_data(&raw, hash, height).map_err(|e| match e {
            TaintError::Rpc(rpc_err) => rpc_err,
            other => RpcError::InvalidResponse(other.to_string()),
        })
    }
}

/// Check that `connection` is an `http(s)://` URL the node RPC client can
/// actually dial, returning it unchanged (the `reqwest::Client` parses it
/// again internally; this pass is purely a config-time sanity check).
fn validate_endpoint(connection: &str) -> Result<String, TaintError> {
    let scheme = reqwest::Url::parse(connection)
        .map_err(|e| TaintError::Config(format!("`{connection}` is not a valid URL: {e}")))?
        .scheme()
        .to_owned();

    if scheme != "http" && scheme != "https" {
        return Err(TaintError::Config(format!(
            "node endpoint must use http or https, got `{scheme}`"
        )));
    }
    Ok(connection.to_owned())
}

/// Work out the basic-auth pair to send with every RPC call, if any.
///
/// `user`/`pass` take priority when both are present; a mismatched pair (one
/// set, the other not) is a configuration mistake and rejected outright.
/// Otherwise, a cookie file is read for a single `user:password` line, the
/// same convention `bitcoind` uses for its own `.cookie` file.
fn resolve_credentials(
    user: Option<&str>,
    pass: Option<&str>,
    cookie_file: Option<&Path>,
) -> Result<Option<(String, String)>, TaintError> {
    if user.is_some() != pass.is_some() {
        return Err(TaintError::Config(
            "node.user and node.pass must both be set, or both left unset".to_owned(),
        ));
    }
    if let (Some(user), Some(pass)) = (user, pass) {
        return Ok(Some((user.to_owned(), pass.to_owned())));
    }

    let Some(cookie_path) = cookie_file else {
        return Ok(None);
    };
    let contents = std::fs::read_to_string(cookie_path).map_err(|e| {
        TaintError::Config(format!("cannot read cookie file {}: {e}", cookie_path.display()))
    })?;

    let (cookie_user, cookie_pass) = contents
        .lines()
        .next()
        .unwrap_or("")
        .trim()
        .split_once(':')
        .filter(|(u, p)| !u.is_empty() && !p.is_empty())
        .ok_or_else(|| {
            TaintError::Config(format!(
                "cookie file {} must contain one non-empty `user:password` line",
                cookie_path.display()
            ))
        })?;

    Ok(Some((cookie_user.to_owned(), cookie_pass.to_owned())))
}

/// Seeds the JSON-RPC request counter from a random value rather than zero,
/// so concurrent client instances hitting the same node don't produce
/// overlapping request ids in its debug log.
fn initial_request_id() -> u64 {
    rand::random()
}
