use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use taint_core::rpc::retry::RetryPolicy;
use taint_core::scanner::ScannerConfig;

fn parse_nonzero_u32(s: &str) -> Result<u32, String> {
    let n: u32 = s.parse().map_err(|e| format!("{e}"))?;
    if n == 0 {
        return Err("value must be at least 1".to_string());
    }
    Ok(n)
}

/// Satoshi taint propagation engine: tracks Bitcoin outputs back to the
/// Patoshi-era coinbase seed set and serves the result over HTTP.
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Bitcoin Core RPC host.
    #[arg(long, default_value = "127.0.0.1", env = "NODE_HOST")]
    pub node_host: String,

    /// Bitcoin Core RPC port.
    #[arg(long, default_value = "8332", env = "NODE_PORT")]
    pub node_port: u16,

    /// RPC username (optional; cookie auth is used when unset).
    #[arg(long, env = "NODE_USER")]
    pub node_user: Option<String>,

    /// RPC password (optional; cookie auth is used when unset).
    #[arg(long, env = "NODE_PASS")]
    pub node_pass: Option<String>,

    /// Path to Bitcoin Core's `.cookie` file, used when user/pass are unset.
    #[arg(long, env = "NODE_COOKIE_FILE")]
    pub node_cookie_file: Option<PathBuf>,

    /// Per-RPC-call timeout.
    #[arg(long, default_value = "30000", env = "NODE_TIMEOUT_MS")]
    pub node_timeout_ms: u64,

    /// Maximum concurrent in-flight RPC calls.
    #[arg(long, default_value = "16", env = "NODE_MAX_PARALLEL", value_parser = parse_nonzero_u32)]
    pub node_max_parallel: u32,

    /// Maximum attempts per RPC call before giving up.
    #[arg(long, default_value = "5", env = "NODE_MAX_RETRIES")]
    pub node_max_retries: u32,

    /// Base retry backoff.
    #[arg(long, default_value = "500", env = "NODE_RETRY_BASE_MS")]
    pub node_retry_base_ms: u64,

    /// Maximum retry backoff.
    #[arg(long, default_value = "120000", env = "NODE_RETRY_CAP_MS")]
    pub node_retry_cap_ms: u64,

    /// Directory the Taint Store persists to.
    #[arg(long, default_value = "./taint-store", env = "STORE_BASE_PATH")]
    pub store_base_path: PathBuf,

    /// Whether the background Scanner runs at all. Disabling it leaves the
    /// HTTP query surface serving whatever the store already contains.
    #[arg(long, default_value = "true", env = "SCANNER_ENABLED")]
    pub scanner_enabled: bool,

    /// Poll interval once the Scanner has caught up to the chain tip.
    #[arg(long, default_value = "600000", env = "SCANNER_IDLE_INTERVAL_MS")]
    pub scanner_idle_interval_ms: u64,

    /// Blocks processed per Scanner window.
    #[arg(long, default_value = "100", env = "SCANNER_CHUNK_SIZE_BLOCKS", value_parser = parse_nonzero_u32)]
    pub scanner_chunk_size_blocks: u32,

    /// Store writes buffered before a batch is flushed early.
    #[arg(long, default_value = "1000", env = "SCANNER_BATCH_SIZE")]
    pub scanner_batch_size: usize,

    /// Maximum time a batch is held open before it is flushed regardless of size.
    #[arg(long, default_value = "5000", env = "SCANNER_BATCH_FLUSH_MS")]
    pub scanner_batch_flush_ms: u64,

    /// Maximum entries kept in the parent-taint-record cache.
    #[arg(long, default_value = "10000", env = "SCANNER_PARENT_CACHE_MAX")]
    pub scanner_parent_cache_max: usize,

    /// Wall-clock budget for a single `/check/<address>` lookup.
    #[arg(long, default_value = "15000", env = "QUERY_TIMEOUT_MS")]
    pub query_timeout_ms: u64,

    /// Address to bind the HTTP server to.
    #[arg(long, default_value = "127.0.0.1", env = "HTTP_BIND")]
    pub bind: String,

    /// Port to listen on.
    #[arg(long, default_value = "8080", env = "HTTP_PORT")]
    pub port: u16,
}

impl Cli {
    pub fn node_url(&self) -> String {
        format!("http://{}:{}", self.node_host, self.node_port)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.node_max_retries,
            base: Duration::from_millis(self.node_retry_base_ms),
            jitter: Duration::from_secs(1),
            cap: Duration::from_millis(self.node_retry_cap_ms),
        }
    }

    pub fn scanner_config(&self, network: bitcoin::Network) -> ScannerConfig {
        ScannerConfig {
            network,
            chunk_size_blocks: self.scanner_chunk_size_blocks,
            batch_size: self.scanner_batch_size,
            batch_flush: Duration::from_millis(self.scanner_batch_flush_ms),
            parent_cache_max: self.scanner_parent_cache_max,
            idle_interval: Duration::from_millis(self.scanner_idle_interval_ms),
        }
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}
