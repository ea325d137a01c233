//! Native JSON-RPC client for Bitcoin Core compatible endpoints.
//!
//! Implements [`NodeClient`](super::NodeClient) over JSON-RPC using
//! `reqwest`, bounding in-flight requests with a semaphore and retrying
//! transient failures with backoff via [`super::retry`].

mod client;
mod parsing;
mod protocol;

pub use client::HttpNodeClient;
