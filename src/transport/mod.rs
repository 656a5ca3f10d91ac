// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! JSON-RPC 2.0 client for a Lotus-compatible node.
//!
//! Calls go through a [`WsPool`] of multiplexed WebSocket connections, simple
//! node-info queries may use the [`HttpClient`]. Subscriptions always get a
//! dedicated socket. Nothing in here knows about chain semantics.

mod error;
mod http;
pub mod jsonrpc;
mod pool;
#[cfg(test)]
pub(crate) mod test_server;
mod ws;

use std::{marker::PhantomData, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use smart_default::SmartDefault;
use tokio::sync::mpsc;
use url::Url;

use crate::lotus_json::HasLotusJson;

pub use error::TransportError;
pub use http::HttpClient;
pub use pool::WsPool;
pub use ws::WsConnection;

/// Where the node listens, and how to authorize against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub ws_url: Url,
    pub http_url: Url,
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, SmartDefault)]
pub struct TransportConfig {
    /// Per attempt.
    #[default(Duration::from_secs(60))]
    pub call_timeout: Duration,
    #[default(5)]
    pub max_retries: usize,
    #[default(10)]
    pub dial_attempts: usize,
    /// Upper bound on idle pooled connections.
    #[default(16)]
    pub pool_size: usize,
    #[default(5000)]
    pub subscription_buffer: usize,
    #[default(Duration::from_secs(60))]
    pub http_timeout: Duration,
    /// First delay of the exponential retry backoff.
    #[default(Duration::from_millis(500))]
    pub retry_min_delay: Duration,
}

/// An at-rest description of a remote procedure call, typed by its result.
#[derive(Debug, Clone)]
pub struct RpcRequest<T = Value> {
    pub method_name: &'static str,
    pub params: Value,
    pub result_type: PhantomData<T>,
    /// Overrides [`TransportConfig::call_timeout`].
    pub timeout: Option<Duration>,
}

impl<T> RpcRequest<T> {
    pub fn new<P: HasLotusJson>(method_name: &'static str, params: P) -> Self {
        let params = match params.into_lotus_json_value() {
            // `()` means "no parameters", which JSON-RPC spells `[]`
            Ok(Value::Null) => Value::Array(vec![]),
            Ok(params) => params,
            Err(e) => Value::String(format!(
                "INTERNAL ERROR: parameters could not be serialized as JSON: {e}"
            )),
        };
        RpcRequest {
            method_name,
            params,
            result_type: PhantomData,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Discard type information about the response.
    pub fn lower(self) -> RpcRequest {
        RpcRequest {
            method_name: self.method_name,
            params: self.params,
            result_type: PhantomData,
            timeout: self.timeout,
        }
    }
}

/// Values of one node-side channel, in the order the node sent them.
#[derive(Debug)]
pub struct Subscription {
    id: Value,
    frames: mpsc::Receiver<Value>,
}

impl Subscription {
    pub fn new(id: Value, frames: mpsc::Receiver<Value>) -> Self {
        Self { id, frames }
    }

    /// The channel id from the node's acknowledgement.
    pub fn id(&self) -> &Value {
        &self.id
    }

    /// `None` once the node closed the channel or the socket dropped.
    pub async fn next(&mut self) -> Option<Value> {
        self.frames.recv().await
    }
}

#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Returns the raw `result` of the call, or fails. Never hangs past the
    /// configured timeouts.
    async fn call(&self, request: RpcRequest) -> Result<Value, TransportError>;

    async fn subscribe(&self, request: RpcRequest) -> Result<Subscription, TransportError>;
}
