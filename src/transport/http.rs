// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use super::{
    Endpoint, RpcRequest, RpcTransport, Subscription, TransportError,
    jsonrpc::{Incoming, Request, parse_frame},
};

/// Pause after a failed HTTP call, so callers polling in a loop don't spin.
const FAILURE_PAUSE: Duration = Duration::from_millis(100);

/// Plain HTTP JSON-RPC. One attempt per call, no retries.
pub struct HttpClient {
    client: reqwest::Client,
    endpoint: Endpoint,
    next_id: AtomicU64,
}

impl HttpClient {
    pub fn new(endpoint: Endpoint, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call_once(&self, request: &RpcRequest) -> Result<Value, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut builder = self
            .client
            .post(self.endpoint.http_url.clone())
            .json(&Request::new(id, request.method_name, &request.params));
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(token) = &self.endpoint.token {
            builder = builder.bearer_auth(token);
        }
        let body = builder.send().await?.error_for_status()?.text().await?;
        match parse_frame(&body)? {
            Incoming::Response { result, .. } => result,
            Incoming::Notification(notification) => Err(TransportError::Json(format!(
                "expected a response, got notification {}",
                notification.method
            ))),
        }
    }
}

#[async_trait]
impl RpcTransport for HttpClient {
    async fn call(&self, request: RpcRequest) -> Result<Value, TransportError> {
        match self.call_once(&request).await {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!(method = request.method_name, "http call failed: {e}");
                tokio::time::sleep(FAILURE_PAUSE).await;
                Err(e)
            }
        }
    }

    async fn subscribe(&self, request: RpcRequest) -> Result<Subscription, TransportError> {
        Err(TransportError::Http(format!(
            "{} needs a websocket connection",
            request.method_name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::test_server;
    use serde_json::json;

    #[tokio::test]
    async fn calls_with_bearer_token() {
        let server = test_server::spawn_http(json!("calibrationnet")).await;
        let mut endpoint = server.endpoint();
        endpoint.token = Some("secret".into());
        let client = HttpClient::new(endpoint, Duration::from_secs(5)).unwrap();
        let name = client
            .call(RpcRequest::<String>::new("Filecoin.StateNetworkName", ()).lower())
            .await
            .unwrap();
        assert_eq!(name, json!("calibrationnet"));
        assert_eq!(server.authorization().as_deref(), Some("bearer secret"));
    }

    #[tokio::test]
    async fn failures_are_not_retried() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let endpoint = Endpoint {
            ws_url: format!("ws://{addr}/rpc/v0").parse().unwrap(),
            http_url: format!("http://{addr}/rpc/v0").parse().unwrap(),
            token: None,
        };
        let client = HttpClient::new(endpoint, Duration::from_secs(1)).unwrap();
        let err = client
            .call(RpcRequest::<Value>::new("Filecoin.NetPeers", ()).lower())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Http(_)), "{err}");
    }

    #[tokio::test]
    async fn subscriptions_need_a_websocket() {
        let server = test_server::spawn_http(json!(null)).await;
        let client = HttpClient::new(server.endpoint(), Duration::from_secs(1)).unwrap();
        assert!(
            client
                .subscribe(RpcRequest::<Value>::new("Filecoin.ChainNotify", ()).lower())
                .await
                .is_err()
        );
    }
}
