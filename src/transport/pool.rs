// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::{ops::Deref, time::Duration};

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable as _};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{
    Endpoint, RpcRequest, RpcTransport, Subscription, TransportConfig, TransportError,
    WsConnection,
};

/// Lazily grown pool of WebSocket connections.
///
/// Each call checks out one connection exclusively, so a slow call never
/// delays another. Connections that closed underneath are dropped instead of
/// being returned.
pub struct WsPool {
    endpoint: Endpoint,
    config: TransportConfig,
    idle: Mutex<Vec<WsConnection>>,
}

impl WsPool {
    /// Dials the first connection, retrying up to
    /// [`TransportConfig::dial_attempts`] times. Failing that, the node is
    /// considered unreachable.
    pub async fn connect(endpoint: Endpoint, config: TransportConfig) -> Result<Self, TransportError> {
        let attempts = config.dial_attempts.max(1);
        let first = (|| WsConnection::dial(&endpoint, config.call_timeout, None))
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(config.retry_min_delay)
                    .with_max_times(attempts - 1),
            )
            .notify(|e, delay| warn!(url = %endpoint.ws_url, "dial failed, retrying in {delay:?}: {e}"))
            .await
            .map_err(|e| TransportError::Dial {
                url: endpoint.ws_url.to_string(),
                attempts,
                reason: e.to_string(),
            })?;
        info!(url = %endpoint.ws_url, "connected to node");
        Ok(Self {
            endpoint,
            config,
            idle: Mutex::new(vec![first]),
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn idle_connections(&self) -> usize {
        self.idle.lock().len()
    }

    async fn checkout(&self) -> Result<PooledConnection<'_>, TransportError> {
        loop {
            let Some(connection) = self.idle.lock().pop() else {
                break;
            };
            if !connection.is_closed() {
                return Ok(PooledConnection {
                    pool: self,
                    connection: Some(connection),
                });
            }
            debug!("discarding a closed connection");
        }
        let connection = WsConnection::dial(&self.endpoint, self.config.call_timeout, None).await?;
        Ok(PooledConnection {
            pool: self,
            connection: Some(connection),
        })
    }

    fn checkin(&self, connection: WsConnection) {
        if connection.is_closed() {
            return;
        }
        let mut idle = self.idle.lock();
        if idle.len() < self.config.pool_size {
            idle.push(connection);
        }
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.config.retry_min_delay)
            .with_max_times(self.config.max_retries)
    }

    async fn call_once(&self, request: &RpcRequest, timeout: Duration) -> Result<Value, TransportError> {
        let connection = self.checkout().await?;
        connection
            .request_with_timeout(request.method_name, &request.params, timeout)
            .await
    }
}

#[async_trait]
impl RpcTransport for WsPool {
    async fn call(&self, request: RpcRequest) -> Result<Value, TransportError> {
        let timeout = request.timeout.unwrap_or(self.config.call_timeout);
        (|| self.call_once(&request, timeout))
            .retry(self.backoff())
            .when(TransportError::is_transient)
            .notify(|e, delay| {
                warn!(
                    method = request.method_name,
                    "call failed, retrying in {delay:?}: {e}"
                )
            })
            .await
    }

    async fn subscribe(&self, request: RpcRequest) -> Result<Subscription, TransportError> {
        (|| {
            WsConnection::subscribe(
                &self.endpoint,
                self.config.call_timeout,
                self.config.subscription_buffer,
                request.method_name,
                &request.params,
            )
        })
        .retry(self.backoff())
        .when(TransportError::is_transient)
        .notify(|e, delay| {
            warn!(
                method = request.method_name,
                "subscribe failed, retrying in {delay:?}: {e}"
            )
        })
        .await
    }
}

/// Returns the connection to the pool when dropped.
struct PooledConnection<'a> {
    pool: &'a WsPool,
    connection: Option<WsConnection>,
}

impl Deref for PooledConnection<'_> {
    type Target = WsConnection;

    fn deref(&self) -> &Self::Target {
        // only `drop` takes the connection out
        self.connection.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.pool.checkin(connection);
        }
    }
}
