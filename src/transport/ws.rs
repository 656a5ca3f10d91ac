// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use futures::{
    SinkExt as _, StreamExt as _,
    stream::{SplitSink, SplitStream},
};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::{
    net::TcpStream,
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream,
    tungstenite::{
        Message,
        client::IntoClientRequest as _,
        http::{HeaderValue, header::AUTHORIZATION},
    },
};
use tracing::{debug, warn};

use super::{
    Endpoint, Subscription, TransportError,
    jsonrpc::{Incoming, Notification, Request, parse_frame},
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type PendingCalls = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, TransportError>>>>>;

/// One WebSocket connection multiplexing JSON-RPC calls.
///
/// A background reader routes every response to its caller by request id and
/// forwards notifications, if a notification channel is attached. Once the
/// socket closes every outstanding call fails with
/// [`TransportError::ConnectionClosed`].
pub struct WsConnection {
    writer: tokio::sync::Mutex<SplitSink<WsStream, Message>>,
    pending: PendingCalls,
    next_id: AtomicU64,
    closed: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    call_timeout: Duration,
}

impl WsConnection {
    pub async fn dial(
        endpoint: &Endpoint,
        call_timeout: Duration,
        notifications: Option<mpsc::Sender<Notification>>,
    ) -> Result<Self, TransportError> {
        let mut request = endpoint.ws_url.as_str().into_client_request()?;
        if let Some(token) = &endpoint.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| TransportError::WebSocket(format!("invalid API token: {e}")))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }
        let (stream, _) = tokio_tungstenite::connect_async(request).await?;
        let (writer, stream) = stream.split();
        let pending = PendingCalls::default();
        let closed = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(read_loop(
            stream,
            pending.clone(),
            closed.clone(),
            notifications,
        ));
        debug!(url = %endpoint.ws_url, "websocket connected");
        Ok(Self {
            writer: tokio::sync::Mutex::new(writer),
            pending,
            next_id: AtomicU64::new(1),
            closed,
            reader,
            call_timeout,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Sends one request and waits for the correlated response, at most
    /// `call_timeout`.
    pub async fn request(&self, method: &str, params: &Value) -> Result<Value, TransportError> {
        self.request_with_timeout(method, params, self.call_timeout).await
    }

    pub async fn request_with_timeout(
        &self,
        method: &str,
        params: &Value,
        timeout: Duration,
    ) -> Result<Value, TransportError> {
        if self.is_closed() {
            return Err(TransportError::ConnectionClosed);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = serde_json::to_string(&Request::new(id, method, params))?;
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let outcome = tokio::time::timeout(timeout, async {
            self.writer.lock().await.send(Message::text(frame)).await?;
            rx.await.map_err(|_| TransportError::ConnectionClosed)?
        })
        .await;
        self.pending.lock().remove(&id);

        match outcome {
            Ok(result) => result,
            Err(_) => Err(TransportError::RequestTimeout {
                method: method.into(),
                timeout,
            }),
        }
    }

    /// Opens a dedicated connection and subscribes on it. The first response is
    /// the acknowledgement carrying the channel id, all later channel values
    /// are handed to the returned [`Subscription`].
    pub async fn subscribe(
        endpoint: &Endpoint,
        call_timeout: Duration,
        buffer: usize,
        method: &str,
        params: &Value,
    ) -> Result<Subscription, TransportError> {
        let (raw_tx, mut raw_rx) = mpsc::channel(buffer);
        let connection = Self::dial(endpoint, call_timeout, Some(raw_tx)).await?;
        let channel = connection.request(method, params).await?;
        debug!(method, %channel, "subscription acknowledged");

        let (tx, rx) = mpsc::channel(buffer);
        let id = channel.clone();
        tokio::spawn(async move {
            // the socket lives as long as the dispatch loop
            let _connection = connection;
            while let Some(notification) = raw_rx.recv().await {
                if notification.closes_channel(&channel) {
                    debug!(%channel, "subscription closed by the node");
                    break;
                }
                match notification.channel_value() {
                    Some((id, value)) if *id == channel => {
                        if tx.send(value.clone()).await.is_err() {
                            debug!(%channel, "subscriber went away");
                            break;
                        }
                    }
                    _ => debug!(method = %notification.method, "ignoring notification"),
                }
            }
        });
        Ok(Subscription::new(id, rx))
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop(
    mut stream: SplitStream<WsStream>,
    pending: PendingCalls,
    closed: Arc<AtomicBool>,
    notifications: Option<mpsc::Sender<Notification>>,
) {
    while let Some(message) = stream.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text.as_str().to_owned(),
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => text,
                Err(e) => {
                    warn!("dropping non UTF-8 frame: {e}");
                    continue;
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!("websocket read failed: {e}");
                break;
            }
        };
        match parse_frame(&text) {
            Ok(Incoming::Response { id, result }) => match pending.lock().remove(&id) {
                Some(tx) => {
                    let _ = tx.send(result);
                }
                None => debug!(id, "dropping response to an abandoned request"),
            },
            Ok(Incoming::Notification(notification)) => match &notifications {
                // blocks the socket while the subscriber is behind
                Some(tx) => {
                    if tx.send(notification).await.is_err() {
                        debug!("notification channel closed");
                    }
                }
                None => debug!(method = %notification.method, "unexpected notification"),
            },
            Err(e) => warn!("{e}"),
        }
    }
    closed.store(true, Ordering::Release);
    for (_, tx) in pending.lock().drain() {
        let _ = tx.send(Err(TransportError::ConnectionClosed));
    }
}
