// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Minimal in-process JSON-RPC nodes for transport tests.

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use futures::{SinkExt as _, StreamExt as _};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::{
    io::{AsyncReadExt as _, AsyncWriteExt as _},
    net::TcpListener,
};
use tokio_tungstenite::tungstenite::{
    Message,
    handshake::server::{Request, Response},
    http::header::AUTHORIZATION,
};

use super::Endpoint;

pub struct TestServer {
    addr: SocketAddr,
    authorization: Arc<Mutex<Option<String>>>,
    connections: Arc<AtomicUsize>,
}

impl TestServer {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            ws_url: format!("ws://{}/rpc/v0", self.addr).parse().unwrap(),
            http_url: format!("http://{}/rpc/v0", self.addr).parse().unwrap(),
            token: None,
        }
    }

    pub fn authorization(&self) -> Option<String> {
        self.authorization.lock().clone()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

pub fn response(request: &Value, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": request["id"], "result": result})
}

/// Serves WebSocket JSON-RPC. For every request the handler gets the
/// connection index and the request, and returns the frames to send back, or
/// `None` to close the connection.
pub async fn spawn<F>(handler: F) -> TestServer
where
    F: FnMut(usize, Value) -> Option<Vec<Value>> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server = TestServer {
        addr: listener.local_addr().unwrap(),
        authorization: Default::default(),
        connections: Default::default(),
    };
    let handler = Arc::new(Mutex::new(handler));
    let (authorization, connections) = (server.authorization.clone(), server.connections.clone());
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let index = connections.fetch_add(1, Ordering::SeqCst);
            let (handler, authorization) = (handler.clone(), authorization.clone());
            tokio::spawn(async move {
                let callback = |request: &Request, response: Response| {
                    if let Some(value) = request.headers().get(AUTHORIZATION) {
                        *authorization.lock() = value.to_str().ok().map(String::from);
                    }
                    Ok(response)
                };
                let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
                    return;
                };
                while let Some(Ok(message)) = ws.next().await {
                    let Message::Text(text) = message else {
                        continue;
                    };
                    let request: Value = serde_json::from_str(text.as_str()).unwrap();
                    let reply = (&mut *handler.lock())(index, request);
                    match reply {
                        Some(frames) => {
                            for frame in frames {
                                if ws.send(Message::text(frame.to_string())).await.is_err() {
                                    return;
                                }
                            }
                        }
                        None => {
                            let _ = ws.close(None).await;
                            return;
                        }
                    }
                }
            });
        }
    });
    server
}

/// Serves plain HTTP JSON-RPC, answering every request with `result`.
pub async fn spawn_http(result: Value) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server = TestServer {
        addr: listener.local_addr().unwrap(),
        authorization: Default::default(),
        connections: Default::default(),
    };
    let (authorization, connections) = (server.authorization.clone(), server.connections.clone());
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            connections.fetch_add(1, Ordering::SeqCst);
            let (authorization, result) = (authorization.clone(), result.clone());
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 4096];
                let (head_len, content_length) = loop {
                    let n = stream.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        return;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                    if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                        let head = String::from_utf8_lossy(&buf[..pos]).to_lowercase();
                        let content_length = head
                            .lines()
                            .find_map(|line| line.strip_prefix("content-length:"))
                            .and_then(|v| v.trim().parse::<usize>().ok())
                            .unwrap_or_default();
                        if let Some(auth) = head
                            .lines()
                            .find_map(|line| line.strip_prefix("authorization:"))
                        {
                            *authorization.lock() = Some(auth.trim().to_owned());
                        }
                        break (pos + 4, content_length);
                    }
                };
                while buf.len() < head_len + content_length {
                    let n = stream.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        return;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }
                let request: Value = serde_json::from_slice(&buf[head_len..]).unwrap();
                let body = response(&request, result).to_string();
                let reply = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(reply.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });
    server
}
