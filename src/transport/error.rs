// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request {method} timed out after {}", humantime::format_duration(*timeout))]
    RequestTimeout { method: String, timeout: Duration },
    #[error("connection to the node is closed")]
    ConnectionClosed,
    #[error("websocket error: {0}")]
    WebSocket(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("malformed JSON-RPC frame: {0}")]
    Json(String),
    #[error("failed to connect to {url} after {attempts} attempts: {reason}")]
    Dial {
        url: String,
        attempts: usize,
        reason: String,
    },
}

impl TransportError {
    /// Whether retrying the same call may succeed.
    ///
    /// Errors reported by the node itself and undecodable frames are final.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RequestTimeout { .. } | Self::ConnectionClosed | Self::WebSocket(_) | Self::Http(_)
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error;
        match e {
            Error::ConnectionClosed | Error::AlreadyClosed => Self::ConnectionClosed,
            e => Self::WebSocket(e.to_string()),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}
