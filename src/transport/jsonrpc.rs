// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! JSON-RPC 2.0 framing, including Lotus' channel notifications.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::TransportError;

/// Carries one value of a subscription channel: `params = [channel_id, value]`.
pub const CHANNEL_VALUE: &str = "xrpc.ch.val";
/// Ends a subscription channel: `params = [channel_id]`.
pub const CHANNEL_CLOSE: &str = "xrpc.ch.close";

#[derive(Debug, Serialize)]
pub struct Request<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: &'a Value,
}

impl<'a> Request<'a> {
    pub fn new(id: u64, method: &'a str, params: &'a Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ErrorObject>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub method: String,
    pub params: Value,
}

impl Notification {
    /// Splits a channel notification into its channel id and payload.
    pub fn channel_value(&self) -> Option<(&Value, &Value)> {
        match (self.method.as_str(), self.params.as_array().map(Vec::as_slice)) {
            (CHANNEL_VALUE, Some([id, value])) => Some((id, value)),
            _ => None,
        }
    }

    pub fn closes_channel(&self, channel: &Value) -> bool {
        self.method == CHANNEL_CLOSE
            && self
                .params
                .as_array()
                .and_then(|params| params.first())
                .is_some_and(|id| id == channel)
    }
}

#[derive(Debug, PartialEq)]
pub enum Incoming {
    Response {
        id: u64,
        result: Result<Value, TransportError>,
    },
    Notification(Notification),
}

pub fn parse_frame(text: &str) -> Result<Incoming, TransportError> {
    let frame: RawFrame = serde_json::from_str(text)?;
    match (frame.method, frame.id) {
        (Some(method), _) => Ok(Incoming::Notification(Notification {
            method,
            params: frame.params.unwrap_or(Value::Null),
        })),
        (None, Some(id)) => {
            let id = id
                .as_u64()
                .ok_or_else(|| TransportError::Json(format!("unexpected response id {id}")))?;
            let result = match frame.error {
                Some(ErrorObject { code, message }) => Err(TransportError::Rpc { code, message }),
                None => Ok(frame.result.unwrap_or(Value::Null)),
            };
            Ok(Incoming::Response { id, result })
        }
        (None, None) => Err(TransportError::Json(format!(
            "frame is neither a response nor a notification: {text}"
        ))),
    }
}
