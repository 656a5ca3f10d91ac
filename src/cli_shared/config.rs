// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::{path::PathBuf, time::Duration};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use url::Url;

use crate::shim::ChainEpoch;
use crate::sync::SyncConfig;
use crate::transport::{Endpoint, TransportConfig};
use crate::watchdog::WatchdogConfig;

pub const API_URL_ENV: &str = "FOREST_INDEXER_API_URL";
pub const API_WS_URL_ENV: &str = "FOREST_INDEXER_API_WS_URL";
pub const API_TOKEN_ENV: &str = "FOREST_INDEXER_API_TOKEN";
pub const DATABASE_PATH_ENV: &str = "FOREST_INDEXER_DATABASE_PATH";
pub const TOPIC_PREFIX_ENV: &str = "FOREST_INDEXER_TOPIC_PREFIX";

/// Printed in place of secrets.
pub const REDACTED: &str = "********";

/// How to reach the node.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, SmartDefault)]
#[serde(default)]
pub struct Client {
    #[default("http://127.0.0.1:1234/rpc/v1".into())]
    pub api_url: String,
    #[default("ws://127.0.0.1:1234/rpc/v1".into())]
    pub api_ws_url: String,
    /// Sent as a bearer token when set.
    pub api_token: Option<String>,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, SmartDefault)]
#[serde(default)]
pub struct TransportSection {
    #[default(60)]
    pub call_timeout_secs: u64,
    #[default(5)]
    pub max_retries: usize,
    #[default(10)]
    pub dial_attempts: usize,
    #[default(16)]
    pub pool_size: usize,
    #[default(5000)]
    pub subscription_buffer: usize,
    #[default(60)]
    pub http_timeout_secs: u64,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, SmartDefault)]
#[serde(default)]
pub struct SyncSection {
    #[default(8)]
    pub workers: usize,
    #[default(10)]
    pub actor_workers: usize,
    pub collect_miner_sectors: bool,
    #[default(5)]
    pub poll_interval_secs: u64,
    #[default(5000)]
    pub head_updates_buffer: usize,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, SmartDefault)]
#[serde(default)]
pub struct SinkSection {
    #[default(PathBuf::from("forest-indexer.db"))]
    pub database_path: PathBuf,
    /// Prepended to every topic name.
    pub topic_prefix: String,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, SmartDefault)]
#[serde(default)]
pub struct WatchdogSection {
    pub check_from: ChainEpoch,
    #[default(60)]
    pub interval_secs: u64,
    pub run_once: bool,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Default, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub client: Client,
    pub transport: TransportSection,
    pub sync: SyncSection,
    pub sink: SinkSection,
    pub watchdog: WatchdogSection,
}

impl Config {
    /// Overrides fields from the `FOREST_INDEXER_*` variables `lookup` knows.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(API_URL_ENV) {
            self.client.api_url = url;
        }
        if let Some(url) = lookup(API_WS_URL_ENV) {
            self.client.api_ws_url = url;
        }
        if let Some(token) = lookup(API_TOKEN_ENV) {
            self.client.api_token = Some(token).filter(|token| !token.is_empty());
        }
        if let Some(path) = lookup(DATABASE_PATH_ENV) {
            self.sink.database_path = path.into();
        }
        if let Some(prefix) = lookup(TOPIC_PREFIX_ENV) {
            self.sink.topic_prefix = prefix;
        }
    }

    /// A copy safe to print, with the API token masked.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if let Some(token) = &mut config.client.api_token {
            *token = REDACTED.into();
        }
        config
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.client.api_url.is_empty(), "client.api_url is empty");
        anyhow::ensure!(
            !self.client.api_ws_url.is_empty(),
            "client.api_ws_url is empty"
        );
        anyhow::ensure!(self.sync.workers > 0, "sync.workers must be positive");
        anyhow::ensure!(
            self.sync.actor_workers > 0,
            "sync.actor_workers must be positive"
        );
        self.endpoint()?;
        Ok(())
    }

    pub fn endpoint(&self) -> anyhow::Result<Endpoint> {
        Ok(Endpoint {
            ws_url: Url::parse(&self.client.api_ws_url)
                .with_context(|| format!("invalid api_ws_url {}", self.client.api_ws_url))?,
            http_url: Url::parse(&self.client.api_url)
                .with_context(|| format!("invalid api_url {}", self.client.api_url))?,
            token: self.client.api_token.clone(),
        })
    }

    pub fn transport_config(&self) -> TransportConfig {
        let transport = &self.transport;
        TransportConfig {
            call_timeout: Duration::from_secs(transport.call_timeout_secs),
            max_retries: transport.max_retries,
            dial_attempts: transport.dial_attempts,
            pool_size: transport.pool_size,
            subscription_buffer: transport.subscription_buffer,
            http_timeout: Duration::from_secs(transport.http_timeout_secs),
            ..Default::default()
        }
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            workers: self.sync.workers,
            actor_workers: self.sync.actor_workers,
            collect_miner_sectors: self.sync.collect_miner_sectors,
            poll_interval: Duration::from_secs(self.sync.poll_interval_secs),
            head_updates_buffer: self.sync.head_updates_buffer,
        }
    }

    pub fn watchdog_config(&self) -> WatchdogConfig {
        WatchdogConfig {
            check_from: self.watchdog.check_from,
            interval: Duration::from_secs(self.watchdog.interval_secs),
            run_once: self.watchdog.run_once,
        }
    }
}
