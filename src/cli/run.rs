// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::{sync::Arc, time::Duration};

use anyhow::Context as _;
use tokio::signal::ctrl_c;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{Command, RunOpts};
use crate::chain_source::LotusChainSource;
use crate::cli_shared::Config;
use crate::sink::ReadBackStore as _;
use crate::sync::SyncEngine;
use crate::transport::{HttpClient, WsPool};
use crate::watchdog::Watchdog;

#[cfg(feature = "sqlite")]
type Store = crate::sink::SqliteStore;
#[cfg(not(feature = "sqlite"))]
type Store = crate::sink::MemoryStore;

/// Runs `cmd` until it finishes or the process is asked to stop. On a signal,
/// in-flight work is allowed to finish.
pub(super) async fn start_interruptable(
    run: RunOpts,
    cmd: Option<Command>,
    config: Config,
) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let work = start(run, cmd, config, cancel.clone());
    tokio::pin!(work);
    tokio::select! {
        ret = &mut work => return ret,
        signal = shutdown_signal() => signal?,
    }
    cancel.cancel();
    work.await
}

async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            ret = ctrl_c() => {
                ret?;
                info!("Keyboard interrupt.");
            }
            _ = terminate.recv() => info!("Received SIGTERM."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c().await?;
        info!("Keyboard interrupt.");
    }
    Ok(())
}

async fn start(
    run: RunOpts,
    cmd: Option<Command>,
    config: Config,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let source = connect(&config).await?;
    let store = open_store(&config).await?;
    let persisted_max = store
        .max_height()
        .await
        .context("failed to read the persisted max height")?;
    info!(?persisted_max, "store opened");
    let engine = Arc::new(SyncEngine::new(
        source,
        store.clone(),
        config.sync_config(),
    ));

    match cmd {
        Some(Command::Watchdog {
            once,
            interval,
            check_from,
        }) => {
            let mut watchdog_config = config.watchdog_config();
            watchdog_config.run_once |= once;
            if let Some(interval) = interval {
                watchdog_config.interval = Duration::from_secs(interval);
            }
            if let Some(check_from) = check_from {
                watchdog_config.check_from = check_from;
            }
            let report = Watchdog::new(engine, store, watchdog_config)
                .run(&cancel)
                .await?;
            info!(
                checked = report.checked,
                repaired = report.repaired.len(),
                failed = report.failed.len(),
                "watchdog stopped"
            );
            Ok(())
        }
        Some(Command::Config(_)) => Ok(()),
        None => {
            engine
                .run(run.start_options(), persisted_max, cancel)
                .await
        }
    }
}

async fn connect(config: &Config) -> anyhow::Result<Arc<LotusChainSource>> {
    let endpoint = config.endpoint()?;
    let transport = config.transport_config();
    info!("connecting to {}", endpoint.ws_url);
    let http = HttpClient::new(endpoint.clone(), transport.http_timeout)?;
    let pool = WsPool::connect(endpoint, transport)
        .await
        .context("failed to connect to the node")?;
    let source = LotusChainSource::new(pool).with_http(http);

    match source.network_name().await {
        Ok(network) => info!(%network, "connected"),
        Err(e) => warn!("failed to get the network name: {e}"),
    }
    match source.network_version().await {
        Ok(version) => info!(version, "network version"),
        Err(e) => warn!("failed to get the network version: {e}"),
    }
    match source.net_peers().await {
        Ok(peers) => info!(peers = peers.len(), "node peers"),
        Err(e) => warn!("failed to get the node's peers: {e}"),
    }
    match source.load_actor_codes().await {
        Ok(codes) => info!(codes, "loaded actor code CIDs"),
        Err(e) => warn!("failed to load actor code CIDs, using the builtin ones: {e}"),
    }
    Ok(Arc::new(source))
}

#[cfg(feature = "sqlite")]
async fn open_store(config: &Config) -> anyhow::Result<Arc<Store>> {
    let path = &config.sink.database_path;
    info!("opening {}", path.display());
    Ok(Arc::new(
        Store::open(path, config.sink.topic_prefix.clone()).await?,
    ))
}

#[cfg(not(feature = "sqlite"))]
async fn open_store(_config: &Config) -> anyhow::Result<Arc<Store>> {
    warn!("built without sqlite, records are kept in memory only");
    Ok(Arc::new(Store::new()))
}
