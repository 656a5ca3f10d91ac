// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod run;

use std::{ffi::OsString, path::PathBuf, time::Duration};

use anyhow::Context as _;
use clap::{ArgAction, Args, Parser, Subcommand};
use tokio::runtime::Builder as RuntimeBuilder;
use tracing::info;

use crate::cli_shared::{logger, read_config};
use crate::shim::ChainEpoch;
use crate::sync::{StartHeight, StartOptions};

/// CLI structure generated when interacting with the indexer binary
#[derive(Parser, Debug)]
#[command(name = env!("CARGO_PKG_NAME"), author = env!("CARGO_PKG_AUTHORS"), version = env!("CARGO_PKG_VERSION"), about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Cli {
    #[command(flatten)]
    pub opts: CliOpts,
    #[command(flatten)]
    pub run: RunOpts,
    #[command(subcommand)]
    pub cmd: Option<Command>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CliOpts {
    /// A TOML file containing relevant configurations
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Directory of the hourly rolling log files
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,
    /// Log to the console as JSON
    #[arg(long, global = true)]
    pub log_json: bool,
}

/// Options of the streamer, used when no subcommand is given.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct RunOpts {
    /// Backfill up to the chain head on start
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub sync: bool,
    /// Backfill from genesis, ignoring what is persisted
    #[arg(long)]
    pub sync_force: bool,
    /// Poll the chain head and backfill up to it
    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    pub follow_chain_sync: bool,
    /// Follow head changes over a subscription
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub sub_head_updates: bool,
    /// Height to backfill from, negative to start from the persisted maximum
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub sync_from: ChainEpoch,
    /// How far below the persisted maximum to start, when `--sync-from` is negative
    #[arg(long, default_value_t = 100)]
    pub sync_from_db_offset: ChainEpoch,
}

impl RunOpts {
    pub fn start_options(&self) -> StartOptions {
        StartOptions {
            sync_on_start: self.sync,
            force_full_resync: self.sync_force,
            live_follow: self.sub_head_updates,
            poll_follow: self.follow_chain_sync,
            start_height: if self.sync_from >= 0 {
                StartHeight::Explicit(self.sync_from)
            } else {
                StartHeight::FromPersisted {
                    offset: self.sync_from_db_offset,
                }
            },
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Re-collect persisted heights that disagree with the node
    Watchdog {
        /// Check once and exit
        #[arg(long)]
        once: bool,
        /// Seconds between checks, overrides `watchdog.interval_secs`
        #[arg(long)]
        interval: Option<u64>,
        /// First height to check, overrides `watchdog.check_from`
        #[arg(long)]
        check_from: Option<ChainEpoch>,
    },
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Dump,
}

pub fn main<ArgT>(args: impl IntoIterator<Item = ArgT>) -> anyhow::Result<()>
where
    ArgT: Into<OsString> + Clone,
{
    // Capture Cli inputs
    let Cli { opts, run, cmd } = Cli::parse_from(args);

    let (path, config) = read_config(opts.config.as_deref()).context("Error parsing config")?;
    if let Some(Command::Config(ConfigCommand::Dump)) = cmd {
        print!("{}", toml::to_string_pretty(&config.redacted())?);
        return Ok(());
    }

    logger::setup_logger(opts.log_dir.as_deref(), opts.log_json);
    match &path {
        Some(path) => info!("Config loaded: {}", path.to_path_buf().display()),
        None => info!("Using the default config"),
    }
    config.validate().context("Invalid config")?;

    let rt = RuntimeBuilder::new_multi_thread().enable_all().build()?;
    let ret = rt.block_on(run::start_interruptable(run, cmd, config));
    info!("Shutting down tokio...");
    rt.shutdown_timeout(Duration::from_secs_f32(0.5));
    ret
}
