// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::{io::IsTerminal as _, path::Path};

use tracing_subscriber::{EnvFilter, Registry, prelude::*};

pub const LOG_FILE_NAME: &str = "forest-indexer.log";

type BoxedLayer = Box<dyn tracing_subscriber::layer::Layer<Registry> + Send + Sync>;

/// Console logging, plus an hourly rolling file in `log_dir` when set.
pub fn setup_logger(log_dir: Option<&Path>, json: bool) {
    let console: BoxedLayer = if json {
        Box::new(
            tracing_subscriber::fmt::Layer::new()
                .json()
                .with_filter(get_env_filter(default_env_filter())),
        )
    } else {
        Box::new(
            tracing_subscriber::fmt::Layer::new()
                .with_ansi(std::io::stdout().is_terminal())
                .with_filter(get_env_filter(default_env_filter())),
        )
    };
    let mut layers = vec![console];

    // file logger
    if let Some(log_dir) = log_dir {
        let file_appender = tracing_appender::rolling::hourly(log_dir, LOG_FILE_NAME);
        layers.push(Box::new(
            tracing_subscriber::fmt::Layer::new()
                .with_ansi(false)
                .with_writer(file_appender)
                .with_filter(get_env_filter(default_env_filter())),
        ));
    }

    tracing_subscriber::registry().with(layers).init();
}

// Log warnings to stderr
pub fn setup_minimal_logger() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::Layer::new()
                .with_ansi(std::io::stderr().is_terminal())
                .with_writer(std::io::stderr)
                .with_filter(get_env_filter(EnvFilter::new("warn"))),
        )
        .init();
}

/// Returns an [`EnvFilter`] according to the `RUST_LOG` environment variable,
/// or `def`.
///
/// [`tracing_subscriber::filter::Builder`] only allows a single default
/// directive, whereas we want to provide multiple.
fn get_env_filter(def: EnvFilter) -> EnvFilter {
    use std::env::{
        self,
        VarError::{NotPresent, NotUnicode},
    };
    match env::var(EnvFilter::DEFAULT_ENV) {
        Ok(s) => EnvFilter::new(s),
        Err(NotPresent) => def,
        Err(NotUnicode(_)) => EnvFilter::default(),
    }
}

fn default_env_filter() -> EnvFilter {
    let default_directives = [
        "info",
        "hyper_util=warn",
        "reqwest=warn",
        "rustls=warn",
        "sqlx=warn",
        "tungstenite=warn",
        "tokio_tungstenite=warn",
    ];
    EnvFilter::try_new(default_directives.join(",")).unwrap_or_else(|_| EnvFilter::new("info"))
}

#[test]
fn test_default_env_filter() {
    let filter = default_env_filter().to_string();
    assert!(filter.contains("sqlx=warn"), "{filter}");
}
