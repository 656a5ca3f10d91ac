// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub mod config;
pub mod logger;

use std::path::{Path, PathBuf};

use anyhow::Context as _;

pub use config::Config;

use crate::utils::io::read_toml;

#[cfg(feature = "jemalloc")]
pub use tikv_jemallocator;

pub const CONFIG_PATH_ENV: &str = "FOREST_INDEXER_CONFIG_PATH";

/// Where the configuration file came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigPath {
    Cli(PathBuf),
    Env(PathBuf),
}

impl ConfigPath {
    pub fn to_path_buf(&self) -> &PathBuf {
        match self {
            ConfigPath::Cli(path) | ConfigPath::Env(path) => path,
        }
    }
}

pub fn find_config_path(cli_path: Option<&Path>) -> Option<ConfigPath> {
    if let Some(path) = cli_path {
        return Some(ConfigPath::Cli(path.to_path_buf()));
    }
    std::env::var_os(CONFIG_PATH_ENV)
        .filter(|path| !path.is_empty())
        .map(|path| ConfigPath::Env(path.into()))
}

/// Reads the configuration file if there is one, then applies the
/// environment overrides.
pub fn read_config(cli_path: Option<&Path>) -> anyhow::Result<(Option<ConfigPath>, Config)> {
    let path = find_config_path(cli_path);
    let mut config = match &path {
        Some(path) => {
            let path = path.to_path_buf();
            let toml = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            read_toml(&toml).with_context(|| format!("failed to parse {}", path.display()))?
        }
        None => Config::default(),
    };
    config.apply_env(|name| std::env::var(name).ok());
    Ok((path, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    #[serial_test::serial]
    fn read_config_default() {
        let (config_path, config) = read_config(None).unwrap();
        assert!(config_path.is_none());
        assert_eq!(config.sync, Config::default().sync);
    }

    #[test]
    #[serial_test::serial]
    fn read_config_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut expected = Config::default();
        expected.sync.workers = 3;
        expected.sink.topic_prefix = "mainnet_".into();
        std::fs::write(&path, toml::to_string(&expected).unwrap()).unwrap();

        let (config_path, config) = read_config(Some(path.as_path())).unwrap();
        assert_eq!(config_path, Some(ConfigPath::Cli(path)));
        assert_eq!(config.sync, expected.sync);
        assert_eq!(config.sink.topic_prefix, expected.sink.topic_prefix);
    }

    #[test]
    #[serial_test::serial]
    fn unreadable_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_config(Some(dir.path().join("missing.toml").as_path())).is_err());
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[sync\nworkers = ").unwrap();
        assert!(read_config(Some(path.as_path())).is_err());
    }
}
