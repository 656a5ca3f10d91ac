// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use forest_indexer::{Config, cli_shared::config::REDACTED};
use predicates::prelude::*;

pub mod common;
use crate::common::{create_tmp_config, indexer};

#[test]
fn help_lists_the_subcommands() {
    indexer()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("watchdog"))
        .stdout(predicate::str::contains("--sub-head-updates"));
}

#[test]
fn config_dump_produces_valid_toml() {
    let cmd = indexer().arg("config").arg("dump").assert().success();

    let output = &cmd.get_output().stdout;
    let config = toml::from_str::<Config>(std::str::from_utf8(output).unwrap())
        .expect("Invalid configuration!");
    assert_eq!(config, Config::default());
}

#[test]
fn config_dump_reflects_file_and_environment() {
    let (config_file, _temp_dir) = create_tmp_config();
    let cmd = indexer()
        .env("FOREST_INDEXER_CONFIG_PATH", &config_file)
        .env("FOREST_INDEXER_API_TOKEN", "Azazello")
        .arg("config")
        .arg("dump")
        .assert()
        .success();

    let output = std::str::from_utf8(&cmd.get_output().stdout).unwrap();
    assert!(!output.contains("Azazello"));
    let config = toml::from_str::<Config>(output).unwrap();
    assert_eq!(config.transport.dial_attempts, 1);
    assert_eq!(config.sink.topic_prefix, "test_");
    assert_eq!(config.client.api_token.as_deref(), Some(REDACTED));
}

#[test]
fn missing_config_file_fails() {
    indexer()
        .arg("--config")
        .arg("/nonexistent/indexer.toml")
        .arg("config")
        .arg("dump")
        .assert()
        .failure();
}

#[test]
fn unreachable_node_exits_non_zero() {
    let (config_file, _temp_dir) = create_tmp_config();
    indexer()
        .arg("--config")
        .arg(&config_file)
        .arg("--sync")
        .arg("false")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to connect to the node"));
}
