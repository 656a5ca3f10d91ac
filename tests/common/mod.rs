// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::path::PathBuf;

use assert_cmd::{Command, cargo::cargo_bin_cmd};
use tempfile::TempDir;

pub fn indexer() -> Command {
    let mut cmd = cargo_bin_cmd!("forest-indexer");
    cmd.env_remove("FOREST_INDEXER_CONFIG_PATH")
        .env_remove("FOREST_INDEXER_API_URL")
        .env_remove("FOREST_INDEXER_API_WS_URL")
        .env_remove("FOREST_INDEXER_API_TOKEN");
    cmd
}

/// A config pointing at a node that is not there, with a database in a
/// temporary directory.
pub fn create_tmp_config() -> (PathBuf, TempDir) {
    let temp_dir = tempfile::tempdir().expect("couldn't create temp dir");

    let config = format!(
        r#"
[client]
api_url = "http://127.0.0.1:1/rpc/v1"
api_ws_url = "ws://127.0.0.1:1/rpc/v1"

[transport]
dial_attempts = 1
call_timeout_secs = 2

[sink]
database_path = "{}"
topic_prefix = "test_"
"#,
        temp_dir.path().join("indexer.db").display()
    );

    let config_file = temp_dir.path().join("config.toml");
    std::fs::write(&config_file, config).expect("couldn't write config");

    (config_file, temp_dir)
}
