// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::path::Path;

use anyhow::Context as _;
use async_trait::async_trait;
use sqlx::SqlitePool;

use super::{
    PersistedTipset, REVERTED_TOPICS, ReadBackStore, Sink, SinkRecord, Topic, persisted_tipset,
};
use crate::shim::ChainEpoch;
use crate::utils::sqlite;

const DDLS: [&str; 2] = [
    "CREATE TABLE IF NOT EXISTS records (
        topic TEXT NOT NULL,
        key TEXT NOT NULL,
        height INTEGER NOT NULL,
        payload TEXT NOT NULL,
        PRIMARY KEY (topic, key)
    )",
    "CREATE INDEX IF NOT EXISTS records_topic_height ON records (topic, height)",
];

/// A SQLite backed [`Sink`] and [`ReadBackStore`]. Records are upserted by
/// topic and key, topics are stored under an optional prefix.
pub struct SqliteStore {
    db: SqlitePool,
    topic_prefix: String,
}

impl SqliteStore {
    pub async fn open(path: &Path, topic_prefix: impl Into<String>) -> anyhow::Result<Self> {
        let db = sqlite::open_file(path)
            .await
            .with_context(|| format!("failed to open {}", path.display()))?;
        Self::new(db, topic_prefix).await
    }

    pub async fn open_memory(topic_prefix: impl Into<String>) -> anyhow::Result<Self> {
        Self::new(sqlite::open_memory().await?, topic_prefix).await
    }

    async fn new(db: SqlitePool, topic_prefix: impl Into<String>) -> anyhow::Result<Self> {
        sqlite::init_db(&db, "indexer", DDLS.map(sqlx::query), vec![]).await?;
        Ok(Self {
            db,
            topic_prefix: topic_prefix.into(),
        })
    }

    fn topic_name(&self, topic: Topic) -> String {
        format!("{}{topic}", self.topic_prefix)
    }

    async fn count_at(&self, topic: Topic, height: ChainEpoch) -> anyhow::Result<usize> {
        let count: i64 =
            sqlx::query_scalar("SELECT count(*) FROM records WHERE topic = ? AND height = ?")
                .bind(self.topic_name(topic))
                .bind(height)
                .fetch_one(&self.db)
                .await?;
        Ok(usize::try_from(count)?)
    }
}

#[async_trait]
impl Sink for SqliteStore {
    async fn push(&self, topic: Topic, records: Vec<SinkRecord>) -> anyhow::Result<()> {
        let mut tx = self.db.begin().await?;
        for record in records {
            if topic == Topic::TipsetsToRevert {
                for reverted in REVERTED_TOPICS {
                    sqlx::query("DELETE FROM records WHERE topic = ? AND height = ?")
                        .bind(self.topic_name(reverted))
                        .bind(record.height)
                        .execute(tx.as_mut())
                        .await?;
                }
            }
            sqlx::query(
                "INSERT INTO records (topic, key, height, payload) VALUES (?, ?, ?, ?)
                 ON CONFLICT (topic, key) DO UPDATE SET height = excluded.height, payload = excluded.payload",
            )
            .bind(self.topic_name(topic))
            .bind(record.key)
            .bind(record.height)
            .bind(record.payload.to_string())
            .execute(tx.as_mut())
            .await?;
        }
        tx.commit()
            .await
            .with_context(|| format!("failed to push to {topic}"))
    }
}

#[async_trait]
impl ReadBackStore for SqliteStore {
    async fn max_height(&self) -> anyhow::Result<Option<ChainEpoch>> {
        Ok(
            sqlx::query_scalar::<_, Option<i64>>("SELECT max(height) FROM records WHERE topic = ?")
                .bind(self.topic_name(Topic::Tipsets))
                .fetch_one(&self.db)
                .await?,
        )
    }

    async fn tipset_at(&self, height: ChainEpoch) -> anyhow::Result<Option<PersistedTipset>> {
        let payload: Option<String> =
            sqlx::query_scalar("SELECT payload FROM records WHERE topic = ? AND key = ?")
                .bind(self.topic_name(Topic::Tipsets))
                .bind(height.to_string())
                .fetch_optional(&self.db)
                .await?;
        payload
            .map(|payload| persisted_tipset(height, &serde_json::from_str(&payload)?))
            .transpose()
    }

    async fn block_count(&self, height: ChainEpoch) -> anyhow::Result<usize> {
        self.count_at(Topic::Blocks, height).await
    }

    async fn message_count(&self, height: ChainEpoch) -> anyhow::Result<usize> {
        self.count_at(Topic::Messages, height).await
    }
}
