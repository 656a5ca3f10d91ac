// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::{cmp::Ordering, path::Path, time::Instant};

use anyhow::Context as _;
use sqlx::{
    SqlitePool,
    query::Query,
    sqlite::{
        SqliteArguments, SqliteAutoVacuum, SqliteConnectOptions, SqliteJournalMode,
        SqliteSynchronous,
    },
};

pub type SqliteQuery<'q> = Query<'q, sqlx::Sqlite, SqliteArguments<'q>>;

/// Opens or creates a database file, creating missing parent directories.
pub async fn open_file(file: &Path) -> anyhow::Result<SqlitePool> {
    if let Some(dir) = file.parent()
        && !dir.as_os_str().is_empty()
        && !dir.is_dir()
    {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    let options = SqliteConnectOptions::new()
        .filename(file)
        .create_if_missing(true);
    Ok(open(options).await?)
}

/// A private in-memory database. A single connection, since every connection
/// to `:memory:` would see its own database.
pub async fn open_memory() -> sqlx::Result<SqlitePool> {
    sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(SqliteConnectOptions::new().in_memory(true))
        .await
}

pub async fn open(options: SqliteConnectOptions) -> sqlx::Result<SqlitePool> {
    let options = options
        .synchronous(SqliteSynchronous::Normal)
        .pragma("temp_store", "memory")
        .auto_vacuum(SqliteAutoVacuum::None)
        .journal_mode(SqliteJournalMode::Wal)
        .pragma("journal_size_limit", "0")
        .read_only(false);
    SqlitePool::connect_with(options).await
}

/// Creates the schema of a fresh database, or migrates an existing one.
///
/// The schema version is the number of `migrations` plus one. A database newer
/// than that is rejected.
pub async fn init_db<'q>(
    db: &SqlitePool,
    name: &str,
    ddls: impl IntoIterator<Item = SqliteQuery<'q>>,
    migrations: Vec<SqliteQuery<'q>>,
) -> anyhow::Result<()> {
    let schema_version = migrations.len() as i64 + 1;

    let fresh = sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name='_meta'")
        .fetch_optional(db)
        .await
        .with_context(|| format!("error looking for the {name} database _meta table"))?
        .is_none();
    if fresh {
        let mut tx = db.begin().await?;
        sqlx::query("CREATE TABLE IF NOT EXISTS _meta (version INTEGER NOT NULL UNIQUE)")
            .execute(tx.as_mut())
            .await?;
        sqlx::query("INSERT OR IGNORE INTO _meta (version) VALUES (?)")
            .bind(schema_version)
            .execute(tx.as_mut())
            .await?;
        for ddl in ddls {
            ddl.execute(tx.as_mut()).await?;
        }
        tx.commit().await?;
        return Ok(());
    }

    let found_version: i64 = sqlx::query_scalar::<_, Option<i64>>("SELECT max(version) FROM _meta")
        .fetch_one(db)
        .await?
        .with_context(|| format!("invalid {name} database version: no version found"))?;
    anyhow::ensure!(found_version > 0, "schema version should be 1 based");
    match found_version.cmp(&schema_version) {
        Ordering::Greater => anyhow::bail!(
            "invalid {name} database version: version {found_version} is newer than {schema_version}"
        ),
        Ordering::Equal => return Ok(()),
        Ordering::Less => {}
    }

    // the first migration takes version 1 to 2
    for (to_version, migration) in (2_i64..).zip(migrations).skip(found_version as usize - 1) {
        let start = Instant::now();
        let mut tx = db.begin().await?;
        migration.execute(tx.as_mut()).await?;
        sqlx::query("INSERT OR IGNORE INTO _meta (version) VALUES (?)")
            .bind(to_version)
            .execute(tx.as_mut())
            .await?;
        tx.commit().await?;
        tracing::info!(
            "migrated {name} database to version {to_version} in {}",
            humantime::format_duration(start.elapsed())
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_database_gets_the_schema() {
        let db = open_memory().await.unwrap();
        init_db(
            &db,
            "test",
            [sqlx::query("CREATE TABLE t (x INTEGER)")],
            vec![],
        )
        .await
        .unwrap();
        let version: i64 = sqlx::query_scalar("SELECT max(version) FROM _meta")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(version, 1);
        sqlx::query("INSERT INTO t (x) VALUES (1)")
            .execute(&db)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn existing_database_is_migrated() {
        let db = open_memory().await.unwrap();
        init_db(&db, "test", [sqlx::query("CREATE TABLE t (x INTEGER)")], vec![])
            .await
            .unwrap();
        init_db(
            &db,
            "test",
            [sqlx::query("CREATE TABLE t (x INTEGER)")],
            vec![sqlx::query("ALTER TABLE t ADD COLUMN y INTEGER")],
        )
        .await
        .unwrap();
        sqlx::query("INSERT INTO t (x, y) VALUES (1, 2)")
            .execute(&db)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn newer_database_is_rejected() {
        let db = open_memory().await.unwrap();
        init_db(
            &db,
            "test",
            [sqlx::query("CREATE TABLE t (x INTEGER)")],
            vec![sqlx::query("SELECT 1")],
        )
        .await
        .unwrap();
        assert!(init_db(&db, "test", Vec::<SqliteQuery>::new(), vec![]).await.is_err());
    }
}
