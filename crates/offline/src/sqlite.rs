//! SQLite-backed durable queue store.
//!
//! This is the persistence that survives restarts: one `request_queue`
//! table with an autoincrement primary key, opened lazily on first use
//! and never explicitly closed. The schema is stamped with
//! `PRAGMA user_version` so later columns can migrate.
//!
//! Concurrent access from multiple processes (the multi-tab case) is
//! not specified and not supported; a single active client process is
//! assumed.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::store::{QueueStore, QueueStoreError};
use crate::types::{EntryId, OutboundRequest, QueueStats, QueuedRequest};

const SCHEMA_VERSION: i64 = 1;

/// SQLite-backed queue store.
///
/// Cheap to clone and safe to share across tasks. The pool is
/// initialized on first use.
#[derive(Debug, Clone)]
pub struct SqliteQueueStore {
    pool: Arc<tokio::sync::Mutex<Option<SqlitePool>>>,
    path: Option<PathBuf>,
}

impl SqliteQueueStore {
    /// Create a store backed by the default database location
    /// (`{data_dir}/comptoir/offline.db`), resolved lazily.
    pub fn new() -> Self {
        Self {
            pool: Arc::new(tokio::sync::Mutex::new(None)),
            path: None,
        }
    }

    /// Create a store backed by an explicit database file (tests,
    /// embedders with their own data directory).
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            pool: Arc::new(tokio::sync::Mutex::new(None)),
            path: Some(path.into()),
        }
    }

    /// Initialize the database connection (called lazily on first use).
    async fn ensure_initialized(&self) -> anyhow::Result<()> {
        let mut pool_guard = self.pool.lock().await;
        if pool_guard.is_some() {
            return Ok(());
        }

        let db_path = match &self.path {
            Some(path) => path.clone(),
            None => default_db_path()
                .context("failed to determine offline queue DB path")?,
        };

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create queue directory at {parent:?}"))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open offline queue at {db_path:?}"))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS request_queue (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                method      TEXT NOT NULL,
                url         TEXT NOT NULL,
                headers     TEXT NOT NULL,
                body        TEXT NULL,
                enqueued_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("failed to create request_queue table")?;

        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&pool)
            .await
            .context("failed to read queue schema version")?;
        if version == 0 {
            sqlx::query(&format!("PRAGMA user_version = {SCHEMA_VERSION}"))
                .execute(&pool)
                .await
                .context("failed to stamp queue schema version")?;
        }

        *pool_guard = Some(pool);
        Ok(())
    }

    /// Get the pool, initializing if necessary.
    async fn get_pool(&self) -> Result<SqlitePool, QueueStoreError> {
        self.ensure_initialized().await.map_err(storage_err)?;
        let pool_guard = self.pool.lock().await;
        pool_guard
            .as_ref()
            .cloned()
            .ok_or_else(|| QueueStoreError::Storage("queue pool not initialized".to_string()))
    }
}

impl Default for SqliteQueueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueStore for SqliteQueueStore {
    async fn enqueue(&self, request: OutboundRequest) -> Result<QueuedRequest, QueueStoreError> {
        let pool = self.get_pool().await?;

        let mut request = request;
        request.replay = false;

        let enqueued_at = Utc::now();
        let headers = serde_json::to_string(&request.headers)
            .map_err(|e| QueueStoreError::Storage(format!("failed to encode headers: {e}")))?;
        let body = request.body.as_ref().map(|b| b.to_string());

        let result = sqlx::query(
            r#"
            INSERT INTO request_queue (method, url, headers, body, enqueued_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&request.method)
        .bind(&request.url)
        .bind(&headers)
        .bind(&body)
        .bind(enqueued_at.to_rfc3339())
        .execute(&pool)
        .await
        .map_err(|e| QueueStoreError::Storage(format!("failed to insert queued request: {e}")))?;

        Ok(QueuedRequest {
            id: EntryId(result.last_insert_rowid()),
            request,
            enqueued_at,
        })
    }

    async fn list_in_order(&self) -> Result<Vec<QueuedRequest>, QueueStoreError> {
        let pool = self.get_pool().await?;

        let rows = sqlx::query(
            r#"
            SELECT id, method, url, headers, body, enqueued_at
            FROM request_queue
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&pool)
        .await
        .map_err(|e| QueueStoreError::Storage(format!("failed to list queued requests: {e}")))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(row_to_entry(row)?);
        }
        Ok(entries)
    }

    async fn remove(&self, id: EntryId) -> Result<(), QueueStoreError> {
        let pool = self.get_pool().await?;

        // Idempotent: deleting an absent id affects zero rows.
        sqlx::query("DELETE FROM request_queue WHERE id = ?1")
            .bind(id.0)
            .execute(&pool)
            .await
            .map_err(|e| QueueStoreError::Storage(format!("failed to remove entry {id}: {e}")))?;
        Ok(())
    }

    async fn count(&self) -> Result<usize, QueueStoreError> {
        let pool = self.get_pool().await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM request_queue")
            .fetch_one(&pool)
            .await
            .map_err(|e| QueueStoreError::Storage(format!("failed to count queue: {e}")))?;
        Ok(count as usize)
    }

    async fn stats(&self) -> Result<QueueStats, QueueStoreError> {
        let entries = self.list_in_order().await?;
        let mut stats = QueueStats {
            count: entries.len(),
            ..QueueStats::default()
        };
        for entry in &entries {
            let at = entry.enqueued_at;
            stats.oldest_timestamp = Some(match stats.oldest_timestamp {
                Some(oldest) if oldest <= at => oldest,
                _ => at,
            });
            stats.newest_timestamp = Some(match stats.newest_timestamp {
                Some(newest) if newest >= at => newest,
                _ => at,
            });
        }
        Ok(stats)
    }
}

fn storage_err(err: anyhow::Error) -> QueueStoreError {
    QueueStoreError::Storage(format!("{err:#}"))
}

/// Map a database row into a `QueuedRequest`.
fn row_to_entry(row: SqliteRow) -> Result<QueuedRequest, QueueStoreError> {
    let id: i64 = row
        .try_get("id")
        .map_err(|e| QueueStoreError::Storage(e.to_string()))?;

    let corrupt = |reason: String| QueueStoreError::Corrupt { id, reason };

    let method: String = row.try_get("method").map_err(|e| corrupt(e.to_string()))?;
    let url: String = row.try_get("url").map_err(|e| corrupt(e.to_string()))?;

    let headers_str: String = row.try_get("headers").map_err(|e| corrupt(e.to_string()))?;
    let headers: Vec<(String, String)> = serde_json::from_str(&headers_str)
        .map_err(|e| corrupt(format!("invalid headers JSON: {e}")))?;

    let body_str: Option<String> = row.try_get("body").map_err(|e| corrupt(e.to_string()))?;
    let body = match body_str {
        Some(s) => Some(
            serde_json::from_str(&s).map_err(|e| corrupt(format!("invalid body JSON: {e}")))?,
        ),
        None => None,
    };

    let enqueued_at_str: String = row
        .try_get("enqueued_at")
        .map_err(|e| corrupt(e.to_string()))?;
    let enqueued_at = DateTime::parse_from_rfc3339(&enqueued_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| corrupt(format!("invalid enqueued_at: {e}")))?;

    Ok(QueuedRequest {
        id: EntryId(id),
        request: OutboundRequest {
            method,
            url,
            headers,
            body,
            replay: false,
        },
        enqueued_at,
    })
}

/// Resolve the default database path:
/// `{app_data_dir}/comptoir/offline.db`.
fn default_db_path() -> anyhow::Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .context("failed to resolve OS app data directory")?;

    let mut dir = base;
    dir.push("comptoir");
    dir.push("offline.db");
    Ok(dir)
}
