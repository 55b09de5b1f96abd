//! Key/value persistence for the session.
//!
//! The client only needs an opaque string-keyed store. Values are JSON and
//! may carry an expiry; an expired entry reads as absent and is removed on
//! that read.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

#[async_trait]
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Value>>;

    /// Store `value`; with `ttl`, the entry expires that long from now.
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> anyhow::Result<()>;

    async fn remove(&self, key: &str) -> anyhow::Result<()>;

    async fn clear(&self) -> anyhow::Result<()>;

    /// Keys of entries that have not expired.
    async fn keys(&self) -> anyhow::Result<Vec<String>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    value: Value,
    #[serde(default)]
    expire: Option<DateTime<Utc>>,
}

impl StoredEntry {
    fn new(value: Value, ttl: Option<Duration>) -> anyhow::Result<Self> {
        let expire = match ttl {
            Some(ttl) => {
                let ttl = chrono::Duration::from_std(ttl).context("ttl out of range")?;
                Some(Utc::now() + ttl)
            }
            None => None,
        };
        Ok(Self { value, expire })
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expire.is_some_and(|at| now > at)
    }
}

/// In-process store for tests and short-lived tools.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, StoredEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, StoredEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
        let mut entries = self.entries();
        let expired = match entries.get(key) {
            Some(entry) => entry.is_expired(Utc::now()),
            None => return Ok(None),
        };
        if expired {
            entries.remove(key);
            return Ok(None);
        }
        Ok(entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> anyhow::Result<()> {
        let entry = StoredEntry::new(value, ttl)?;
        self.entries().insert(key.to_string(), entry);
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.entries().remove(key);
        Ok(())
    }

    async fn clear(&self) -> anyhow::Result<()> {
        self.entries().clear();
        Ok(())
    }

    async fn keys(&self) -> anyhow::Result<Vec<String>> {
        let now = Utc::now();
        let mut keys: Vec<String> = self
            .entries()
            .iter()
            .filter(|(_, e)| !e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

/// SQLite-backed store.
///
/// Cheap to clone; the pool is opened lazily on first use.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    target: SqliteTarget,
    pool: Arc<tokio::sync::Mutex<Option<SqlitePool>>>,
}

#[derive(Debug, Clone)]
enum SqliteTarget {
    File(PathBuf),
    Memory,
}

impl SqliteStore {
    /// Store in the given database file (created if missing).
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self::with_target(SqliteTarget::File(path.as_ref().to_path_buf()))
    }

    /// Store in `{app_data_dir}/adminconsole/session.db`.
    pub fn open_default() -> anyhow::Result<Self> {
        Ok(Self::open(default_db_path()?))
    }

    /// Private in-memory database; contents vanish with the store.
    pub fn in_memory() -> Self {
        Self::with_target(SqliteTarget::Memory)
    }

    fn with_target(target: SqliteTarget) -> Self {
        Self {
            target,
            pool: Arc::new(tokio::sync::Mutex::new(None)),
        }
    }

    async fn get_pool(&self) -> anyhow::Result<SqlitePool> {
        let mut guard = self.pool.lock().await;
        if let Some(pool) = guard.as_ref() {
            return Ok(pool.clone());
        }

        let (options, max_connections) = match &self.target {
            SqliteTarget::File(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("failed to create session store directory at {:?}", parent)
                    })?;
                }
                (
                    SqliteConnectOptions::new().filename(path).create_if_missing(true),
                    4,
                )
            }
            // Every connection to `:memory:` is its own database, so pin the
            // pool to a single connection that never idles out.
            SqliteTarget::Memory => (
                SqliteConnectOptions::from_str("sqlite::memory:")
                    .context("invalid in-memory SQLite URL")?,
                1,
            ),
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open SQLite session store ({:?})", self.target))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key         TEXT PRIMARY KEY,
                value       TEXT NOT NULL,
                expire_at   TEXT NULL,
                updated_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("failed to create kv_store table")?;

        *guard = Some(pool.clone());
        Ok(pool)
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
        let pool = self.get_pool().await?;

        let row = sqlx::query(
            r#"
            SELECT value, expire_at
            FROM kv_store
            WHERE key = ?1
            "#,
        )
        .bind(key)
        .fetch_optional(&pool)
        .await
        .context("failed to fetch value from kv_store")?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let expire_at: Option<String> = row.try_get("expire_at")?;
        if let Some(raw) = expire_at {
            let at = DateTime::parse_from_rfc3339(&raw)
                .map(|dt| dt.with_timezone(&Utc))
                .context("invalid expire_at in kv_store")?;
            if Utc::now() > at {
                self.remove(key).await?;
                return Ok(None);
            }
        }

        let data: String = row.try_get("value")?;
        let value = serde_json::from_str(&data).context("invalid JSON value in kv_store")?;
        Ok(Some(value))
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> anyhow::Result<()> {
        let pool = self.get_pool().await?;
        let entry = StoredEntry::new(value, ttl)?;
        let payload =
            serde_json::to_string(&entry.value).context("failed to serialize value for kv_store")?;

        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, expire_at, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(key)
            DO UPDATE SET
                value = excluded.value,
                expire_at = excluded.expire_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(&payload)
        .bind(entry.expire.map(|at| at.to_rfc3339()))
        .bind(Utc::now().to_rfc3339())
        .execute(&pool)
        .await
        .context("failed to upsert value in kv_store")?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        let pool = self.get_pool().await?;
        sqlx::query("DELETE FROM kv_store WHERE key = ?1")
            .bind(key)
            .execute(&pool)
            .await
            .context("failed to delete value from kv_store")?;
        Ok(())
    }

    async fn clear(&self) -> anyhow::Result<()> {
        let pool = self.get_pool().await?;
        sqlx::query("DELETE FROM kv_store")
            .execute(&pool)
            .await
            .context("failed to clear kv_store")?;
        Ok(())
    }

    async fn keys(&self) -> anyhow::Result<Vec<String>> {
        let pool = self.get_pool().await?;
        let now = Utc::now();

        let rows = sqlx::query("SELECT key, expire_at FROM kv_store ORDER BY key ASC")
            .fetch_all(&pool)
            .await
            .context("failed to list kv_store keys")?;

        let mut keys = Vec::with_capacity(rows.len());
        for row in rows {
            let expire_at: Option<String> = row.try_get("expire_at")?;
            let expired = match expire_at {
                Some(raw) => DateTime::parse_from_rfc3339(&raw)
                    .map(|dt| now > dt.with_timezone(&Utc))
                    .context("invalid expire_at in kv_store")?,
                None => false,
            };
            if !expired {
                keys.push(row.try_get("key")?);
            }
        }
        Ok(keys)
    }
}

/// Resolve `{app_data_dir}/adminconsole/session.db`.
fn default_db_path() -> anyhow::Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .context("failed to resolve OS app data directory - tried data_dir() and home_dir()/.local/share")?;

    let mut path = base;
    path.push("adminconsole");
    path.push("session.db");
    Ok(path)
}
