//! PostgreSQL implementation of the listcast list store.
//!
//! This crate provides a PostgreSQL implementation of the `ListStore`
//! trait from listcast.
//!
//! # Features
//!
//! - One row per channel, list kept as `JSONB` in the same array shape any
//!   key-value backend would hold
//! - Upsert saves (last writer wins, per-channel writers serialize above this)
//! - Legacy rows (missing or gapped positions, missing ids, non-boolean
//!   `checked`) are repaired on load
//! - Maintenance helpers: `ensure_schema`, `stats`
//!
//! # Database Schema
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS lists (
//!     channel TEXT PRIMARY KEY,
//!     items JSONB NOT NULL DEFAULT '[]'::jsonb,
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use listcast_store_postgres::PgListStore;
//! use sqlx::PgPool;
//!
//! let pool = PgPool::connect("postgres://localhost/mydb").await?;
//! let store = PgListStore::new(pool);
//! store.ensure_schema().await?;
//!
//! // Use with the channel writers
//! let writers = ChannelWriters::new(Arc::new(store), broadcaster, WriterConfig::default());
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use listcast_core::{List, ListStore};
use sqlx::{PgPool, Row};
use tracing::debug;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS lists (
    channel TEXT PRIMARY KEY,
    items JSONB NOT NULL DEFAULT '[]'::jsonb,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

/// PostgreSQL list store implementation.
#[derive(Clone)]
pub struct PgListStore {
    pool: PgPool,
}

impl PgListStore {
    /// Create a new PostgreSQL list store.
    ///
    /// # Arguments
    ///
    /// * `pool` - PostgreSQL connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` and make sure the table exists.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("connecting to postgres")?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the `lists` table if it is missing.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .context("creating lists table")?;
        Ok(())
    }
}

#[async_trait]
impl ListStore for PgListStore {
    /// Load a channel's list. No row means an empty list.
    async fn load(&self, channel: &str) -> Result<List> {
        let row = sqlx::query("SELECT items FROM lists WHERE channel = $1")
            .bind(channel)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("loading channel `{channel}`"))?;

        let Some(row) = row else {
            return Ok(List::new());
        };
        let items: serde_json::Value = row.get("items");
        serde_json::from_value(items).with_context(|| format!("decoding channel `{channel}`"))
    }

    /// Replace a channel's list.
    async fn save(&self, channel: &str, list: &List) -> Result<()> {
        let items = serde_json::to_value(list).context("encoding list")?;

        sqlx::query(
            r#"
            INSERT INTO lists (channel, items, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (channel) DO UPDATE
            SET items = EXCLUDED.items,
                updated_at = NOW()
            "#,
        )
        .bind(channel)
        .bind(items)
        .execute(&self.pool)
        .await
        .with_context(|| format!("saving channel `{channel}`"))?;

        debug!(channel, items = list.len(), "list row upserted");
        Ok(())
    }
}

/// Utility functions for list maintenance.
impl PgListStore {
    /// Get statistics about stored lists.
    pub async fn stats(&self) -> Result<StoreStats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM lists) as channels,
                COUNT(item.value) as items,
                COUNT(item.value) FILTER (
                    WHERE COALESCE(item.value->'checked', 'false')
                        NOT IN ('false'::jsonb, 'null'::jsonb, '0'::jsonb, '""'::jsonb)
                ) as checked,
                (SELECT MAX(updated_at) FROM lists) as last_write
            FROM lists
            LEFT JOIN LATERAL jsonb_array_elements(lists.items) AS item ON TRUE
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(StoreStats {
            channels: row.get("channels"),
            items: row.get("items"),
            checked: row.get("checked"),
            last_write: row.get("last_write"),
        })
    }
}

/// Stored list statistics.
#[derive(Debug, Clone, Copy)]
pub struct StoreStats {
    pub channels: i64,
    pub items: i64,
    pub checked: i64,
    pub last_write: Option<DateTime<Utc>>,
}
