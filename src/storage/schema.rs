use anyhow::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::DatabaseError;

// ============================================================================
// Database
// ============================================================================

#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open a database connection and run migrations
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InstanceLocked` if another instance of herald
    /// has the database locked (SQLITE_BUSY, SQLITE_LOCKED, SQLITE_CANTOPEN).
    /// Returns `DatabaseError::Other` for other database errors.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // busy_timeout=5000: SQLite waits up to 5 seconds for locks to release
        // before returning SQLITE_BUSY. Handles transient contention between
        // the poll cycle and CLI commands sharing the database.
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(DatabaseError::from_sqlx)?
            .pragma("busy_timeout", "5000");
        // SQLite is single-writer; 5 connections covers the fetch fan-out's
        // concurrent readers.
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        let db = Self { pool };
        db.migrate().await.map_err(|e| {
            // Migration errors could also be lock-related
            let error_string = e.to_string().to_lowercase();
            if error_string.contains("database is locked")
                || error_string.contains("database table is locked")
                || error_string.contains("sqlite_busy")
                || error_string.contains("sqlite_locked")
            {
                DatabaseError::InstanceLocked
            } else {
                DatabaseError::Migration(e.to_string())
            }
        })?;
        Ok(db)
    }

    /// Run database migrations atomically within a transaction.
    ///
    /// All schema changes are wrapped in a single transaction so a failure
    /// mid-migration (disk full, power loss) rolls back to the previous
    /// consistent state. All statements use `IF NOT EXISTS`, so re-running
    /// on an existing database is a no-op.
    async fn migrate(&self) -> Result<()> {
        // Enable foreign keys (must be outside transaction, per-connection setting)
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&self.pool)
            .await?;

        sqlx::query("PRAGMA busy_timeout = 5000")
            .execute(&self.pool)
            .await?;

        let mut tx = self.pool.begin().await?;

        // Sites: one row per known feed URL, shared by every channel
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sites (
                id INTEGER PRIMARY KEY,
                url TEXT UNIQUE NOT NULL,
                added_at INTEGER NOT NULL,
                last_fetched INTEGER,
                error TEXT
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Articles: append-only per site. UNIQUE(site_id, identity) is what
        // makes re-appending a re-fetched feed a no-op.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY,
                site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
                identity TEXT NOT NULL,
                title TEXT NOT NULL,
                url TEXT,
                published INTEGER NOT NULL,
                image_url TEXT,
                discovered_at INTEGER NOT NULL,
                UNIQUE(site_id, identity)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Subscriptions: which channels follow which sites
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subscriptions (
                channel_id TEXT NOT NULL,
                site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
                subscribed_at INTEGER NOT NULL,
                PRIMARY KEY (channel_id, site_id)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Deliveries: the per-channel processed set. A row means "this
        // channel has been notified about this identity" (or was seeded at
        // subscribe time so pre-existing articles never notify).
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS deliveries (
                channel_id TEXT NOT NULL,
                identity TEXT NOT NULL,
                delivered_at INTEGER NOT NULL,
                PRIMARY KEY (channel_id, identity)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Delta queries scan a site's articles in discovery order
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_articles_site_discovered ON articles(site_id, discovered_at)",
        )
        .execute(&mut *tx)
        .await?;

        // Delivery fan-out and GC both ask "who subscribes to this site"
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_subscriptions_site ON subscriptions(site_id)",
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }
}
