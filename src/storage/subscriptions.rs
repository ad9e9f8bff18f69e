use anyhow::Result;

use super::schema::Database;
use super::types::{Article, Site};

impl Database {
    // ========================================================================
    // Subscription Store
    // ========================================================================

    /// Subscribe a channel to a site, returning whether the subscription was
    /// newly created.
    ///
    /// Only on first creation is the channel's processed set seeded with
    /// `seed_identities` (the site's current articles), so subscribing never
    /// triggers a notification storm for the existing backlog. Re-subscribing
    /// is a no-op and leaves the processed set alone. One transaction: a
    /// reader never sees the subscription without its seed.
    pub async fn subscribe(
        &self,
        channel_id: &str,
        site_id: i64,
        seed_identities: &[String],
    ) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT OR IGNORE INTO subscriptions (channel_id, site_id, subscribed_at) VALUES (?, ?, ?)",
        )
        .bind(channel_id)
        .bind(site_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let created = result.rows_affected() > 0;

        if created {
            for identity in seed_identities {
                sqlx::query(
                    "INSERT OR IGNORE INTO deliveries (channel_id, identity, delivered_at) VALUES (?, ?, ?)",
                )
                .bind(channel_id)
                .bind(identity)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(created)
    }

    /// Remove a channel's subscription to a site, returning whether one
    /// existed. The processed set is deliberately left alone — orphaned
    /// entries are harmless and keep a later re-subscribe quiet.
    pub async fn unsubscribe(&self, channel_id: &str, site_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE channel_id = ? AND site_id = ?")
            .bind(channel_id)
            .bind(site_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Record that a channel has been notified about an identity. Idempotent.
    pub async fn mark_processed(&self, channel_id: &str, identity: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            "INSERT OR IGNORE INTO deliveries (channel_id, identity, delivered_at) VALUES (?, ?, ?)",
        )
        .bind(channel_id)
        .bind(identity)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Whether a channel has already been notified about an identity.
    pub async fn is_processed(&self, channel_id: &str, identity: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM deliveries WHERE channel_id = ? AND identity = ?",
        )
        .bind(channel_id)
        .bind(identity)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Sites a channel is subscribed to, in subscription order.
    pub async fn list_subscribed_sites(&self, channel_id: &str) -> Result<Vec<Site>> {
        let sites = sqlx::query_as::<_, Site>(
            r#"
            SELECT s.id, s.url, s.added_at, s.last_fetched, s.error
            FROM sites s
            JOIN subscriptions sub ON sub.site_id = s.id
            WHERE sub.channel_id = ?
            ORDER BY sub.subscribed_at, s.id
        "#,
        )
        .bind(channel_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sites)
    }

    /// Channels subscribed to a site (the delivery fan-out).
    pub async fn list_channels_subscribed_to(&self, site_id: i64) -> Result<Vec<String>> {
        let channels: Vec<String> = sqlx::query_scalar(
            "SELECT channel_id FROM subscriptions WHERE site_id = ? ORDER BY channel_id",
        )
        .bind(site_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(channels)
    }

    /// The delta for one (channel, site) pair: the site's articles the
    /// channel has not been notified about, oldest discovery first, so a
    /// backlog drains oldest-to-newest.
    pub async fn undelivered_articles(
        &self,
        channel_id: &str,
        site_id: i64,
    ) -> Result<Vec<Article>> {
        let articles = sqlx::query_as::<_, Article>(
            r#"
            SELECT a.id, a.site_id, a.identity, a.title, a.url, a.published,
                   a.image_url, a.discovered_at
            FROM articles a
            WHERE a.site_id = ?
              AND NOT EXISTS (
                  SELECT 1 FROM deliveries d
                  WHERE d.channel_id = ? AND d.identity = a.identity
              )
            ORDER BY a.discovered_at, a.id
        "#,
        )
        .bind(site_id)
        .bind(channel_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(articles)
    }
}
