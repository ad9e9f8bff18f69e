use anyhow::Result;

use super::schema::Database;
use super::types::{Article, ParsedArticle, Site};

impl Database {
    // ========================================================================
    // Site Registry
    // ========================================================================

    /// Get or create the site for a feed URL, returning its id.
    ///
    /// Idempotent: a second call with the same URL returns the existing id
    /// untouched (`ON CONFLICT DO NOTHING` + lookup, one transaction).
    pub async fn ensure_site(&self, url: &str) -> Result<i64> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO sites (url, added_at) VALUES (?, ?) ON CONFLICT(url) DO NOTHING")
            .bind(url)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        let id: i64 = sqlx::query_scalar("SELECT id FROM sites WHERE url = ?")
            .bind(url)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(id)
    }

    /// Look up a site by its feed URL.
    pub async fn site_by_url(&self, url: &str) -> Result<Option<Site>> {
        let site = sqlx::query_as::<_, Site>(
            "SELECT id, url, added_at, last_fetched, error FROM sites WHERE url = ?",
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(site)
    }

    /// All known sites, oldest first.
    pub async fn list_sites(&self) -> Result<Vec<Site>> {
        let sites = sqlx::query_as::<_, Site>(
            "SELECT id, url, added_at, last_fetched, error FROM sites ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(sites)
    }

    /// Every article identity currently known for a site.
    ///
    /// Used to seed a channel's processed set at subscribe time so
    /// pre-existing articles are never announced retroactively.
    pub async fn article_identities(&self, site_id: i64) -> Result<Vec<String>> {
        let identities: Vec<String> =
            sqlx::query_scalar("SELECT identity FROM articles WHERE site_id = ?")
                .bind(site_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(identities)
    }

    /// Append the articles not already present in the site, returning exactly
    /// the subset that was inserted, in input order.
    ///
    /// `INSERT OR IGNORE` under `UNIQUE(site_id, identity)` makes this
    /// at-most-once effective per (site, identity): re-appending the same
    /// fetched list is a no-op. Runs in one transaction so concurrent readers
    /// never observe a partially-appended batch.
    pub async fn append_new_articles(
        &self,
        site_id: i64,
        articles: &[ParsedArticle],
    ) -> Result<Vec<Article>> {
        if articles.is_empty() {
            return Ok(Vec::new());
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;
        let mut appended = Vec::new();

        for article in articles {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO articles
                    (site_id, identity, title, url, published, image_url, discovered_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            )
            .bind(site_id)
            .bind(&article.identity)
            .bind(&article.title)
            .bind(&article.url)
            .bind(article.published)
            .bind(&article.image_url)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() > 0 {
                appended.push(Article {
                    id: result.last_insert_rowid(),
                    site_id,
                    identity: article.identity.clone(),
                    title: article.title.clone(),
                    url: article.url.clone(),
                    published: article.published,
                    image_url: article.image_url.clone(),
                    discovered_at: now,
                });
            }
        }

        tx.commit().await?;
        Ok(appended)
    }

    /// Record the outcome of a fetch on the site row: bumps `last_fetched`,
    /// sets the error message on failure or clears it on success.
    pub async fn record_fetch_outcome(&self, site_id: i64, error: Option<&str>) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query("UPDATE sites SET last_fetched = ?, error = ? WHERE id = ?")
            .bind(now)
            .bind(error)
            .bind(site_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ========================================================================
    // Garbage Collection
    // ========================================================================

    /// Purge every site no subscription references, returning the purged URLs.
    ///
    /// Computing the used set and deleting the rest happen in one transaction,
    /// so a concurrent `subscribe` (itself one transaction) either lands
    /// before the sweep and keeps its site, or after it and re-creates the
    /// site fresh — never a half-purged site.
    ///
    /// Processed-set rows are pruned only for identities that no longer exist
    /// in any surviving site: an identity shared with a live site must stay
    /// delivered, or the article would be announced a second time.
    pub async fn purge_unreferenced_sites(&self) -> Result<Vec<String>> {
        let mut tx = self.pool.begin().await?;

        // Prune deliveries before the cascade removes the article rows that
        // tell us which identities belonged to the doomed sites.
        sqlx::query(
            r#"
            DELETE FROM deliveries WHERE identity IN (
                SELECT identity FROM articles
                WHERE site_id NOT IN (SELECT site_id FROM subscriptions)
            ) AND identity NOT IN (
                SELECT identity FROM articles
                WHERE site_id IN (SELECT site_id FROM subscriptions)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        let purged: Vec<String> = sqlx::query_scalar(
            "DELETE FROM sites WHERE id NOT IN (SELECT site_id FROM subscriptions) RETURNING url",
        )
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(purged)
    }
}
