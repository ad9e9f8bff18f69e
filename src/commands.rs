//! The add/remove/list operations behind the CLI.
//!
//! Each operation returns the user-visible reply text; errors a user can
//! act on ([`CommandError::UnknownSite`]) are distinct from internal ones.

use std::time::Duration;
use thiserror::Error;

use crate::feed::fetch_articles;
use crate::storage::Database;

#[derive(Debug, Error)]
pub enum CommandError {
    /// The channel has no subscription for this URL (or the URL was never
    /// added at all). A user-facing "not found", not a crash.
    #[error("This channel is not subscribed to {0}")]
    UnknownSite(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Subscribe a channel to a feed URL.
///
/// Fetches the feed once so the site's current articles are known, then
/// subscribes with the processed set seeded from them — the existing
/// backlog is never announced, only articles discovered later. A failed
/// first fetch still creates the subscription (with an empty seed for a
/// brand-new site) and is reported in the reply; the next poll cycle
/// retries the fetch.
pub async fn add_feed(
    db: &Database,
    client: &reqwest::Client,
    fetch_timeout: Duration,
    channel_id: &str,
    url: &str,
) -> Result<String, CommandError> {
    let site_id = db.ensure_site(url).await?;

    let fetch_error = match fetch_articles(client, url, fetch_timeout).await {
        Ok(parsed) => {
            db.append_new_articles(site_id, &parsed).await?;
            db.record_fetch_outcome(site_id, None).await?;
            None
        }
        Err(e) => {
            tracing::warn!(site = %url, error = %e, "Initial fetch failed during add");
            db.record_fetch_outcome(site_id, Some(&e.to_string())).await?;
            Some(e.to_string())
        }
    };

    let seed = db.article_identities(site_id).await?;
    let created = db.subscribe(channel_id, site_id, &seed).await?;

    if !created {
        return Ok(format!("Already subscribed to {} in this channel.", url));
    }

    tracing::info!(channel = %channel_id, site = %url, seeded = seed.len(), "Subscribed channel to site");

    match fetch_error {
        None => Ok(format!(
            "Added {} to this channel's feeds ({} existing articles skipped).",
            url,
            seed.len()
        )),
        Some(err) => Ok(format!(
            "Added {} to this channel's feeds, but the first fetch failed: {}",
            url, err
        )),
    }
}

/// Unsubscribe a channel from a feed URL.
///
/// The site itself stays in the registry until the garbage collector finds
/// it has no subscribers left — another channel may still follow it.
pub async fn remove_feed(
    db: &Database,
    channel_id: &str,
    url: &str,
) -> Result<String, CommandError> {
    let site = db
        .site_by_url(url)
        .await?
        .ok_or_else(|| CommandError::UnknownSite(url.to_string()))?;

    if !db.unsubscribe(channel_id, site.id).await? {
        return Err(CommandError::UnknownSite(url.to_string()));
    }

    tracing::info!(channel = %channel_id, site = %url, "Unsubscribed channel from site");
    Ok(format!("Removed {} from this channel's feeds.", url))
}

/// Render the channel's subscribed feed URLs.
pub async fn list_feeds(db: &Database, channel_id: &str) -> Result<String, CommandError> {
    let sites = db.list_subscribed_sites(channel_id).await?;

    if sites.is_empty() {
        return Ok("No feeds subscribed in this channel.".to_string());
    }

    let mut reply = String::from("Feeds for this channel:\n");
    for site in &sites {
        reply.push_str(&format!("* {}\n", site.url));
    }
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_remove_never_added_url_is_unknown_site() {
        let db = test_db().await;

        let err = remove_feed(&db, "chan-1", "https://example.com/feed.xml")
            .await
            .unwrap_err();
        match err {
            CommandError::UnknownSite(url) => assert_eq!(url, "https://example.com/feed.xml"),
            e => panic!("Expected UnknownSite, got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_remove_when_other_channel_subscribed_is_unknown_site() {
        let db = test_db().await;

        let site_id = db.ensure_site("https://example.com/feed.xml").await.unwrap();
        db.subscribe("chan-1", site_id, &[]).await.unwrap();

        // chan-2 never subscribed; the site exists but not for this channel
        let err = remove_feed(&db, "chan-2", "https://example.com/feed.xml")
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::UnknownSite(_)));
    }

    #[tokio::test]
    async fn test_list_empty_channel() {
        let db = test_db().await;

        let reply = list_feeds(&db, "chan-1").await.unwrap();
        assert_eq!(reply, "No feeds subscribed in this channel.");
    }

    #[tokio::test]
    async fn test_list_renders_subscribed_urls() {
        let db = test_db().await;

        let a = db.ensure_site("https://a.example/feed.xml").await.unwrap();
        let b = db.ensure_site("https://b.example/feed.xml").await.unwrap();
        db.subscribe("chan-1", a, &[]).await.unwrap();
        db.subscribe("chan-1", b, &[]).await.unwrap();

        let reply = list_feeds(&db, "chan-1").await.unwrap();
        assert!(reply.contains("* https://a.example/feed.xml"));
        assert!(reply.contains("* https://b.example/feed.xml"));
    }
}
