use anyhow::Result;
use chrono::Utc;
use feed_rs::parser;

use crate::feed::identity::identify;
use crate::storage::ParsedArticle;

/// Parse a feed document into normalized articles, in feed order.
///
/// Entries missing both published and updated timestamps get the current
/// wall clock, so every stored article has a usable timestamp.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<ParsedArticle>> {
    let feed = parser::parse(bytes)?;
    let now = Utc::now().timestamp();

    let articles: Vec<ParsedArticle> = feed
        .entries
        .into_iter()
        .map(|entry| {
            let url = entry.links.first().map(|l| l.href.clone());
            let published = entry
                .published
                .or(entry.updated)
                .map(|dt| dt.timestamp())
                .unwrap_or(now);
            let title = entry
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "Untitled".to_string());
            let image_url = entry
                .media
                .iter()
                .flat_map(|m| m.thumbnails.iter())
                .next()
                .map(|t| t.image.uri.clone());

            let guid = if entry.id.is_empty() {
                None
            } else {
                Some(entry.id.as_str())
            };
            let identity = identify(guid, url.as_deref());

            ParsedArticle {
                identity,
                title,
                url,
                published,
                image_url,
            }
        })
        .collect();

    Ok(articles)
}
