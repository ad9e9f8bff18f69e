//! Message dispatch to the chat API.
//!
//! One announcement per (channel, article). The caller marks an article
//! processed only after [`Notifier::send_to_channel`] returns `Ok`, so a
//! failed or interrupted dispatch is retried on the next cycle rather than
//! silently lost.

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::storage::Article;

/// Errors from a single dispatch attempt. No retry here — the article stays
/// pending and the next poll cycle is the retry.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Chat API returned a non-2xx status
    #[error("Chat API error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the timeout
    #[error("Request timed out")]
    Timeout,
}

/// Posts messages to channels through a Discord-style bot API.
///
/// `api_base` is configurable so tests can point the notifier at a mock
/// server; production uses the real API endpoint.
#[derive(Clone)]
pub struct Notifier {
    client: reqwest::Client,
    api_base: String,
    token: SecretString,
    timeout: Duration,
}

impl Notifier {
    pub const DEFAULT_API_BASE: &'static str = "https://discord.com/api/v10";

    pub fn new(client: reqwest::Client, api_base: String, token: SecretString) -> Self {
        Self {
            client,
            api_base,
            token,
            timeout: Duration::from_secs(10),
        }
    }

    /// Send one message to one channel.
    pub async fn send_to_channel(
        &self,
        channel_id: &str,
        text: &str,
    ) -> Result<(), DispatchError> {
        let url = format!(
            "{}/channels/{}/messages",
            self.api_base.trim_end_matches('/'),
            channel_id
        );
        let payload = json!({ "content": text });

        let response = tokio::time::timeout(
            self.timeout,
            self.client
                .post(&url)
                .header(
                    reqwest::header::AUTHORIZATION,
                    format!("Bot {}", self.token.expose_secret()),
                )
                .json(&payload)
                .send(),
        )
        .await
        .map_err(|_| DispatchError::Timeout)?
        .map_err(DispatchError::Network)?;

        if !response.status().is_success() {
            return Err(DispatchError::HttpStatus(response.status().as_u16()));
        }

        Ok(())
    }
}

/// Render the announcement text for a new article.
pub fn format_announcement(article: &Article) -> String {
    match article.url.as_deref() {
        Some(url) => format!("\u{1F4EC} {} {}", article.title, url),
        None => format!("\u{1F4EC} {}", article.title),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_article(title: &str, url: Option<&str>) -> Article {
        Article {
            id: 1,
            site_id: 1,
            identity: "abc".into(),
            title: title.into(),
            url: url.map(String::from),
            published: 1700000000,
            image_url: None,
            discovered_at: 1700000000,
        }
    }

    fn test_notifier(api_base: String) -> Notifier {
        Notifier::new(
            reqwest::Client::new(),
            api_base,
            SecretString::from("test-token".to_string()),
        )
    }

    #[test]
    fn test_format_announcement_with_url() {
        let article = test_article("Big News", Some("https://example.com/a"));
        assert_eq!(
            format_announcement(&article),
            "\u{1F4EC} Big News https://example.com/a"
        );
    }

    #[test]
    fn test_format_announcement_without_url() {
        let article = test_article("Linkless", None);
        assert_eq!(format_announcement(&article), "\u{1F4EC} Linkless");
    }

    #[tokio::test]
    async fn test_send_posts_to_channel_endpoint() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/channels/chan-1/messages"))
            .and(header("Authorization", "Bot test-token"))
            .and(body_json(json!({ "content": "hello" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let notifier = test_notifier(mock_server.uri());
        notifier.send_to_channel("chan-1", "hello").await.unwrap();
    }

    #[tokio::test]
    async fn test_send_surfaces_http_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&mock_server)
            .await;

        let notifier = test_notifier(mock_server.uri());
        let result = notifier.send_to_channel("chan-1", "hello").await;
        match result.unwrap_err() {
            DispatchError::HttpStatus(403) => {}
            e => panic!("Expected HttpStatus(403), got {:?}", e),
        }
    }
}
