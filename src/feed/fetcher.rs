use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

use crate::feed::parser::parse_feed;
use crate::storage::ParsedArticle;

/// Response bodies are capped to keep one hostile or broken feed from
/// exhausting memory.
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while fetching and parsing one feed.
///
/// Every variant is scoped to a single site: the poll cycle records the
/// error on that site and moves on. There is deliberately no retry here —
/// a failed fetch means "no new information this cycle" and the next
/// scheduled poll is the retry.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Feed XML could not be parsed as RSS or Atom
    #[error("Parse error: {0}")]
    Parse(String),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
}

/// Fetch one feed URL and parse it into normalized articles, in feed order.
///
/// Issues a single GET (no retries), bounded by `timeout` and by
/// [`MAX_FEED_SIZE`] on the body. Transport, HTTP, and parse failures all
/// surface as [`FetchError`] so the caller can treat them uniformly as
/// "zero new articles from this site".
pub async fn fetch_articles(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<Vec<ParsedArticle>, FetchError> {
    let response = tokio::time::timeout(timeout, client.get(url).send())
        .await
        .map_err(|_| FetchError::Timeout)?
        .map_err(FetchError::Network)?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    let bytes = read_limited_bytes(response, MAX_FEED_SIZE).await?;

    parse_feed(&bytes).map_err(|e| FetchError::Parse(e.to_string()))
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <item><guid>1</guid><title>Test</title></item>
</channel></rss>"#;

    fn test_timeout() -> Duration {
        Duration::from_secs(5)
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .insert_header("Content-Type", "application/xml"),
            )
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let articles = fetch_articles(&client, &format!("{}/feed", mock_server.uri()), test_timeout())
            .await
            .unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Test");
    }

    #[tokio::test]
    async fn test_fetch_404_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let result =
            fetch_articles(&client, &format!("{}/feed", mock_server.uri()), test_timeout()).await;
        match result.unwrap_err() {
            FetchError::HttpStatus(404) => {}
            e => panic!("Expected HttpStatus(404), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_fetch_500_fails_without_retry() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1) // Single attempt, no retry
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let result =
            fetch_articles(&client, &format!("{}/feed", mock_server.uri()), test_timeout()).await;
        match result.unwrap_err() {
            FetchError::HttpStatus(500) => {}
            e => panic!("Expected HttpStatus(500), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_malformed_feed_parse_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<not valid xml"))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let result =
            fetch_articles(&client, &format!("{}/feed", mock_server.uri()), test_timeout()).await;
        match result.unwrap_err() {
            FetchError::Parse(_) => {}
            e => panic!("Expected Parse error, got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_empty_feed_success() {
        let empty_rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel></channel></rss>"#;

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(empty_rss))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let articles = fetch_articles(&client, &format!("{}/feed", mock_server.uri()), test_timeout())
            .await
            .unwrap();
        assert!(articles.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_bytes(vec![b'x'; MAX_FEED_SIZE + 1]),
            )
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let result =
            fetch_articles(&client, &format!("{}/feed", mock_server.uri()), test_timeout()).await;
        match result.unwrap_err() {
            FetchError::ResponseTooLarge => {}
            e => panic!("Expected ResponseTooLarge, got {:?}", e),
        }
    }
}
