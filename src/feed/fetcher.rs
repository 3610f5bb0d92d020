use futures::StreamExt;
use reqwest::redirect::Policy;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::Config;

/// Errors that can occur while fetching a listing export.
///
/// No variant is retried; each request gets exactly one upstream attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Upstream answered with anything other than 200 OK
    #[error("Upstream returned status {0}")]
    UpstreamStatus(u16),
    /// Request plus body download exceeded the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Response body exceeded the configured size limit
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    /// Client hash is empty or a relative path segment
    #[error("Invalid client hash: {0:?}")]
    InvalidHash(String),
    /// Configured base URL cannot take path segments
    #[error("Invalid upstream base URL: {0}")]
    InvalidBaseUrl(String),
}

/// Builds the HTTP client used for upstream requests.
///
/// The per-request bound is enforced by [`SourceFetcher`]; the client-level
/// timeout here is only a backstop.
pub fn build_client(config: &Config) -> Result<reqwest::Client, FetchError> {
    let client = reqwest::Client::builder()
        .redirect(create_redirect_policy())
        .user_agent(concat!("imob-feed/", env!("CARGO_PKG_VERSION")))
        .pool_idle_timeout(Duration::from_secs(30))
        .timeout(config.fetch_timeout() + Duration::from_secs(1))
        .build()?;
    Ok(client)
}

fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        // Limit to 3 redirects
        if attempt.previous().len() >= 3 {
            return attempt.error("Too many redirects (max 3)");
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %attempt.url(),
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

/// Fetches a client's listing export from the upstream provider.
#[derive(Debug, Clone)]
pub struct SourceFetcher {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    max_bytes: usize,
}

impl SourceFetcher {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        timeout: Duration,
        max_bytes: usize,
    ) -> Result<Self, FetchError> {
        let base_url = Url::parse(base_url).map_err(|e| FetchError::InvalidBaseUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(FetchError::InvalidBaseUrl(base_url.to_string()));
        }
        Ok(Self {
            client,
            base_url,
            timeout,
            max_bytes,
        })
    }

    pub fn from_config(client: reqwest::Client, config: &Config) -> Result<Self, FetchError> {
        Self::new(
            client,
            &config.upstream_base_url,
            config.fetch_timeout(),
            config.max_response_bytes,
        )
    }

    /// Upstream URL for a client hash.
    ///
    /// The hash becomes exactly one path segment; characters such as `/`,
    /// `?` and `#` are percent-encoded so the hash cannot escape it.
    pub fn listing_url(&self, hash: &str) -> Result<Url, FetchError> {
        // `.` and `..` would be dropped by the URL serializer
        if hash.trim().is_empty() || hash == "." || hash == ".." {
            return Err(FetchError::InvalidHash(hash.to_string()));
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push(hash);
        Ok(url)
    }

    /// Downloads the raw export for `hash`.
    ///
    /// # Errors
    ///
    /// - [`FetchError::UpstreamStatus`] - Upstream answered with a non-200 status
    /// - [`FetchError::Timeout`] - No complete response within the timeout
    /// - [`FetchError::Network`] - Connection, TLS or body stream failure,
    ///   including a body shorter than its Content-Length
    /// - [`FetchError::ResponseTooLarge`] - Body exceeded the size limit
    pub async fn fetch(&self, hash: &str) -> Result<Vec<u8>, FetchError> {
        let url = self.listing_url(hash)?;

        tokio::time::timeout(self.timeout, self.fetch_url(url))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))?
    }

    async fn fetch_url(&self, url: Url) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url.clone()).send().await?;

        if response.status() != reqwest::StatusCode::OK {
            tracing::warn!(
                url = %url,
                status = %response.status(),
                "Upstream returned non-success status"
            );
            return Err(FetchError::UpstreamStatus(response.status().as_u16()));
        }

        let bytes = read_limited_bytes(response, self.max_bytes).await?;
        tracing::debug!(url = %url, bytes = bytes.len(), "Fetched listing export");
        Ok(bytes)
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_EXPORT: &str = r#"<?xml version="1.0"?>
<imoveis><imovel><idNaImobiliaria>1</idNaImobiliaria></imovel></imoveis>"#;

    fn fetcher_for(server: &MockServer, timeout: Duration, max_bytes: usize) -> SourceFetcher {
        SourceFetcher::new(
            reqwest::Client::new(),
            &format!("{}/Imob86XML/listar/", server.uri()),
            timeout,
            max_bytes,
        )
        .unwrap()
    }

    #[test]
    fn test_listing_url_appends_hash() {
        let fetcher = SourceFetcher::from_config(reqwest::Client::new(), &Config::default()).unwrap();
        let url = fetcher.listing_url("abc123").unwrap();
        assert_eq!(
            url.as_str(),
            "https://xml.imob86.conceptsoft.com.br/Imob86XML/listar/abc123"
        );
    }

    #[test]
    fn test_listing_url_without_trailing_slash() {
        let fetcher = SourceFetcher::new(
            reqwest::Client::new(),
            "https://example.com/listar",
            Duration::from_secs(1),
            1024,
        )
        .unwrap();
        assert_eq!(
            fetcher.listing_url("h").unwrap().as_str(),
            "https://example.com/listar/h"
        );
    }

    #[test]
    fn test_listing_url_encodes_hash() {
        let fetcher = SourceFetcher::from_config(reqwest::Client::new(), &Config::default()).unwrap();
        let url = fetcher.listing_url("../a?b#c").unwrap();
        assert_eq!(
            url.as_str(),
            "https://xml.imob86.conceptsoft.com.br/Imob86XML/listar/..%2Fa%3Fb%23c"
        );
    }

    #[test]
    fn test_unusable_hash_rejected() {
        let fetcher = SourceFetcher::from_config(reqwest::Client::new(), &Config::default()).unwrap();
        for hash in ["", "  ", ".", ".."] {
            assert!(
                matches!(fetcher.listing_url(hash), Err(FetchError::InvalidHash(_))),
                "hash {hash:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let result = SourceFetcher::new(
            reqwest::Client::new(),
            "mailto:someone@example.com",
            Duration::from_secs(1),
            1024,
        );
        assert!(matches!(result, Err(FetchError::InvalidBaseUrl(_))));
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Imob86XML/listar/abc123"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_EXPORT)
                    .insert_header("Content-Type", "application/xml"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let fetcher = fetcher_for(&mock_server, Duration::from_secs(5), 1024 * 1024);
        let bytes = fetcher.fetch("abc123").await.unwrap();
        assert_eq!(bytes, VALID_EXPORT.as_bytes());
    }

    #[tokio::test]
    async fn test_fetch_503_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&mock_server)
            .await;

        let fetcher = fetcher_for(&mock_server, Duration::from_secs(5), 1024);
        match fetcher.fetch("abc123").await.unwrap_err() {
            FetchError::UpstreamStatus(503) => {}
            e => panic!("Expected UpstreamStatus(503), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_fetch_non_200_success_status_is_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;

        let fetcher = fetcher_for(&mock_server, Duration::from_secs(5), 1024);
        assert!(matches!(
            fetcher.fetch("abc123").await,
            Err(FetchError::UpstreamStatus(204))
        ));
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_EXPORT)
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let fetcher = fetcher_for(&mock_server, Duration::from_millis(200), 1024);
        assert!(matches!(
            fetcher.fetch("abc123").await,
            Err(FetchError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_too_large() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(2048)))
            .mount(&mock_server)
            .await;

        let fetcher = fetcher_for(&mock_server, Duration::from_secs(5), 1024);
        assert!(matches!(
            fetcher.fetch("abc123").await,
            Err(FetchError::ResponseTooLarge(1024))
        ));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        // Bind then drop to get a port with nothing listening
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetcher = SourceFetcher::new(
            reqwest::Client::new(),
            &format!("http://{addr}/listar/"),
            Duration::from_secs(5),
            1024,
        )
        .unwrap();
        assert!(matches!(
            fetcher.fetch("abc123").await,
            Err(FetchError::Network(_))
        ));
    }
}
