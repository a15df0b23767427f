//! # authdata-http
//!
//! HTTP-backed [`QuerySource`] for the authdata cache.
//!
//! [`HttpQuerySource`] issues a GET against an auth backend endpoint that
//! answers with the `{ "data": ..., "error": { "status", "message" } }`
//! envelope and maps the response onto the cache core's fetch contract:
//!
//! - 2xx with an `error` object is an API failure classified by the
//!   status carried *in the body*;
//! - 2xx with `data` (possibly `null`) is a success, `null` mapping to
//!   the explicit-null result;
//! - a non-2xx response is an API failure classified by the HTTP status,
//!   taking the message from the error body when one parses;
//! - a transport failure (refused connection, timeout) is a retryable
//!   network error;
//! - a 2xx body that is not valid envelope JSON is unclassified and
//!   therefore terminal.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use authdata_cache::{FetchError, QuerySource};

/// Configuration for [`HttpQuerySource`].
#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    /// HTTP request timeout (default: 10 seconds).
    pub request_timeout: Duration,
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl HttpSourceConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the HTTP request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// The response envelope the auth backend wraps every payload in.
#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    status: Option<u16>,
    #[serde(default)]
    message: Option<String>,
}

/// A [`QuerySource`] that GETs an envelope-shaped auth endpoint.
pub struct HttpQuerySource {
    client: reqwest::Client,
    url: Url,
    bearer_token: Option<String>,
}

impl HttpQuerySource {
    /// Creates a source for `url` with its own HTTP client.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created (should not happen in
    /// practice).
    #[must_use]
    pub fn new(url: Url, config: HttpSourceConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            url,
            bearer_token: None,
        }
    }

    /// Creates a source for `url` reusing an existing client.
    ///
    /// Prefer this when several sources talk to the same backend; reqwest
    /// clients share their connection pool across clones.
    #[must_use]
    pub fn with_client(client: reqwest::Client, url: Url) -> Self {
        Self {
            client,
            url,
            bearer_token: None,
        }
    }

    /// Attaches a bearer token sent as `Authorization` on every fetch.
    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// The cache key for this source, derived from the normalized URL.
    ///
    /// Two sources pointing at the same endpoint (modulo a trailing
    /// slash) produce the same key and therefore share cache entries and
    /// in-flight coalescing.
    #[must_use]
    pub fn cache_key(&self) -> String {
        normalize_url(&self.url)
    }

    /// The endpoint this source queries.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl QuerySource for HttpQuerySource {
    async fn fetch(&self) -> Result<Option<Value>, FetchError> {
        let mut request = self
            .client
            .get(self.url.as_str())
            .header("Accept", "application/json");
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!("Request to {} failed: {}", self.url, e);
            FetchError::Network(e.to_string())
        })?;

        let status = response.status();
        let envelope: Envelope = match response.json().await {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => {
                tracing::warn!("Malformed response body from {}: {}", self.url, e);
                return Err(FetchError::Unclassified(format!(
                    "malformed response body: {e}"
                )));
            }
            // Error statuses often carry non-JSON bodies; classify by
            // the HTTP status alone.
            Err(_) => Envelope::default(),
        };

        if !status.is_success() {
            let message = envelope
                .error
                .and_then(|e| e.message)
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                });
            return Err(FetchError::Api {
                status: Some(status.as_u16()),
                message,
            });
        }

        if let Some(error) = envelope.error {
            return Err(FetchError::Api {
                status: error.status,
                message: error.message.unwrap_or_else(|| "request failed".to_string()),
            });
        }

        // `data: null` and an absent field both mean the explicit-null
        // result.
        Ok(envelope.data.filter(|v| !v.is_null()))
    }
}

/// Normalizes a URL for use as a cache key.
fn normalize_url(url: &Url) -> String {
    url.as_str().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source_for(server: &MockServer, route: &str) -> HttpQuerySource {
        let url = Url::parse(&format!("{}{route}", server.uri())).unwrap();
        HttpQuerySource::new(url, HttpSourceConfig::default())
    }

    #[test]
    fn cache_key_normalizes_trailing_slash() {
        let a = HttpQuerySource::new(
            Url::parse("https://auth.example.com/api/profile").unwrap(),
            HttpSourceConfig::default(),
        );
        let b = HttpQuerySource::new(
            Url::parse("https://auth.example.com/api/profile/").unwrap(),
            HttpSourceConfig::default(),
        );
        assert_eq!(a.cache_key(), b.cache_key());
        assert_eq!(a.cache_key(), "https://auth.example.com/api/profile");
    }

    #[test]
    fn config_builder() {
        let config = HttpSourceConfig::new().with_request_timeout(Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn success_envelope_yields_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/profile"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"data": {"name": "ada"}})),
            )
            .mount(&server)
            .await;

        let source = source_for(&server, "/api/profile");
        assert_eq!(source.fetch().await, Ok(Some(json!({"name": "ada"}))));
    }

    #[tokio::test]
    async fn null_data_is_the_explicit_null_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/profile"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": null})))
            .mount(&server)
            .await;

        let source = source_for(&server, "/api/profile");
        assert_eq!(source.fetch().await, Ok(None));
    }

    #[tokio::test]
    async fn error_object_in_success_body_is_an_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/profile"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": {"status": 403, "message": "forbidden"}
            })))
            .mount(&server)
            .await;

        let source = source_for(&server, "/api/profile");
        assert_eq!(
            source.fetch().await,
            Err(FetchError::Api {
                status: Some(403),
                message: "forbidden".to_string()
            })
        );
    }

    #[tokio::test]
    async fn http_error_takes_message_from_parseable_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/profile"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": {"message": "database down"}
            })))
            .mount(&server)
            .await;

        let source = source_for(&server, "/api/profile");
        assert_eq!(
            source.fetch().await,
            Err(FetchError::Api {
                status: Some(500),
                message: "database down".to_string()
            })
        );
    }

    #[tokio::test]
    async fn http_error_with_opaque_body_falls_back_to_the_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/profile"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not json"))
            .mount(&server)
            .await;

        let source = source_for(&server, "/api/profile");
        assert_eq!(
            source.fetch().await,
            Err(FetchError::Api {
                status: Some(404),
                message: "Not Found".to_string()
            })
        );
    }

    #[tokio::test]
    async fn malformed_success_body_is_unclassified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/profile"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let source = source_for(&server, "/api/profile");
        let error = source.fetch().await.unwrap_err();
        assert!(matches!(error, FetchError::Unclassified(_)));
    }

    #[tokio::test]
    async fn transport_failure_is_a_network_error() {
        // Nothing listens on this port.
        let url = Url::parse("http://127.0.0.1:9/api/profile").unwrap();
        let source = HttpQuerySource::new(
            url,
            HttpSourceConfig::default().with_request_timeout(Duration::from_secs(1)),
        );

        let error = source.fetch().await.unwrap_err();
        assert!(matches!(error, FetchError::Network(_)));
        assert!(error.is_retryable());
    }

    #[tokio::test]
    async fn bearer_token_is_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/profile"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": 1})))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/api/profile", server.uri())).unwrap();
        let source = HttpQuerySource::new(url, HttpSourceConfig::default())
            .with_bearer_token("secret");

        assert_eq!(source.fetch().await, Ok(Some(json!(1))));
    }
}
