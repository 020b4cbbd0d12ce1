//! Feed fetching and verbatim raw capture

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;

use crate::config::FeedConfig;

/// Parsed shape of one feed response
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    /// JSON array; elements are the indicator entries
    List(Vec<Value>),
    /// JSON object; entries live in a nested list under a feed-specific field
    Object(serde_json::Map<String, Value>),
    /// Anything without a recognized entry structure; carries no indicators
    Text(String),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("feed returned {status}")]
    Status { status: StatusCode },
    #[error("malformed JSON body: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("could not persist raw capture: {0}")]
    Capture(#[from] std::io::Error),
}

impl FetchError {
    /// Only failures that may clear on their own are worth another attempt
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Network(e) => e.is_timeout() || e.is_connect(),
            FetchError::Status { status } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            FetchError::Malformed(_) | FetchError::Capture(_) => false,
        }
    }
}

/// Fetches feeds and captures each successful response body verbatim
pub struct FeedFetcher {
    client: Client,
    raw_dir: PathBuf,
    attempts: u32,
    retry_delay: Duration,
}

impl FeedFetcher {
    pub fn new(raw_dir: impl Into<PathBuf>, attempts: u32, retry_delay: Duration) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            raw_dir: raw_dir.into(),
            attempts: attempts.max(1),
            retry_delay,
        }
    }

    /// Fetch one feed, retrying transient failures with exponential backoff.
    /// On success the verbatim body has been written to the raw directory.
    pub async fn fetch(
        &self,
        feed: &FeedConfig,
        fetched_at: DateTime<Utc>,
    ) -> Result<RawPayload, FetchError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.fetch_once(feed, fetched_at).await {
                Ok(payload) => return Ok(payload),
                Err(e) if e.is_transient() && attempt < self.attempts => {
                    let delay = self.retry_delay * 2u32.saturating_pow(attempt - 1);
                    tracing::warn!(
                        feed = %feed.name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(
        &self,
        feed: &FeedConfig,
        fetched_at: DateTime<Utc>,
    ) -> Result<RawPayload, FetchError> {
        let mut request = self.client.get(feed.url.clone());
        for (name, value) in &feed.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response.text().await?;

        self.capture_raw(&feed.name, fetched_at, &body)?;
        Ok(parse_body(&content_type, body)?)
    }

    fn capture_raw(
        &self,
        feed_name: &str,
        fetched_at: DateTime<Utc>,
        body: &str,
    ) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.raw_dir)?;
        let path = self.raw_dir.join(format!(
            "{}_{}.json",
            feed_name,
            fetched_at.format("%Y%m%d%H%M%S")
        ));
        std::fs::write(path, body)
    }
}

/// Classify a response body by its declared content type. Bodies that claim
/// JSON but fail to parse are an error; valid JSON scalars fall back to
/// `Text` and contribute nothing downstream.
fn parse_body(content_type: &str, body: String) -> Result<RawPayload, serde_json::Error> {
    if !content_type.contains("application/json") {
        return Ok(RawPayload::Text(body));
    }

    match serde_json::from_str(&body)? {
        Value::Array(items) => Ok(RawPayload::List(items)),
        Value::Object(map) => Ok(RawPayload::Object(map)),
        _ => Ok(RawPayload::Text(body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;
    use url::Url;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::models::IndicatorType;

    fn feed(name: &str, url: &str) -> FeedConfig {
        FeedConfig {
            name: name.to_string(),
            url: Url::parse(url).unwrap(),
            headers: vec![("X-Test-Key".to_string(), "secret".to_string())],
            configured: true,
            indicator_type: IndicatorType::Ip,
            list_field: "data".to_string(),
            value_field: "ipAddress".to_string(),
        }
    }

    #[test]
    fn test_parse_body_shapes() {
        assert_eq!(
            parse_body("application/json", "[\"1.2.3.4\"]".to_string()).unwrap(),
            RawPayload::List(vec![json!("1.2.3.4")])
        );

        let object = parse_body("application/json; charset=utf-8", "{\"data\":[]}".to_string())
            .unwrap();
        assert!(matches!(object, RawPayload::Object(_)));

        assert_eq!(
            parse_body("text/plain", "1.2.3.4\n5.6.7.8".to_string()).unwrap(),
            RawPayload::Text("1.2.3.4\n5.6.7.8".to_string())
        );

        // JSON scalar has no entry structure
        assert_eq!(
            parse_body("application/json", "42".to_string()).unwrap(),
            RawPayload::Text("42".to_string())
        );

        assert!(parse_body("application/json", "{broken".to_string()).is_err());
    }

    #[test]
    fn test_transient_classification() {
        assert!(
            FetchError::Status {
                status: StatusCode::INTERNAL_SERVER_ERROR
            }
            .is_transient()
        );
        assert!(
            FetchError::Status {
                status: StatusCode::TOO_MANY_REQUESTS
            }
            .is_transient()
        );
        assert!(
            !FetchError::Status {
                status: StatusCode::UNAUTHORIZED
            }
            .is_transient()
        );
        let parse_err = serde_json::from_str::<Value>("{").unwrap_err();
        assert!(!FetchError::Malformed(parse_err).is_transient());
    }

    #[tokio::test]
    async fn test_fetch_captures_verbatim_body() {
        let server = MockServer::start().await;
        let body = "[\"1.2.3.4\", \"1.2.3.4\"]";
        Mock::given(method("GET"))
            .and(path("/feed"))
            .and(header("X-Test-Key", "secret"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(body)
                    .insert_header("Content-Type", "application/json"),
            )
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let fetcher = FeedFetcher::new(dir.path(), 1, Duration::from_millis(1));
        let fetched_at = Utc::now();

        let payload = fetcher
            .fetch(&feed("OTX", &format!("{}/feed", server.uri())), fetched_at)
            .await
            .unwrap();

        assert_eq!(
            payload,
            RawPayload::List(vec![json!("1.2.3.4"), json!("1.2.3.4")])
        );

        let expected = dir.path().join(format!(
            "OTX_{}.json",
            fetched_at.format("%Y%m%d%H%M%S")
        ));
        assert_eq!(std::fs::read_to_string(expected).unwrap(), body);
    }

    #[tokio::test]
    async fn test_fetch_writes_nothing_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let fetcher = FeedFetcher::new(dir.path().join("raw"), 3, Duration::from_millis(1));

        let result = fetcher.fetch(&feed("OTX", &server.uri()), Utc::now()).await;

        assert!(matches!(
            result,
            Err(FetchError::Status {
                status: StatusCode::FORBIDDEN
            })
        ));
        // 403 is permanent, so no retries either
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
        assert!(!dir.path().join("raw").exists());
    }

    #[tokio::test]
    async fn test_fetch_retries_transient_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("[]")
                    .insert_header("Content-Type", "application/json"),
            )
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let fetcher = FeedFetcher::new(dir.path(), 3, Duration::from_millis(1));

        let payload = fetcher
            .fetch(&feed("Flaky", &server.uri()), Utc::now())
            .await
            .unwrap();

        assert_eq!(payload, RawPayload::List(vec![]));
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }
}
