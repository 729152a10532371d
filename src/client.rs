//! Thread HTTP Client
//!
//! Fetches the thread page once and polls `<page url>/<cursor>` for posts
//! newer than the cursor.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::cursor::{Cursor, DEFAULT_UNSET_SEGMENT};
use crate::thread::Message;

/// Source of new thread posts
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Fetch the posts the server reports as newer than `cursor`, in server order
    async fn fetch_after(&self, cursor: &Cursor) -> Result<Vec<Message>, FetchError>;
}

/// Configuration for the thread client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// URL of the thread page (e.g. "http://localhost:8000/thread/3")
    pub page_url: String,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Path segment requested while the cursor is unset
    pub unset_segment: String,
}

impl ClientConfig {
    pub fn new(page_url: impl Into<String>) -> Self {
        Self {
            page_url: page_url.into(),
            ..Default::default()
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            page_url: "http://localhost:8000/thread/1".to_string(),
            request_timeout_ms: 10_000,
            unset_segment: DEFAULT_UNSET_SEGMENT.to_string(),
        }
    }
}

/// reqwest-backed thread client
pub struct ThreadClient {
    client: Client,
    config: ClientConfig,
}

impl ThreadClient {
    /// Create a new thread client with the given configuration
    pub fn new(config: ClientConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self { client, config })
    }

    /// URL polled for posts newer than `cursor`
    pub fn poll_url(&self, cursor: &Cursor) -> String {
        format!(
            "{}/{}",
            self.config.page_url.trim_end_matches('/'),
            cursor.path_segment(&self.config.unset_segment)
        )
    }

    /// Fetch the thread page markup
    pub async fn fetch_page(&self) -> Result<String, FetchError> {
        let url = &self.config.page_url;
        let response = self.client.get(url).send().await.map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.clone(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(FetchError::Request)
    }
}

#[async_trait]
impl MessageSource for ThreadClient {
    async fn fetch_after(&self, cursor: &Cursor) -> Result<Vec<Message>, FetchError> {
        let url = self.poll_url(cursor);
        tracing::debug!(url = %url, "Polling thread");

        let response = self.client.get(&url).send().await.map_err(map_send_error)?;

        let status = response.status();
        if !is_accepted(status) {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(FetchError::Request)?;
        decode_messages(&body)
    }
}

/// Poll responses are accepted for any status in [200, 400)
pub fn is_accepted(status: StatusCode) -> bool {
    (200..400).contains(&status.as_u16())
}

fn map_send_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_connect() {
        FetchError::Unavailable
    } else {
        FetchError::Request(e)
    }
}

/// Decode a poll response body.
///
/// The server answers `nil` for a thread without posts and a bare `]` when
/// no post is newer than the cursor; both mean "nothing new".
pub fn decode_messages(body: &str) -> Result<Vec<Message>, FetchError> {
    match body.trim() {
        "nil" | "]" => Ok(Vec::new()),
        trimmed => serde_json::from_str(trimmed).map_err(FetchError::Decode),
    }
}

// ============================================
// Errors
// ============================================

/// Errors that can occur while talking to the thread server
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("thread server unavailable")]
    Unavailable,

    #[error("request timeout")]
    Timeout,

    #[error("connection error: {url} answered {status}")]
    Status { url: String, status: u16 },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Decode(serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::PostId;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.request_timeout_ms, 10_000);
        assert_eq!(config.unset_segment, "0");
    }

    #[test]
    fn test_poll_url() {
        let client = ThreadClient::new(ClientConfig::new("http://localhost:8000/thread/3/")).unwrap();
        assert_eq!(
            client.poll_url(&Cursor::At(PostId::from(17))),
            "http://localhost:8000/thread/3/17"
        );
        assert_eq!(client.poll_url(&Cursor::Unset), "http://localhost:8000/thread/3/0");
    }

    #[test]
    fn test_accepted_status_range() {
        assert!(is_accepted(StatusCode::OK));
        assert!(is_accepted(StatusCode::NOT_MODIFIED));
        assert!(!is_accepted(StatusCode::NOT_FOUND));
        assert!(!is_accepted(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn test_decode_posts() {
        let body = r#"[{"threadid":3,"poster":"a","body":"x","img":"i.png","time":"1","date":"2","postid":6},
                       {"threadid":3,"poster":"b","body":"y","img":"j.png","time":"3","date":"4","postid":7}]"#;
        let posts = decode_messages(body).unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[1].postid, PostId::from(7));
    }

    #[test]
    fn test_decode_sentinels() {
        assert!(decode_messages("nil").unwrap().is_empty());
        assert!(decode_messages("]").unwrap().is_empty());
        assert!(decode_messages(" [] ").unwrap().is_empty());
    }

    #[test]
    fn test_decode_malformed() {
        let err = decode_messages("[{\"poster\": ").unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
        assert!(err.to_string().starts_with("malformed response"));
    }
}
