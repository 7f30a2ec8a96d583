//! Connection to one org of the metadata platform.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use super::http::{send_with_retry, RetryPolicy};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn build_user_agent() -> String {
    format!("metasync/{}", env!("CARGO_PKG_VERSION"))
}

/// Resolved connection parameters for one workflow invocation.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub endpoint: String,
    pub access_token: String,
    pub username: String,
}

/// Transport-level request failures, before translation into the
/// retrieval/deployment error taxonomies.
#[derive(Debug, Error)]
pub enum ApiFailure {
    #[error("invalid org endpoint {url:?}: {reason}")]
    BadUrl { url: String, reason: String },
    #[error("org rejected the stored credentials (HTTP {status}): {message}")]
    Unauthorized { status: u16, message: String },
    #[error("not found: {message}")]
    NotFound { message: String },
    #[error("org request failed (HTTP {status}): {message}")]
    Server { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response from org: {0}")]
    InvalidResponse(String),
}

/// The addressable handle for one org, shared by the retrieval and
/// deployment clients. One underlying `reqwest::Client` per invocation
/// keeps connection reuse across the job-status polls.
pub struct Connection {
    client: Client,
    config: ConnectionConfig,
    user_agent: String,
    session_id: String,
}

impl Connection {
    pub fn new(config: ConnectionConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            config,
            user_agent: build_user_agent(),
            session_id: Uuid::new_v4().to_string(),
        }
    }

    fn build_url(&self, path: &str) -> Result<Url, ApiFailure> {
        let base = Url::parse(&self.config.endpoint).map_err(|e| ApiFailure::BadUrl {
            url: self.config.endpoint.clone(),
            reason: e.to_string(),
        })?;
        base.join(path).map_err(|e| ApiFailure::BadUrl {
            url: format!("{}/{}", self.config.endpoint, path),
            reason: e.to_string(),
        })
    }

    /// POST a JSON body and parse a JSON response, mapping auth and
    /// not-found statuses into their own failure variants.
    pub(super) async fn post_json<T, R>(&self, path: &str, body: &T) -> Result<R, ApiFailure>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let url = self.build_url(path)?;
        let request_id = Uuid::new_v4().to_string();
        debug!("POST {} (request {})", url, request_id);

        let response = send_with_retry(RetryPolicy::default(), || {
            self.client
                .post(url.clone())
                .header("Content-Type", "application/json")
                .header("User-Agent", &self.user_agent)
                .header("Authorization", format!("Bearer {}", self.config.access_token))
                .header("x-request-id", &request_id)
                .header("x-request-session-id", &self.session_id)
                .json(body)
        })
        .await
        .map_err(|e| ApiFailure::Transport(e.to_string()))?;

        let status = response.status();
        debug!("response status {}", status);

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "no diagnostic provided".to_string());
            return Err(match status.as_u16() {
                401 | 403 => ApiFailure::Unauthorized {
                    status: status.as_u16(),
                    message,
                },
                404 => ApiFailure::NotFound { message },
                code => ApiFailure::Server {
                    status: code,
                    message,
                },
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| ApiFailure::Transport(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| ApiFailure::InvalidResponse(e.to_string()))
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.config.endpoint)
            .field("username", &self.config.username)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(endpoint: &str) -> Connection {
        Connection::new(ConnectionConfig {
            endpoint: endpoint.to_string(),
            access_token: "tok-secret".to_string(),
            username: "dev@example.com".to_string(),
        })
    }

    #[test]
    fn builds_urls_with_and_without_trailing_slash() {
        let conn = connection("https://org.example-platform.com/");
        let url = conn.build_url("services/metadata/retrieve").unwrap();
        assert_eq!(
            url.as_str(),
            "https://org.example-platform.com/services/metadata/retrieve"
        );

        let conn = connection("https://org.example-platform.com");
        let url = conn.build_url("services/metadata/retrieve").unwrap();
        assert_eq!(
            url.as_str(),
            "https://org.example-platform.com/services/metadata/retrieve"
        );
    }

    #[test]
    fn invalid_endpoint_is_bad_url() {
        let conn = connection("not a url");
        assert!(matches!(
            conn.build_url("x"),
            Err(ApiFailure::BadUrl { .. })
        ));
    }

    #[test]
    fn debug_redacts_token() {
        let conn = connection("https://org.example-platform.com");
        let debug = format!("{:?}", conn);
        assert!(!debug.contains("tok-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
