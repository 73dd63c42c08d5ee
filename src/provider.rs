// HTTP transport for the Amadeus travel API.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::{ClientError, ProviderConfig};

const TOKEN_PATH: &str = "/v1/security/oauth2/token";
// Refresh slightly early so a token never expires mid-request.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum ProviderError {
    // The provider answered with a non-2xx status.
    #[error("HTTP {status} {status_text}")]
    Status {
        status: u16,
        status_text: String,
        body: Option<Value>,
    },

    // Connection-level failure: DNS, TLS, timeout, refused.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    // A 2xx response whose body could not be read as JSON.
    #[error("malformed response body: {0}")]
    Decode(String),
}

// The seam every producer is built against. Tool handlers capture a
// provider reference and a path; tests swap in the scripted mock below.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<Value, ProviderError>;

    async fn post(&self, path: &str, body: Value) -> Result<Value, ProviderError>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

pub struct AmadeusProvider {
    http: reqwest::Client,
    config: ProviderConfig,
    token: Mutex<Option<CachedToken>>,
}

impl AmadeusProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| ClientError::InitError(err.to_string()))?;

        Ok(Self {
            http,
            config,
            token: Mutex::new(None),
        })
    }

    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ProviderConfig::from_env()?)
    }

    // Client-credentials token, cached until shortly before expiry. The lock
    // also serializes refreshes, so a burst of calls fetches one token.
    async fn access_token(&self) -> Result<String, ProviderError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.access_token.clone());
            }
        }

        let url = format!("{}{}", self.config.base_url, TOKEN_PATH);
        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.api_key.as_str()),
                ("client_secret", self.config.api_secret.as_str()),
            ])
            .send()
            .await?;

        let payload = Self::into_json(response).await?;
        let token: TokenResponse = serde_json::from_value(payload)
            .map_err(|err| ProviderError::Decode(format!("token response: {err}")))?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        Ok(token.access_token)
    }

    async fn into_json(response: reqwest::Response) -> Result<Value, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            let status_text = status
                .canonical_reason()
                .unwrap_or("unknown status")
                .to_string();
            let body = response.json::<Value>().await.ok();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                status_text,
                body,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|err| ProviderError::Decode(err.to_string()))
    }
}

#[async_trait]
impl Provider for AmadeusProvider {
    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<Value, ProviderError> {
        let token = self.access_token().await?;
        let url = format!("{}{}", self.config.base_url, path);

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(params)
            .send()
            .await?;

        Self::into_json(response).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, ProviderError> {
        let token = self.access_token().await?;
        let url = format!("{}{}", self.config.base_url, path);

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        Self::into_json(response).await
    }
}

// Scripted stand-in for the remote provider: canned responses per path,
// failure injection, artificial delay, call counting.
#[cfg(test)]
pub mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    pub struct MockProvider {
        responses: Mutex<HashMap<String, Value>>,
        fail_next: AtomicUsize,
        delay_ms: AtomicUsize,
        calls: AtomicUsize,
    }

    impl MockProvider {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_response(&self, path: &str, response: Value) {
            self.responses.lock().insert(path.to_string(), response);
        }

        pub fn fail_next_requests(&self, count: usize) {
            self.fail_next.store(count, Ordering::SeqCst);
        }

        pub fn set_delay(&self, delay_ms: usize) {
            self.delay_ms.store(delay_ms, Ordering::SeqCst);
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        async fn respond(&self, path: &str) -> Result<Value, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            let delay = self.delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay as u64)).await;
            }

            let remaining = self.fail_next.load(Ordering::SeqCst);
            if remaining > 0 {
                self.fail_next.store(remaining - 1, Ordering::SeqCst);
                return Err(ProviderError::Status {
                    status: 503,
                    status_text: "Service Unavailable".to_string(),
                    body: Some(serde_json::json!({"detail": "scripted failure"})),
                });
            }

            match self.responses.lock().get(path) {
                Some(response) => Ok(response.clone()),
                None => Err(ProviderError::Status {
                    status: 404,
                    status_text: "Not Found".to_string(),
                    body: None,
                }),
            }
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        async fn get(
            &self,
            path: &str,
            _params: &[(&str, String)],
        ) -> Result<Value, ProviderError> {
            self.respond(path).await
        }

        async fn post(&self, path: &str, _body: Value) -> Result<Value, ProviderError> {
            self.respond(path).await
        }
    }
}
