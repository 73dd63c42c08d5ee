// Failure classification for remote provider calls.

use serde_json::Value;
use thiserror::Error;

use crate::provider::ProviderError;

// Every failure a producer can raise, and every domain error a provider can
// embed in a 2xx payload, is normalized into one of these three shapes
// before the retry policy sees it. The message is always non-empty.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    // Non-2xx status or connection-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    // The provider answered 2xx but reported a semantic failure in the
    // payload.
    #[error("API error: {0}")]
    Api(String),

    // Anything matching neither shape, malformed bodies included.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl ApiError {
    // Detects a domain-level error embedded in an otherwise successful
    // response: either an `errors` array or a single `error` object.
    pub fn from_payload(payload: &Value) -> Option<ApiError> {
        if let Some(errors) = payload.get("errors").and_then(Value::as_array) {
            let message = errors
                .iter()
                .map(|err| {
                    let title = err
                        .get("title")
                        .and_then(Value::as_str)
                        .unwrap_or("API Error");
                    let detail = err
                        .get("detail")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .or_else(|| err.get("code").map(render_value))
                        .unwrap_or_else(|| "Unknown error".to_string());
                    format!("{title}: {detail}")
                })
                .collect::<Vec<_>>()
                .join("; ");

            if message.is_empty() {
                return Some(ApiError::Api("API Error".to_string()));
            }
            return Some(ApiError::Api(message));
        }

        if let Some(error) = payload.get("error") {
            let message = error
                .as_str()
                .or_else(|| error.get("message").and_then(Value::as_str))
                .or_else(|| error.get("description").and_then(Value::as_str))
                .unwrap_or("API Error");
            return Some(ApiError::Api(message.to_string()));
        }

        None
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Status {
                status,
                status_text,
                body,
            } => {
                let mut message = if status_text.is_empty() {
                    format!("HTTP {status}")
                } else {
                    status_text
                };
                if let Some(body) = body {
                    message = format!("{message}: {body}");
                }
                ApiError::Transport(message)
            }
            ProviderError::Request(err) => ApiError::Transport(err.to_string()),
            ProviderError::Decode(detail) => ApiError::Unexpected(detail),
        }
    }
}

fn render_value(value: &Value) -> String {
    match value.as_str() {
        Some(text) => text.to_string(),
        None => value.to_string(),
    }
}
