// Runtime configuration, read once from the environment at startup.

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::retry::RetryConfig;

const DEFAULT_CACHE_TTL_MINUTES: u64 = 5;
const DEFAULT_RATE_LIMIT_REQUESTS: usize = 5;
const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

const TEST_BASE_URL: &str = "https://test.api.amadeus.com";
const PRODUCTION_BASE_URL: &str = "https://api.amadeus.com";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Initialization error: {0}")]
    InitError(String),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub cache_ttl: Duration,
    pub max_concurrent_requests: usize,
    pub retry: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_MINUTES * 60),
            max_concurrent_requests: DEFAULT_RATE_LIMIT_REQUESTS,
            retry: RetryConfig::default(),
        }
    }
}

impl ClientConfig {
    // CACHE_TTL_MINUTES, RATE_LIMIT_REQUESTS, MAX_RETRIES and the RETRY_*
    // backoff knobs override the defaults; unparsable values fall back with
    // a warning.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let ttl_minutes = env_or("CACHE_TTL_MINUTES", DEFAULT_CACHE_TTL_MINUTES);
        let defaults = RetryConfig::default();
        let retry = RetryConfig {
            max_retries: env_or("MAX_RETRIES", defaults.max_retries),
            initial_backoff_ms: env_or("RETRY_INITIAL_BACKOFF_MS", defaults.initial_backoff_ms),
            max_backoff_ms: env_or("RETRY_MAX_BACKOFF_MS", defaults.max_backoff_ms),
            backoff_multiplier: env_or("RETRY_BACKOFF_MULTIPLIER", defaults.backoff_multiplier),
        };

        Self {
            cache_ttl: Duration::from_secs(ttl_minutes * 60),
            max_concurrent_requests: env_or("RATE_LIMIT_REQUESTS", DEFAULT_RATE_LIMIT_REQUESTS),
            retry,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub api_secret: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl ProviderConfig {
    // AMADEUS_API_KEY and AMADEUS_API_SECRET are mandatory. AMADEUS_HOSTNAME
    // selects the test or production endpoint and defaults to test.
    pub fn from_env() -> Result<Self, ClientError> {
        dotenvy::dotenv().ok();

        let api_key = require_env("AMADEUS_API_KEY")?;
        let api_secret = require_env("AMADEUS_API_SECRET")?;

        let hostname = env::var("AMADEUS_HOSTNAME").unwrap_or_else(|_| "test".to_string());
        let base_url = match hostname.as_str() {
            "test" => TEST_BASE_URL,
            "production" => PRODUCTION_BASE_URL,
            other => {
                return Err(ClientError::ConfigError(format!(
                    "AMADEUS_HOSTNAME must be 'test' or 'production', got '{other}'"
                )))
            }
        };

        Ok(Self {
            api_key,
            api_secret,
            base_url: base_url.to_string(),
            timeout: Duration::from_secs(env_or(
                "REQUEST_TIMEOUT_SECONDS",
                DEFAULT_REQUEST_TIMEOUT_SECONDS,
            )),
        })
    }
}

fn require_env(key: &str) -> Result<String, ClientError> {
    env::var(key)
        .ok()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ClientError::ConfigError(format!("{key} is not set")))
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy + Display,
{
    match env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, raw = %raw, %default, "unparsable value, using default");
                default
            }
        },
        Err(_) => default,
    }
}
