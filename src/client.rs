// Cached, bounded, retried execution for every remote travel lookup.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::Value;

use crate::cache::{CacheStats, ResponseCache};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::limiter::ConcurrencyLimiter;
use crate::retry::{self, RetryConfig};

// Point-in-time view of the request counters.
#[derive(Debug, Default, Clone)]
pub struct ClientStats {
    pub requests_sent: usize,
    pub requests_succeeded: usize,
    pub requests_failed: usize,
    pub requests_retried: usize,
}

#[derive(Debug, Default)]
struct ClientCounters {
    requests_sent: AtomicUsize,
    requests_succeeded: AtomicUsize,
    requests_failed: AtomicUsize,
    requests_retried: AtomicUsize,
}

// One instance per process, shared by reference across every tool handler.
// Holds the response cache, the in-flight bound and the retry schedule; a
// handler only ever supplies a cache key and a producer.
pub struct TravelApiClient {
    cache: ResponseCache,
    limiter: ConcurrencyLimiter,
    retry: RetryConfig,
    counters: ClientCounters,
}

impl TravelApiClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            cache: ResponseCache::new(config.cache_ttl),
            limiter: ConcurrencyLimiter::new(config.max_concurrent_requests),
            retry: config.retry,
            counters: ClientCounters::default(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(ClientConfig::from_env())
    }

    // The single entry point for remote lookups. A cache hit returns
    // immediately without consuming a limiter slot or touching the retry
    // machinery. A miss runs the producer under both, classifies every
    // failure (thrown or embedded in a 2xx payload), and caches only a
    // successful value; the last failure of an exhausted invocation is
    // surfaced verbatim.
    pub async fn fetch<F, Fut, E>(&self, key: &str, producer: F) -> Result<Value, ApiError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
        E: Into<ApiError>,
    {
        if let Some(value) = self.cache.get(key) {
            tracing::debug!(key, "cache hit");
            return Ok(value);
        }
        tracing::debug!(key, "cache miss, fetching from provider");

        let producer = &producer;
        let counters = &self.counters;
        let limiter = &self.limiter;

        let result = retry::with_backoff(
            &self.retry,
            |err: &ApiError, attempt| {
                counters.requests_retried.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(key, attempt, error = %err, "retrying failed request");
            },
            move || async move {
                counters.requests_sent.fetch_add(1, Ordering::Relaxed);
                match limiter.run(|| producer()).await {
                    Ok(value) => match ApiError::from_payload(&value) {
                        Some(err) => Err(err),
                        None => Ok(value),
                    },
                    Err(err) => Err(err.into()),
                }
            },
        )
        .await;

        match result {
            Ok(value) => {
                self.counters
                    .requests_succeeded
                    .fetch_add(1, Ordering::Relaxed);
                self.cache.set(key, value.clone());
                tracing::info!(key, "cached provider result");
                Ok(value)
            }
            Err(err) => {
                self.counters.requests_failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(key, error = %err, "request failed after retries");
                Err(err)
            }
        }
    }

    pub fn stats(&self) -> ClientStats {
        ClientStats {
            requests_sent: self.counters.requests_sent.load(Ordering::Relaxed),
            requests_succeeded: self.counters.requests_succeeded.load(Ordering::Relaxed),
            requests_failed: self.counters.requests_failed.load(Ordering::Relaxed),
            requests_retried: self.counters.requests_retried.load(Ordering::Relaxed),
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    // Administrative invalidation: substring pattern, or everything when no
    // pattern is given.
    pub fn clear_cache(&self, pattern: Option<&str>) -> usize {
        let removed = self.cache.invalidate(pattern);
        match pattern {
            Some(pattern) => tracing::info!(pattern, removed, "cleared matching cache entries"),
            None => tracing::info!(removed, "cleared all cache entries"),
        }
        removed
    }

    // Applies to future cache writes only.
    pub fn set_cache_ttl(&self, ttl: Duration) {
        self.cache.set_default_ttl(ttl);
        tracing::info!(ttl_secs = ttl.as_secs(), "cache TTL updated");
    }
}

impl Default for TravelApiClient {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}
