// TTL cache for provider responses, shared by every remote lookup.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;

// Keys embed the request parameters; anything past this many rendered bytes
// is cut off so large payloads cannot produce unbounded keys.
const MAX_PARAMS_IN_KEY: usize = 50;

#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    pub key_count: usize,
    pub hit_count: usize,
    pub miss_count: usize,
    pub expired_count: usize,
}

struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

// Concurrent store keyed by request fingerprints. Expiration is lazy: an
// expired entry is dropped when it is next read, or swept when stats are
// taken. Only successful results are ever written here.
pub struct ResponseCache {
    store: DashMap<String, CacheEntry>,
    default_ttl: RwLock<Duration>,
    hits: AtomicUsize,
    misses: AtomicUsize,
    expired: AtomicUsize,
}

impl ResponseCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            store: DashMap::new(),
            default_ttl: RwLock::new(default_ttl),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            expired: AtomicUsize::new(0),
        }
    }

    // Returns the stored value unless it is missing or past its expiration.
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        match self.store.get(key) {
            Some(entry) if entry.expires_at > now => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            Some(entry) => {
                // Expired entries are logically absent.
                drop(entry);
                self.store.remove(key);
                self.expired.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    // Stores with the current default TTL. Writing an existing key replaces
    // the entry and resets its expiration.
    pub fn set(&self, key: &str, value: Value) {
        let ttl = *self.default_ttl.read();
        self.set_with_ttl(key, value, ttl);
    }

    pub fn set_with_ttl(&self, key: &str, value: Value, ttl: Duration) {
        self.store.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    // Applies to future writes only; entries already stored keep the
    // expiration they were written with.
    pub fn set_default_ttl(&self, ttl: Duration) {
        *self.default_ttl.write() = ttl;
    }

    pub fn default_ttl(&self) -> Duration {
        *self.default_ttl.read()
    }

    // Removes entries whose key contains the pattern, or everything when no
    // pattern is given. Returns how many entries were dropped.
    pub fn invalidate(&self, pattern: Option<&str>) -> usize {
        match pattern {
            Some(pattern) => {
                let keys: Vec<String> = self
                    .store
                    .iter()
                    .filter(|entry| entry.key().contains(pattern))
                    .map(|entry| entry.key().clone())
                    .collect();

                let mut removed = 0;
                for key in keys {
                    if self.store.remove(&key).is_some() {
                        removed += 1;
                    }
                }
                removed
            }
            None => {
                let removed = self.store.len();
                self.store.clear();
                removed
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.purge_expired();
        CacheStats {
            key_count: self.store.len(),
            hit_count: self.hits.load(Ordering::Relaxed),
            miss_count: self.misses.load(Ordering::Relaxed),
            expired_count: self.expired.load(Ordering::Relaxed),
        }
    }

    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.store.len();
        self.store.retain(|_, entry| entry.expires_at > now);
        let purged = before.saturating_sub(self.store.len());
        if purged > 0 {
            self.expired.fetch_add(purged, Ordering::Relaxed);
        }
        purged
    }
}

// Builds a deterministic cache key from an operation name and its
// parameters. The rendered parameters are truncated on a character boundary.
pub fn request_fingerprint(operation: &str, params: &Value) -> String {
    let mut rendered = params.to_string();
    if rendered.len() > MAX_PARAMS_IN_KEY {
        let mut end = MAX_PARAMS_IN_KEY;
        while !rendered.is_char_boundary(end) {
            end -= 1;
        }
        rendered.truncate(end);
    }
    format!("{operation}-{rendered}")
}
