// Admission control for calls against the upstream provider.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

// Bounds how many producer calls run against the provider at once. Waiters
// queue in FIFO order on the semaphore and suspend cooperatively; the
// wrapped operation's output passes through untouched.
pub struct ConcurrencyLimiter {
    permits: Arc<Semaphore>,
    max_concurrent: usize,
}

impl ConcurrencyLimiter {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub async fn run<F, Fut, T>(&self, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        // acquire() only fails after close(), which this limiter never calls.
        let _permit = self
            .permits
            .acquire()
            .await
            .expect("limiter semaphore closed");
        f().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_never_exceeds_limit() {
        let limiter = Arc::new(ConcurrencyLimiter::new(2));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let limiter = Arc::clone(&limiter);
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                limiter
                    .run(|| async move {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(limiter.available(), 2);
    }

    #[test]
    fn test_output_passes_through_unchanged() {
        let limiter = ConcurrencyLimiter::new(1);

        let ok = tokio_test::block_on(limiter.run(|| async { Ok::<_, String>(7) }));
        assert_eq!(ok, Ok(7));

        let err = tokio_test::block_on(limiter.run(|| async { Err::<i32, _>("boom".to_string()) }));
        assert_eq!(err, Err("boom".to_string()));
    }

    #[tokio::test]
    async fn test_slot_released_after_completion() {
        let limiter = ConcurrencyLimiter::new(1);
        assert_eq!(limiter.max_concurrent(), 1);

        limiter.run(|| async {}).await;
        limiter.run(|| async {}).await;
        assert_eq!(limiter.available(), 1);
    }
}
