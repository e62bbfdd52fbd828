use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::application::ports::rate_limiter::RateLimiter;

struct Bucket {
    count: u64,
    expires_at: Instant,
}

/// Single-process fallback for deployments (and tests) that run without a
/// Redis backplane. Fixed window, same semantics as
/// [`RedisRateLimiter`](super::redis_rate_limiter::RedisRateLimiter).
#[derive(Default)]
pub struct InMemoryRateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn increment(&self, key: &str, window: Duration) -> anyhow::Result<u64> {
        let mut buckets = self.buckets.lock().unwrap();
        let now = Instant::now();
        let bucket = buckets.entry(key.to_string()).or_insert(Bucket { count: 0, expires_at: now });
        if bucket.count == 0 || now >= bucket.expires_at {
            bucket.count = 0;
            bucket.expires_at = now + window;
        }
        bucket.count += 1;
        Ok(bucket.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resets_after_window_elapses() {
        let limiter = InMemoryRateLimiter::default();
        let window = Duration::from_millis(20);
        assert_eq!(limiter.increment("k", window).await.unwrap(), 1);
        assert_eq!(limiter.increment("k", window).await.unwrap(), 2);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(limiter.increment("k", window).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn independent_keys_do_not_share_counters() {
        let limiter = InMemoryRateLimiter::default();
        let window = Duration::from_secs(60);
        assert_eq!(limiter.increment("a", window).await.unwrap(), 1);
        assert_eq!(limiter.increment("b", window).await.unwrap(), 1);
        assert_eq!(limiter.increment("a", window).await.unwrap(), 2);
    }
}
