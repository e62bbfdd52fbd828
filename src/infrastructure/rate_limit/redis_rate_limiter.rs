use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;

use crate::application::ports::rate_limiter::RateLimiter;

/// Fixed-window counter backed by Redis `INCR` + `EXPIRE`: the first
/// increment for a key sets its TTL to the window size, subsequent
/// increments within the window leave the TTL untouched so the window
/// doesn't reset on every connect attempt.
#[derive(Clone)]
pub struct RedisRateLimiter {
    client: redis::Client,
}

impl RedisRateLimiter {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn increment(&self, key: &str, window: Duration) -> anyhow::Result<u64> {
        let mut conn = self.client.get_async_connection().await?;
        let count: u64 = conn.incr(key, 1u64).await?;
        if count == 1 {
            let _: bool = conn.expire(key, window.as_secs() as i64).await?;
        }
        Ok(count)
    }
}
