use async_trait::async_trait;
use std::time::Duration;

/// Rolling fixed-window connection counter. Not required to be
/// sliding-window-exact; one increment-or-set-with-expiry per key is
/// sufficient.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Increments the counter for `key` (creating it with `window` TTL on
    /// first use) and returns the post-increment count.
    async fn increment(&self, key: &str, window: Duration) -> anyhow::Result<u64>;
}

pub fn rate_limit_key_for_user(user_id: &str) -> String {
    format!("ws_rate_user_{user_id}")
}

pub fn rate_limit_key_for_ip(ip: &str) -> String {
    format!("ws_rate_ip_{ip}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_by_kind() {
        assert_eq!(rate_limit_key_for_user("u1"), "ws_rate_user_u1");
        assert_eq!(rate_limit_key_for_ip("1.2.3.4"), "ws_rate_ip_1.2.3.4");
    }
}
