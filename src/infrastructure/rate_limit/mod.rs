pub mod in_memory;
pub mod redis_rate_limiter;

pub use in_memory::InMemoryRateLimiter;
pub use redis_rate_limiter::RedisRateLimiter;
