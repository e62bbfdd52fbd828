pub mod permission_repository;
pub mod rate_limiter;
pub mod room_hub;
pub mod update_store;
