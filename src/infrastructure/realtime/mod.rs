pub mod local_hub;
pub mod redis_backplane;
pub mod room_actor;
