pub mod control_frame;
pub mod handler;
pub mod protocol;

pub use handler::routes;
