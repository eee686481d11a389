mod health;
mod proxy;

pub use health::{BACKEND_HEALTH_ENDPOINT, health_check, readiness_check};
pub use proxy::{forward_nested, forward_root, not_found};
