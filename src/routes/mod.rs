//! HTTP routes for docbridge

pub mod events;
pub mod health;

pub use events::handle_event;
pub use health::{health_check, HealthResponse};
