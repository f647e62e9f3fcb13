pub mod health;
pub mod tracing;

pub use health::{ComponentStatus, HealthChecker, HealthStatus};
pub use tracing::init_tracing;
