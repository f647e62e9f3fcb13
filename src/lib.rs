pub mod config;
pub mod context;
pub mod db;
pub mod domain;
pub mod errors;
pub mod loading;
pub mod local;
pub mod notifications;
pub mod observability;
pub mod palette;
pub mod services;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use context::{HubContext, RunningHub};
pub use errors::{AppError, Result};
