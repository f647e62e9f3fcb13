use serde::{Deserialize, Serialize};
use sqlx::PgPool;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthChecks {
    pub database: ComponentStatus,
    pub realtime: ComponentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComponentStatus {
    pub status: String,
    pub message: Option<String>,
}

impl ComponentStatus {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: Some(message.into()),
        }
    }

    pub fn disabled() -> Self {
        Self {
            status: "disabled".to_string(),
            message: None,
        }
    }

    /// Disabled components do not degrade the hub
    fn is_healthy(&self) -> bool {
        self.status != "error"
    }
}

/// Startup and readiness checks of the daemon's backends
pub struct HealthChecker {
    db_pool: PgPool,
    realtime_enabled: bool,
}

impl HealthChecker {
    pub fn new(db_pool: PgPool, realtime_enabled: bool) -> Self {
        Self {
            db_pool,
            realtime_enabled,
        }
    }

    /// Readiness check - can the hub reach its backends?
    pub async fn readiness(&self, realtime_listening: bool) -> HealthStatus {
        let database = self.check_database().await;
        let realtime = if !self.realtime_enabled {
            ComponentStatus::disabled()
        } else if realtime_listening {
            ComponentStatus::ok()
        } else {
            ComponentStatus::error("Realtime listener is not running")
        };

        summarize(database, realtime)
    }

    async fn check_database(&self) -> ComponentStatus {
        match crate::db::health_check(&self.db_pool).await {
            Ok(latency) => {
                tracing::debug!("Database answered in {:?}", latency);
                ComponentStatus::ok()
            }
            Err(e) => ComponentStatus::error(format!("Database check failed: {}", e)),
        }
    }
}

fn summarize(database: ComponentStatus, realtime: ComponentStatus) -> HealthStatus {
    let status = if database.is_healthy() && realtime.is_healthy() {
        "ok"
    } else {
        "degraded"
    };

    HealthStatus {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks { database, realtime },
    }
}
