use crate::{config::DatabaseConfig, errors::Result};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Reported in `pg_stat_activity` for every hub connection
pub const APPLICATION_NAME: &str = "hub-portal";

/// Create the pool shared by the remote store and the realtime listener
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let options = PgConnectOptions::from_str(&config.url)?.application_name(APPLICATION_NAME);

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections.min(config.max_connections))
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
        .connect_with(options)
        .await?;

    tracing::info!(
        "Connected as {} (pool {}..={})",
        APPLICATION_NAME,
        config.min_connections.min(config.max_connections),
        config.max_connections
    );

    Ok(pool)
}

/// Create the hub tables and the change-notification trigger
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./src/db/migrations").run(pool).await?;
    tracing::info!("Hub schema is up to date");
    Ok(())
}

/// Round-trip a trivial query; returns how long it took
pub async fn health_check(pool: &PgPool) -> Result<Duration> {
    let started = Instant::now();
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(started.elapsed())
}
