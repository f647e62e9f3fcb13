use hub_portal::{
    config::Config,
    context::HubContext,
    db::{create_pool, run_migrations, ChangeFeed, PgRealtime, PgStore},
    local::FileStore,
    notifications::SchedulerSettings,
    observability::{init_tracing, HealthChecker},
    session::{AuthUser, Session},
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load()?;
    config.validate()?;

    // Initialize tracing/logging
    init_tracing(&config.observability)?;

    tracing::info!("Starting hub portal");

    // Create database connection pool
    let db_pool = create_pool(&config.database).await?;
    tracing::info!("Database connection pool created");

    if config.database.run_migrations {
        run_migrations(&db_pool).await?;
        tracing::info!("Database migrations completed");
    }

    // Forward row changes into the in-process feed
    let feed = ChangeFeed::new(config.realtime.buffer_size);
    let realtime = if config.realtime.enabled {
        Some(PgRealtime::start(&db_pool, feed.clone()).await?)
    } else {
        tracing::warn!("Realtime disabled; data refreshes only on mutations");
        None
    };

    let health = HealthChecker::new(db_pool.clone(), config.realtime.enabled);
    let status = health
        .readiness(realtime.as_ref().map(PgRealtime::is_running).unwrap_or(false))
        .await;
    tracing::info!("Health: {}", serde_json::to_string(&status)?);

    let local = FileStore::open(&config.storage.path)?;
    tracing::info!("Local store at {}", local.path().display());

    let session = Session::signed_out();
    match config.session.user_id {
        Some(id) => {
            let mut user = AuthUser::new(id);
            if let Some(email) = &config.session.email {
                user = user.with_email(email);
            }
            if let Some(name) = &config.session.full_name {
                user = user.with_full_name(name);
            }
            session.sign_in(user);
        }
        None => tracing::warn!("No session user configured; running signed out"),
    }

    let ctx = HubContext::new(
        Arc::new(PgStore::new(db_pool.clone())),
        feed,
        Arc::new(local),
        session,
    )
    .with_key_prefix(&config.storage.key_prefix)
    .with_scheduler_settings(SchedulerSettings::from(&config.notifications));

    let hub = ctx.start().await;
    if let Some(profile) = hub.profile.profile() {
        tracing::info!("Signed in as {}", profile.display_name());
    }
    if let Some(completion) = hub.completion.completion() {
        if !completion.is_complete {
            tracing::warn!(
                "Profile incomplete, missing: {}",
                completion
                    .missing_fields
                    .iter()
                    .map(|f| f.label())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }

    tracing::info!("Hub portal is running; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down");
    hub.shutdown();
    if let Some(realtime) = realtime {
        realtime.stop();
    }
    db_pool.close().await;

    Ok(())
}
