//! Timetabler server: boots the pool, the queue gateway, and the HTTP
//! control surface.

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use timetabler_core::orchestration::topics;
use timetabler_core::web::{self, AppState};
use timetabler_core::{ConfigManager, OptimizationOrchestrator, PgmqGateway};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ConfigManager::load().context("loading configuration")?;
    let database_url = config.database.url();

    let pool = PgPoolOptions::new()
        .max_connections(config.database.pool)
        .connect(&database_url)
        .await
        .context("connecting to database")?;

    let gateway = PgmqGateway::new_with_pool(pool.clone(), config.messaging.clone()).await;
    gateway
        .ensure_queues(&[topics::OPTIMIZE_TIMETABLE, topics::TEST_CONNECTION])
        .await
        .context("creating solver queues")?;

    let orchestrator = Arc::new(OptimizationOrchestrator::new(
        pool.clone(),
        Arc::new(gateway),
    ));
    let app = web::router(AppState::new(pool, orchestrator));

    let listener = tokio::net::TcpListener::bind(&config.web.bind_address)
        .await
        .with_context(|| format!("binding {}", config.web.bind_address))?;
    info!(address = %config.web.bind_address, "timetabler server listening");

    axum::serve(listener, app).await.context("serving")?;
    Ok(())
}
