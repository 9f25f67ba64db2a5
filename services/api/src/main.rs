use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use common::{
    database::{DatabaseConfig, health_check, init_pool},
    error::DatabaseError,
};
use hms_api::{
    AppState,
    config::AppConfig,
    jwt::JwtService,
    repositories::{PgActivityStore, PgUserStore},
    routes,
    scheduler::SweepScheduler,
    service::UserService,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting API service");

    let config = Arc::new(AppConfig::from_env()?);

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    if health_check(&pool).await {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;

    let users = UserService::new(
        Arc::new(PgUserStore::new(pool.clone())),
        Arc::new(PgActivityStore::new(pool)),
        JwtService::new(config.jwt.clone()),
        config.sweep.thresholds,
    );

    let sweeper = SweepScheduler::new(users.clone());
    let mut scheduler = sweeper.start(&config.sweep.schedule).await?;
    if config.sweep.run_on_startup {
        sweeper.run_logged().await;
    }

    let app = routes::create_router(AppState::new(config.clone(), users));

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!("API service listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = scheduler.shutdown().await {
        warn!("Failed to stop sweep scheduler: {}", e);
    }
    info!("API service stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
