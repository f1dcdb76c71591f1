use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use birthday_admin_api::config;
use birthday_admin_api::database::{manager, schema};
use birthday_admin_api::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let config = config::config();
    config.validate().context("invalid configuration")?;
    tracing::info!("Starting Birthday Admin API in {:?} mode", config.environment);

    // The pool connects on first use so the server can come up (and report
    // 503 from /health) while the database is still starting.
    let pool = manager::connect_lazy(&config.database).context("database pool")?;
    match schema::migrate(&pool).await {
        Ok(()) => tracing::info!("Database schema is up to date"),
        Err(e) => tracing::error!("Schema migration failed, continuing: {}", e),
    }

    let state = AppState::new(pool, config).context("application state")?;
    let cache = state.cache.clone();
    cache.start_sweeper(Duration::from_secs(config.cache.sweep_interval_secs.max(1)));

    if config.api.enable_rate_limiting {
        tracing::info!(
            "Rate limiting {} requests per {}s per client",
            config.api.rate_limit_requests,
            config.api.rate_limit_window_secs
        );
    }
    let router = app(state, config);

    let bind_addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("Birthday Admin API listening on http://{}", bind_addr);

    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    cache.close();
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
