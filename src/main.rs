//! Request Gateway - Main Application Entry Point
//!
//! Authenticates and rate-limits requests for a multi-tenant HTTP API.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Open the client directory (PostgreSQL or JSON file)
//! 3. Build the auth gateway and start the nonce sweeper
//! 4. Build HTTP router with routes and middleware
//! 5. Serve on the configured port until Ctrl+C

use std::{net::SocketAddr, sync::Arc};

use anyhow::bail;
use tracing_subscriber::EnvFilter;

use request_gateway::{
    app::{self, AppState},
    auth::AuthGateway,
    config::Config,
    db,
    services::directory::{ClientDirectory, InMemoryDirectory, PgClientDirectory},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    let gateway_config = config.gateway();
    tracing::info!(
        strict_mode = gateway_config.strict_mode,
        date_skew_secs = gateway_config.date_skew.as_secs(),
        nonce_ttl_secs = gateway_config.nonce_ttl.as_secs(),
        default_rate_per_minute = gateway_config.default_rate_per_minute,
        "Configuration loaded"
    );

    let directory: Arc<dyn ClientDirectory> = match (&config.database_url, &config.clients_file) {
        (Some(database_url), _) => {
            let pool = db::create_pool(database_url).await?;
            tracing::info!("Database pool created");

            db::run_migrations(&pool).await?;
            tracing::info!("Database migrations complete");

            Arc::new(PgClientDirectory::new(pool))
        }
        (None, Some(path)) => {
            let directory = InMemoryDirectory::from_json_file(path)?;
            tracing::info!(clients = directory.len(), path = %path.display(), "Client file loaded");
            Arc::new(directory)
        }
        (None, None) => bail!("either DATABASE_URL or CLIENTS_FILE must be set"),
    };

    let gateway = AuthGateway::new(gateway_config, directory);
    let sweeper = gateway.spawn_nonce_sweeper();
    let app = app::router(AppState::new(gateway));

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Connect info supplies the peer address for allowlisting
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.shutdown().await;
    tracing::info!("Server stopped");

    Ok(())
}

/// Wait for Ctrl+C.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
