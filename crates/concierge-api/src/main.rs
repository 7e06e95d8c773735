//! Concierge API Server
//!
//! Configuration comes from the TOML file named by `CONCIERGE_CONFIG` (if
//! set), overridden by environment variables.

use concierge_api::{create_router, data::Models, state::AppState};
use concierge_core::{AppConfig, LoggingConfig};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = match std::env::var("CONCIERGE_CONFIG") {
        Ok(path) => AppConfig::from_file(path)?.with_env_override()?,
        Err(_) => AppConfig::from_env()?,
    };

    // Initialize tracing
    init_tracing(&config.logging);

    // Connect to PostgreSQL
    let pool = PgPoolOptions::new()
        .max_connections(config.database.postgres_pool_size)
        .connect(&config.database.postgres_url)
        .await?;
    tracing::info!(
        pool_size = config.database.postgres_pool_size,
        "Connected to PostgreSQL"
    );

    let models = Models::postgres(pool, config.database.query_timeout());
    let addr = config.server.bind_addr();

    // Create application state and router
    let state = Arc::new(AppState::new(config, models)?);
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Concierge API Server starting on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "concierge_api={level},concierge_core={level},audit={level},tower_http=info",
            level = logging.level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json_format {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
