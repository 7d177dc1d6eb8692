use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use credit_api::auth::JwtProvider;
use credit_api::config::Config;
use credit_api::db::Database;
use credit_api::handlers::{build_router, AppState};
use credit_api::services::Clock;

/// Initializes logging, configuration and the database pool, then starts
/// the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "credit_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    let jwt = JwtProvider::new(config.jwt_secret.clone(), config.jwt_validity_secs);
    let state = Arc::new(AppState {
        db: db.pool.clone(),
        config: config.clone(),
        jwt,
        clock: Clock::System,
    });

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
