//! Server entry point: configuration, database, startup checks, serve.

use tracing_subscriber::EnvFilter;

use claimflow_server::services::ensure_default_affiliate;
use claimflow_server::{create_router, db, AppConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,claimflow_server=debug")),
        )
        .init();

    let config = AppConfig::from_env()?;

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    // Fail fast: a missing default-affiliate credential row would otherwise
    // surface as a per-lead delivery failure.
    ensure_default_affiliate(&pool, &config.default_aff_id).await?;

    let bind_addr = config.bind_addr.clone();
    let router = create_router(AppState::new(pool, config));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("claimflow server listening on http://{}", bind_addr);
    axum::serve(listener, router).await?;

    Ok(())
}
