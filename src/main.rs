use std::sync::Arc;

use strength_coach::api::routes::{create_routes, AppState};
use strength_coach::config::{run_migrations, AppConfig, DatabaseConfig, DatabaseSeeder};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let db_config = DatabaseConfig::from_env()?;
    let pool = db_config.create_pool().await?;
    run_migrations(&pool).await?;

    if config.seed_on_startup {
        if config.is_production() {
            tracing::warn!("SEED_ON_STARTUP is enabled in production");
        }
        DatabaseSeeder::new(pool.clone()).seed_all().await?;
    }

    let address = config.server_address();
    let state = AppState::new(pool, Arc::new(config))?;
    let app = create_routes(state);

    let listener = TcpListener::bind(&address).await?;
    info!("Strength coach server starting on http://{}", address);
    info!("Health check available at http://{}/health", address);

    axum::serve(listener, app).await?;

    Ok(())
}
