use anyhow::Context;
use kardio_learning::{AppConfig, AppState, tracing::init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from `.env` and the environment
    let config = AppConfig::from_env().context("failed to load configuration")?;
    init_tracing(&config.env);

    // Connecting creates the database if needed and applies pending migrations
    let state = AppState::connect(&config).await?;

    tracing::info!(environment = ?state.environment, "Database is up to date");
    Ok(())
}
