use anyhow::{Context, Result};
use apigateway::{handler::AppRouter, state::AppState};
use dotenv::dotenv;
use shared::{config::Config, utils::init_logger};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let config = Config::init().context("Failed to load configuration")?;

    let _guard = init_logger("apigateway", config.is_dev, config.enable_file_log);

    let state = AppState::new(&config).context("Failed to create AppState")?;

    info!(port = config.port, "Starting marketplace gateway");

    AppRouter::serve(config.port, state)
        .await
        .context("Failed to start server")?;

    info!("Server shut down");

    Ok(())
}
