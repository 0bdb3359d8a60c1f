pub mod auth;
pub mod commands;
pub mod error;
pub mod render;
pub mod state;

pub use commands::Cli;
pub use error::AppError;
pub use state::AppState;

use anyhow::Context;
use gatepass_store::app_config::Config;
use tracing::info;

/// Load configuration, wire the app state and run one command.
/// Returns the text to print on success.
pub async fn run(cli: Cli) -> Result<String, AppError> {
    let config = Config::load_from(&cli.config_dir).context("Failed to load configuration")?;
    info!("Using backend at {}", config.backend.base_url);

    let state = AppState::from_config(&config)?;
    commands::execute(cli.command, &state, cli.json).await
}
