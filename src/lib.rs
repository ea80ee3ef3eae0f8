pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod rag;
pub mod relay;
pub mod search;
pub mod server;

use cli::Args;
use config::AppConfig;
use relay::CompletionRelay;
use server::Server;
use std::error::Error;
use std::sync::Arc;
use log::info;

/// Validates `args`, builds the provider clients and serves until shutdown.
/// Fails before binding when a credential is missing.
pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = AppConfig::from_args(&args)?;
    config.log_summary();

    let relay = Arc::new(CompletionRelay::from_config(&config)?);
    info!("Starting server on: {}", config.server_addr);
    let server = Server::new(&config, relay);
    server.run().await?;

    Ok(())
}
