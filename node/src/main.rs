use anyhow::Result;
use log::info;
use tokio::signal;
use tokio_util::sync::CancellationToken;

mod commands;
mod config;
mod error;

use config::{Mode, NodeConfig};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = NodeConfig::from_env()?;
    info!(mode:? = config.mode; "starting node");

    let engine = commands::build_engine(&config)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("received SIGINT, cancelling");
            on_signal.cancel();
        }
    });

    match config.mode {
        Mode::Evaluate => commands::evaluate(&config, &engine),
        Mode::Train => commands::train(&config, &engine, cancel).await,
        Mode::Predict => commands::predict(&config, engine).await,
    }
}
