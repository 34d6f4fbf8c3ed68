//! # Fundflow Server
//! WebSocket front end of the fund flow analysis engine.
//!
//! Clients send JSON requests tagged by `type` (`symbols`, `intervals`, `health`,
//! `analyze`). An `analyze` request fetches spot and futures candles plus order books
//! from Binance, runs the trend, anomaly and pressure classifiers, and asks a
//! chat-completions provider for a narrative interpretation.

use fundflow_data::{BinanceConfig, BinanceRestClient};
use std::{process::ExitCode, sync::Arc};
use tracing::{error, info};

mod config;
mod error;
mod gate;
mod message;
mod narrative;
mod pipeline;
mod server;

use config::ServerConfig;
use narrative::{ChatCompletionsClient, NarrativeConfig};
use server::{AppState, start_websocket_server};

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    info!("Starting fundflow analysis server");

    let config = ServerConfig::from_env();
    info!(
        addr = %config.addr,
        klines = config.klines_limit,
        depth = config.depth_limit,
        symbols = ?config.default_symbols,
        "Loaded server configuration"
    );

    let source = match BinanceConfig::from_env().and_then(BinanceRestClient::new) {
        Ok(source) => source,
        Err(e) => {
            error!("Failed to initialise Binance client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let narrator = match NarrativeConfig::from_env().and_then(ChatCompletionsClient::new) {
        Ok(narrator) => narrator,
        Err(e) => {
            error!("Failed to initialise narrative client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let addr = config.addr;
    let state = Arc::new(AppState::new(Arc::new(source), Arc::new(narrator), config));

    info!(
        "WebSocket server listening on ws://{} (up to {} concurrent analyses)",
        addr,
        state.gate.capacity()
    );

    tokio::select! {
        result = start_websocket_server(addr, state) => {
            if let Err(e) = result {
                error!("WebSocket server stopped: {}", e);
                return ExitCode::FAILURE;
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Server shutting down");
    ExitCode::SUCCESS
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
