//! Tearoom - room-based chat server
//!
//! A thin wrapper around the network library that sets up logging, loads
//! the token verification key, and runs until interrupted.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tearoom_net::Server;

mod config;

use config::CliArgs;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting Tearoom");

    let args = CliArgs::parse();

    let verifier = match args.verifier() {
        Ok(verifier) => verifier,
        Err(e) => {
            tracing::error!("Failed to load verification key: {}", e);
            std::process::exit(1);
        }
    };

    let server = match Server::start(args.port, verifier).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    server.shutdown();
}
