//! Tokengate CLI
//!
//! Starts the token-validation gateway.

use clap::Parser;
use std::path::PathBuf;
use std::process;
use tokengate_gatekeeper::{start_server, GatewayConfig, GatewayError};

/// Tokengate - token-validation gateway in front of an upstream service.
#[derive(Debug, Parser)]
#[command(name = "tokengate")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "TOKENGATE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run() -> Result<(), GatewayError> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => GatewayConfig::from_file(path)?,
        None => {
            eprintln!("Warning: No config file specified, using default test configuration");
            eprintln!("Usage: tokengate --config <path-to-config.toml>");
            eprintln!();
            GatewayConfig::default_test_config()
        }
    };

    start_server(config).await
}
