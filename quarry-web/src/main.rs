//! Quarry Web Server
//!
//! HTTP API for web research reports.

use clap::Parser;
use quarry_core::{init_logging, QuarryConfig};
use quarry_web::{AppState, QuarryServer, WebConfig};
use std::path::PathBuf;

/// Quarry Web Server - research reports over HTTP
#[derive(Parser)]
#[command(name = "quarry-web")]
#[command(about = "HTTP API for Quarry research reports")]
#[command(version)]
struct Args {
    /// Server host to bind to (overrides QUARRY_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Server port to listen on (overrides QUARRY_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Load environment variables before anything reads them
    dotenvy::dotenv().ok();

    let quarry = match QuarryConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let mut logging = quarry.logging.clone();
    logging.level = args.log_level;
    logging
        .filter_directives
        .extend(["quarry_web=info".to_string(), "tower_http=debug".to_string()]);
    if let Err(e) = init_logging(&logging) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    let mut config = WebConfig::from_env();
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    let state = match AppState::from_config(config.clone(), &quarry) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Failed to build research pipeline: {}", e);
            std::process::exit(1);
        }
    };

    println!("Starting Quarry Web Server on http://{}", config.address());
    if let Err(e) = QuarryServer::new(config, state).start().await {
        eprintln!("Server failed: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["quarry-web"]);
        assert!(args.host.is_none());
        assert!(args.port.is_none());
        assert_eq!(args.log_level, "info");

        let args = Args::parse_from(["quarry-web", "--host", "0.0.0.0", "--port", "8080"]);
        assert_eq!(args.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(args.port, Some(8080));
    }
}
