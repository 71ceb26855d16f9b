//! TinySQL Server Binary
//!
//! Starts the TCP server for TinySQL.

use std::sync::Arc;

use clap::Parser;
use tinysql::{AckHandler, Server, ServerConfig};
use tracing_subscriber::{fmt, EnvFilter};

/// TinySQL Server
#[derive(Parser, Debug)]
#[command(name = "tinysql-server")]
#[command(about = "Minimal SQL server speaking the TinySQL wire protocol")]
#[command(version)]
struct Args {
    /// Host to bind
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to bind
    #[arg(short = 'P', long, default_value = "4000")]
    port: u16,

    /// Default database for new sessions
    #[arg(short, long, default_value = "test")]
    database: String,

    /// Maximum concurrent connections (0 = unlimited)
    #[arg(short, long, default_value = "0")]
    max_connections: usize,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tinysql=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .init();

    let args = Args::parse();

    tracing::info!("TinySQL Server v{}", tinysql::VERSION);

    let config = match ServerConfig::builder()
        .listen_addr(format!("{}:{}", args.host, args.port))
        .default_database(&args.database)
        .max_connections(args.max_connections)
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let server = match Server::bind(config, Arc::new(AckHandler)) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to init server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
