//! Parlor server binary.
//!
//! # Usage
//!
//! ```bash
//! # Default endpoint (port 1000, all interfaces)
//! parlor-server
//!
//! # Custom endpoint with debug logging
//! parlor-server --bind 127.0.0.1:4242 --log-level debug
//! ```

use clap::Parser;
use parlor_server::{ChatServer, ServerConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Parlor chat server
#[derive(Parser, Debug)]
#[command(name = "parlor-server")]
#[command(about = "Single-room chat broadcast server")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:1000")]
    bind: String,

    /// Per-session outbound queue depth
    #[arg(long, default_value = "64")]
    channel_capacity: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config =
        ServerConfig { bind_address: args.bind, channel_capacity: args.channel_capacity };

    let server = ChatServer::bind(config).await?;
    tracing::info!("server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
