use clap::Parser;
use log::info;
use server::network::{Server, ServerConfig, DEFAULT_MAX_CONNECTIONS};
use shared::DEFAULT_PORT;
use std::time::Duration;

/// Tug-of-war territory game server
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,
    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Milliseconds a lone team must hold a cell to claim it
    #[arg(long, default_value_t = 2000)]
    claim_dwell_ms: u64,
    /// Connections served concurrently
    #[arg(short, long, default_value_t = DEFAULT_MAX_CONNECTIONS)]
    max_connections: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Tip: set RUST_LOG=info (or debug) to see server logs");
    }
    env_logger::init();

    let args = Args::parse();
    let config = ServerConfig {
        addr: format!("{}:{}", args.host, args.port),
        claim_dwell: Duration::from_millis(args.claim_dwell_ms),
        max_connections: args.max_connections,
    };

    let server = Server::bind(config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
