use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::info;

use windowguard::config::WindowguardConfig;
use windowguard::http::HttpServer;
use windowguard::logging;
use windowguard::ratelimit::RateLimiter;

/// Sliding-window rate limit decision service.
#[derive(Debug, Parser)]
#[command(name = "windowguard", version, about)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the HTTP listen address
    #[arg(short, long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = WindowguardConfig::load(cli.config.as_deref())?;
    if let Some(listen) = cli.listen {
        config.server.http_addr = listen;
    }

    logging::init(&config.logging);

    info!("Starting Windowguard Rate Limiting Service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(http_addr = %config.server.http_addr, "Configuration loaded");

    // Connects to Redis once; failures fall back to in-memory limiting
    let rate_limiter = Arc::new(RateLimiter::from_config(&config.rate_limiting).await);

    let server = HttpServer::new(
        config.server.http_addr,
        rate_limiter,
        config.rate_limiting.quotas.clone(),
    );
    server.serve_with_shutdown(shutdown_signal()).await?;

    info!("Windowguard Rate Limiting Service stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
