//! Termfleet Daemon - workstation fleet reconciliation service
//!
//! The daemon provides:
//! - REST API for workstation registration and lookup
//! - DNS A records for every registered workstation
//! - Reconciliation loop that probes workstations and applies lifecycle rules

use anyhow::Context;
use clap::Parser;
use termfleet_daemon::{DaemonConfig, Server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Termfleet Daemon CLI
#[derive(Parser)]
#[command(name = "termfleetd")]
#[command(about = "Termfleet Daemon - workstation fleet reconciliation service", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "TERMFLEET_CONFIG")]
    config: Option<String>,

    /// Listen address, overriding the configuration file
    #[arg(short, long, env = "TERMFLEET_LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level, overriding the configuration file
    #[arg(long, env = "TERMFLEET_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "TERMFLEET_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config =
        DaemonConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    // Override with CLI args
    if let Some(listen) = &cli.listen {
        config.server.listen_addr = listen
            .parse()
            .with_context(|| format!("Invalid listen address: {}", listen))?;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    config.validate().context("Invalid configuration")?;

    // Print startup banner
    println!(
        r#"
  Termfleet - workstation fleet daemon
  Version: {}
  Base domain: {}
  Listening: {}
"#,
        env!("CARGO_PKG_VERSION"),
        config.dns.base_domain,
        config.server.listen_addr
    );

    // Create and run server
    let server = Server::new(config)
        .await
        .context("Failed to start daemon")?;
    server.run().await?;

    Ok(())
}
