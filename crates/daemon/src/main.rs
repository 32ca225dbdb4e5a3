//! Vmfish Daemon
//!
//! Runs one Redfish gateway per configured vSphere VM.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vmfish_common::SessionFactory;

mod config;
mod supervisor;
mod tls;

use config::VmfishConfig;
use supervisor::Supervisor;

#[derive(Parser)]
#[command(name = "vmfishd")]
#[command(about = "Vmfish daemon - Redfish BMC gateways for vSphere VMs")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "VMFISH_CONFIG", default_value = "vmfish.toml")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    info!("Vmfish daemon v{}", env!("CARGO_PKG_VERSION"));

    let config = VmfishConfig::load(&cli.config)?;
    config.validate()?;

    if !config.platform.verify_tls {
        warn!(
            "TLS certificate verification towards {} is disabled",
            config.platform.host
        );
    }
    if config.service_credential().is_none() {
        info!("No service credential configured, prompt dismissal uses caller credentials");
    }

    let tls = match &config.tls {
        Some(tls_config) => Some(tls::load_server_config(tls_config)?),
        None => None,
    };

    let platform: Arc<dyn SessionFactory> = Arc::new(config.connector());
    let mut supervisor = Supervisor::start(&config, platform, tls)?;

    info!("Daemon started with {} gateway(s)", supervisor.len());

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = supervisor.wait_any() => {
            if let Err(e) = result {
                error!("{:#}", e);
            }
        }
    }

    supervisor.shutdown().await;
    info!("Daemon shutdown complete");
    Ok(())
}
