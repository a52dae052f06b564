use anyhow::{Context, Result};
use clap::Parser;
use std::net::IpAddr;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use server::{DualListener, ListenerConfig, Roster, RosterEvent};

/// Headless telemetry ingest: listens for live match telemetry and logs the
/// roster and reconstructed kills.
#[derive(Parser, Debug)]
#[command(name = "telemetry-server", version)]
struct Args {
    /// Address to bind (overrides TELEMETRY_BIND)
    #[arg(long)]
    bind: Option<IpAddr>,

    /// Port shared by UDP and TCP (overrides TELEMETRY_PORT)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if exists
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = ListenerConfig::from_env()
        .context("Invalid listener configuration")?
        .with_overrides(args.bind, args.port);

    let roster = Roster::new();
    let mut events = roster.subscribe();
    let mut listener = DualListener::new(roster.clone());
    let addr = listener
        .start(&config)
        .await
        .context("Failed to start telemetry listener")?;
    info!("Listening for telemetry on {}. Waiting for shutdown signal (Ctrl+C)...", addr);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
            event = events.recv() => {
                match event {
                    Ok(RosterEvent::PlayersChanged(names)) => {
                        info!(players = names.len(), "Players: {}", names.join(", "));
                    }
                    Ok(RosterEvent::Kill(kill)) => info!("{}", kill),
                    Ok(RosterEvent::Cleared) => info!("Roster cleared"),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Roster notifications lagged");
                        info!("Players: {}", roster.names().join(", "));
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    listener.stop().await;
    info!("Telemetry server shut down");
    Ok(())
}
