//! MSB demo service entry point

mod cli;

use crate::cli::{demo_service, Cli, Commands, DemoService};
use anyhow::{Context, Result};
use clap::Parser;
use msb_client::{ClientStatus, MsbClient, MsbConfig, Priority, ServiceClass, ServiceDescriptor, TlsMaterial};
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let uuid = cli.uuid.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let service = ServiceDescriptor::new(
        uuid,
        cli.token.clone(),
        ServiceClass::Application,
        cli.name.clone(),
        "Publishes a heartbeat and echoes calls",
    );

    match cli.command {
        Commands::Describe => describe(service),
        Commands::Run {
            url,
            interval,
            sockjs,
            origin,
            cert,
            key,
            ca,
            insecure,
            debug,
        } => {
            let mut config = MsbConfig::new(&url).with_context(|| format!("Invalid broker URL: {}", url))?;
            if let Some(origin) = origin {
                config = config.origin(origin);
            }
            if let Some(material) = tls_material(cert, key, ca) {
                config = config.tls(material);
            }
            if insecure {
                config = config.dangerous_skip_hostname_verify();
            }
            if debug {
                config = config.debug();
            }
            run(config, service, interval, sockjs).await
        }
    }
}

fn tls_material(cert: Option<PathBuf>, key: Option<PathBuf>, ca: Option<PathBuf>) -> Option<TlsMaterial> {
    let material = TlsMaterial::new(cert?, key?);
    Some(match ca {
        Some(ca) => material.ca(ca),
        None => material,
    })
}

fn describe(service: ServiceDescriptor) -> Result<()> {
    let config = MsbConfig::new("ws://localhost")?;
    let client = MsbClient::new(config, service)?;
    demo_service(&client, 5)?;

    println!("{}", serde_json::to_string_pretty(&client.self_description())?);
    Ok(())
}

async fn run(config: MsbConfig, service: ServiceDescriptor, interval: i32, sockjs: bool) -> Result<()> {
    let debug = config.debug;
    let client = MsbClient::new(config, service).context("Failed to create client")?;
    let DemoService { interval } = demo_service(&client, interval)?;

    if sockjs {
        client.generate_sockjs_path();
    }
    if debug {
        client.set_debug_sink(|line| eprintln!("[msb] {}", line));
    }

    client.run().context("Failed to start state machine")?;

    let mut status = client.state_receiver();
    let mut beat: i64 = 0;
    loop {
        let secs = (*interval.read()).max(1) as u64;
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                if client.status() == ClientStatus::Registered {
                    beat += 1;
                    if !client.publish(cli::HEARTBEAT, Priority::Low, beat, None) {
                        warn!(beat, "Heartbeat dropped");
                    }
                }
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                info!(status = %*status.borrow(), "Client status");
            }
            _ = shutdown_signal() => {
                info!("Shutdown signal received, stopping client");
                break;
            }
        }
    }

    client.shutdown().context("Failed to stop client")?;
    info!("Stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
