//! poligent Daemon
//!
//! Accepts router connections and keeps every connected router in sync
//! with the desired policy document.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use poligent_core::config::{self, OrchestratorConfig};
use poligent_core::DesiredState;
use poligent_orchestrator::server::{ConnectionSettings, PeerEvent, PeerListener};
use poligent_orchestrator::{DesiredStateWatcher, Orchestrator};

#[derive(Parser)]
#[command(name = "poligent")]
#[command(about = "Keeps connected routers in sync with a desired policy")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config)
    #[arg(short, long)]
    bind: Option<String>,

    /// Desired-state document (overrides config)
    #[arg(short, long)]
    desired: Option<PathBuf>,

    /// Run in foreground with verbose output
    #[arg(short, long)]
    foreground: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Validate the desired-state document and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.foreground { "debug" } else { &args.log_level };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        config::load_config(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        let default_path = config::default_config_path();
        if default_path.exists() {
            config::load_config(&default_path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
                OrchestratorConfig::default()
            })
        } else {
            tracing::info!("Using default configuration");
            OrchestratorConfig::default()
        }
    };

    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    if let Some(desired) = args.desired {
        config.desired_state_path = desired;
    }
    config.validate().context("Invalid configuration")?;

    if args.check {
        let desired = DesiredState::load(&config.desired_state_path)
            .await
            .with_context(|| {
                format!("Invalid desired state in {:?}", config.desired_state_path)
            })?;
        tracing::info!(
            "Desired state in {:?} is valid ({} units)",
            config.desired_state_path,
            desired.len()
        );
        return Ok(());
    }

    let identity = config.process_identity();
    tracing::info!(
        "poligent starting as {} (product: {})",
        identity.container_id,
        identity.product
    );

    let orchestrator = Arc::new(Orchestrator::new(&config));

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Setup signal handlers
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }

        cancel_clone.cancel();
    });

    // Desired-state reloads
    let (desired_tx, mut desired_rx) = mpsc::channel::<DesiredState>(16);
    let orchestrator_clone = Arc::clone(&orchestrator);
    tokio::spawn(async move {
        while let Some(desired) = desired_rx.recv().await {
            orchestrator_clone.on_desired_state_loaded(desired);
        }
    });

    let watcher = DesiredStateWatcher::new(&config.desired_state_path, config.poll_interval);
    tokio::spawn(watcher.run(desired_tx, cancel.clone()));

    // Peer connection events
    let (event_tx, mut event_rx) = mpsc::channel::<PeerEvent>(256);
    let orchestrator_clone = Arc::clone(&orchestrator);
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            handle_peer_event(&orchestrator_clone, event);
        }
    });

    let settings = ConnectionSettings {
        identity,
        entity_type: config.entity_type.clone(),
        request_timeout: config.request_timeout,
        handshake_timeout: config.handshake_timeout,
    };
    let listener = PeerListener::new(settings, cancel.clone(), event_tx);

    listener.run(&config.bind_address).await?;

    cancel.cancel();
    tracing::info!("poligent shutdown complete");
    Ok(())
}

/// Handle events from connection handlers
fn handle_peer_event(orchestrator: &Arc<Orchestrator>, event: PeerEvent) {
    match event {
        PeerEvent::Connected {
            identity,
            connection_id,
            client,
        } => {
            // The sync cycle runs detached and logs its own outcome
            let _ = orchestrator.on_peer_connected(identity, connection_id, client);
        }

        PeerEvent::Disconnected {
            peer_id,
            connection_id,
        } => {
            orchestrator.on_peer_disconnected(&peer_id, connection_id);
        }
    }
}
