//! `camera-remote` - run the remote-command channel against a simulated camera.
//!
//! ```text
//! camera-remote --endpoint ws://192.168.4.1:9876/ --readout action-completed
//! ```
//!
//! Connects to the controller, reconnects with backoff when the connection
//! drops, and logs every latency readout until Ctrl+C.

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use camera_remote::{
    ChannelConfig, ChannelConfigBuilder, ChannelEvent, CommandDispatcher, ConnectionManager,
    EventBus, ReadoutMode, Result, SimulatedCamera, Supervisor,
};

// ============================================================================
// Cli
// ============================================================================

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "camera-remote", version, about)]
struct Cli {
    /// Controller WebSocket URL (ws:// only).
    #[arg(long)]
    endpoint: Option<String>,

    /// JSON config file; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Liveness probe timeout in milliseconds.
    #[arg(long)]
    probe_timeout_ms: Option<u64>,

    /// Latency readout trigger: `action-completed` or `command-starting`.
    #[arg(long)]
    readout: Option<ReadoutMode>,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn into_config(self) -> Result<ChannelConfig> {
        let mut builder = match &self.config {
            Some(path) => ChannelConfigBuilder::from_file(path)?,
            None => ChannelConfig::builder(),
        };

        if let Some(endpoint) = self.endpoint {
            builder = builder.endpoint(endpoint);
        }
        if let Some(ms) = self.probe_timeout_ms {
            builder = builder.probe_timeout(Duration::from_millis(ms));
        }
        if let Some(readout) = self.readout {
            builder = builder.readout(readout);
        }

        builder.build()
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging. `RUST_LOG` wins when set.
fn init_logging(debug: bool) {
    let filter = if debug {
        "camera_remote=debug"
    } else {
        "camera_remote=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();
}

/// Logs the events a UI would render.
fn report(event: &ChannelEvent) {
    match event {
        ChannelEvent::Connected { session } => info!(%session, "Controller connected"),
        ChannelEvent::Disconnected { session } => warn!(%session, "Controller disconnected"),
        ChannelEvent::LatencyMeasured(reading) => info!("{reading}"),
        ChannelEvent::CommandStarting(_) => {}
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.into_config()?;
    info!(endpoint = %config.endpoint, readout = %config.readout, "Starting camera remote");

    let bus = Arc::new(EventBus::new());
    bus.subscribe(report);

    let camera = Arc::new(SimulatedCamera::new());
    let dispatcher = Arc::new(CommandDispatcher::new(&config, bus, camera.clone()));
    camera.set_completion(dispatcher.completion_signal());

    let supervisor = Supervisor::new(ConnectionManager::websocket(config, dispatcher));
    supervisor
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl+C");
            }
        })
        .await;

    let state = camera.state();
    info!(
        photos = state.photos_taken,
        recording = state.recording,
        zoom = state.zoom,
        "Shut down"
    );

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "camera-remote failed");
            ExitCode::FAILURE
        }
    }
}
