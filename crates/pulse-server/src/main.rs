//! Pulse server binary.
//!
//! Wires together the population board, the connection registry, the
//! broadcast loop, and the HTTP server. Loads configuration,
//! initializes all subsystems, and serves until the process is
//! terminated.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `pulse-config.yaml` (or defaults)
//! 3. Build the population board from configured territories
//! 4. Create the connection registry and broadcast control
//! 5. Spawn the broadcast loop on a background task
//! 6. Serve HTTP until termination or Ctrl-C
//! 7. Request a cooperative broadcast stop and exit

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use pulse_core::config::{AppConfig, ConfigError};
use pulse_core::{
    BroadcastControl, Broadcaster, Clock, ConnectionRegistry, PopulationBoard, SystemClock,
};
use pulse_server::{server, AppState};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Application entry point for the Pulse server.
///
/// # Errors
///
/// Returns an error if configuration loading, board construction, or
/// the HTTP server fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("pulse-server starting");

    // 2. Load configuration.
    let config = load_config()?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        interval_seconds = config.broadcast.interval_seconds,
        territories = config.population.territories.len(),
        reporting_timezone = %config.population.reporting_timezone,
        "Configuration loaded"
    );

    // 3. Build the population board.
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let reporting_tz = config.population.reporting_tz()?;
    let board = Arc::new(PopulationBoard::new(
        config.population.territories.clone(),
        reporting_tz,
        Arc::clone(&clock),
    )?);
    info!("Population board initialized");

    // 4. Create the connection registry and broadcast control.
    let registry = Arc::new(ConnectionRegistry::new());
    let control = Arc::new(BroadcastControl::new());

    // 5. Spawn the broadcast loop.
    let broadcaster = Broadcaster::new(
        Arc::clone(&board),
        Arc::clone(&registry),
        Arc::clone(&clock),
        Duration::from_secs(config.broadcast.interval_seconds),
        Arc::clone(&control),
    );
    let broadcast_handle = tokio::spawn(broadcaster.run());
    info!("Broadcast loop spawned on background task");

    // 6. Serve HTTP until termination or Ctrl-C.
    let state = Arc::new(AppState::new(&config, board, registry, clock));
    let serve_result = tokio::select! {
        result = server::start_server(&config.server, state) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
            Ok(())
        }
    };

    // 7. Stop the broadcast loop cooperatively.
    control.request_stop();
    if let Err(e) = broadcast_handle.await {
        warn!(error = %e, "Broadcast task did not shut down cleanly");
    }

    serve_result?;
    info!("pulse-server stopped");
    Ok(())
}

/// Load configuration from `PULSE_CONFIG` (default
/// `pulse-config.yaml`), falling back to built-in defaults when no
/// file is present.
fn load_config() -> Result<AppConfig, ConfigError> {
    let path = std::env::var("PULSE_CONFIG").unwrap_or_else(|_| String::from("pulse-config.yaml"));
    let path = Path::new(&path);
    if path.exists() {
        info!(path = %path.display(), "Loading configuration file");
        AppConfig::from_file(path)
    } else {
        info!("No configuration file found, using defaults");
        let mut config = AppConfig::default();
        config.apply_env_overrides();
        Ok(config)
    }
}
