//! Engine binary for the typhoon power generation fleet simulation.
//!
//! This is the entry point that wires the configuration, the typhoon
//! track dataset and the tick cycle together, runs the simulation to
//! completion and writes one JSON line per tick.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `TPG_CONFIG` (default `tpg-config.yaml`)
//! 2. Initialize structured logging (tracing)
//! 3. Load the typhoon track dataset
//! 4. Assemble the simulation state (clock, forecaster, fleet, base)
//! 5. Open the tick log
//! 6. Run the simulation loop
//! 7. Flush the tick log and log the result

mod error;
mod tick_log;

use std::path::{Path, PathBuf};

use tpg_core::config::{LoggingConfig, SimulationConfig};
use tpg_core::runner;
use tpg_core::tick::SimulationState;
use tpg_weather::TyphoonTrackStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::tick_log::TickLog;

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if any initialization step or the simulation itself
/// fails.
fn main() -> Result<(), EngineError> {
    // 1. Load configuration.
    let config_path = config_path();
    let config = load_config(&config_path)?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!(config = %config_path.display(), "tpg-engine starting");
    info!(
        tick_hours = config.simulation.tick_hours,
        max_ticks = config.simulation.max_ticks,
        ships = config.tpg_ships.len(),
        support_ships = config.support_ships.len(),
        forecast_time = config.forecaster.forecast_time,
        forecast_error_slope = config.forecaster.forecast_error_slope,
        "Configuration loaded"
    );

    // 3. Load the typhoon tracks.
    let store = TyphoonTrackStore::from_csv_path(&config.input.typhoon_data_path)?;

    // 4. Assemble simulation state.
    let mut state = SimulationState::new(&config, store)?;

    // 5. Open the tick log.
    let mut tick_log = TickLog::create(&config.output.tick_log_path)?;
    info!(path = %config.output.tick_log_path.display(), "Tick log opened");

    // 6. Run the simulation.
    let result = runner::run_simulation(&mut state, &mut tick_log)?;

    // 7. Flush and log results.
    let lines = tick_log.lines();
    tick_log.finish()?;
    runner::log_simulation_end(&result);

    info!(
        end_reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        lines_written = lines,
        "tpg-engine shutdown complete"
    );

    Ok(())
}

/// The configuration file path, from `TPG_CONFIG` when set.
fn config_path() -> PathBuf {
    std::env::var_os("TPG_CONFIG").map_or_else(|| PathBuf::from("tpg-config.yaml"), PathBuf::from)
}

/// Load the simulation configuration.
///
/// A missing file falls back to the defaults (plus environment
/// overrides), which still have to pass validation when the state is
/// built.
fn load_config(path: &Path) -> Result<SimulationConfig, EngineError> {
    if path.exists() {
        Ok(SimulationConfig::from_file(path)?)
    } else {
        let mut config = SimulationConfig::default();
        config.apply_env_overrides();
        Ok(config)
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
