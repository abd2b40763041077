//! Simulation loop runner.
//!
//! This module provides [`run_simulation`], which drives the tick loop
//! until the clock reaches the end of the run or the optional tick cap is
//! hit, handing every tick summary to a [`TickCallback`].
//!
//! The runner wraps the single-tick [`run_tick`] function and adds the
//! termination checks around it.
//!
//! [`run_tick`]: crate::tick::run_tick

use tracing::info;

use tpg_ledger::FlowTotals;

use crate::tick::{self, SimulationState, TickError, TickSummary};

/// Errors that can occur during the simulation run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A tick execution failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: TickError,
    },
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationEndReason {
    /// The clock reached the configured end time.
    EndTimeReached,
    /// The configured tick cap was reached.
    MaxTicksReached,
}

/// Result of the simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    /// The reason the simulation ended.
    pub end_reason: SimulationEndReason,
    /// The last tick summary, if any tick completed.
    pub final_summary: Option<TickSummary>,
    /// Total number of ticks executed.
    pub total_ticks: u64,
    /// Ledger flows over the whole run.
    pub totals: FlowTotals,
    /// Number of ticks that failed the conservation check.
    pub anomalies: u64,
}

/// Callback invoked after each tick completes.
///
/// Implementations can use this to write tick logs or collect summaries.
/// The callback receives the tick summary and the current simulation
/// state.
pub trait TickCallback {
    /// Called after a tick completes successfully.
    fn on_tick(&mut self, summary: &TickSummary, state: &SimulationState);
}

/// A no-op tick callback for testing.
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(&mut self, _summary: &TickSummary, _state: &SimulationState) {}
}

/// Run the simulation loop until a termination condition is met.
///
/// # Errors
///
/// Returns [`RunnerError`] if a tick execution fails unrecoverably.
pub fn run_simulation(
    state: &mut SimulationState,
    callback: &mut dyn TickCallback,
) -> Result<SimulationResult, RunnerError> {
    let mut last_summary: Option<TickSummary> = None;
    let mut total_ticks: u64 = 0;
    let mut anomalies: u64 = 0;

    info!(
        start = %state.clock.start(),
        end = %state.clock.end(),
        expected_ticks = state.clock.total_ticks(),
        max_ticks = state.max_ticks,
        "Simulation starting"
    );

    let end_reason = loop {
        // --- Check end time (before tick) ---
        if state.clock.is_finished() {
            info!(tick = state.clock.tick(), "End time reached");
            break SimulationEndReason::EndTimeReached;
        }

        // --- Check tick limit (before tick) ---
        if state.max_ticks.is_some_and(|max| total_ticks >= max) {
            info!(tick = state.clock.tick(), max_ticks = state.max_ticks, "Tick limit reached");
            break SimulationEndReason::MaxTicksReached;
        }

        // --- Execute tick ---
        let summary = tick::run_tick(state)?;
        total_ticks = total_ticks.saturating_add(1);
        if summary.anomaly.is_some() {
            anomalies = anomalies.saturating_add(1);
        }

        // --- Notify callback ---
        callback.on_tick(&summary, state);
        last_summary = Some(summary);
    };

    Ok(SimulationResult {
        end_reason,
        final_summary: last_summary,
        total_ticks,
        totals: state.ledger.lifetime_totals(),
        anomalies,
    })
}

/// Log the simulation end sequence.
///
/// This should be called after [`run_simulation`] returns.
pub fn log_simulation_end(result: &SimulationResult) {
    info!(
        reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        final_tick = result.final_summary.as_ref().map(|s| s.tick),
        generated_wh = %result.totals.generation_wh,
        spilled_wh = %result.totals.spill_wh,
        consumed_wh = %result.totals.propulsion_wh,
        delivered_wh = %result.totals.delivery_wh,
        anomalies = result.anomalies,
        "Simulation ended"
    );
}
