//! Simulation clock, configuration, and tick orchestration for the fleet
//! simulation.
//!
//! This crate owns the tick cycle that drives the simulation: forecast,
//! base update, ship updates, support ship updates, logistics, conservation
//! check and snapshot.
//!
//! # Modules
//!
//! - [`clock`] -- Fixed-step simulation clock.
//! - [`config`] -- Configuration loading from `tpg-config.yaml` into
//!   strongly-typed structs.
//! - [`tick`] -- [`SimulationState`] and the per-tick engine loop.
//! - [`runner`] -- The run loop with its termination checks and
//!   [`TickCallback`] hook.
//!
//! [`SimulationState`]: tick::SimulationState
//! [`TickCallback`]: runner::TickCallback

pub mod clock;
pub mod config;
pub mod runner;
pub mod tick;
