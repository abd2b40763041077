//! The fleet: typhoon power generation ships, the storage base, and the
//! support ships that carry energy to shore.
//!
//! # Modules
//!
//! - [`config`] -- Per-agent parameter sets as loaded from configuration.
//! - [`navigation`] -- The navigable-water mask.
//! - [`propulsion`] -- Hull power and propulsion energy.
//! - [`decision`] -- Target scoring and selection against forecasts.
//! - [`ship`] -- The [`TpgShip`] state machine.
//! - [`storage_base`] -- The [`StorageBase`] and its pickup call.
//! - [`support_ship`] -- The [`SupportShip`] dispatcher.
//! - [`logistics`] -- Energy transfers between holders after movement.
//!
//! Agents never touch each other directly. Ships read the world through a
//! [`ShipContext`], support ships through a [`SupportContext`], and every
//! transfer of energy runs in [`logistics::run_logistics`].

pub mod config;
pub mod decision;
pub mod error;
pub mod logistics;
pub mod navigation;
pub mod propulsion;
pub mod ship;
pub mod storage_base;
pub mod support_ship;

pub use config::{
    LogisticsParams, NavigationParams, StorageBaseParams, SupportShipParams, TpgShipParams,
};
pub use decision::{Candidate, ShipView, TargetDecision, select_target};
pub use error::FleetError;
pub use logistics::{LogisticsReport, run_logistics};
pub use navigation::{NavigableWaters, SeaBand};
pub use propulsion::PropulsionModel;
pub use ship::{ShipContext, ShipStats, TpgShip};
pub use storage_base::StorageBase;
pub use support_ship::{DispatchBoard, SupportContext, SupportShip};
