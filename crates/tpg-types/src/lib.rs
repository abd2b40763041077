//! Shared type definitions for the typhoon power generation fleet simulation.
//!
//! This crate is the single source of truth for the types that flow between
//! the weather, ledger, fleet, and orchestration crates.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe integer wrappers for ship and typhoon identifiers
//! - [`enums`] -- Ship modes, decision branches, storage methods, ledger vocabulary
//! - [`geo`] -- [`GeoPosition`] and great-circle navigation
//! - [`structs`] -- Typhoon observations and forecasts, ledger entries, tick snapshots

pub mod enums;
pub mod geo;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{
    BranchCondition, EntityKind, EntityRef, LedgerEntryType, ReturnReason, ShipMode,
    StorageMethod, SupportShipMode,
};
pub use geo::{
    EARTH_RADIUS_KM, GeoError, GeoPosition, KM_PER_NAUTICAL_MILE, knots_to_km_per_hour,
    wrap_longitude,
};
pub use ids::{ShipId, SupportShipId, TyphoonId};
pub use structs::{
    ForecastPoint, LedgerEntry, StorageBaseSnapshot, SupportShipSnapshot, TickSnapshot,
    TpgShipSnapshot, TyphoonForecast, TyphoonObservation, TyphoonSnapshot,
};
