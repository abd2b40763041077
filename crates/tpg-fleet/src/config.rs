//! Fleet parameters.
//!
//! These structs are the `tpg_ships`, `storage_base`, `support_ships`,
//! `logistics` and `navigation` sections of `tpg-config.yaml`. Every field
//! that has a sensible default carries one, so a minimal ship entry only
//! names its position, storage, generator and speeds.
//!
//! Percentages are expressed on a 0--100 scale, energy in watt-hours,
//! power in watts, speeds in knots and distances in kilometres.

use serde::{Deserialize, Serialize};

use tpg_types::{GeoPosition, StorageMethod};

use crate::FleetError;
use crate::navigation::{SeaBand, default_sea_bands};

/// Parameters of one typhoon power generation ship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TpgShipParams {
    /// Starting position (normally the storage base).
    pub initial_position: GeoPosition,

    /// Number of hulls sharing the load (default: 1).
    #[serde(default = "default_hull_num")]
    pub hull_num: u32,

    /// Storage technology (default: electric).
    #[serde(default)]
    pub storage_method: StorageMethod,

    /// Storage capacity in watt-hours.
    pub max_storage_wh: f64,

    /// Stored energy at start, percent of capacity (default: 10).
    #[serde(default = "default_initial_storage_per")]
    pub initial_storage_per: f64,

    /// Generator output while inside a typhoon, watts.
    pub generator_output_w: f64,

    /// Speed used when heading back to base, knots.
    pub ship_return_speed_kt: f64,

    /// Maximum speed, knots.
    pub ship_max_speed_kt: f64,

    /// Weight (0--100) of generation hours against capture hours in the
    /// target score (default: 50).
    #[serde(default = "default_forecast_weight")]
    pub forecast_weight: f64,

    /// Distance from a typhoon centre within which the ship generates, km
    /// (default: 100).
    #[serde(default = "default_typhoon_effective_range")]
    pub typhoon_effective_range: f64,

    /// Storage percentage below which the ship returns to base (default: 10).
    #[serde(default = "default_govia_base_judge_energy_storage_per")]
    pub govia_base_judge_energy_storage_per: f64,

    /// Catch-up feasibility factor: a target is feasible only when
    /// `travel_hours <= judge_time_times * arrival_hours` (default: 1.2).
    #[serde(default = "default_judge_time_times")]
    pub judge_time_times: f64,

    /// Storage percentage at which the ship returns to unload (default: 100).
    #[serde(default = "default_full_return_storage_per")]
    pub full_return_storage_per: f64,

    /// Storage percentage a ship leaves base with after transferring
    /// (default: 50).
    #[serde(default = "default_departure_storage_per")]
    pub departure_storage_per: f64,

    /// Expected lifetime of a typhoon from genesis, hours (default: 120).
    #[serde(default = "default_typhoon_mean_lifetime_hours")]
    pub typhoon_mean_lifetime_hours: f64,
}

const fn default_hull_num() -> u32 {
    1
}

const fn default_initial_storage_per() -> f64 {
    10.0
}

const fn default_forecast_weight() -> f64 {
    50.0
}

const fn default_typhoon_effective_range() -> f64 {
    100.0
}

const fn default_govia_base_judge_energy_storage_per() -> f64 {
    10.0
}

const fn default_judge_time_times() -> f64 {
    1.2
}

const fn default_full_return_storage_per() -> f64 {
    100.0
}

const fn default_departure_storage_per() -> f64 {
    50.0
}

const fn default_typhoon_mean_lifetime_hours() -> f64 {
    120.0
}

impl TpgShipParams {
    /// A ship with the given position, storage, generator and speeds and
    /// defaults for everything else.
    pub const fn new(
        initial_position: GeoPosition,
        max_storage_wh: f64,
        generator_output_w: f64,
        ship_max_speed_kt: f64,
        ship_return_speed_kt: f64,
    ) -> Self {
        Self {
            initial_position,
            hull_num: default_hull_num(),
            storage_method: StorageMethod::Electric,
            max_storage_wh,
            initial_storage_per: default_initial_storage_per(),
            generator_output_w,
            ship_return_speed_kt,
            ship_max_speed_kt,
            forecast_weight: default_forecast_weight(),
            typhoon_effective_range: default_typhoon_effective_range(),
            govia_base_judge_energy_storage_per: default_govia_base_judge_energy_storage_per(),
            judge_time_times: default_judge_time_times(),
            full_return_storage_per: default_full_return_storage_per(),
            departure_storage_per: default_departure_storage_per(),
            typhoon_mean_lifetime_hours: default_typhoon_mean_lifetime_hours(),
        }
    }

    /// Check the parameters for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::InvalidParameter`] naming `entity` and the
    /// first violated constraint.
    pub fn validate(&self, entity: &str) -> Result<(), FleetError> {
        check_non_negative(entity, "max_storage_wh", self.max_storage_wh)?;
        check_non_negative(entity, "generator_output_w", self.generator_output_w)?;
        check_non_negative(entity, "ship_max_speed_kt", self.ship_max_speed_kt)?;
        check_non_negative(entity, "ship_return_speed_kt", self.ship_return_speed_kt)?;
        check_non_negative(entity, "typhoon_effective_range", self.typhoon_effective_range)?;
        check_non_negative(
            entity,
            "typhoon_mean_lifetime_hours",
            self.typhoon_mean_lifetime_hours,
        )?;
        check_percent(entity, "initial_storage_per", self.initial_storage_per)?;
        check_percent(entity, "forecast_weight", self.forecast_weight)?;
        check_percent(
            entity,
            "govia_base_judge_energy_storage_per",
            self.govia_base_judge_energy_storage_per,
        )?;
        check_percent(entity, "full_return_storage_per", self.full_return_storage_per)?;
        check_percent(entity, "departure_storage_per", self.departure_storage_per)?;

        if self.hull_num == 0 {
            return Err(FleetError::invalid(entity, "hull_num must be at least 1"));
        }
        if self.judge_time_times.is_nan() || self.judge_time_times <= 0.0 {
            return Err(FleetError::invalid(
                entity,
                format!("judge_time_times must be positive, got {}", self.judge_time_times),
            ));
        }
        if self.departure_storage_per < self.govia_base_judge_energy_storage_per {
            return Err(FleetError::invalid(
                entity,
                format!(
                    "departure_storage_per ({}) is below govia_base_judge_energy_storage_per ({})",
                    self.departure_storage_per, self.govia_base_judge_energy_storage_per
                ),
            ));
        }
        if self.full_return_storage_per < self.departure_storage_per {
            return Err(FleetError::invalid(
                entity,
                format!(
                    "full_return_storage_per ({}) is below departure_storage_per ({})",
                    self.full_return_storage_per, self.departure_storage_per
                ),
            ));
        }
        Ok(())
    }
}

/// Parameters of the storage base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageBaseParams {
    /// Fixed position (default: 24.0 N, 153.0 E).
    pub locate: GeoPosition,
    /// Storage capacity in watt-hours (default: 1 TWh).
    pub max_storage_wh: f64,
    /// Stored energy at start in watt-hours (default: 0).
    pub initial_storage_wh: f64,
    /// Maximum ship/base transfer power, watts. `None` moves any amount in a
    /// single tick.
    pub transfer_rate_w: Option<f64>,
    /// Percentage of the support ship capacity at which the base calls for
    /// a pickup (default: 60).
    pub call_per: f64,
}

impl Default for StorageBaseParams {
    fn default() -> Self {
        Self {
            locate: default_base_position(),
            max_storage_wh: 1.0e12,
            initial_storage_wh: 0.0,
            transfer_rate_w: None,
            call_per: 60.0,
        }
    }
}

impl StorageBaseParams {
    /// Check the parameters for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::InvalidParameter`] for negative capacities or
    /// an out-of-range call percentage.
    pub fn validate(&self) -> Result<(), FleetError> {
        let entity = "storage_base";
        check_non_negative(entity, "max_storage_wh", self.max_storage_wh)?;
        check_non_negative(entity, "initial_storage_wh", self.initial_storage_wh)?;
        if self.initial_storage_wh > self.max_storage_wh {
            return Err(FleetError::invalid(
                entity,
                "initial_storage_wh exceeds max_storage_wh",
            ));
        }
        if let Some(rate) = self.transfer_rate_w {
            check_non_negative(entity, "transfer_rate_w", rate)?;
        }
        check_percent(entity, "call_per", self.call_per)
    }
}

fn default_base_position() -> GeoPosition {
    GeoPosition::new(24.0, 153.0).unwrap_or_default()
}

/// Parameters of one support ship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportShipParams {
    /// Home port where carried energy leaves the system
    /// (default: 34.75 N, 134.79 E).
    #[serde(default = "default_supply_base_position")]
    pub supply_base_locate: GeoPosition,
    /// Cargo capacity in watt-hours.
    pub max_storage_wh: f64,
    /// Cruising speed, knots.
    pub ship_speed_kt: f64,
}

fn default_supply_base_position() -> GeoPosition {
    GeoPosition::new(34.75, 134.79).unwrap_or_default()
}

impl SupportShipParams {
    /// A support ship based at the default supply port.
    pub fn new(max_storage_wh: f64, ship_speed_kt: f64) -> Self {
        Self {
            supply_base_locate: default_supply_base_position(),
            max_storage_wh,
            ship_speed_kt,
        }
    }

    /// Check the parameters for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::InvalidParameter`] for a negative capacity or
    /// speed.
    pub fn validate(&self, entity: &str) -> Result<(), FleetError> {
        check_non_negative(entity, "max_storage_wh", self.max_storage_wh)?;
        check_non_negative(entity, "ship_speed_kt", self.ship_speed_kt)
    }
}

/// Rules for ship-to-support-ship rendezvous at sea.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticsParams {
    /// Maximum separation for a transfer between two holders, km.
    pub rendezvous_tolerance_km: f64,
    /// Minimum storage percentage of a returning ship worth intercepting.
    pub rendezvous_min_storage_per: f64,
    /// Minimum distance from base of a returning ship worth intercepting, km.
    pub rendezvous_min_base_distance_km: f64,
}

impl Default for LogisticsParams {
    fn default() -> Self {
        Self {
            rendezvous_tolerance_km: 1.0,
            rendezvous_min_storage_per: 80.0,
            rendezvous_min_base_distance_km: 500.0,
        }
    }
}

impl LogisticsParams {
    /// Check the parameters for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::InvalidParameter`] for a negative distance or
    /// an out-of-range percentage.
    pub fn validate(&self) -> Result<(), FleetError> {
        let entity = "logistics";
        check_non_negative(entity, "rendezvous_tolerance_km", self.rendezvous_tolerance_km)?;
        check_non_negative(
            entity,
            "rendezvous_min_base_distance_km",
            self.rendezvous_min_base_distance_km,
        )?;
        check_percent(
            entity,
            "rendezvous_min_storage_per",
            self.rendezvous_min_storage_per,
        )
    }
}

/// The navigable-water section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationParams {
    /// Latitude bands of open water. Empty means unrestricted.
    pub sea_bands: Vec<SeaBand>,
}

impl Default for NavigationParams {
    fn default() -> Self {
        Self {
            sea_bands: default_sea_bands(),
        }
    }
}

fn check_non_negative(entity: &str, field: &str, value: f64) -> Result<(), FleetError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(FleetError::invalid(
            entity,
            format!("{field} must be a non-negative number, got {value}"),
        ))
    }
}

fn check_percent(entity: &str, field: &str, value: f64) -> Result<(), FleetError> {
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(FleetError::invalid(
            entity,
            format!("{field} must be within [0, 100], got {value}"),
        ))
    }
}
