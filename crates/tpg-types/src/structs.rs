//! Core data structs: typhoon observations and forecasts, ledger entries,
//! and the read-only per-tick snapshot handed to output collaborators.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::enums::{
    BranchCondition, EntityRef, LedgerEntryType, ReturnReason, ShipMode, SupportShipMode,
};
use crate::geo::GeoPosition;
use crate::ids::{ShipId, SupportShipId, TyphoonId};

// ---------------------------------------------------------------------------
// Typhoon data
// ---------------------------------------------------------------------------

/// One observed state of a typhoon from the track dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TyphoonObservation {
    /// The typhoon this observation belongs to.
    pub typhoon_id: TyphoonId,
    /// Observation time.
    pub time: DateTime<Utc>,
    /// Position of the typhoon centre.
    pub position: GeoPosition,
    /// Intensity or category, when the dataset provides one.
    pub intensity: Option<f64>,
}

/// A single predicted typhoon position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// The future time this prediction is for.
    pub time: DateTime<Utc>,
    /// Predicted centre position.
    pub position: GeoPosition,
    /// Radius of the forecast error circle in kilometres.
    pub error_radius_km: f64,
}

/// Predicted future trajectory of one typhoon, issued at `origin`.
///
/// Forecasts are rebuilt every tick and replaced wholesale; nothing mutates
/// a forecast after it is issued. An empty `points` list means the typhoon
/// has no prediction available and is not trackable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TyphoonForecast {
    /// The forecast typhoon.
    pub typhoon_id: TyphoonId,
    /// The time the forecast was issued.
    pub origin: DateTime<Utc>,
    /// The latest time the forecaster could have predicted
    /// (`origin + forecast_time`).
    pub horizon_end: DateTime<Utc>,
    /// First observation time of the typhoon.
    pub genesis: DateTime<Utc>,
    /// Predicted positions, strictly increasing in time.
    pub points: Vec<ForecastPoint>,
}

impl TyphoonForecast {
    /// Whether the forecast contains no prediction.
    pub const fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The first (nearest) predicted point.
    pub fn first_point(&self) -> Option<&ForecastPoint> {
        self.points.first()
    }

    /// The last (furthest) predicted point.
    pub fn last_point(&self) -> Option<&ForecastPoint> {
        self.points.last()
    }

    /// The predicted point for exactly `time`, if any.
    pub fn point_at(&self, time: DateTime<Utc>) -> Option<&ForecastPoint> {
        self.points.iter().find(|p| p.time == time)
    }

    /// Whether the prediction runs all the way to the forecast horizon
    /// (the typhoon is expected to outlive the forecast window).
    pub fn reaches_horizon(&self) -> bool {
        self.last_point().is_some_and(|p| p.time >= self.horizon_end)
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// A single energy movement in the append-only ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// The tick when the movement occurred.
    pub tick: u64,
    /// The category of movement.
    pub entry_type: LedgerEntryType,
    /// Source entity (debit side).
    pub from: EntityRef,
    /// Destination entity (credit side).
    pub to: EntityRef,
    /// Energy moved in watt-hours (always positive).
    pub quantity_wh: Decimal,
    /// Reason code (e.g. `"GENERATION"`, `"BASE_UNLOAD"`).
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Read-only state of one generation ship at the end of a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TpgShipSnapshot {
    /// Ship identifier.
    pub ship_id: ShipId,
    /// Current position.
    pub position: GeoPosition,
    /// Current operating mode.
    pub mode: ShipMode,
    /// Decision branch taken this tick.
    pub branch: BranchCondition,
    /// Why the ship is returning, when it is.
    pub return_reason: Option<ReturnReason>,
    /// Speed sailed this tick in knots.
    pub speed_kt: f64,
    /// Energy stored in watt-hours.
    pub stored_wh: Decimal,
    /// Storage capacity in watt-hours.
    pub capacity_wh: Decimal,
    /// Stored fraction as a percentage.
    pub storage_per: f64,
    /// Committed target typhoon, if any.
    pub target_typhoon: Option<TyphoonId>,
    /// Current navigation waypoint, if any.
    pub waypoint: Option<GeoPosition>,
    /// Distance to the target typhoon centre in kilometres, if any.
    pub typhoon_distance_km: Option<f64>,
    /// Energy generated during this tick.
    pub generated_wh: Decimal,
    /// Energy consumed by propulsion during this tick.
    pub consumed_wh: Decimal,
    /// Cumulative energy generated over the run.
    pub total_generated_wh: Decimal,
    /// Cumulative energy consumed over the run.
    pub total_consumed_wh: Decimal,
    /// Cumulative energy unloaded into base or support ships.
    pub total_unloaded_wh: Decimal,
    /// Cumulative hours spent generating.
    pub generating_hours: f64,
    /// Cumulative hours spent sailing under own power.
    pub consuming_hours: f64,
}

/// Read-only state of one support ship at the end of a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportShipSnapshot {
    /// Support ship identifier.
    pub support_ship_id: SupportShipId,
    /// Current position.
    pub position: GeoPosition,
    /// Current operating mode.
    pub mode: SupportShipMode,
    /// Energy carried in watt-hours.
    pub stored_wh: Decimal,
    /// Cargo capacity in watt-hours.
    pub capacity_wh: Decimal,
    /// Generation ship this support ship is meeting, if any.
    pub assigned_ship: Option<ShipId>,
    /// Current navigation waypoint, if any.
    pub waypoint: Option<GeoPosition>,
    /// Cumulative energy delivered to the supply base.
    pub total_delivered_wh: Decimal,
}

/// Read-only state of the storage base at the end of a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageBaseSnapshot {
    /// Fixed base position.
    pub position: GeoPosition,
    /// Energy stored in watt-hours.
    pub stored_wh: Decimal,
    /// Storage capacity in watt-hours.
    pub capacity_wh: Decimal,
    /// Whether the base is calling for a support ship pickup.
    pub pickup_requested: bool,
}

/// Position of a typhoon observed at the snapshot time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TyphoonSnapshot {
    /// Typhoon identifier.
    pub typhoon_id: TyphoonId,
    /// Observed (or interpolated) centre position.
    pub position: GeoPosition,
}

/// Everything an output collaborator needs to log one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickSnapshot {
    /// The tick number.
    pub tick: u64,
    /// Simulated time at the end of the tick.
    pub time: DateTime<Utc>,
    /// Every generation ship, in id order.
    pub ships: Vec<TpgShipSnapshot>,
    /// Every support ship, in id order.
    pub support_ships: Vec<SupportShipSnapshot>,
    /// The storage base.
    pub storage_base: StorageBaseSnapshot,
    /// Typhoons active at the snapshot time.
    pub typhoons: Vec<TyphoonSnapshot>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn forecast_with_points(hours: &[i64], horizon_hours: i64) -> TyphoonForecast {
        let origin = Utc.with_ymd_and_hms(2019, 8, 1, 0, 0, 0).unwrap();
        let position = GeoPosition::new(20.0, 140.0).unwrap();
        TyphoonForecast {
            typhoon_id: TyphoonId::new(1909),
            origin,
            horizon_end: origin + Duration::hours(horizon_hours),
            genesis: origin,
            points: hours
                .iter()
                .map(|h| ForecastPoint {
                    time: origin + Duration::hours(*h),
                    position,
                    error_radius_km: 0.0,
                })
                .collect(),
        }
    }

    #[test]
    fn reaches_horizon_only_when_last_point_is_at_horizon() {
        assert!(forecast_with_points(&[6, 12], 12).reaches_horizon());
        assert!(!forecast_with_points(&[6], 12).reaches_horizon());
        assert!(!forecast_with_points(&[], 12).reaches_horizon());
    }

    #[test]
    fn point_lookup_by_time() {
        let forecast = forecast_with_points(&[6, 12, 18], 18);
        let t = forecast.origin + Duration::hours(12);
        assert_eq!(forecast.point_at(t).map(|p| p.time), Some(t));
        assert!(forecast.point_at(forecast.origin).is_none());
    }

    #[test]
    fn ledger_entry_json_shape() {
        let entry = LedgerEntry {
            tick: 3,
            entry_type: LedgerEntryType::Transfer,
            from: EntityRef::TpgShip(ShipId::new(1)),
            to: EntityRef::StorageBase,
            quantity_wh: rust_decimal_macros::dec!(1500),
            reason: "BASE_UNLOAD".to_owned(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["entry_type"], "TRANSFER");
        assert_eq!(json["from"]["kind"], "tpg_ship");
        assert_eq!(json["from"]["id"], 1);
        assert_eq!(json["to"]["kind"], "storage_base");
    }
}
