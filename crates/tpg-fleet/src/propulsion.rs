//! Propulsion energy model.
//!
//! A ship sailing under its own power at speed `v` draws
//!
//! ```text
//! P(v) = max(0, (P_hull + P_gen) × (v / v_max)^3 − P_wind)
//! ```
//!
//! where the coefficients are sized once from the ship parameters:
//!
//! | Term | Value |
//! |------|-------|
//! | deadweight, electric | `storage_wh / 1e6` t (1000 Wh/kg batteries) |
//! | deadweight, hydrogen | `storage_wh / 5000 × 0.0898 / 47.4` t (organic hydride) |
//! | `P_hull` | `k × (dwt / hulls)^(2/3) × v_max^3 × hulls`, `k` = 1.7 bulk carrier, 2.2 tanker |
//! | `P_gen` | 1% of generator output (drag of the idle turbine) |
//! | `P_wind` | 10% of `P_hull` (sail assist) |
//!
//! While generating the ship is carried by the storm and draws nothing;
//! that rule lives in the ship state machine, not here.

use tpg_types::StorageMethod;

use crate::config::TpgShipParams;

/// Hull power coefficient of a bulk carrier (battery ships).
pub const BULK_CARRIER_COEFFICIENT: f64 = 1.7;

/// Hull power coefficient of a tanker (hydrogen ships).
pub const TANKER_COEFFICIENT: f64 = 2.2;

/// Share of generator output lost to turbine drag while sailing.
const GENERATOR_DRAG_SHARE: f64 = 0.01;

/// Share of hull power recovered from wind assist.
const WIND_ASSIST_SHARE: f64 = 0.1;

/// Deadweight in tonnes needed to carry `storage_wh` of energy.
pub fn deadweight_tonnes(method: StorageMethod, storage_wh: f64) -> f64 {
    match method {
        StorageMethod::Electric => storage_wh / 1.0e6,
        StorageMethod::Hydrogen => storage_wh / 5000.0 * 0.0898 / 47.4,
    }
}

/// Hull power coefficient for a storage method.
pub const fn hull_coefficient(method: StorageMethod) -> f64 {
    match method {
        StorageMethod::Electric => BULK_CARRIER_COEFFICIENT,
        StorageMethod::Hydrogen => TANKER_COEFFICIENT,
    }
}

/// Propulsion power curve of one ship.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropulsionModel {
    /// Power to drive the hulls at maximum speed, watts.
    pub hull_power_w: f64,
    /// Turbine drag at maximum speed, watts.
    pub generator_drag_w: f64,
    /// Wind assist, watts.
    pub wind_assist_w: f64,
    /// Maximum speed, knots.
    pub max_speed_kt: f64,
}

impl PropulsionModel {
    /// Size the propulsion model from ship parameters.
    pub fn for_ship(params: &TpgShipParams) -> Self {
        let hulls = f64::from(params.hull_num.max(1));
        let dwt_per_hull = deadweight_tonnes(params.storage_method, params.max_storage_wh) / hulls;
        let hull_power_w = hull_coefficient(params.storage_method)
            * dwt_per_hull.max(0.0).powf(2.0 / 3.0)
            * params.ship_max_speed_kt.powi(3)
            * hulls;
        Self {
            hull_power_w,
            generator_drag_w: GENERATOR_DRAG_SHARE * params.generator_output_w,
            wind_assist_w: WIND_ASSIST_SHARE * hull_power_w,
            max_speed_kt: params.ship_max_speed_kt,
        }
    }

    /// Power drawn at `speed_kt`, watts.
    pub fn power_w(&self, speed_kt: f64) -> f64 {
        if self.max_speed_kt <= 0.0 || speed_kt <= 0.0 {
            return 0.0;
        }
        let ratio = speed_kt / self.max_speed_kt;
        (self.hull_power_w + self.generator_drag_w)
            .mul_add(ratio.powi(3), -self.wind_assist_w)
            .max(0.0)
    }

    /// Energy drawn sailing `hours` at `speed_kt`, watt-hours.
    pub fn energy_wh(&self, speed_kt: f64, hours: f64) -> f64 {
        self.power_w(speed_kt) * hours.max(0.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tpg_types::GeoPosition;

    use super::*;

    fn params(method: StorageMethod) -> TpgShipParams {
        let mut p = TpgShipParams::new(GeoPosition::new(24.0, 153.0).unwrap(), 1.0e10, 1.0e8, 20.0, 15.0);
        p.storage_method = method;
        p
    }

    #[test]
    fn deadweight_by_storage_method() {
        assert!((deadweight_tonnes(StorageMethod::Electric, 1.0e10) - 10_000.0).abs() < 1e-9);
        let hydrogen = deadweight_tonnes(StorageMethod::Hydrogen, 1.0e10);
        assert!((hydrogen - 1.0e10 / 5000.0 * 0.0898 / 47.4).abs() < 1e-9);
    }

    #[test]
    fn sizing_follows_hull_rule() {
        let model = PropulsionModel::for_ship(&params(StorageMethod::Electric));
        let expected = 1.7 * 10_000.0_f64.powf(2.0 / 3.0) * 8000.0;
        assert!((model.hull_power_w - expected).abs() < 1e-3);
        assert!((model.generator_drag_w - 1.0e6).abs() < 1e-9);
        assert!((model.wind_assist_w - 0.1 * expected).abs() < 1e-3);
    }

    #[test]
    fn splitting_into_hulls_raises_power() {
        let single = PropulsionModel::for_ship(&params(StorageMethod::Electric));
        let mut twin_params = params(StorageMethod::Electric);
        twin_params.hull_num = 2;
        let twin = PropulsionModel::for_ship(&twin_params);
        assert!(twin.hull_power_w > single.hull_power_w);
        // (1/2)^(2/3) * 2 = 2^(1/3)
        assert!((twin.hull_power_w / single.hull_power_w - 2.0_f64.cbrt()).abs() < 1e-9);
    }

    #[test]
    fn power_is_zero_at_rest_and_cubic_in_speed() {
        let model = PropulsionModel::for_ship(&params(StorageMethod::Electric));
        assert!(model.power_w(0.0).abs() < f64::EPSILON);
        let full = model.power_w(20.0);
        let expected = model.hull_power_w + model.generator_drag_w - model.wind_assist_w;
        assert!((full - expected).abs() < 1e-6);
        assert!(model.power_w(10.0) < full / 4.0);
    }

    #[test]
    fn wind_assist_covers_slow_sailing() {
        let model = PropulsionModel::for_ship(&params(StorageMethod::Electric));
        // At 2 kt the cubic term is 1/1000 of full power, below wind assist.
        assert!(model.power_w(2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn energy_scales_with_hours() {
        let model = PropulsionModel::for_ship(&params(StorageMethod::Hydrogen));
        let one = model.energy_wh(15.0, 1.0);
        let six = model.energy_wh(15.0, 6.0);
        assert!((six - 6.0 * one).abs() < 1e-6);
    }
}
