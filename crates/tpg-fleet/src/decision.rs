//! Target scoring and the catch-up feasibility guard.
//!
//! Target selection is a pure function of a ship's start-of-tick view, the
//! forecasts issued this tick, and the ship's parameters. It mutates
//! nothing, so the state machine, the support-ship dispatcher and tests can
//! all call it freely.
//!
//! # Candidates
//!
//! Every (typhoon, forecast point) pair in navigable water is a candidate
//! intercept point. For each one:
//!
//! ```text
//! arrival_hours    = hours until the typhoon reaches the point
//! travel_hours     = ceil(max(0, distance − effective_range) / max_speed)
//! capture_hours    = max(travel_hours, arrival_hours)
//! feasible         ⇔ travel_hours ≤ judge_time_times × arrival_hours
//! generation_hours = expected_end − (now + capture_hours), at least 0
//! score            = w × generation_hours − (100 − w) × capture_hours
//! ```
//!
//! `expected_end` is the forecast's last point, or `genesis +
//! mean_lifetime` when the forecast runs to its horizon and the typhoon is
//! younger than its mean lifetime. It is cut short at the first forecast
//! segment where the typhoon outruns a ship following it at maximum speed
//! by more than the effective range.
//!
//! # Ranking
//!
//! Highest score wins. Ties go to the committed target, then to more
//! generation hours, fewer capture hours, the lower typhoon id and the
//! earlier point.

use core::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use tpg_types::{
    GeoPosition, ReturnReason, ShipId, ShipMode, TyphoonForecast, TyphoonId, knots_to_km_per_hour,
};
use tpg_weather::hours;

use crate::config::TpgShipParams;
use crate::navigation::NavigableWaters;

/// Read-only view of a ship at the start of a tick.
///
/// Handed to decision code and to other agents so that nobody observes a
/// ship's same-tick mutations.
#[derive(Debug, Clone, PartialEq)]
pub struct ShipView {
    /// The ship.
    pub ship_id: ShipId,
    /// Position at the start of the tick.
    pub position: GeoPosition,
    /// Mode at the start of the tick.
    pub mode: ShipMode,
    /// Why the ship is returning, if it is.
    pub return_reason: Option<ReturnReason>,
    /// Committed target typhoon, if any.
    pub target: Option<TyphoonId>,
    /// Stored energy in watt-hours.
    pub stored_wh: Decimal,
    /// Stored energy as a percentage of capacity.
    pub storage_per: f64,
    /// Speed used when returning to base, knots.
    pub return_speed_kt: f64,
}

/// One scored intercept point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// The typhoon to intercept.
    pub typhoon_id: TyphoonId,
    /// When the typhoon is forecast at the intercept point.
    pub point_time: DateTime<Utc>,
    /// Where the ship heads.
    pub intercept_position: GeoPosition,
    /// Great-circle distance from the ship to the intercept point, km.
    pub distance_km: f64,
    /// Whole hours the ship needs at maximum speed to get within range.
    pub travel_hours: f64,
    /// Hours until the typhoon reaches the intercept point.
    pub arrival_hours: f64,
    /// `max(travel_hours, arrival_hours)`.
    pub capture_hours: f64,
    /// Expected hours of generation after capture.
    pub generation_hours: f64,
    /// Weighted score.
    pub score: f64,
    /// Speed that brings the ship to the point at capture time, knots.
    pub tracking_speed_kt: f64,
}

/// Outcome of target selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetDecision {
    /// Head for this intercept point.
    Pursue(Candidate),
    /// No typhoon passes the feasibility guard.
    NoFeasibleTarget,
}

/// Every feasible candidate for the ship, unranked.
pub fn feasible_candidates(
    ship: &ShipView,
    forecasts: &[TyphoonForecast],
    params: &TpgShipParams,
    waters: &NavigableWaters,
    now: DateTime<Utc>,
) -> Vec<Candidate> {
    forecasts
        .iter()
        .flat_map(|forecast| {
            (0..forecast.points.len())
                .filter_map(move |index| evaluate_point(ship, forecast, index, params, waters, now))
        })
        .collect()
}

/// Pick the best feasible target for the ship.
pub fn select_target(
    ship: &ShipView,
    forecasts: &[TyphoonForecast],
    params: &TpgShipParams,
    waters: &NavigableWaters,
    now: DateTime<Utc>,
) -> TargetDecision {
    feasible_candidates(ship, forecasts, params, waters, now)
        .into_iter()
        .min_by(|a, b| rank(a, b, ship.target))
        .map_or(TargetDecision::NoFeasibleTarget, TargetDecision::Pursue)
}

/// Ordering of candidates, best first.
pub fn rank(a: &Candidate, b: &Candidate, committed: Option<TyphoonId>) -> Ordering {
    let a_committed = committed == Some(a.typhoon_id);
    let b_committed = committed == Some(b.typhoon_id);
    b.score
        .total_cmp(&a.score)
        .then_with(|| b_committed.cmp(&a_committed))
        .then_with(|| b.generation_hours.total_cmp(&a.generation_hours))
        .then_with(|| a.capture_hours.total_cmp(&b.capture_hours))
        .then_with(|| a.typhoon_id.cmp(&b.typhoon_id))
        .then_with(|| a.point_time.cmp(&b.point_time))
}

/// Whole hours needed to close `distance_km` at `speed_kmh`.
///
/// `None` when the distance can never be closed.
fn travel_hours(distance_km: f64, speed_kmh: f64) -> Option<f64> {
    if distance_km <= 0.0 {
        Some(0.0)
    } else if speed_kmh > 0.0 {
        Some((distance_km / speed_kmh).ceil())
    } else {
        None
    }
}

fn evaluate_point(
    ship: &ShipView,
    forecast: &TyphoonForecast,
    index: usize,
    params: &TpgShipParams,
    waters: &NavigableWaters,
    now: DateTime<Utc>,
) -> Option<Candidate> {
    let point = forecast.points.get(index)?;
    if !waters.is_navigable(point.position) {
        return None;
    }
    let arrival_hours = hours(point.time.signed_duration_since(now));
    if arrival_hours <= 0.0 {
        return None;
    }

    let max_kmh = knots_to_km_per_hour(params.ship_max_speed_kt);
    let distance_km = ship.position.distance_km(point.position);
    let travel_hours = travel_hours(
        (distance_km - params.typhoon_effective_range).max(0.0),
        max_kmh,
    )?;
    if travel_hours > params.judge_time_times * arrival_hours {
        return None;
    }
    let capture_hours = travel_hours.max(arrival_hours);

    let generation_hours = generation_hours(forecast, index, params, now, capture_hours);
    let weight = params.forecast_weight;
    let score = weight.mul_add(generation_hours, -((100.0 - weight) * capture_hours));
    let tracking_speed_kt =
        (distance_km / capture_hours / knots_to_km_per_hour(1.0)).min(params.ship_max_speed_kt);

    Some(Candidate {
        typhoon_id: forecast.typhoon_id,
        point_time: point.time,
        intercept_position: point.position,
        distance_km,
        travel_hours,
        arrival_hours,
        capture_hours,
        generation_hours,
        score,
        tracking_speed_kt,
    })
}

/// Expected generation hours after capturing the typhoon at point `index`.
fn generation_hours(
    forecast: &TyphoonForecast,
    index: usize,
    params: &TpgShipParams,
    now: DateTime<Utc>,
    capture_hours: f64,
) -> f64 {
    let Some(last) = forecast.last_point() else {
        return 0.0;
    };
    let mut expected_end = last.time;
    if forecast.reaches_horizon() {
        let lifetime_end = add_hours(forecast.genesis, params.typhoon_mean_lifetime_hours);
        if lifetime_end > expected_end {
            expected_end = lifetime_end;
        }
    }
    if let Some(exit) = range_exit_time(forecast, index, params) {
        expected_end = expected_end.min(exit);
    }

    let captured_at = add_hours(now, capture_hours);
    hours(expected_end.signed_duration_since(captured_at)).max(0.0)
}

/// The last forecast time at which a ship that starts on the typhoon at
/// point `index` and follows it at maximum speed is still within range.
///
/// `None` when the ship keeps up for the whole forecast.
fn range_exit_time(
    forecast: &TyphoonForecast,
    index: usize,
    params: &TpgShipParams,
) -> Option<DateTime<Utc>> {
    let max_kmh = knots_to_km_per_hour(params.ship_max_speed_kt);
    let start = forecast.points.get(index)?;
    let mut ship = start.position;
    let mut previous = start;
    for point in forecast.points.iter().skip(index.saturating_add(1)) {
        let step_hours = hours(point.time.signed_duration_since(previous.time));
        ship = ship.step_toward(point.position, max_kmh * step_hours);
        if ship.distance_km(point.position) > params.typhoon_effective_range {
            return Some(previous.time);
        }
        previous = point;
    }
    None
}

/// `time` shifted by fractional hours, saturating at the representable range.
#[allow(clippy::cast_possible_truncation)] // rounded seconds of a bounded horizon
fn add_hours(time: DateTime<Utc>, hours: f64) -> DateTime<Utc> {
    let seconds = (hours * 3600.0).round();
    if !seconds.is_finite() {
        return time;
    }
    let seconds = seconds.clamp(-1.0e12, 1.0e12) as i64;
    Duration::try_seconds(seconds)
        .and_then(|offset| time.checked_add_signed(offset))
        .unwrap_or(time)
}
