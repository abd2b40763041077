//! Typhoon track forecasting with a linear error model.
//!
//! A forecast issued at time `t` covers the window `[t + lead, t + horizon]`
//! where `lead` is one simulation tick and `horizon` is `forecast_time`.
//! Each predicted point carries an error radius
//!
//! ```text
//! error_radius_km = forecast_error_slope × hours_ahead
//! ```
//!
//! which grows monotonically with the horizon. With a noise seed set, each
//! predicted position is additionally scattered by a Gaussian offset whose
//! standard deviation equals the error radius, so forecasts become less
//! reliable the further ahead they look. The scatter is derived from
//! `(seed, typhoon, origin, point time)` and is therefore reproducible.
//!
//! Forecasts are recomputed every tick and never cached. Past the last
//! observation of a typhoon nothing is predicted: an empty forecast means
//! the typhoon is not trackable, and no extrapolation is attempted. A
//! typhoon that forms inside the window is forecast from its first
//! observation on, so ships can position themselves ahead of genesis.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use tpg_types::{ForecastPoint, GeoPosition, TyphoonForecast, TyphoonId};

use crate::track::{TyphoonTrackStore, hours};

/// Produces uncertain future trajectories from the observed tracks.
#[derive(Debug, Clone, PartialEq)]
pub struct Forecaster {
    /// Maximum look-ahead.
    horizon: Duration,
    /// Offset of the first predicted point from the issue time.
    lead: Duration,
    /// Error growth in kilometres per hour of look-ahead.
    error_slope_km_per_hour: f64,
    /// Seed for position scatter; `None` predicts the true track positions.
    noise_seed: Option<u64>,
}

impl Forecaster {
    /// Create a forecaster looking `forecast_time_hours` ahead, starting one
    /// tick (`tick_hours`) after the issue time.
    pub fn new(forecast_time_hours: u32, error_slope_km_per_hour: f64, tick_hours: u32) -> Self {
        Self {
            horizon: Duration::hours(i64::from(forecast_time_hours)),
            lead: Duration::hours(i64::from(tick_hours)),
            error_slope_km_per_hour: error_slope_km_per_hour.max(0.0),
            noise_seed: None,
        }
    }

    /// Enable reproducible Gaussian scatter of predicted positions.
    #[must_use]
    pub const fn with_noise_seed(mut self, seed: u64) -> Self {
        self.noise_seed = Some(seed);
        self
    }

    /// Maximum look-ahead.
    pub const fn horizon(&self) -> Duration {
        self.horizon
    }

    /// Error radius for a prediction `hours_ahead` hours into the future.
    pub fn error_radius_km(&self, hours_ahead: f64) -> f64 {
        (self.error_slope_km_per_hour * hours_ahead).max(0.0)
    }

    /// Forecast one typhoon as seen at `at`.
    ///
    /// The result is empty when the typhoon is unknown or has no
    /// observation inside the forecast window.
    pub fn forecast(
        &self,
        store: &TyphoonTrackStore,
        typhoon_id: TyphoonId,
        at: DateTime<Utc>,
    ) -> TyphoonForecast {
        let horizon_end = offset(at, self.horizon);
        let points = store
            .observations_between(typhoon_id, offset(at, self.lead), horizon_end)
            .iter()
            .map(|observation| {
                let hours_ahead = hours(observation.time.signed_duration_since(at));
                let error_radius_km = self.error_radius_km(hours_ahead);
                ForecastPoint {
                    time: observation.time,
                    position: self.scatter(
                        observation.position,
                        error_radius_km,
                        typhoon_id,
                        at,
                        observation.time,
                    ),
                    error_radius_km,
                }
            })
            .collect();

        TyphoonForecast {
            typhoon_id,
            origin: at,
            horizon_end,
            genesis: store.genesis_time(typhoon_id).unwrap_or(at),
            points,
        }
    }

    /// Forecast every trackable typhoon at `at`, in typhoon id order.
    ///
    /// Typhoons with an empty forecast are omitted.
    pub fn forecast_all(&self, store: &TyphoonTrackStore, at: DateTime<Utc>) -> Vec<TyphoonForecast> {
        let forecasts: Vec<TyphoonForecast> = store
            .typhoon_ids()
            .map(|id| self.forecast(store, id, at))
            .filter(|f| !f.is_empty())
            .collect();
        debug!(
            at = %at,
            trackable = forecasts.len(),
            "Forecasts refreshed"
        );
        forecasts
    }

    /// Apply the seeded Gaussian offset to a true position.
    fn scatter(
        &self,
        position: GeoPosition,
        error_radius_km: f64,
        typhoon_id: TyphoonId,
        origin: DateTime<Utc>,
        time: DateTime<Utc>,
    ) -> GeoPosition {
        let Some(seed) = self.noise_seed else {
            return position;
        };
        if error_radius_km <= 0.0 {
            return position;
        }
        let mut rng = StdRng::seed_from_u64(mix_seed(
            seed,
            typhoon_id,
            origin.timestamp(),
            time.timestamp(),
        ));
        let (north, east) = standard_normal_pair(&mut rng);
        position.offset_km(north * error_radius_km, east * error_radius_km)
    }
}

/// `time + duration`, saturating at the representable maximum.
fn offset(time: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    time.checked_add_signed(duration)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Two independent standard normal samples (Box-Muller transform).
fn standard_normal_pair(rng: &mut StdRng) -> (f64, f64) {
    // `random` yields [0, 1); flip to (0, 1] so the logarithm is finite.
    let u1 = 1.0 - rng.random::<f64>();
    let u2: f64 = rng.random();
    let radius = (-2.0 * u1.ln()).sqrt();
    let angle = std::f64::consts::TAU * u2;
    (radius * angle.cos(), radius * angle.sin())
}

/// Combine the scatter inputs into one RNG seed.
fn mix_seed(seed: u64, typhoon_id: TyphoonId, origin_secs: i64, time_secs: i64) -> u64 {
    let origin_bits = u64::from_ne_bytes(origin_secs.to_ne_bytes());
    let time_bits = u64::from_ne_bytes(time_secs.to_ne_bytes());
    let mut state = seed
        ^ u64::from(typhoon_id.into_inner()).wrapping_mul(0x9e37_79b9_7f4a_7c15)
        ^ origin_bits.wrapping_mul(0xbf58_476d_1ce4_e5b9)
        ^ time_bits.wrapping_mul(0x94d0_49bb_1331_11eb);
    // splitmix64 finaliser
    state ^= state >> 30;
    state = state.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    state ^= state >> 27;
    state = state.wrapping_mul(0x94d0_49bb_1331_11eb);
    state ^ (state >> 31)
}
