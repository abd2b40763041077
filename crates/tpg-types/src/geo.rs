//! Geographic positions and great-circle navigation.
//!
//! Positions are (latitude, longitude) pairs in degrees. The range
//! invariant (`lat ∈ [-90, 90]`, `lon ∈ [-180, 180]`) is checked on
//! construction; every position derived by navigation is clamped back into
//! range, so a [`GeoPosition`] value is always valid.
//!
//! In configuration and track files a position is written as a two-element
//! `[lat, lon]` array.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometres (IUGG).
pub const EARTH_RADIUS_KM: f64 = 6_371.008_8;

/// Kilometres per nautical mile.
pub const KM_PER_NAUTICAL_MILE: f64 = 1.852;

/// Kilometres per degree of latitude on the mean sphere.
const KM_PER_DEGREE: f64 = 111.195_08;

/// Below this angular separation (radians) two positions are treated as one.
const COINCIDENT_RADIANS: f64 = 1e-12;

/// Errors raised when building a position from raw coordinates.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeoError {
    /// Latitude or longitude outside the valid range, or not finite.
    #[error("coordinate out of range: lat {lat}, lon {lon}")]
    OutOfRange {
        /// The rejected latitude in degrees.
        lat: f64,
        /// The rejected longitude in degrees.
        lon: f64,
    },
}

/// A point on the Earth's surface.
///
/// The default is the equator at the prime meridian.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 2]", into = "[f64; 2]")]
pub struct GeoPosition {
    lat: f64,
    lon: f64,
}

impl GeoPosition {
    /// Build a position, validating the coordinate ranges.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::OutOfRange`] if either coordinate is outside its
    /// valid range or is not a finite number.
    pub fn new(lat: f64, lon: f64) -> Result<Self, GeoError> {
        let valid = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);
        if valid {
            Ok(Self { lat, lon })
        } else {
            Err(GeoError::OutOfRange { lat, lon })
        }
    }

    /// Latitude in degrees.
    pub const fn lat(self) -> f64 {
        self.lat
    }

    /// Longitude in degrees.
    pub const fn lon(self) -> f64 {
        self.lon
    }

    /// Great-circle (haversine) distance to `other` in kilometres.
    pub fn distance_km(self, other: Self) -> f64 {
        EARTH_RADIUS_KM * self.central_angle(other)
    }

    /// Point at `fraction` of the way along the great circle to `other`.
    ///
    /// `fraction` is clamped to `[0, 1]`.
    pub fn interpolate(self, other: Self, fraction: f64) -> Self {
        let f = fraction.clamp(0.0, 1.0);
        let delta = self.central_angle(other);
        if delta < COINCIDENT_RADIANS {
            return self;
        }
        let sin_delta = delta.sin();
        if sin_delta.abs() < COINCIDENT_RADIANS {
            // Antipodal points: the great circle is undefined.
            return if f < 0.5 { self } else { other };
        }

        let a = ((1.0 - f) * delta).sin() / sin_delta;
        let b = (f * delta).sin() / sin_delta;

        let (phi1, lambda1) = (self.lat.to_radians(), self.lon.to_radians());
        let (phi2, lambda2) = (other.lat.to_radians(), other.lon.to_radians());

        let x = (a * phi1.cos()).mul_add(lambda1.cos(), b * phi2.cos() * lambda2.cos());
        let y = (a * phi1.cos()).mul_add(lambda1.sin(), b * phi2.cos() * lambda2.sin());
        let z = a.mul_add(phi1.sin(), b * phi2.sin());

        let lat = z.atan2(x.hypot(y)).to_degrees();
        let lon = y.atan2(x).to_degrees();
        Self::clamped(lat, lon)
    }

    /// Move toward `dest` by at most `max_km` along the great circle.
    ///
    /// Never overshoots: when `dest` is within `max_km`, `dest` itself is
    /// returned. A non-positive `max_km` leaves the position unchanged.
    pub fn step_toward(self, dest: Self, max_km: f64) -> Self {
        if max_km <= 0.0 {
            return self;
        }
        let distance = self.distance_km(dest);
        if distance <= max_km {
            return dest;
        }
        self.interpolate(dest, max_km / distance)
    }

    /// Displace the position by the given north and east offsets in
    /// kilometres (flat-earth approximation, adequate for forecast scatter).
    pub fn offset_km(self, north_km: f64, east_km: f64) -> Self {
        let lat = (self.lat + north_km / KM_PER_DEGREE).clamp(-90.0, 90.0);
        let cos_lat = lat.to_radians().cos().max(1e-6);
        let lon = self.lon + east_km / (KM_PER_DEGREE * cos_lat);
        Self::clamped(lat, lon)
    }

    /// Angular separation in radians.
    fn central_angle(self, other: Self) -> f64 {
        let phi1 = self.lat.to_radians();
        let phi2 = other.lat.to_radians();
        let half_dphi = (phi2 - phi1) / 2.0;
        let half_dlambda = (other.lon - self.lon).to_radians() / 2.0;
        let h = (phi1.cos() * phi2.cos())
            .mul_add(half_dlambda.sin().powi(2), half_dphi.sin().powi(2));
        2.0 * h.sqrt().min(1.0).asin()
    }

    /// Build a position from derived coordinates, forcing them into range.
    fn clamped(lat: f64, lon: f64) -> Self {
        Self {
            lat: lat.clamp(-90.0, 90.0),
            lon: wrap_longitude(lon),
        }
    }
}

impl TryFrom<[f64; 2]> for GeoPosition {
    type Error = GeoError;

    fn try_from([lat, lon]: [f64; 2]) -> Result<Self, Self::Error> {
        Self::new(lat, lon)
    }
}

impl From<GeoPosition> for [f64; 2] {
    fn from(position: GeoPosition) -> Self {
        [position.lat, position.lon]
    }
}

impl core::fmt::Display for GeoPosition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({:.3}, {:.3})", self.lat, self.lon)
    }
}

/// Wrap a longitude into `[-180, 180)`.
pub fn wrap_longitude(lon: f64) -> f64 {
    if (-180.0..=180.0).contains(&lon) {
        lon
    } else {
        (lon + 180.0).rem_euclid(360.0) - 180.0
    }
}

/// Convert a speed in knots to kilometres per hour.
pub const fn knots_to_km_per_hour(knots: f64) -> f64 {
    knots * KM_PER_NAUTICAL_MILE
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn pos(lat: f64, lon: f64) -> GeoPosition {
        GeoPosition::new(lat, lon).unwrap()
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(GeoPosition::new(91.0, 0.0).is_err());
        assert!(GeoPosition::new(0.0, -180.5).is_err());
        assert!(GeoPosition::new(f64::NAN, 0.0).is_err());
        assert!(GeoPosition::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let d = pos(0.0, 130.0).distance_km(pos(1.0, 130.0));
        assert!((d - 111.195).abs() < 0.01, "got {d}");
    }

    #[test]
    fn distance_is_symmetric_and_zero_to_self() {
        let a = pos(24.0, 153.0);
        let b = pos(34.75, 134.79);
        assert!((a.distance_km(b) - b.distance_km(a)).abs() < 1e-9);
        assert!(a.distance_km(a) < 1e-9);
    }

    #[test]
    fn step_toward_never_overshoots() {
        let from = pos(20.0, 140.0);
        let to = pos(21.0, 140.0);
        assert_eq!(from.step_toward(to, 500.0), to);

        let stepped = from.step_toward(to, 50.0);
        let travelled = from.distance_km(stepped);
        let remaining = stepped.distance_km(to);
        assert!((travelled - 50.0).abs() < 0.01, "travelled {travelled}");
        assert!((travelled + remaining - from.distance_km(to)).abs() < 0.01);
    }

    #[test]
    fn step_toward_with_zero_budget_stays_put() {
        let from = pos(20.0, 140.0);
        assert_eq!(from.step_toward(pos(30.0, 150.0), 0.0), from);
    }

    #[test]
    fn interpolation_across_antimeridian_stays_in_range() {
        let mid = pos(10.0, 179.0).interpolate(pos(10.0, -179.0), 0.5);
        assert!(mid.lon().abs() > 179.0, "got {mid}");
        assert!((-180.0..=180.0).contains(&mid.lon()));
    }

    #[test]
    fn offset_moves_north_and_east() {
        let origin = pos(20.0, 140.0);
        let moved = origin.offset_km(111.195, 0.0);
        assert!((moved.lat() - 21.0).abs() < 0.01);
        let east = origin.offset_km(0.0, 100.0);
        assert!(east.lon() > origin.lon());
    }

    #[test]
    fn deserializes_from_pair() {
        let p: GeoPosition = serde_json::from_str("[24.0, 153.0]").unwrap();
        assert!((p.lat() - 24.0).abs() < f64::EPSILON);
        assert!(serde_json::from_str::<GeoPosition>("[95.0, 0.0]").is_err());
    }

    #[test]
    fn knots_conversion() {
        assert!((knots_to_km_per_hour(10.0) - 18.52).abs() < 1e-9);
    }
}
