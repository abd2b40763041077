//! Navigable-water mask.
//!
//! Ships only commit to intercept points at sea. The mask is a list of
//! latitude bands, each with the minimum longitude east of which the band
//! is open water. A position is navigable when it falls inside a band and
//! lies east of (or on) that band's limit. Positions covered by no band are
//! off the mask and never navigable; only an empty band list opens the
//! whole sea.
//!
//! The default bands trace the east coast of Asia from the Philippines to
//! Kamchatka, so that intercept points stay in the open western Pacific.

use serde::{Deserialize, Serialize};

use tpg_types::GeoPosition;

/// One latitude band of the mask: `[min_lat, max_lat)` is water for
/// longitudes at or above `min_lon`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeaBand {
    /// Southern edge of the band (inclusive), degrees.
    pub min_lat: f64,
    /// Northern edge of the band (exclusive), degrees.
    pub max_lat: f64,
    /// Western limit of open water inside the band, degrees.
    pub min_lon: f64,
}

impl SeaBand {
    /// Whether `lat` falls inside this band.
    pub fn contains_lat(&self, lat: f64) -> bool {
        (self.min_lat..self.max_lat).contains(&lat)
    }
}

/// The west-Pacific bands used when no mask is configured.
pub fn default_sea_bands() -> Vec<SeaBand> {
    [
        (0.0, 13.0, 127.5),
        (13.0, 15.0, 125.0),
        (15.0, 24.0, 123.0),
        (24.0, 26.0, 126.0),
        (26.0, 28.0, 130.1),
        (28.0, 32.2, 132.4),
        (32.2, 34.0, 137.2),
        (34.0, 41.2, 143.0),
        (41.2, 44.0, 149.0),
        (44.0, 50.0, 156.0),
    ]
    .into_iter()
    .map(|(min_lat, max_lat, min_lon)| SeaBand {
        min_lat,
        max_lat,
        min_lon,
    })
    .collect()
}

/// The navigable-water mask built from configured bands.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavigableWaters {
    bands: Vec<SeaBand>,
}

impl NavigableWaters {
    /// Build a mask from bands. An empty list makes every position navigable.
    pub const fn new(bands: Vec<SeaBand>) -> Self {
        Self { bands }
    }

    /// A mask that accepts every position.
    pub const fn open_sea() -> Self {
        Self { bands: Vec::new() }
    }

    /// The configured bands.
    pub fn bands(&self) -> &[SeaBand] {
        &self.bands
    }

    /// Whether a ship may be sent to `position`.
    pub fn is_navigable(&self, position: GeoPosition) -> bool {
        self.bands.is_empty()
            || self
                .bands
                .iter()
                .find(|band| band.contains_lat(position.lat()))
                .is_some_and(|band| position.lon() >= band.min_lon)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn pos(lat: f64, lon: f64) -> GeoPosition {
        GeoPosition::new(lat, lon).unwrap()
    }

    #[test]
    fn default_mask_excludes_land_side_of_each_band() {
        let waters = NavigableWaters::new(default_sea_bands());
        // Luzon
        assert!(!waters.is_navigable(pos(16.0, 121.0)));
        assert!(waters.is_navigable(pos(16.0, 123.0)));
        // Honshu
        assert!(!waters.is_navigable(pos(35.5, 139.7)));
        assert!(waters.is_navigable(pos(35.5, 143.5)));
    }

    #[test]
    fn band_edges_are_half_open() {
        let waters = NavigableWaters::new(default_sea_bands());
        // Exactly 24.0 belongs to the 24-26 band (limit 126).
        assert!(!waters.is_navigable(pos(24.0, 125.0)));
        assert!(waters.is_navigable(pos(23.99, 125.0)));
    }

    #[test]
    fn positions_outside_every_band_are_not_navigable() {
        let waters = NavigableWaters::new(default_sea_bands());
        assert!(!waters.is_navigable(pos(55.0, 160.0)));
        assert!(!waters.is_navigable(pos(-10.0, 160.0)));
        assert!(!waters.is_navigable(pos(-28.0, 153.0)));
        // Northern edge of the last band is exclusive.
        assert!(!waters.is_navigable(pos(50.0, 170.0)));
        assert!(waters.is_navigable(pos(49.9, 170.0)));
    }

    #[test]
    fn open_sea_accepts_everything() {
        let waters = NavigableWaters::open_sea();
        assert!(waters.bands().is_empty());
        assert!(waters.is_navigable(pos(35.5, 139.7)));
        assert!(waters.is_navigable(pos(-28.0, 153.0)));
        assert!(NavigableWaters::new(Vec::new()).is_navigable(pos(55.0, 100.0)));
    }
}
