//! Type-safe identifier wrappers.
//!
//! Every entity in the simulation has a strongly-typed ID so that a ship
//! number can never be passed where a typhoon number is expected. IDs are
//! small integers assigned deterministically from configuration order (for
//! ships) or taken from the track dataset (for typhoons), which keeps runs
//! reproducible and log output readable.

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around `u32` with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident, $prefix:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            /// Create an identifier from its raw number.
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            /// Return the inner number.
            pub const fn into_inner(self) -> u32 {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for u32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Identifier of a typhoon power generation ship (1-based fleet index).
    ShipId, "tpg-"
}

define_id! {
    /// Identifier of a support (shuttle) ship (1-based fleet index).
    SupportShipId, "support-"
}

define_id! {
    /// Identifier of a typhoon, as numbered in the track dataset
    /// (e.g. `1915` for the 15th typhoon of 2019).
    TyphoonId, "ty-"
}
