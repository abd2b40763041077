//! Enumeration types for the fleet simulation.
//!
//! Operating modes of the two ship kinds, the reasons a ship acts the way
//! it does on a tick, storage technology, and the ledger vocabulary
//! (entry types and the entities that appear on either side of an entry).

use serde::{Deserialize, Serialize};

use crate::ids::{ShipId, SupportShipId};

// ---------------------------------------------------------------------------
// Ship modes
// ---------------------------------------------------------------------------

/// Operating mode of a typhoon power generation ship.
///
/// The mode cycles for the whole run; there is no terminal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipMode {
    /// Waiting at the storage base with no committed target.
    StandbyAtBase,
    /// Travelling toward the intercept point of the committed typhoon.
    EnRouteToTarget,
    /// Inside the effective range of the target typhoon, harvesting energy.
    Generating,
    /// Travelling back to the storage base.
    EnRouteToBase,
    /// At the storage base, exchanging energy with it.
    Transferring,
}

impl ShipMode {
    /// Whether the ship is out pursuing or riding a typhoon.
    pub const fn is_pursuing(self) -> bool {
        matches!(self, Self::EnRouteToTarget | Self::Generating)
    }
}

/// Why a ship is heading back to base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnReason {
    /// Stored energy fell below the return threshold.
    LowEnergy,
    /// Storage reached the full-return level; energy must be unloaded.
    Full,
    /// No typhoon is worth pursuing and the ship is away from base.
    NoTarget,
}

/// Operating mode of a support ship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupportShipMode {
    /// Docked at its supply base with nothing to do.
    IdleAtSupplyBase,
    /// Travelling to the storage base to pick up energy.
    EnRouteToStorageBase,
    /// Travelling to meet a returning generation ship at sea.
    EnRouteToRendezvous,
    /// Carrying cargo back to the supply base.
    ReturningToSupplyBase,
}

/// The decision branch a generation ship took on a tick.
///
/// Reported in the per-tick snapshot so the log explains every mode change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchCondition {
    /// Standing by at base, no typhoon worth pursuing.
    Standby,
    /// A new typhoon target was selected.
    TargetSelected,
    /// The committed typhoon is still the best choice.
    TargetKept,
    /// The committed typhoon lost its forecast or feasibility.
    TargetLost,
    /// Riding inside the effective range of the target.
    Generating,
    /// Fell out of range and is chasing the typhoon again.
    Chasing,
    /// Heading home because stored energy is low.
    LowEnergyReturn,
    /// Heading home to unload a full store.
    FullStorageReturn,
    /// Heading home because nothing is worth pursuing.
    NoTargetReturn,
    /// Reached the storage base.
    ArrivedAtBase,
    /// Exchanging energy with the storage base.
    Transferring,
    /// Energy exchange with the base is finished.
    TransferComplete,
}

// ---------------------------------------------------------------------------
// Storage technology
// ---------------------------------------------------------------------------

/// How a generation ship stores its harvested energy.
///
/// Determines the ship's deadweight per stored watt-hour and therefore its
/// hull class and propulsion power.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMethod {
    /// Batteries (bulk carrier hull).
    #[default]
    Electric,
    /// Organic hydride hydrogen (tanker hull).
    Hydrogen,
}

// ---------------------------------------------------------------------------
// Ledger vocabulary
// ---------------------------------------------------------------------------

/// Category of an energy ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEntryType {
    /// Energy harvested from a typhoon (environment to ship). Source flow.
    Generation,
    /// Harvested energy that did not fit in storage (environment to spill).
    Spill,
    /// Energy burned for propulsion (ship to consumer). Sink flow.
    Propulsion,
    /// Energy moved between two holders. Internal flow.
    Transfer,
    /// Energy unloaded at a supply base, leaving the system. Sink flow.
    Delivery,
}

/// Kind of entity that can appear on either side of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A typhoon power generation ship.
    TpgShip,
    /// A support ship.
    SupportShip,
    /// The storage base.
    StorageBase,
    /// The typhoon environment (source of generated energy).
    Environment,
    /// Ship propulsion (sink of consumed energy).
    Consumer,
    /// An external supply base (sink of delivered energy).
    Supply,
    /// Generated energy lost to a full store.
    Spill,
}

/// A concrete entity on one side of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum EntityRef {
    /// A typhoon power generation ship.
    TpgShip(ShipId),
    /// A support ship.
    SupportShip(SupportShipId),
    /// The storage base.
    StorageBase,
    /// The typhoon environment.
    Environment,
    /// Ship propulsion.
    Consumer,
    /// The supply base of a support ship.
    Supply(SupportShipId),
    /// Spilled generation.
    Spill,
}

impl EntityRef {
    /// Return the kind of this entity.
    pub const fn kind(self) -> EntityKind {
        match self {
            Self::TpgShip(_) => EntityKind::TpgShip,
            Self::SupportShip(_) => EntityKind::SupportShip,
            Self::StorageBase => EntityKind::StorageBase,
            Self::Environment => EntityKind::Environment,
            Self::Consumer => EntityKind::Consumer,
            Self::Supply(_) => EntityKind::Supply,
            Self::Spill => EntityKind::Spill,
        }
    }

    /// Whether this entity owns an energy account (a holder), as opposed to
    /// a source or sink outside the system.
    pub const fn is_holder(self) -> bool {
        matches!(
            self,
            Self::TpgShip(_) | Self::SupportShip(_) | Self::StorageBase
        )
    }
}

impl core::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::TpgShip(id) => write!(f, "{id}"),
            Self::SupportShip(id) => write!(f, "{id}"),
            Self::StorageBase => write!(f, "storage-base"),
            Self::Environment => write!(f, "environment"),
            Self::Consumer => write!(f, "propulsion"),
            Self::Supply(id) => write!(f, "supply-base({id})"),
            Self::Spill => write!(f, "spill"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ship_mode_serializes_screaming_case() {
        let json = serde_json::to_string(&ShipMode::EnRouteToTarget).ok();
        assert_eq!(json.as_deref(), Some("\"EN_ROUTE_TO_TARGET\""));
    }

    #[test]
    fn pursuing_modes() {
        assert!(ShipMode::Generating.is_pursuing());
        assert!(ShipMode::EnRouteToTarget.is_pursuing());
        assert!(!ShipMode::EnRouteToBase.is_pursuing());
        assert!(!ShipMode::StandbyAtBase.is_pursuing());
    }

    #[test]
    fn storage_method_parses_lowercase() {
        let method: Option<StorageMethod> = serde_json::from_str("\"hydrogen\"").ok();
        assert_eq!(method, Some(StorageMethod::Hydrogen));
    }

    #[test]
    fn entity_ref_kinds() {
        assert_eq!(EntityRef::TpgShip(ShipId::new(1)).kind(), EntityKind::TpgShip);
        assert_eq!(
            EntityRef::Supply(SupportShipId::new(2)).kind(),
            EntityKind::Supply
        );
        assert!(EntityRef::StorageBase.is_holder());
        assert!(!EntityRef::Environment.is_holder());
        assert!(!EntityRef::Consumer.is_holder());
    }
}
