//! Energy accounts, transfers, and the energy ledger for the fleet simulation.
//!
//! Every watt-hour in the simulation sits in exactly one [`EnergyAccount`]
//! (a generation ship, the storage base, or a support ship) and every
//! movement of energy is written to the append-only [`Ledger`]. The
//! conservation law is checked at the end of every tick.
//!
//! # Modules
//!
//! - [`account`] -- [`EnergyAccount`] with its capacity invariant, the atomic
//!   [`transfer`] and the co-located [`transfer_co_located`].
//! - [`ledger`] -- The [`Ledger`]: append-only log with recording methods.
//! - [`transaction`] -- The [`TransactionBuilder`] for validated entry construction.
//! - [`conservation`] -- Conservation law verification and anomaly detection.
//!
//! # Entry types
//!
//! | Type | From (debit) | To (credit) |
//! |------|-------------|-------------|
//! | Generation | Environment | `TpgShip` |
//! | Spill | Environment | Spill |
//! | Propulsion | `TpgShip` | Consumer |
//! | Transfer | any holder | any other holder |
//! | Delivery | `SupportShip` | Supply |
//!
//! # Usage
//!
//! ```
//! use tpg_ledger::{EnergyAccount, Ledger, transfer};
//! use tpg_ledger::conservation::{ConservationResult, HolderBalance, HolderBalances};
//! use tpg_types::{EntityRef, ShipId};
//! use rust_decimal::Decimal;
//!
//! let mut ship = EnergyAccount::new(Decimal::new(1_000, 0), Decimal::new(600, 0))?;
//! let mut base = EnergyAccount::empty(Decimal::new(10_000, 0))?;
//!
//! let moved = transfer(&mut ship, &mut base, Decimal::new(1_000, 0));
//! assert_eq!(moved, Decimal::new(600, 0));
//!
//! let mut ledger = Ledger::new();
//! let ship_ref = EntityRef::TpgShip(ShipId::new(1));
//! ledger.record_transfer(1, ship_ref, EntityRef::StorageBase, moved, "BASE_UNLOAD")?;
//!
//! let mut balances = HolderBalances::new();
//! balances.insert(ship_ref, HolderBalance { opening_wh: Decimal::new(600, 0), closing_wh: ship.stored_wh() });
//! balances.insert(EntityRef::StorageBase, HolderBalance { opening_wh: Decimal::ZERO, closing_wh: base.stored_wh() });
//! assert_eq!(ledger.verify_conservation(1, &balances), ConservationResult::Balanced);
//! # Ok::<(), tpg_ledger::LedgerError>(())
//! ```

pub mod account;
pub mod conservation;
pub mod ledger;
pub mod transaction;

// Re-export primary types at crate root.
pub use account::{
    ChargeOutcome, EnergyAccount, Party, TransferOutcome, transfer, transfer_co_located,
    wh_from_f64, wh_to_f64,
};
pub use conservation::{ConservationResult, HolderBalance, HolderBalances};
pub use ledger::{FlowTotals, Ledger};
pub use transaction::TransactionBuilder;

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use tpg_types::{EntityRef, LedgerEntryType};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when building accounts or recording entries.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Quantity must be strictly positive.
    #[error("ledger entry quantity must be non-zero")]
    ZeroQuantity,

    /// Quantity must not be negative.
    #[error("ledger entry quantity must be positive, got {quantity}")]
    NegativeQuantity {
        /// The invalid quantity.
        quantity: Decimal,
    },

    /// A required field was not set on the builder.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// An entity on one side does not fit the entry type.
    #[error("invalid entity for {entry_type:?} {side}: expected {expected}, got {actual}")]
    InvalidEntityKind {
        /// The entry type being validated.
        entry_type: LedgerEntryType,
        /// Which side of the entry ("from" or "to").
        side: &'static str,
        /// The expected entity kind.
        expected: String,
        /// The actual entity kind.
        actual: String,
    },

    /// A transfer names the same holder on both sides.
    #[error("transfer from {entity} to itself")]
    SelfTransfer {
        /// The holder named twice.
        entity: EntityRef,
    },

    /// An account was created with an impossible capacity or charge.
    #[error("invalid energy account: stored {stored_wh} Wh, capacity {capacity_wh} Wh")]
    InvalidAccount {
        /// The requested capacity.
        capacity_wh: Decimal,
        /// The requested initial charge.
        stored_wh: Decimal,
    },

    /// An internal error that should not occur in normal operation.
    #[error("internal ledger error: {0}")]
    InternalError(&'static str),
}

// ---------------------------------------------------------------------------
// Anomaly type
// ---------------------------------------------------------------------------

/// A conservation law violation detected during tick verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerAnomaly {
    /// The tick where the anomaly was detected.
    pub tick: u64,
    /// Per-holder imbalance: (`ledger_delta`, `account_delta`).
    pub imbalances: BTreeMap<EntityRef, (Decimal, Decimal)>,
    /// Human-readable description of the anomaly.
    pub message: String,
}

impl core::fmt::Display for LedgerAnomaly {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.message)
    }
}
