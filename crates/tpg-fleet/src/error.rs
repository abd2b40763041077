//! Error types for the `tpg-fleet` crate.
//!
//! Normal runtime conditions (no feasible target, a missed rendezvous, a
//! clamped charge) are not errors. What remains are invalid fleet
//! parameters and ledger failures propagated from recording energy flows.

use tpg_ledger::LedgerError;

/// Errors that can occur while building or stepping fleet agents.
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    /// A fleet parameter is outside its valid range.
    #[error("invalid parameter for {entity}: {reason}")]
    InvalidParameter {
        /// The agent or section the parameter belongs to.
        entity: String,
        /// Description of the violated constraint.
        reason: String,
    },

    /// Recording an energy movement in the ledger failed.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl FleetError {
    /// Shorthand for a [`FleetError::InvalidParameter`].
    pub fn invalid(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            entity: entity.into(),
            reason: reason.into(),
        }
    }
}
