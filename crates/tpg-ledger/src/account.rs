//! Energy accounts and the atomic transfer operation.
//!
//! An [`EnergyAccount`] is owned by exactly one holder (a generation ship,
//! the storage base, or a support ship). Every mutating operation keeps
//! `0 <= stored_wh <= capacity_wh`: requests that would break the invariant
//! are clamped to the feasible amount and the caller learns how much
//! actually moved. Clamping is the normal outcome, not an error.

use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};
use tracing::debug;

use tpg_types::GeoPosition;

use crate::LedgerError;

/// Decimal places kept for energy quantities (milli-watt-hours).
pub const ENERGY_DECIMAL_PLACES: u32 = 3;

/// Convert a floating-point energy figure into a ledger quantity.
///
/// Non-finite input converts to zero.
pub fn wh_from_f64(value: f64) -> Decimal {
    Decimal::from_f64(value).map_or(Decimal::ZERO, |wh| wh.round_dp(ENERGY_DECIMAL_PLACES))
}

/// Convert a ledger quantity into a floating-point figure for ratios.
pub fn wh_to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Stored energy and storage capacity of one holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergyAccount {
    capacity_wh: Decimal,
    stored_wh: Decimal,
}

/// What happened to a charge request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChargeOutcome {
    /// Energy that entered the account.
    pub accepted_wh: Decimal,
    /// Energy that did not fit and was lost.
    pub spilled_wh: Decimal,
}

impl EnergyAccount {
    /// Create an account with the given capacity and initial charge.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidAccount`] if the capacity is negative or
    /// the initial charge is outside `[0, capacity]`.
    pub fn new(capacity_wh: Decimal, stored_wh: Decimal) -> Result<Self, LedgerError> {
        if capacity_wh.is_sign_negative()
            || stored_wh.is_sign_negative()
            || stored_wh > capacity_wh
        {
            return Err(LedgerError::InvalidAccount {
                capacity_wh,
                stored_wh,
            });
        }
        Ok(Self {
            capacity_wh,
            stored_wh,
        })
    }

    /// Create an empty account.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidAccount`] if the capacity is negative.
    pub fn empty(capacity_wh: Decimal) -> Result<Self, LedgerError> {
        Self::new(capacity_wh, Decimal::ZERO)
    }

    /// Create an account charged to `percent` of its capacity.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidAccount`] if the capacity is negative or
    /// `percent` is outside `[0, 100]`.
    pub fn with_percent(capacity_wh: Decimal, percent: f64) -> Result<Self, LedgerError> {
        let percent = Decimal::from_f64(percent).unwrap_or(Decimal::ZERO);
        let stored_wh = capacity_wh
            .checked_mul(percent)
            .and_then(|wh| wh.checked_div(Decimal::ONE_HUNDRED))
            .ok_or(LedgerError::InternalError("initial charge overflow"))?
            .round_dp(ENERGY_DECIMAL_PLACES);
        Self::new(capacity_wh, stored_wh)
    }

    /// Storage capacity in watt-hours.
    pub const fn capacity_wh(&self) -> Decimal {
        self.capacity_wh
    }

    /// Stored energy in watt-hours.
    pub const fn stored_wh(&self) -> Decimal {
        self.stored_wh
    }

    /// Remaining free capacity in watt-hours.
    pub fn free_wh(&self) -> Decimal {
        self.capacity_wh.saturating_sub(self.stored_wh)
    }

    /// Stored fraction in `[0, 1]`; zero for a zero-capacity account.
    pub fn fraction(&self) -> f64 {
        if self.capacity_wh.is_zero() {
            return 0.0;
        }
        self.stored_wh
            .checked_div(self.capacity_wh)
            .map_or(0.0, wh_to_f64)
    }

    /// Stored fraction as a percentage in `[0, 100]`.
    pub fn percent(&self) -> f64 {
        self.fraction() * 100.0
    }

    /// Whether the account holds no energy.
    pub const fn is_empty(&self) -> bool {
        self.stored_wh.is_zero()
    }

    /// Add energy, clamped to the free capacity.
    ///
    /// Negative requests are treated as zero.
    pub fn charge(&mut self, amount_wh: Decimal) -> ChargeOutcome {
        let requested = amount_wh.max(Decimal::ZERO);
        let accepted_wh = requested.min(self.free_wh());
        self.stored_wh = self.stored_wh.saturating_add(accepted_wh);
        ChargeOutcome {
            accepted_wh,
            spilled_wh: requested.saturating_sub(accepted_wh),
        }
    }

    /// Remove energy, clamped to the stored amount. Returns the amount
    /// actually removed.
    ///
    /// Negative requests are treated as zero.
    pub fn discharge(&mut self, amount_wh: Decimal) -> Decimal {
        let removed = amount_wh.max(Decimal::ZERO).min(self.stored_wh);
        self.stored_wh = self.stored_wh.saturating_sub(removed);
        removed
    }
}

/// Move energy between two accounts.
///
/// The amount moved is `min(requested, from.stored, to.free)`; negative
/// requests move nothing. Both accounts are updated before this returns, so
/// no caller can observe one side without the other.
pub fn transfer(from: &mut EnergyAccount, to: &mut EnergyAccount, requested_wh: Decimal) -> Decimal {
    let actual = requested_wh
        .max(Decimal::ZERO)
        .min(from.stored_wh)
        .min(to.free_wh());
    from.stored_wh = from.stored_wh.saturating_sub(actual);
    to.stored_wh = to.stored_wh.saturating_add(actual);
    actual
}

/// Result of a transfer that requires both parties to be co-located.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransferOutcome {
    /// The parties met; this much energy moved (possibly zero).
    Executed(Decimal),
    /// The parties were too far apart; nothing moved.
    RendezvousNotMet {
        /// Separation between the parties in kilometres.
        distance_km: f64,
    },
}

impl TransferOutcome {
    /// Energy moved by this transfer (zero when the rendezvous failed).
    pub const fn moved_wh(&self) -> Decimal {
        match self {
            Self::Executed(amount) => *amount,
            Self::RendezvousNotMet { .. } => Decimal::ZERO,
        }
    }
}

/// One side of a co-located transfer: an account and where its holder is.
#[derive(Debug)]
pub struct Party<'a> {
    /// The holder's account.
    pub account: &'a mut EnergyAccount,
    /// The holder's position.
    pub position: GeoPosition,
}

/// Move energy between two holders that must be within `tolerance_km` of
/// each other.
///
/// A rendezvous that is not met is not an error: nothing moves on either
/// side and the caller may retry on a later tick.
pub fn transfer_co_located(
    from: Party<'_>,
    to: Party<'_>,
    requested_wh: Decimal,
    tolerance_km: f64,
) -> TransferOutcome {
    let distance_km = from.position.distance_km(to.position);
    if distance_km > tolerance_km {
        debug!(
            distance_km,
            tolerance_km, "Transfer rejected: rendezvous not met"
        );
        return TransferOutcome::RendezvousNotMet { distance_km };
    }
    TransferOutcome::Executed(transfer(from.account, to.account, requested_wh))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn account(capacity: Decimal, stored: Decimal) -> EnergyAccount {
        EnergyAccount::new(capacity, stored).unwrap()
    }

    fn assert_invariant(account: &EnergyAccount) {
        assert!(account.stored_wh() >= Decimal::ZERO);
        assert!(account.stored_wh() <= account.capacity_wh());
    }

    #[test]
    fn rejects_invalid_initial_state() {
        assert!(EnergyAccount::new(dec!(-1), dec!(0)).is_err());
        assert!(EnergyAccount::new(dec!(10), dec!(11)).is_err());
        assert!(EnergyAccount::new(dec!(10), dec!(-1)).is_err());
        assert!(EnergyAccount::with_percent(dec!(100), 150.0).is_err());
    }

    #[test]
    fn with_percent_charges_fraction_of_capacity() {
        let acc = EnergyAccount::with_percent(dec!(1000000), 10.0).unwrap();
        assert_eq!(acc.stored_wh(), dec!(100000));
        assert!((acc.percent() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn with_percent_keeps_fractional_percent() {
        let acc = EnergyAccount::with_percent(dec!(1000000), 40.05).unwrap();
        assert_eq!(acc.stored_wh(), dec!(400500));
        assert!((acc.percent() - 40.05).abs() < 1e-9);

        let acc = EnergyAccount::with_percent(dec!(3), 33.3333).unwrap();
        assert_eq!(acc.stored_wh(), dec!(1.000));
    }

    #[test]
    fn charge_clamps_and_reports_spill() {
        let mut acc = account(dec!(100), dec!(90));
        let outcome = acc.charge(dec!(25));
        assert_eq!(outcome.accepted_wh, dec!(10));
        assert_eq!(outcome.spilled_wh, dec!(15));
        assert_eq!(acc.stored_wh(), dec!(100));
        assert_invariant(&acc);
    }

    #[test]
    fn negative_requests_move_nothing() {
        let mut acc = account(dec!(100), dec!(50));
        assert_eq!(acc.charge(dec!(-5)).accepted_wh, Decimal::ZERO);
        assert_eq!(acc.discharge(dec!(-5)), Decimal::ZERO);
        assert_eq!(acc.stored_wh(), dec!(50));
    }

    #[test]
    fn discharge_clamps_to_stored() {
        let mut acc = account(dec!(100), dec!(30));
        assert_eq!(acc.discharge(dec!(45)), dec!(30));
        assert!(acc.is_empty());
        assert_invariant(&acc);
    }

    #[test]
    fn transfer_limited_by_source() {
        // 1,000,000 requested, source holds 600,000, destination has 900,000 free.
        let mut from = account(dec!(1000000), dec!(600000));
        let mut to = account(dec!(1000000), dec!(100000));
        let moved = transfer(&mut from, &mut to, dec!(1000000));
        assert_eq!(moved, dec!(600000));
        assert_eq!(from.stored_wh(), Decimal::ZERO);
        assert_eq!(to.stored_wh(), dec!(700000));
    }

    #[test]
    fn transfer_limited_by_destination_free_space() {
        let mut from = account(dec!(1000), dec!(800));
        let mut to = account(dec!(500), dec!(400));
        let moved = transfer(&mut from, &mut to, dec!(700));
        assert_eq!(moved, dec!(100));
        assert_eq!(from.stored_wh(), dec!(700));
        assert_eq!(to.stored_wh(), dec!(500));
        assert_invariant(&from);
        assert_invariant(&to);
    }

    #[test]
    fn transfer_conserves_energy() {
        let mut from = account(dec!(1000), dec!(750.5));
        let mut to = account(dec!(2000), dec!(10));
        let before = from.stored_wh() + to.stored_wh();
        let moved = transfer(&mut from, &mut to, dec!(333.25));
        assert_eq!(moved, dec!(333.25));
        assert_eq!(from.stored_wh() + to.stored_wh(), before);
    }

    #[test]
    fn co_located_transfer_rejected_when_apart() {
        let mut from = account(dec!(1000), dec!(500));
        let mut to = account(dec!(1000), dec!(0));
        let outcome = transfer_co_located(
            Party {
                account: &mut from,
                position: GeoPosition::new(24.0, 153.0).unwrap(),
            },
            Party {
                account: &mut to,
                position: GeoPosition::new(25.0, 153.0).unwrap(),
            },
            dec!(200),
            1.0,
        );
        assert!(matches!(outcome, TransferOutcome::RendezvousNotMet { distance_km } if distance_km > 100.0));
        assert_eq!(outcome.moved_wh(), Decimal::ZERO);
        assert_eq!(from.stored_wh(), dec!(500));
        assert_eq!(to.stored_wh(), Decimal::ZERO);
    }

    #[test]
    fn co_located_transfer_executes_within_tolerance() {
        let mut from = account(dec!(1000), dec!(500));
        let mut to = account(dec!(1000), dec!(0));
        let here = GeoPosition::new(24.0, 153.0).unwrap();
        let outcome = transfer_co_located(
            Party {
                account: &mut from,
                position: here,
            },
            Party {
                account: &mut to,
                position: here,
            },
            dec!(200),
            1.0,
        );
        assert_eq!(outcome, TransferOutcome::Executed(dec!(200)));
        assert_eq!(to.stored_wh(), dec!(200));
    }

    #[test]
    fn zero_capacity_fraction_is_zero() {
        let acc = account(Decimal::ZERO, Decimal::ZERO);
        assert!(acc.fraction().abs() < f64::EPSILON);
    }
}
