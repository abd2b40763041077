//! Energy conservation verification.
//!
//! Energy enters the system only through `Generation` and leaves only
//! through `Propulsion` and `Delivery`. `Spill` records generated energy
//! that never entered an account, and `Transfer` moves energy between
//! holders without changing the total. So for every holder H and tick T:
//!
//! ```text
//! closing(H) - opening(H) == credits(H, T) - debits(H, T)
//! ```
//!
//! and summed over all holders:
//!
//! ```text
//! closing_total == opening_total + generation - propulsion - delivery
//! ```
//!
//! A mismatch means an account changed without a matching ledger entry (or
//! vice versa) and produces a [`LedgerAnomaly`].

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use tpg_types::{EntityRef, LedgerEntry};

use crate::LedgerAnomaly;

/// Opening and closing stored energy of one holder for a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HolderBalance {
    /// Stored energy before the tick ran.
    pub opening_wh: Decimal,
    /// Stored energy after the tick ran.
    pub closing_wh: Decimal,
}

/// Balances of every holder, keyed by entity.
pub type HolderBalances = BTreeMap<EntityRef, HolderBalance>;

/// The result of a conservation check for a single tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConservationResult {
    /// Every holder's change matches its ledger flows.
    Balanced,
    /// At least one holder changed without matching entries.
    Anomaly(LedgerAnomaly),
}

/// Verify the conservation law for every holder in `balances` at `tick`.
///
/// Entries that touch a holder missing from `balances` are reported as an
/// imbalance for that holder.
pub fn verify_conservation(
    tick: u64,
    entries: &[LedgerEntry],
    balances: &HolderBalances,
) -> ConservationResult {
    // Ledger-implied change per holder.
    let mut expected: BTreeMap<EntityRef, Decimal> = BTreeMap::new();

    for entry in entries.iter().filter(|e| e.tick == tick) {
        if entry.from.is_holder() {
            let delta = expected.entry(entry.from).or_insert(Decimal::ZERO);
            *delta = match delta.checked_sub(entry.quantity_wh) {
                Some(val) => val,
                None => return overflow_anomaly(tick, entry.from),
            };
        }
        if entry.to.is_holder() {
            let delta = expected.entry(entry.to).or_insert(Decimal::ZERO);
            *delta = match delta.checked_add(entry.quantity_wh) {
                Some(val) => val,
                None => return overflow_anomaly(tick, entry.to),
            };
        }
    }

    let mut imbalances: BTreeMap<EntityRef, (Decimal, Decimal)> = BTreeMap::new();

    for (entity, balance) in balances {
        let expected_delta = expected.remove(entity).unwrap_or(Decimal::ZERO);
        let Some(actual_delta) = balance.closing_wh.checked_sub(balance.opening_wh) else {
            return overflow_anomaly(tick, *entity);
        };
        if expected_delta != actual_delta {
            imbalances.insert(*entity, (expected_delta, actual_delta));
        }
    }

    // Flows recorded against holders nobody reported a balance for.
    for (entity, expected_delta) in expected {
        if !expected_delta.is_zero() {
            imbalances.insert(entity, (expected_delta, Decimal::ZERO));
        }
    }

    if imbalances.is_empty() {
        ConservationResult::Balanced
    } else {
        let count = imbalances.len();
        ConservationResult::Anomaly(LedgerAnomaly {
            tick,
            imbalances,
            message: format!(
                "LEDGER_ANOMALY at tick {tick}: energy conservation violated for {count} holder(s)",
            ),
        })
    }
}

/// Construct an anomaly result for arithmetic overflow during summation.
fn overflow_anomaly(tick: u64, entity: EntityRef) -> ConservationResult {
    ConservationResult::Anomaly(LedgerAnomaly {
        tick,
        imbalances: BTreeMap::new(),
        message: format!("LEDGER_ANOMALY at tick {tick}: arithmetic overflow summing flows of {entity}"),
    })
}
