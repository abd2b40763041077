//! The energy ledger: an append-only log of every energy movement.
//!
//! # Design
//!
//! - **Append-only**: entries are never modified or deleted.
//! - **Double-entry**: every movement has a debit (from) and credit (to).
//! - **Conservation**: holder balances match recorded flows every tick.
//! - **Precision**: all quantities use [`Decimal`] watt-hours.
//!
//! The `record_*` helpers skip zero quantities: a clamped transfer that
//! moved nothing leaves no trace.

use rust_decimal::Decimal;

use tpg_types::{EntityRef, LedgerEntry, LedgerEntryType, ShipId, SupportShipId};

use crate::account::ChargeOutcome;
use crate::conservation::{self, ConservationResult, HolderBalances};
use crate::{LedgerError, TransactionBuilder};

/// Per-type energy totals for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowTotals {
    /// Energy generated into ships.
    pub generation_wh: Decimal,
    /// Generated energy that did not fit.
    pub spill_wh: Decimal,
    /// Energy burned for propulsion.
    pub propulsion_wh: Decimal,
    /// Energy moved between holders.
    pub transfer_wh: Decimal,
    /// Energy delivered to supply bases.
    pub delivery_wh: Decimal,
}

impl FlowTotals {
    /// Net change in stored energy across all holders implied by the flows.
    pub fn net_wh(&self) -> Decimal {
        self.generation_wh
            .saturating_sub(self.propulsion_wh)
            .saturating_sub(self.delivery_wh)
    }

    fn add(&mut self, entry_type: LedgerEntryType, quantity: Decimal) {
        let slot = match entry_type {
            LedgerEntryType::Generation => &mut self.generation_wh,
            LedgerEntryType::Spill => &mut self.spill_wh,
            LedgerEntryType::Propulsion => &mut self.propulsion_wh,
            LedgerEntryType::Transfer => &mut self.transfer_wh,
            LedgerEntryType::Delivery => &mut self.delivery_wh,
        };
        *slot = slot.saturating_add(quantity);
    }
}

/// The energy ledger for one simulation run.
#[derive(Debug, Default)]
pub struct Ledger {
    /// All entries, in insertion order.
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    /// Create an empty ledger.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Number of entries.
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger has no entries.
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Entries recorded for `tick`.
    pub fn entries_for_tick(&self, tick: u64) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.iter().filter(move |e| e.tick == tick)
    }

    /// Validate and append one entry. Zero quantities are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the entry fails validation.
    pub fn record(
        &mut self,
        tick: u64,
        entry_type: LedgerEntryType,
        from: EntityRef,
        to: EntityRef,
        quantity_wh: Decimal,
        reason: &str,
    ) -> Result<(), LedgerError> {
        if quantity_wh.is_zero() {
            return Ok(());
        }
        let entry = TransactionBuilder::new(tick, entry_type)
            .from(from)
            .to(to)
            .quantity(quantity_wh)
            .reason(reason.to_owned())
            .build()?;
        self.entries.push(entry);
        Ok(())
    }

    /// Record a generation charge: the accepted part as `Generation`, the
    /// part that did not fit as `Spill`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if an entry fails validation.
    pub fn record_generation(
        &mut self,
        tick: u64,
        ship: ShipId,
        outcome: ChargeOutcome,
    ) -> Result<(), LedgerError> {
        self.record(
            tick,
            LedgerEntryType::Generation,
            EntityRef::Environment,
            EntityRef::TpgShip(ship),
            outcome.accepted_wh,
            "GENERATION",
        )?;
        self.record(
            tick,
            LedgerEntryType::Spill,
            EntityRef::Environment,
            EntityRef::Spill,
            outcome.spilled_wh,
            "STORAGE_FULL",
        )
    }

    /// Record energy burned for propulsion.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the entry fails validation.
    pub fn record_propulsion(
        &mut self,
        tick: u64,
        ship: ShipId,
        quantity_wh: Decimal,
    ) -> Result<(), LedgerError> {
        self.record(
            tick,
            LedgerEntryType::Propulsion,
            EntityRef::TpgShip(ship),
            EntityRef::Consumer,
            quantity_wh,
            "PROPULSION",
        )
    }

    /// Record energy moved between two holders.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the entry fails validation.
    pub fn record_transfer(
        &mut self,
        tick: u64,
        from: EntityRef,
        to: EntityRef,
        quantity_wh: Decimal,
        reason: &str,
    ) -> Result<(), LedgerError> {
        self.record(tick, LedgerEntryType::Transfer, from, to, quantity_wh, reason)
    }

    /// Record energy unloaded by a support ship at its supply base.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the entry fails validation.
    pub fn record_delivery(
        &mut self,
        tick: u64,
        support_ship: SupportShipId,
        quantity_wh: Decimal,
    ) -> Result<(), LedgerError> {
        self.record(
            tick,
            LedgerEntryType::Delivery,
            EntityRef::SupportShip(support_ship),
            EntityRef::Supply(support_ship),
            quantity_wh,
            "SUPPLY_UNLOAD",
        )
    }

    /// Net energy credited to `entity` during `tick` (credits minus debits).
    ///
    /// Returns `None` on arithmetic overflow.
    pub fn net_flow(&self, entity: EntityRef, tick: u64) -> Option<Decimal> {
        self.entries_for_tick(tick)
            .try_fold(Decimal::ZERO, |acc, entry| {
                let acc = if entry.to == entity {
                    acc.checked_add(entry.quantity_wh)?
                } else {
                    acc
                };
                if entry.from == entity {
                    acc.checked_sub(entry.quantity_wh)
                } else {
                    Some(acc)
                }
            })
    }

    /// Per-type totals for `tick`.
    pub fn flow_totals(&self, tick: u64) -> FlowTotals {
        let mut totals = FlowTotals::default();
        for entry in self.entries_for_tick(tick) {
            totals.add(entry.entry_type, entry.quantity_wh);
        }
        totals
    }

    /// Per-type totals over the whole run.
    pub fn lifetime_totals(&self) -> FlowTotals {
        let mut totals = FlowTotals::default();
        for entry in &self.entries {
            totals.add(entry.entry_type, entry.quantity_wh);
        }
        totals
    }

    /// Verify the conservation law for `tick` against the given holder
    /// balances.
    pub fn verify_conservation(&self, tick: u64, balances: &HolderBalances) -> ConservationResult {
        conservation::verify_conservation(tick, &self.entries, balances)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::conservation::HolderBalance;

    const SHIP: ShipId = ShipId(1);
    const SUPPORT: SupportShipId = SupportShipId(1);

    #[test]
    fn zero_quantities_are_not_recorded() {
        let mut ledger = Ledger::new();
        ledger.record_propulsion(1, SHIP, Decimal::ZERO).unwrap();
        ledger
            .record_generation(
                1,
                SHIP,
                ChargeOutcome {
                    accepted_wh: dec!(10),
                    spilled_wh: Decimal::ZERO,
                },
            )
            .unwrap();
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn generation_with_spill_records_two_entries() {
        let mut ledger = Ledger::new();
        ledger
            .record_generation(
                4,
                SHIP,
                ChargeOutcome {
                    accepted_wh: dec!(70),
                    spilled_wh: dec!(30),
                },
            )
            .unwrap();
        let totals = ledger.flow_totals(4);
        assert_eq!(totals.generation_wh, dec!(70));
        assert_eq!(totals.spill_wh, dec!(30));
        assert_eq!(totals.net_wh(), dec!(70));
    }

    #[test]
    fn net_flow_per_entity() {
        let mut ledger = Ledger::new();
        let ship = EntityRef::TpgShip(SHIP);
        let support = EntityRef::SupportShip(SUPPORT);
        ledger
            .record_generation(
                1,
                SHIP,
                ChargeOutcome {
                    accepted_wh: dec!(100),
                    spilled_wh: Decimal::ZERO,
                },
            )
            .unwrap();
        ledger.record_transfer(1, ship, support, dec!(40), "RENDEZVOUS").unwrap();
        ledger.record_delivery(1, SUPPORT, dec!(15)).unwrap();

        assert_eq!(ledger.net_flow(ship, 1), Some(dec!(60)));
        assert_eq!(ledger.net_flow(support, 1), Some(dec!(25)));
        assert_eq!(ledger.net_flow(EntityRef::StorageBase, 1), Some(Decimal::ZERO));
        assert_eq!(ledger.flow_totals(1).net_wh(), dec!(85));
    }

    #[test]
    fn conservation_through_ledger() {
        let mut ledger = Ledger::new();
        ledger.record_propulsion(2, SHIP, dec!(12.5)).unwrap();
        let mut balances = HolderBalances::new();
        balances.insert(
            EntityRef::TpgShip(SHIP),
            HolderBalance {
                opening_wh: dec!(100),
                closing_wh: dec!(87.5),
            },
        );
        assert_eq!(
            ledger.verify_conservation(2, &balances),
            ConservationResult::Balanced
        );
    }

    #[test]
    fn invalid_entries_are_rejected_not_appended() {
        let mut ledger = Ledger::new();
        let result = ledger.record_transfer(
            1,
            EntityRef::StorageBase,
            EntityRef::StorageBase,
            dec!(5),
            "LOOP",
        );
        assert!(result.is_err());
        assert!(ledger.is_empty());
    }
}
