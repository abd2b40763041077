//! Transaction builder and validation for the energy ledger.
//!
//! Every energy movement names a source entity (debit) and a destination
//! entity (credit). The [`TransactionBuilder`] checks the quantity and that
//! both sides are the right kind of entity for the entry type before a
//! [`LedgerEntry`] can exist.

use rust_decimal::Decimal;

use tpg_types::{EntityKind, EntityRef, LedgerEntry, LedgerEntryType};

use crate::LedgerError;

/// Builder for validated [`LedgerEntry`] values.
///
/// # Examples
///
/// ```
/// use tpg_ledger::TransactionBuilder;
/// use tpg_types::{EntityRef, LedgerEntryType, ShipId};
/// use rust_decimal::Decimal;
///
/// let entry = TransactionBuilder::new(1, LedgerEntryType::Generation)
///     .from(EntityRef::Environment)
///     .to(EntityRef::TpgShip(ShipId::new(1)))
///     .quantity(Decimal::new(5_000, 0))
///     .reason("GENERATION".to_owned())
///     .build();
///
/// assert!(entry.is_ok());
/// ```
#[derive(Debug)]
pub struct TransactionBuilder {
    tick: u64,
    entry_type: LedgerEntryType,
    from: Option<EntityRef>,
    to: Option<EntityRef>,
    quantity: Option<Decimal>,
    reason: Option<String>,
}

impl TransactionBuilder {
    /// Start building an entry for the given tick and entry type.
    pub const fn new(tick: u64, entry_type: LedgerEntryType) -> Self {
        Self {
            tick,
            entry_type,
            from: None,
            to: None,
            quantity: None,
            reason: None,
        }
    }

    /// Set the source entity (debit side).
    #[must_use]
    pub const fn from(mut self, entity: EntityRef) -> Self {
        self.from = Some(entity);
        self
    }

    /// Set the destination entity (credit side).
    #[must_use]
    pub const fn to(mut self, entity: EntityRef) -> Self {
        self.to = Some(entity);
        self
    }

    /// Set the energy moved, in watt-hours.
    #[must_use]
    pub const fn quantity(mut self, quantity_wh: Decimal) -> Self {
        self.quantity = Some(quantity_wh);
        self
    }

    /// Set the reason code.
    #[must_use]
    pub fn reason(mut self, reason: String) -> Self {
        self.reason = Some(reason);
        self
    }

    /// Validate inputs and produce a [`LedgerEntry`].
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::MissingField`] if a required field is unset,
    /// [`LedgerError::ZeroQuantity`] or [`LedgerError::NegativeQuantity`] for
    /// a non-positive quantity, and [`LedgerError::InvalidEntityKind`] or
    /// [`LedgerError::SelfTransfer`] if the parties do not fit the entry type.
    pub fn build(self) -> Result<LedgerEntry, LedgerError> {
        let from = self.from.ok_or(LedgerError::MissingField("from"))?;
        let to = self.to.ok_or(LedgerError::MissingField("to"))?;
        let quantity_wh = self.quantity.ok_or(LedgerError::MissingField("quantity"))?;
        let reason = self.reason.ok_or(LedgerError::MissingField("reason"))?;

        if quantity_wh.is_zero() {
            return Err(LedgerError::ZeroQuantity);
        }
        if quantity_wh.is_sign_negative() {
            return Err(LedgerError::NegativeQuantity {
                quantity: quantity_wh,
            });
        }

        validate_parties(self.entry_type, from, to)?;

        Ok(LedgerEntry {
            tick: self.tick,
            entry_type: self.entry_type,
            from,
            to,
            quantity_wh,
            reason,
        })
    }
}

/// Check both parties against the contract for `entry_type`.
fn validate_parties(
    entry_type: LedgerEntryType,
    from: EntityRef,
    to: EntityRef,
) -> Result<(), LedgerError> {
    if let Some((expected_from, expected_to)) = expected_entity_kinds(entry_type) {
        check_side(entry_type, "from", expected_from, from.kind())?;
        return check_side(entry_type, "to", expected_to, to.kind());
    }

    // Internal transfer: holder to holder, never to itself.
    for (side, entity) in [("from", from), ("to", to)] {
        if !entity.is_holder() {
            return Err(LedgerError::InvalidEntityKind {
                entry_type,
                side,
                expected: "energy holder".to_owned(),
                actual: format!("{:?}", entity.kind()),
            });
        }
    }
    if from == to {
        return Err(LedgerError::SelfTransfer { entity: from });
    }
    Ok(())
}

fn check_side(
    entry_type: LedgerEntryType,
    side: &'static str,
    expected: EntityKind,
    actual: EntityKind,
) -> Result<(), LedgerError> {
    if expected == actual {
        Ok(())
    } else {
        Err(LedgerError::InvalidEntityKind {
            entry_type,
            side,
            expected: format!("{expected:?}"),
            actual: format!("{actual:?}"),
        })
    }
}

/// Expected (from, to) entity kinds for source and sink entry types.
///
/// `None` for [`LedgerEntryType::Transfer`], which accepts any pair of
/// distinct holders.
const fn expected_entity_kinds(entry_type: LedgerEntryType) -> Option<(EntityKind, EntityKind)> {
    match entry_type {
        LedgerEntryType::Generation => Some((EntityKind::Environment, EntityKind::TpgShip)),
        LedgerEntryType::Spill => Some((EntityKind::Environment, EntityKind::Spill)),
        LedgerEntryType::Propulsion => Some((EntityKind::TpgShip, EntityKind::Consumer)),
        LedgerEntryType::Delivery => Some((EntityKind::SupportShip, EntityKind::Supply)),
        LedgerEntryType::Transfer => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;
    use tpg_types::{ShipId, SupportShipId};

    use super::*;

    const SHIP: EntityRef = EntityRef::TpgShip(ShipId(1));
    const SUPPORT: EntityRef = EntityRef::SupportShip(SupportShipId(1));

    fn build(
        entry_type: LedgerEntryType,
        from: EntityRef,
        to: EntityRef,
        qty: Decimal,
    ) -> Result<LedgerEntry, LedgerError> {
        TransactionBuilder::new(1, entry_type)
            .from(from)
            .to(to)
            .quantity(qty)
            .reason("TEST".to_owned())
            .build()
    }

    #[test]
    fn valid_generation() {
        let entry = build(
            LedgerEntryType::Generation,
            EntityRef::Environment,
            SHIP,
            dec!(100),
        )
        .unwrap();
        assert_eq!(entry.quantity_wh, dec!(100));
        assert_eq!(entry.tick, 1);
    }

    #[test]
    fn zero_and_negative_quantities_rejected() {
        let zero = build(LedgerEntryType::Generation, EntityRef::Environment, SHIP, dec!(0));
        assert!(matches!(zero, Err(LedgerError::ZeroQuantity)));
        let negative = build(LedgerEntryType::Generation, EntityRef::Environment, SHIP, dec!(-1));
        assert!(matches!(negative, Err(LedgerError::NegativeQuantity { .. })));
    }

    #[test]
    fn wrong_entity_kinds_rejected() {
        let result = build(LedgerEntryType::Propulsion, EntityRef::StorageBase, EntityRef::Consumer, dec!(5));
        assert!(matches!(
            result,
            Err(LedgerError::InvalidEntityKind { side: "from", .. })
        ));
        let result = build(LedgerEntryType::Delivery, SUPPORT, EntityRef::StorageBase, dec!(5));
        assert!(matches!(
            result,
            Err(LedgerError::InvalidEntityKind { side: "to", .. })
        ));
    }

    #[test]
    fn transfers_must_be_between_distinct_holders() {
        assert!(build(LedgerEntryType::Transfer, SHIP, SUPPORT, dec!(5)).is_ok());
        assert!(build(LedgerEntryType::Transfer, EntityRef::StorageBase, SHIP, dec!(5)).is_ok());
        assert!(matches!(
            build(LedgerEntryType::Transfer, SHIP, SHIP, dec!(5)),
            Err(LedgerError::SelfTransfer { .. })
        ));
        assert!(matches!(
            build(LedgerEntryType::Transfer, SHIP, EntityRef::Consumer, dec!(5)),
            Err(LedgerError::InvalidEntityKind { .. })
        ));
    }

    #[test]
    fn missing_fields_reported() {
        let result = TransactionBuilder::new(1, LedgerEntryType::Spill)
            .from(EntityRef::Environment)
            .quantity(dec!(1))
            .reason("X".to_owned())
            .build();
        assert!(matches!(result, Err(LedgerError::MissingField("to"))));
    }
}
