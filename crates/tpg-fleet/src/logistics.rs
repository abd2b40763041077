//! The logistics phase: every energy transfer between holders.
//!
//! Runs after all agents have moved, in a fixed order:
//!
//! 1. ships transferring at base exchange energy with it;
//! 2. support ships meet returning generation ships at sea;
//! 3. a support ship at the storage base loads the base's energy;
//! 4. support ships back at their supply base unload (energy leaves the
//!    system as a delivery).
//!
//! Each transfer goes through [`transfer_co_located`], so both accounts
//! change together or not at all. A missed rendezvous moves nothing and is
//! retried on the next tick.

use rust_decimal::Decimal;
use tracing::debug;

use tpg_ledger::{Ledger, Party, TransferOutcome, transfer_co_located};
use tpg_types::{EntityRef, ShipMode, SupportShipMode};

use crate::FleetError;
use crate::ship::TpgShip;
use crate::storage_base::StorageBase;
use crate::support_ship::SupportShip;

/// Energy moved during one logistics phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogisticsReport {
    /// Unloaded by ships into the base.
    pub base_unloaded_wh: Decimal,
    /// Drawn by ships from the base.
    pub base_recharged_wh: Decimal,
    /// Taken from ships by support ships at sea.
    pub rendezvous_wh: Decimal,
    /// Loaded by support ships at the base.
    pub pickup_wh: Decimal,
    /// Delivered by support ships to their supply bases.
    pub delivered_wh: Decimal,
    /// Rendezvous attempts where the parties were too far apart.
    pub missed_rendezvous: u32,
}

/// Run the whole logistics phase.
///
/// # Errors
///
/// Returns [`FleetError::Ledger`] if a transfer cannot be recorded.
pub fn run_logistics(
    tick: u64,
    tick_hours: f64,
    tolerance_km: f64,
    ships: &mut [TpgShip],
    base: &mut StorageBase,
    support_ships: &mut [SupportShip],
    ledger: &mut Ledger,
) -> Result<LogisticsReport, FleetError> {
    let mut report = LogisticsReport::default();
    exchange_at_base(tick, tick_hours, tolerance_km, ships, base, ledger, &mut report)?;
    meet_at_sea(tick, tolerance_km, ships, support_ships, ledger, &mut report)?;
    load_at_base(tick, tolerance_km, base, support_ships, ledger, &mut report)?;
    unload_at_supply(tick, tolerance_km, support_ships, ledger, &mut report)?;
    Ok(report)
}

/// Move energy between transferring ships and the base, toward each ship's
/// departure level.
///
/// A transfer completes when the ship reaches its departure level or a
/// tick moves nothing.
///
/// # Errors
///
/// Returns [`FleetError::Ledger`] if a transfer cannot be recorded.
pub fn exchange_at_base(
    tick: u64,
    tick_hours: f64,
    tolerance_km: f64,
    ships: &mut [TpgShip],
    base: &mut StorageBase,
    ledger: &mut Ledger,
    report: &mut LogisticsReport,
) -> Result<(), FleetError> {
    let limit = base.transfer_limit_wh(tick_hours);
    let base_position = base.position();

    for ship in ships.iter_mut().filter(|s| s.mode() == ShipMode::Transferring) {
        let target = ship.departure_wh();
        let stored = ship.account().stored_wh();
        let ship_ref = EntityRef::TpgShip(ship.id());
        let ship_position = ship.position();

        let moved = if stored > target {
            let outcome = transfer_co_located(
                Party {
                    account: ship.account_mut(),
                    position: ship_position,
                },
                Party {
                    account: base.account_mut(),
                    position: base_position,
                },
                stored.saturating_sub(target).min(limit),
                tolerance_km,
            );
            let moved = outcome.moved_wh();
            ledger.record_transfer(tick, ship_ref, EntityRef::StorageBase, moved, "BASE_UNLOAD")?;
            ship.record_unload(moved);
            report.base_unloaded_wh = report.base_unloaded_wh.saturating_add(moved);
            moved
        } else if stored < target {
            let outcome = transfer_co_located(
                Party {
                    account: base.account_mut(),
                    position: base_position,
                },
                Party {
                    account: ship.account_mut(),
                    position: ship_position,
                },
                target.saturating_sub(stored).min(limit),
                tolerance_km,
            );
            let moved = outcome.moved_wh();
            ledger.record_transfer(
                tick,
                EntityRef::StorageBase,
                ship_ref,
                moved,
                "BASE_RECHARGE",
            )?;
            report.base_recharged_wh = report.base_recharged_wh.saturating_add(moved);
            moved
        } else {
            Decimal::ZERO
        };

        if moved.is_zero() || ship.account().stored_wh() == target {
            ship.finish_transfer();
        }
    }
    Ok(())
}

/// Hand over the cargo of returning ships to the support ships meeting them.
///
/// The ship keeps its departure level; the rest goes to the support ship
/// as far as it has room.
///
/// # Errors
///
/// Returns [`FleetError::Ledger`] if a transfer cannot be recorded.
pub fn meet_at_sea(
    tick: u64,
    tolerance_km: f64,
    ships: &mut [TpgShip],
    support_ships: &mut [SupportShip],
    ledger: &mut Ledger,
    report: &mut LogisticsReport,
) -> Result<(), FleetError> {
    for support in support_ships
        .iter_mut()
        .filter(|s| s.mode() == SupportShipMode::EnRouteToRendezvous)
    {
        let Some(ship_id) = support.assigned_ship() else {
            continue;
        };
        let Some(ship) = ships
            .iter_mut()
            .find(|s| s.id() == ship_id && s.mode() == ShipMode::EnRouteToBase)
        else {
            continue;
        };

        let request = ship.account().stored_wh().saturating_sub(ship.departure_wh());
        let ship_position = ship.position();
        let support_position = support.position();
        let outcome = transfer_co_located(
            Party {
                account: ship.account_mut(),
                position: ship_position,
            },
            Party {
                account: support.account_mut(),
                position: support_position,
            },
            request,
            tolerance_km,
        );
        match outcome {
            TransferOutcome::Executed(moved) => {
                ledger.record_transfer(
                    tick,
                    EntityRef::TpgShip(ship_id),
                    EntityRef::SupportShip(support.id()),
                    moved,
                    "RENDEZVOUS",
                )?;
                ship.record_unload(moved);
                ship.finish_offload();
                support.finish_rendezvous();
                report.rendezvous_wh = report.rendezvous_wh.saturating_add(moved);
            }
            TransferOutcome::RendezvousNotMet { distance_km } => {
                debug!(
                    support = %support.id(),
                    ship = %ship_id,
                    distance_km,
                    "Rendezvous not met; retrying next tick"
                );
                report.missed_rendezvous = report.missed_rendezvous.saturating_add(1);
            }
        }
    }
    Ok(())
}

/// Load the storage base's energy into the support ship answering its call.
///
/// # Errors
///
/// Returns [`FleetError::Ledger`] if a transfer cannot be recorded.
pub fn load_at_base(
    tick: u64,
    tolerance_km: f64,
    base: &mut StorageBase,
    support_ships: &mut [SupportShip],
    ledger: &mut Ledger,
    report: &mut LogisticsReport,
) -> Result<(), FleetError> {
    let base_position = base.position();
    for support in support_ships
        .iter_mut()
        .filter(|s| s.mode() == SupportShipMode::EnRouteToStorageBase)
    {
        let support_position = support.position();
        let request = base.account().stored_wh();
        let outcome = transfer_co_located(
            Party {
                account: base.account_mut(),
                position: base_position,
            },
            Party {
                account: support.account_mut(),
                position: support_position,
            },
            request,
            tolerance_km,
        );
        if let TransferOutcome::Executed(moved) = outcome {
            ledger.record_transfer(
                tick,
                EntityRef::StorageBase,
                EntityRef::SupportShip(support.id()),
                moved,
                "BASE_PICKUP",
            )?;
            support.finish_pickup();
            base.pickup_done();
            report.pickup_wh = report.pickup_wh.saturating_add(moved);
        }
    }
    Ok(())
}

/// Unload support ships that are back at their supply base.
///
/// # Errors
///
/// Returns [`FleetError::Ledger`] if a delivery cannot be recorded.
pub fn unload_at_supply(
    tick: u64,
    tolerance_km: f64,
    support_ships: &mut [SupportShip],
    ledger: &mut Ledger,
    report: &mut LogisticsReport,
) -> Result<(), FleetError> {
    for support in support_ships.iter_mut().filter(|s| {
        s.mode() == SupportShipMode::ReturningToSupplyBase
            && s.position().distance_km(s.supply_base()) <= tolerance_km
    }) {
        let delivered = support.unload();
        ledger.record_delivery(tick, support.id(), delivered)?;
        report.delivered_wh = report.delivered_wh.saturating_add(delivered);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use tpg_ledger::{ConservationResult, HolderBalance, HolderBalances};
    use tpg_types::{GeoPosition, ReturnReason, ShipId, SupportShipId};

    use super::*;
    use crate::config::{LogisticsParams, StorageBaseParams, SupportShipParams, TpgShipParams};
    use crate::navigation::NavigableWaters;
    use crate::ship::ShipContext;
    use crate::support_ship::{DispatchBoard, SupportContext};

    fn pos(lat: f64, lon: f64) -> GeoPosition {
        GeoPosition::new(lat, lon).unwrap()
    }

    fn base(stored: f64, rate: Option<f64>) -> StorageBase {
        StorageBase::new(StorageBaseParams {
            max_storage_wh: 1.0e12,
            initial_storage_wh: stored,
            transfer_rate_w: rate,
            ..StorageBaseParams::default()
        })
        .unwrap()
    }

    /// A 1 GWh ship docked at base with the given charge.
    ///
    /// Full-return is 80 % and low-energy 10 %, so a charge outside that
    /// band docks on the first step.
    fn docked_ship(storage_per: f64) -> TpgShip {
        let mut p = TpgShipParams::new(pos(24.0, 153.0), 1.0e9, 1.0e8, 20.0, 15.0);
        p.initial_storage_per = storage_per;
        p.govia_base_judge_energy_storage_per = 10.0;
        p.departure_storage_per = 50.0;
        p.full_return_storage_per = 80.0;
        let mut ship = TpgShip::new(ShipId(1), p).unwrap();

        let store = tpg_weather::TyphoonTrackStore::default();
        let waters = NavigableWaters::open_sea();
        let now = Utc.with_ymd_and_hms(2019, 9, 1, 0, 0, 0).unwrap();
        let ctx = ShipContext {
            tick: 0,
            now,
            next: now,
            tick_hours: 6.0,
            store: &store,
            forecasts: &[],
            waters: &waters,
            base_position: pos(24.0, 153.0),
            base_stored_wh: dec!(1),
            dock_tolerance_km: 1.0,
        };
        ship.step(&ctx, &mut Ledger::new()).unwrap();
        assert_eq!(ship.mode(), ShipMode::Transferring);
        ship
    }

    #[test]
    fn surplus_is_unloaded_to_departure_level() {
        let mut ships = vec![docked_ship(90.0)];
        let mut b = base(0.0, None);
        let mut ledger = Ledger::new();
        let mut report = LogisticsReport::default();
        exchange_at_base(1, 6.0, 1.0, &mut ships, &mut b, &mut ledger, &mut report).unwrap();

        assert_eq!(ships[0].account().stored_wh(), dec!(500_000_000));
        assert_eq!(b.account().stored_wh(), dec!(400_000_000));
        assert_eq!(report.base_unloaded_wh, dec!(400_000_000));
        assert_eq!(ships[0].stats().total_unloaded_wh, dec!(400_000_000));
        assert_eq!(ships[0].mode(), ShipMode::StandbyAtBase);
    }

    #[test]
    fn deficit_is_drawn_from_base() {
        let mut ships = vec![docked_ship(5.0)];
        let mut b = base(1.0e9, None);
        let mut ledger = Ledger::new();
        let mut report = LogisticsReport::default();
        exchange_at_base(1, 6.0, 1.0, &mut ships, &mut b, &mut ledger, &mut report).unwrap();

        assert_eq!(ships[0].account().stored_wh(), dec!(500_000_000));
        assert_eq!(report.base_recharged_wh, dec!(450_000_000));
        assert_eq!(ships[0].mode(), ShipMode::StandbyAtBase);
    }

    #[test]
    fn rate_limited_transfer_spans_ticks() {
        let mut ships = vec![docked_ship(90.0)];
        // 25 MW for 6 h = 150 MWh per tick.
        let mut b = base(0.0, Some(2.5e7));
        let mut ledger = Ledger::new();
        let mut report = LogisticsReport::default();

        exchange_at_base(1, 6.0, 1.0, &mut ships, &mut b, &mut ledger, &mut report).unwrap();
        assert_eq!(ships[0].mode(), ShipMode::Transferring);
        assert_eq!(b.account().stored_wh(), dec!(150_000_000));

        exchange_at_base(2, 6.0, 1.0, &mut ships, &mut b, &mut ledger, &mut report).unwrap();
        assert_eq!(ships[0].mode(), ShipMode::Transferring);

        exchange_at_base(3, 6.0, 1.0, &mut ships, &mut b, &mut ledger, &mut report).unwrap();
        assert_eq!(b.account().stored_wh(), dec!(400_000_000));
        assert_eq!(ships[0].mode(), ShipMode::StandbyAtBase);
    }

    #[test]
    fn empty_base_ends_recharge_immediately() {
        let mut ships = vec![docked_ship(5.0)];
        let mut b = base(0.0, None);
        let mut ledger = Ledger::new();
        let mut report = LogisticsReport::default();
        exchange_at_base(1, 6.0, 1.0, &mut ships, &mut b, &mut ledger, &mut report).unwrap();
        assert_eq!(ships[0].mode(), ShipMode::StandbyAtBase);
        assert!(ledger.is_empty());
    }

    /// A 1 GWh ship returning full from far out, and a support ship that
    /// has chosen to meet it from `support_home`.
    fn rendezvous_pair(support_home: Option<GeoPosition>) -> (TpgShip, SupportShip) {
        let mut p = TpgShipParams::new(pos(30.0, 160.0), 1.0e9, 1.0e8, 20.0, 15.0);
        p.initial_storage_per = 90.0;
        p.govia_base_judge_energy_storage_per = 10.0;
        p.departure_storage_per = 50.0;
        p.full_return_storage_per = 80.0;
        let mut ship = TpgShip::new(ShipId(1), p).unwrap();

        let store = tpg_weather::TyphoonTrackStore::default();
        let waters = NavigableWaters::open_sea();
        let now = Utc.with_ymd_and_hms(2019, 9, 1, 0, 0, 0).unwrap();
        let ctx = ShipContext {
            tick: 1,
            now,
            next: now,
            tick_hours: 6.0,
            store: &store,
            forecasts: &[],
            waters: &waters,
            base_position: pos(24.0, 153.0),
            base_stored_wh: Decimal::ZERO,
            dock_tolerance_km: 1.0,
        };
        ship.step(&ctx, &mut Ledger::new()).unwrap();
        assert_eq!(ship.mode(), ShipMode::EnRouteToBase);

        let mut params = SupportShipParams::new(1.0e10, 30.0);
        params.supply_base_locate = support_home.unwrap_or_else(|| ship.position());
        let mut support = SupportShip::new(SupportShipId(1), params).unwrap();
        let logistics = LogisticsParams::default();
        let views = [ship.view()];
        // A zero-length tick keeps both parties where they are.
        let support_ctx = SupportContext {
            tick_hours: 0.0,
            ships: &views,
            base_position: pos(24.0, 153.0),
            base_pickup_requested: false,
            logistics: &logistics,
        };
        support.step(&support_ctx, &mut DispatchBoard::default());
        assert_eq!(support.mode(), SupportShipMode::EnRouteToRendezvous);
        (ship, support)
    }

    #[test]
    fn rendezvous_takes_cargo_above_departure_level() {
        let (ship, support) = rendezvous_pair(None);
        let opening_ship = ship.account().stored_wh();
        let mut ships = vec![ship];
        let mut supports = vec![support];
        let mut ledger = Ledger::new();
        let mut report = LogisticsReport::default();
        meet_at_sea(1, 1.0, &mut ships, &mut supports, &mut ledger, &mut report).unwrap();

        let moved = opening_ship - dec!(500_000_000);
        assert_eq!(ships[0].account().stored_wh(), dec!(500_000_000));
        assert_eq!(supports[0].account().stored_wh(), moved);
        assert_eq!(report.rendezvous_wh, moved);
        assert_eq!(ships[0].stats().total_unloaded_wh, moved);
        assert_eq!(ships[0].return_reason(), Some(ReturnReason::NoTarget));
        assert_eq!(supports[0].mode(), SupportShipMode::ReturningToSupplyBase);
        assert_eq!(supports[0].assigned_ship(), None);

        let mut balances = HolderBalances::new();
        balances.insert(
            EntityRef::TpgShip(ShipId(1)),
            HolderBalance {
                opening_wh: opening_ship,
                closing_wh: ships[0].account().stored_wh(),
            },
        );
        balances.insert(
            EntityRef::SupportShip(SupportShipId(1)),
            HolderBalance {
                opening_wh: Decimal::ZERO,
                closing_wh: supports[0].account().stored_wh(),
            },
        );
        assert_eq!(ledger.verify_conservation(1, &balances), ConservationResult::Balanced);
    }

    #[test]
    fn missed_rendezvous_moves_nothing() {
        let (ship, support) = rendezvous_pair(Some(pos(31.0, 161.0)));
        let opening_ship = ship.account().stored_wh();
        let mut ships = vec![ship];
        let mut supports = vec![support];
        let mut ledger = Ledger::new();
        let mut report = LogisticsReport::default();
        meet_at_sea(1, 1.0, &mut ships, &mut supports, &mut ledger, &mut report).unwrap();

        assert_eq!(report.missed_rendezvous, 1);
        assert_eq!(ships[0].account().stored_wh(), opening_ship);
        assert!(supports[0].account().is_empty());
        assert_eq!(supports[0].mode(), SupportShipMode::EnRouteToRendezvous);
        assert!(ledger.is_empty());
    }

    #[test]
    fn pickup_and_delivery_balance() {
        let mut b = base(8.0e9, None);
        b.update(Some(dec!(10_000_000_000)));
        assert!(b.pickup_requested());

        let mut params = SupportShipParams::new(1.0e10, 30.0);
        params.supply_base_locate = pos(24.0, 153.0);
        let mut supports = vec![SupportShip::new(SupportShipId(1), params).unwrap()];
        let logistics = LogisticsParams::default();
        let ctx = SupportContext {
            tick_hours: 6.0,
            ships: &[],
            base_position: b.position(),
            base_pickup_requested: b.pickup_requested(),
            logistics: &logistics,
        };
        let mut board = DispatchBoard::default();
        supports[0].step(&ctx, &mut board);
        assert_eq!(supports[0].mode(), SupportShipMode::EnRouteToStorageBase);

        let opening_base = b.account().stored_wh();
        let mut ledger = Ledger::new();
        let report =
            run_logistics(1, 6.0, 1.0, &mut [], &mut b, &mut supports, &mut ledger).unwrap();
        assert_eq!(report.pickup_wh, dec!(8_000_000_000));
        // Supply base and storage base coincide, so the cargo is delivered
        // in the same phase.
        assert_eq!(report.delivered_wh, dec!(8_000_000_000));
        assert!(!b.pickup_requested());
        assert_eq!(supports[0].mode(), SupportShipMode::IdleAtSupplyBase);

        let mut balances = HolderBalances::new();
        balances.insert(
            EntityRef::StorageBase,
            HolderBalance {
                opening_wh: opening_base,
                closing_wh: b.account().stored_wh(),
            },
        );
        balances.insert(
            EntityRef::SupportShip(SupportShipId(1)),
            HolderBalance {
                opening_wh: Decimal::ZERO,
                closing_wh: supports[0].account().stored_wh(),
            },
        );
        assert_eq!(ledger.verify_conservation(1, &balances), ConservationResult::Balanced);
    }
}
