//! Support ships: energy carriers between returning generation ships, the
//! storage base and their supply base.
//!
//! A support ship never generates. Each tick, in priority order, it:
//!
//! 1. finishes a trip home to its supply base;
//! 2. keeps chasing the generation ship it is meeting, while that ship is
//!    still returning full;
//! 3. keeps heading to the storage base while the base is still calling;
//! 4. otherwise looks for new work: the nearest unclaimed generation ship
//!    returning full and far from base, then the base call;
//! 5. with nothing to do, carries any cargo home, or idles there.
//!
//! Support ships decide from the generation ships' start-of-tick views and
//! aim for where each ship will be at the end of the tick, so that the
//! rendezvous happens in the logistics phase of the same tick when the
//! support ship is fast enough.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use tracing::{debug, info};

use tpg_ledger::{EnergyAccount, wh_from_f64};
use tpg_types::{
    GeoPosition, ReturnReason, ShipId, ShipMode, SupportShipId, SupportShipMode,
    SupportShipSnapshot, knots_to_km_per_hour,
};

use crate::FleetError;
use crate::config::{LogisticsParams, SupportShipParams};
use crate::decision::ShipView;

/// Work already taken by support ships this tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchBoard {
    /// Generation ships some support ship is meeting.
    pub claimed_ships: BTreeSet<ShipId>,
    /// Whether a support ship is already on its way to the storage base.
    pub base_claimed: bool,
}

impl DispatchBoard {
    /// The board implied by the support ships' current assignments.
    pub fn from_fleet(support_ships: &[SupportShip]) -> Self {
        let mut board = Self::default();
        for support in support_ships {
            if let Some(ship) = support.assigned_ship {
                board.claimed_ships.insert(ship);
            }
            if support.mode == SupportShipMode::EnRouteToStorageBase {
                board.base_claimed = true;
            }
        }
        board
    }
}

/// What a support ship may read during its update.
#[derive(Debug, Clone, Copy)]
pub struct SupportContext<'a> {
    /// Tick length in hours.
    pub tick_hours: f64,
    /// Start-of-tick views of every generation ship, in id order.
    pub ships: &'a [ShipView],
    /// Storage base position.
    pub base_position: GeoPosition,
    /// Whether the storage base is calling for a pickup.
    pub base_pickup_requested: bool,
    /// Rendezvous rules.
    pub logistics: &'a LogisticsParams,
}

impl SupportContext<'_> {
    /// Where a returning ship will be at the end of the tick.
    pub fn projected_position(&self, ship: &ShipView) -> GeoPosition {
        let reach_km = knots_to_km_per_hour(ship.return_speed_kt.max(0.0)) * self.tick_hours;
        ship.position.step_toward(self.base_position, reach_km)
    }

    /// Whether a ship is still returning with a full load.
    fn returning_full(ship: &ShipView) -> bool {
        ship.mode == ShipMode::EnRouteToBase && ship.return_reason == Some(ReturnReason::Full)
    }

    /// Whether a ship is worth a new interception.
    fn worth_meeting(&self, ship: &ShipView) -> bool {
        Self::returning_full(ship)
            && ship.storage_per >= self.logistics.rendezvous_min_storage_per
            && ship.position.distance_km(self.base_position)
                > self.logistics.rendezvous_min_base_distance_km
    }
}

/// One support ship.
#[derive(Debug, Clone)]
pub struct SupportShip {
    id: SupportShipId,
    params: SupportShipParams,
    position: GeoPosition,
    account: EnergyAccount,
    mode: SupportShipMode,
    assigned_ship: Option<ShipId>,
    waypoint: Option<GeoPosition>,
    total_delivered_wh: Decimal,
}

impl SupportShip {
    /// Create an empty support ship idling at its supply base.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::InvalidParameter`] for inconsistent parameters.
    pub fn new(id: SupportShipId, params: SupportShipParams) -> Result<Self, FleetError> {
        params.validate(&id.to_string())?;
        Ok(Self {
            id,
            position: params.supply_base_locate,
            account: EnergyAccount::empty(wh_from_f64(params.max_storage_wh))?,
            mode: SupportShipMode::IdleAtSupplyBase,
            assigned_ship: None,
            waypoint: None,
            total_delivered_wh: Decimal::ZERO,
            params,
        })
    }

    /// The support ship's identifier.
    pub const fn id(&self) -> SupportShipId {
        self.id
    }

    /// Current position.
    pub const fn position(&self) -> GeoPosition {
        self.position
    }

    /// Home port.
    pub const fn supply_base(&self) -> GeoPosition {
        self.params.supply_base_locate
    }

    /// Current mode.
    pub const fn mode(&self) -> SupportShipMode {
        self.mode
    }

    /// The generation ship being met, if any.
    pub const fn assigned_ship(&self) -> Option<ShipId> {
        self.assigned_ship
    }

    /// The support ship's energy account.
    pub const fn account(&self) -> &EnergyAccount {
        &self.account
    }

    /// Mutable access to the energy account, for transfers.
    pub const fn account_mut(&mut self) -> &mut EnergyAccount {
        &mut self.account
    }

    /// Energy delivered to the supply base over the run.
    pub const fn total_delivered_wh(&self) -> Decimal {
        self.total_delivered_wh
    }

    /// Run this support ship's update for one tick.
    pub fn step(&mut self, ctx: &SupportContext<'_>, board: &mut DispatchBoard) {
        match self.mode {
            SupportShipMode::ReturningToSupplyBase => {
                self.sail_toward(self.supply_base(), ctx.tick_hours);
                return;
            }
            SupportShipMode::EnRouteToRendezvous => {
                let chased = self
                    .assigned_ship
                    .and_then(|id| ctx.ships.iter().find(|s| s.ship_id == id))
                    .filter(|s| SupportContext::returning_full(s));
                if let Some(ship) = chased {
                    let meeting_point = ctx.projected_position(ship);
                    self.sail_toward(meeting_point, ctx.tick_hours);
                    return;
                }
                if let Some(id) = self.assigned_ship.take() {
                    board.claimed_ships.remove(&id);
                    debug!(support = %self.id, ship = %id, "Rendezvous called off");
                }
            }
            SupportShipMode::EnRouteToStorageBase => {
                if ctx.base_pickup_requested {
                    self.sail_toward(ctx.base_position, ctx.tick_hours);
                    return;
                }
                board.base_claimed = false;
            }
            SupportShipMode::IdleAtSupplyBase => {}
        }
        self.dispatch(ctx, board);
    }

    /// Pick new work.
    fn dispatch(&mut self, ctx: &SupportContext<'_>, board: &mut DispatchBoard) {
        let has_room = !self.account.free_wh().is_zero();

        let nearest = ctx
            .ships
            .iter()
            .filter(|s| has_room && ctx.worth_meeting(s) && !board.claimed_ships.contains(&s.ship_id))
            .min_by(|a, b| {
                self.position
                    .distance_km(a.position)
                    .total_cmp(&self.position.distance_km(b.position))
                    .then_with(|| a.ship_id.cmp(&b.ship_id))
            });
        if let Some(ship) = nearest {
            board.claimed_ships.insert(ship.ship_id);
            self.assigned_ship = Some(ship.ship_id);
            self.set_mode(SupportShipMode::EnRouteToRendezvous);
            let meeting_point = ctx.projected_position(ship);
            self.sail_toward(meeting_point, ctx.tick_hours);
            return;
        }

        if has_room && ctx.base_pickup_requested && !board.base_claimed {
            board.base_claimed = true;
            self.set_mode(SupportShipMode::EnRouteToStorageBase);
            self.sail_toward(ctx.base_position, ctx.tick_hours);
            return;
        }

        let home = self.supply_base();
        if self.account.is_empty() && self.position == home {
            self.waypoint = None;
            self.set_mode(SupportShipMode::IdleAtSupplyBase);
        } else {
            self.set_mode(SupportShipMode::ReturningToSupplyBase);
            self.sail_toward(home, ctx.tick_hours);
        }
    }

    /// Cargo taken on at sea: head home.
    pub fn finish_rendezvous(&mut self) {
        self.assigned_ship = None;
        self.set_mode(SupportShipMode::ReturningToSupplyBase);
    }

    /// Cargo loaded at the storage base: head home.
    pub fn finish_pickup(&mut self) {
        self.set_mode(SupportShipMode::ReturningToSupplyBase);
    }

    /// Unload everything at the supply base. Returns the amount delivered.
    pub fn unload(&mut self) -> Decimal {
        let stored = self.account.stored_wh();
        let delivered = self.account.discharge(stored);
        self.total_delivered_wh = self.total_delivered_wh.saturating_add(delivered);
        self.waypoint = None;
        self.set_mode(SupportShipMode::IdleAtSupplyBase);
        delivered
    }

    /// Read-only state for the tick log.
    pub fn snapshot(&self) -> SupportShipSnapshot {
        SupportShipSnapshot {
            support_ship_id: self.id,
            position: self.position,
            mode: self.mode,
            stored_wh: self.account.stored_wh(),
            capacity_wh: self.account.capacity_wh(),
            assigned_ship: self.assigned_ship,
            waypoint: self.waypoint,
            total_delivered_wh: self.total_delivered_wh,
        }
    }

    fn sail_toward(&mut self, waypoint: GeoPosition, tick_hours: f64) {
        let reach_km = knots_to_km_per_hour(self.params.ship_speed_kt) * tick_hours;
        self.waypoint = Some(waypoint);
        self.position = self.position.step_toward(waypoint, reach_km);
    }

    fn set_mode(&mut self, mode: SupportShipMode) {
        if mode != self.mode {
            info!(
                support = %self.id,
                from = ?self.mode,
                to = ?mode,
                ship = ?self.assigned_ship,
                "Support ship mode changed"
            );
        }
        self.mode = mode;
    }
}
