//! The typhoon power generation ship state machine.
//!
//! Each tick a ship runs, in order:
//!
//! 1. **Target selection** through [`select_target`], unless it is
//!    transferring at base.
//! 2. **Energy check**: below the return threshold the ship heads home
//!    whatever the target scores say; at the full-return level it heads
//!    home to unload. Both returns are kept until the ship is back.
//! 3. **Movement and spatial transition**: great-circle step toward the
//!    waypoint, then `GENERATING` if the target's actual centre is within
//!    effective range at the end of the tick, `TRANSFERRING` on arrival at
//!    base.
//! 4. **Energy flows**: generation while inside the storm, propulsion
//!    consumption otherwise, both recorded in the ledger.
//!
//! Transfers with the base and support ships are not done here; the
//! logistics phase drives them through [`crate::logistics`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};

use tpg_ledger::{EnergyAccount, Ledger, wh_from_f64};
use tpg_types::{
    BranchCondition, GeoPosition, ReturnReason, ShipId, ShipMode, TpgShipSnapshot,
    TyphoonForecast, TyphoonId, knots_to_km_per_hour,
};
use tpg_weather::TyphoonTrackStore;

use crate::FleetError;
use crate::config::TpgShipParams;
use crate::decision::{ShipView, TargetDecision, select_target};
use crate::navigation::NavigableWaters;
use crate::propulsion::PropulsionModel;

/// Everything a ship may read during its update.
#[derive(Debug, Clone, Copy)]
pub struct ShipContext<'a> {
    /// The tick being simulated.
    pub tick: u64,
    /// Simulated time at the start of the tick.
    pub now: DateTime<Utc>,
    /// Simulated time at the end of the tick.
    pub next: DateTime<Utc>,
    /// Tick length in hours.
    pub tick_hours: f64,
    /// Observed tracks, for the actual typhoon positions.
    pub store: &'a TyphoonTrackStore,
    /// Forecasts issued at `now`.
    pub forecasts: &'a [TyphoonForecast],
    /// Navigable-water mask.
    pub waters: &'a NavigableWaters,
    /// Storage base position.
    pub base_position: GeoPosition,
    /// Energy held by the base at the start of the tick.
    pub base_stored_wh: Decimal,
    /// Distance at which a ship counts as docked at base, km.
    pub dock_tolerance_km: f64,
}

/// Running totals of one ship.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ShipStats {
    /// Energy generated over the run.
    pub total_generated_wh: Decimal,
    /// Energy burned for propulsion over the run.
    pub total_consumed_wh: Decimal,
    /// Energy handed to the base or support ships over the run.
    pub total_unloaded_wh: Decimal,
    /// Hours spent generating.
    pub generating_hours: f64,
    /// Hours spent sailing under own power.
    pub consuming_hours: f64,
}

/// What the ship decided to do this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Plan {
    /// Head for a waypoint on the way to (or riding) a typhoon.
    Pursue {
        typhoon_id: TyphoonId,
        waypoint: GeoPosition,
        speed_kt: f64,
        branch: BranchCondition,
    },
    /// Sail back to base.
    Return {
        reason: ReturnReason,
        branch: BranchCondition,
    },
    /// Already at base: start exchanging energy with it.
    Dock {
        reason: ReturnReason,
        branch: BranchCondition,
    },
    /// Stay at base.
    Hold { branch: BranchCondition },
}

/// One typhoon power generation ship.
#[derive(Debug, Clone)]
pub struct TpgShip {
    id: ShipId,
    params: TpgShipParams,
    propulsion: PropulsionModel,
    position: GeoPosition,
    account: EnergyAccount,
    mode: ShipMode,
    branch: BranchCondition,
    return_reason: Option<ReturnReason>,
    target: Option<TyphoonId>,
    waypoint: Option<GeoPosition>,
    speed_kt: f64,
    typhoon_distance_km: Option<f64>,
    tick_generated_wh: Decimal,
    tick_consumed_wh: Decimal,
    stats: ShipStats,
}

impl TpgShip {
    /// Create a ship in `STANDBY_AT_BASE` at its initial position, charged
    /// to its initial storage percentage.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::InvalidParameter`] if the parameters are
    /// inconsistent, or a ledger error if the account cannot be built.
    pub fn new(id: ShipId, params: TpgShipParams) -> Result<Self, FleetError> {
        params.validate(&id.to_string())?;
        let account =
            EnergyAccount::with_percent(wh_from_f64(params.max_storage_wh), params.initial_storage_per)?;
        Ok(Self {
            id,
            propulsion: PropulsionModel::for_ship(&params),
            position: params.initial_position,
            account,
            mode: ShipMode::StandbyAtBase,
            branch: BranchCondition::Standby,
            return_reason: None,
            target: None,
            waypoint: None,
            speed_kt: 0.0,
            typhoon_distance_km: None,
            tick_generated_wh: Decimal::ZERO,
            tick_consumed_wh: Decimal::ZERO,
            stats: ShipStats::default(),
            params,
        })
    }

    /// The ship's identifier.
    pub const fn id(&self) -> ShipId {
        self.id
    }

    /// The ship's parameters.
    pub const fn params(&self) -> &TpgShipParams {
        &self.params
    }

    /// The sized propulsion model.
    pub const fn propulsion(&self) -> &PropulsionModel {
        &self.propulsion
    }

    /// Current position.
    pub const fn position(&self) -> GeoPosition {
        self.position
    }

    /// Current mode.
    pub const fn mode(&self) -> ShipMode {
        self.mode
    }

    /// Decision branch of the last tick.
    pub const fn branch(&self) -> BranchCondition {
        self.branch
    }

    /// Why the ship is returning, if it is.
    pub const fn return_reason(&self) -> Option<ReturnReason> {
        self.return_reason
    }

    /// Committed target typhoon.
    pub const fn target(&self) -> Option<TyphoonId> {
        self.target
    }

    /// The ship's energy account.
    pub const fn account(&self) -> &EnergyAccount {
        &self.account
    }

    /// Mutable access to the energy account, for transfers.
    pub const fn account_mut(&mut self) -> &mut EnergyAccount {
        &mut self.account
    }

    /// Running totals.
    pub const fn stats(&self) -> &ShipStats {
        &self.stats
    }

    /// Energy level the ship leaves base with, watt-hours.
    pub fn departure_wh(&self) -> Decimal {
        wh_from_f64(self.params.max_storage_wh * self.params.departure_storage_per / 100.0)
            .min(self.account.capacity_wh())
    }

    /// The start-of-tick view other agents and the decision code see.
    pub fn view(&self) -> ShipView {
        ShipView {
            ship_id: self.id,
            position: self.position,
            mode: self.mode,
            return_reason: self.return_reason,
            target: self.target,
            stored_wh: self.account.stored_wh(),
            storage_per: self.account.percent(),
            return_speed_kt: self.params.ship_return_speed_kt,
        }
    }

    /// Run this ship's update for one tick.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::Ledger`] if an energy movement cannot be
    /// recorded.
    pub fn step(&mut self, ctx: &ShipContext<'_>, ledger: &mut Ledger) -> Result<(), FleetError> {
        self.tick_generated_wh = Decimal::ZERO;
        self.tick_consumed_wh = Decimal::ZERO;
        self.speed_kt = 0.0;
        self.typhoon_distance_km = None;

        if self.mode == ShipMode::Transferring {
            self.branch = BranchCondition::Transferring;
            return Ok(());
        }

        let decision = select_target(
            &self.view(),
            ctx.forecasts,
            &self.params,
            ctx.waters,
            ctx.now,
        );
        if let TargetDecision::Pursue(candidate) = decision {
            debug!(
                ship = %self.id,
                typhoon = %candidate.typhoon_id,
                score = candidate.score,
                capture_hours = candidate.capture_hours,
                generation_hours = candidate.generation_hours,
                "Best target"
            );
        }

        match self.plan(ctx, decision) {
            Plan::Pursue {
                typhoon_id,
                waypoint,
                speed_kt,
                branch,
            } => self.pursue(ctx, ledger, typhoon_id, waypoint, speed_kt, branch),
            Plan::Return { reason, branch } => self.head_home(ctx, ledger, reason, branch),
            Plan::Dock { reason, branch } => {
                self.position = ctx.base_position;
                self.target = None;
                self.waypoint = None;
                self.return_reason = Some(reason);
                self.transition(ShipMode::Transferring, branch);
                Ok(())
            }
            Plan::Hold { branch } => {
                self.target = None;
                self.waypoint = None;
                self.return_reason = (branch == BranchCondition::LowEnergyReturn)
                    .then_some(ReturnReason::LowEnergy);
                self.transition(ShipMode::StandbyAtBase, branch);
                Ok(())
            }
        }
    }

    /// Close a base transfer: the ship is docked and ready to leave.
    pub fn finish_transfer(&mut self) {
        self.return_reason = None;
        self.transition(ShipMode::StandbyAtBase, BranchCondition::TransferComplete);
    }

    /// Note energy handed over to the base or a support ship.
    pub fn record_unload(&mut self, quantity_wh: Decimal) {
        self.stats.total_unloaded_wh = self.stats.total_unloaded_wh.saturating_add(quantity_wh);
    }

    /// A support ship took the cargo at sea: the ship no longer has to go
    /// home and picks its next target on the following tick.
    pub fn finish_offload(&mut self) {
        if self.mode == ShipMode::EnRouteToBase {
            self.return_reason = Some(ReturnReason::NoTarget);
        }
    }

    /// Read-only state for the tick log.
    pub fn snapshot(&self) -> TpgShipSnapshot {
        TpgShipSnapshot {
            ship_id: self.id,
            position: self.position,
            mode: self.mode,
            branch: self.branch,
            return_reason: self.return_reason,
            speed_kt: self.speed_kt,
            stored_wh: self.account.stored_wh(),
            capacity_wh: self.account.capacity_wh(),
            storage_per: self.account.percent(),
            target_typhoon: self.target,
            waypoint: self.waypoint,
            typhoon_distance_km: self.typhoon_distance_km,
            generated_wh: self.tick_generated_wh,
            consumed_wh: self.tick_consumed_wh,
            total_generated_wh: self.stats.total_generated_wh,
            total_consumed_wh: self.stats.total_consumed_wh,
            total_unloaded_wh: self.stats.total_unloaded_wh,
            generating_hours: self.stats.generating_hours,
            consuming_hours: self.stats.consuming_hours,
        }
    }

    /// Return forced by the energy level, if any.
    fn energy_override(&self) -> Option<ReturnReason> {
        let percent = self.account.percent();
        if percent < self.params.govia_base_judge_energy_storage_per {
            return Some(ReturnReason::LowEnergy);
        }
        if self.mode == ShipMode::EnRouteToBase {
            if let Some(reason @ (ReturnReason::LowEnergy | ReturnReason::Full)) = self.return_reason
            {
                return Some(reason);
            }
        }
        if percent >= self.params.full_return_storage_per {
            return Some(ReturnReason::Full);
        }
        None
    }

    fn plan(&self, ctx: &ShipContext<'_>, decision: TargetDecision) -> Plan {
        let at_base = self.position.distance_km(ctx.base_position) <= ctx.dock_tolerance_km;

        if let Some(reason) = self.energy_override() {
            let branch = match reason {
                ReturnReason::LowEnergy => BranchCondition::LowEnergyReturn,
                ReturnReason::Full => BranchCondition::FullStorageReturn,
                ReturnReason::NoTarget => BranchCondition::NoTargetReturn,
            };
            if !at_base {
                return Plan::Return { reason, branch };
            }
            if reason == ReturnReason::LowEnergy && ctx.base_stored_wh <= Decimal::ZERO {
                return Plan::Hold { branch };
            }
            return Plan::Dock { reason, branch };
        }

        match decision {
            TargetDecision::Pursue(candidate) => {
                let kept = self.target == Some(candidate.typhoon_id) && self.mode.is_pursuing();
                let riding = kept && self.mode == ShipMode::Generating;
                let follow = riding
                    .then(|| next_forecast_position(ctx.forecasts, candidate.typhoon_id))
                    .flatten();
                let (waypoint, speed_kt) = follow.map_or(
                    (candidate.intercept_position, candidate.tracking_speed_kt),
                    |next| (next, self.params.ship_max_speed_kt),
                );
                Plan::Pursue {
                    typhoon_id: candidate.typhoon_id,
                    waypoint,
                    speed_kt,
                    branch: if kept {
                        BranchCondition::TargetKept
                    } else {
                        BranchCondition::TargetSelected
                    },
                }
            }
            TargetDecision::NoFeasibleTarget => {
                let held = self
                    .target
                    .filter(|_| self.mode.is_pursuing())
                    .and_then(|id| next_forecast_position(ctx.forecasts, id).map(|next| (id, next)));
                if let Some((typhoon_id, waypoint)) = held {
                    return Plan::Pursue {
                        typhoon_id,
                        waypoint,
                        speed_kt: self.params.ship_max_speed_kt,
                        branch: BranchCondition::TargetKept,
                    };
                }
                if at_base {
                    Plan::Hold {
                        branch: BranchCondition::Standby,
                    }
                } else {
                    Plan::Return {
                        reason: ReturnReason::NoTarget,
                        branch: if self.target.is_some() {
                            BranchCondition::TargetLost
                        } else {
                            BranchCondition::NoTargetReturn
                        },
                    }
                }
            }
        }
    }

    fn pursue(
        &mut self,
        ctx: &ShipContext<'_>,
        ledger: &mut Ledger,
        typhoon_id: TyphoonId,
        waypoint: GeoPosition,
        speed_kt: f64,
        branch: BranchCondition,
    ) -> Result<(), FleetError> {
        let was_riding = self.mode == ShipMode::Generating && self.target == Some(typhoon_id);
        self.target = Some(typhoon_id);
        self.waypoint = Some(waypoint);
        self.return_reason = None;
        let sailed_km = self.sail_toward(waypoint, speed_kt, ctx.tick_hours);

        self.typhoon_distance_km = ctx
            .store
            .position_at(typhoon_id, ctx.next)
            .map(|centre| self.position.distance_km(centre));
        let in_range = self
            .typhoon_distance_km
            .is_some_and(|d| d <= self.params.typhoon_effective_range);

        if in_range {
            self.transition(ShipMode::Generating, BranchCondition::Generating);
            self.generate(ctx, ledger)
        } else {
            let branch = if was_riding {
                BranchCondition::Chasing
            } else {
                branch
            };
            self.transition(ShipMode::EnRouteToTarget, branch);
            self.consume(ctx, ledger, sailed_km)
        }
    }

    fn head_home(
        &mut self,
        ctx: &ShipContext<'_>,
        ledger: &mut Ledger,
        reason: ReturnReason,
        branch: BranchCondition,
    ) -> Result<(), FleetError> {
        self.target = None;
        self.waypoint = Some(ctx.base_position);
        self.return_reason = Some(reason);
        let sailed_km = self.sail_toward(
            ctx.base_position,
            self.params.ship_return_speed_kt,
            ctx.tick_hours,
        );
        self.consume(ctx, ledger, sailed_km)?;

        if self.position.distance_km(ctx.base_position) <= ctx.dock_tolerance_km {
            self.position = ctx.base_position;
            self.waypoint = None;
            self.transition(ShipMode::Transferring, BranchCondition::ArrivedAtBase);
        } else {
            self.transition(ShipMode::EnRouteToBase, branch);
        }
        Ok(())
    }

    /// Step toward `waypoint` and return the distance covered in km.
    fn sail_toward(&mut self, waypoint: GeoPosition, speed_kt: f64, tick_hours: f64) -> f64 {
        let reach_km = knots_to_km_per_hour(speed_kt.max(0.0)) * tick_hours;
        let next = self.position.step_toward(waypoint, reach_km);
        let sailed_km = self.position.distance_km(next);
        self.position = next;
        if tick_hours > 0.0 {
            self.speed_kt = sailed_km / tick_hours / knots_to_km_per_hour(1.0);
        }
        sailed_km
    }

    fn generate(&mut self, ctx: &ShipContext<'_>, ledger: &mut Ledger) -> Result<(), FleetError> {
        let output = wh_from_f64(self.params.generator_output_w * ctx.tick_hours);
        let outcome = self.account.charge(output);
        ledger.record_generation(ctx.tick, self.id, outcome)?;
        self.tick_generated_wh = outcome.accepted_wh;
        self.stats.total_generated_wh = self
            .stats
            .total_generated_wh
            .saturating_add(outcome.accepted_wh);
        self.stats.generating_hours += ctx.tick_hours;
        Ok(())
    }

    fn consume(
        &mut self,
        ctx: &ShipContext<'_>,
        ledger: &mut Ledger,
        sailed_km: f64,
    ) -> Result<(), FleetError> {
        if sailed_km <= 0.0 {
            return Ok(());
        }
        let demand = wh_from_f64(self.propulsion.energy_wh(self.speed_kt, ctx.tick_hours));
        let burned = self.account.discharge(demand);
        ledger.record_propulsion(ctx.tick, self.id, burned)?;
        self.tick_consumed_wh = burned;
        self.stats.total_consumed_wh = self.stats.total_consumed_wh.saturating_add(burned);
        self.stats.consuming_hours += ctx.tick_hours;
        Ok(())
    }

    fn transition(&mut self, mode: ShipMode, branch: BranchCondition) {
        if mode != self.mode {
            info!(
                ship = %self.id,
                from = ?self.mode,
                to = ?mode,
                branch = ?branch,
                storage_per = self.account.percent(),
                "Ship mode changed"
            );
        }
        self.mode = mode;
        self.branch = branch;
    }
}

/// The first predicted position of a typhoon in this tick's forecasts.
fn next_forecast_position(forecasts: &[TyphoonForecast], id: TyphoonId) -> Option<GeoPosition> {
    forecasts
        .iter()
        .find(|f| f.typhoon_id == id)
        .and_then(TyphoonForecast::first_point)
        .map(|p| p.position)
}
