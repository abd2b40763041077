//! Tick cycle: the phased loop that drives the fleet simulation.
//!
//! Each tick runs through these phases, in this order:
//!
//! 1. **Forecast** -- issue a fresh [`TyphoonForecast`] for every trackable
//!    typhoon at the current time. Forecasts are never carried over.
//!
//! 2. **Base** -- the storage base raises or drops its pickup call.
//!
//! 3. **Ships** -- every generation ship runs its state machine, in id
//!    order, against start-of-tick views of the base and the forecasts.
//!
//! 4. **Support ships** -- every support ship picks its work from the
//!    generation ships' start-of-tick views and moves.
//!
//! 5. **Logistics** -- all energy transfers between holders, see
//!    [`tpg_fleet::logistics`].
//!
//! 6. **Verify** -- the energy ledger is checked against every holder's
//!    opening and closing balance. An imbalance is logged, not fatal.
//!
//! 7. **Snapshot** -- the read-only [`TickSnapshot`] for output, then the
//!    clock advances.
//!
//! The tick cycle is deterministic given the same configuration, track data
//! and noise seed.
//!
//! [`TyphoonForecast`]: tpg_types::TyphoonForecast

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, error, info};

use tpg_fleet::{
    DispatchBoard, FleetError, LogisticsParams, LogisticsReport, NavigableWaters, ShipContext,
    StorageBase, SupportContext, SupportShip, TpgShip, run_logistics,
};
use tpg_ledger::{
    ConservationResult, FlowTotals, HolderBalance, HolderBalances, Ledger, LedgerAnomaly,
};
use tpg_types::{EntityRef, ShipId, SupportShipId, TickSnapshot};
use tpg_weather::{Forecaster, TyphoonTrackStore};

use crate::clock::{ClockError, SimClock};
use crate::config::{ConfigError, SimulationConfig};

/// Errors that can occur while building the state or executing a tick.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// A clock operation failed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// A fleet agent could not be built or stepped.
    #[error("fleet error: {source}")]
    Fleet {
        /// The underlying fleet error.
        #[from]
        source: FleetError,
    },

    /// The configuration cannot produce a runnable state.
    #[error("config error: {source}")]
    Config {
        /// The underlying configuration error.
        #[from]
        source: ConfigError,
    },
}

/// Summary of a single tick's execution.
#[derive(Debug, Clone)]
pub struct TickSummary {
    /// The tick number that was executed (1-based).
    pub tick: u64,
    /// Simulated time at the end of the tick.
    pub time: DateTime<Utc>,
    /// Number of typhoons with a non-empty forecast this tick.
    pub trackable_typhoons: usize,
    /// Ledger flows recorded during this tick.
    pub flows: FlowTotals,
    /// Energy moved in the logistics phase.
    pub logistics: LogisticsReport,
    /// Conservation failure detected this tick, if any.
    pub anomaly: Option<LedgerAnomaly>,
    /// End-of-tick state of every agent.
    pub snapshot: TickSnapshot,
}

/// The mutable simulation state passed through the tick cycle.
#[derive(Debug)]
pub struct SimulationState {
    /// The simulation clock.
    pub clock: SimClock,
    /// Observed typhoon tracks.
    pub store: TyphoonTrackStore,
    /// The forecaster issuing per-tick forecasts.
    pub forecaster: Forecaster,
    /// Navigable-water mask for intercept points.
    pub waters: NavigableWaters,
    /// Rendezvous rules.
    pub logistics: LogisticsParams,
    /// Generation ships, in id order.
    pub ships: Vec<TpgShip>,
    /// The storage base.
    pub base: StorageBase,
    /// Support ships, in id order.
    pub support_ships: Vec<SupportShip>,
    /// Every energy movement of the run.
    pub ledger: Ledger,
    /// Optional cap on the number of ticks.
    pub max_ticks: Option<u64>,
}

impl SimulationState {
    /// Build the initial state from a validated configuration and the track
    /// data.
    ///
    /// The run covers the configured time range; a missing start or end
    /// falls back to the first or last typhoon observation.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::Config`] if no time range can be determined or
    /// the configuration is invalid, and [`TickError::Fleet`] if an agent
    /// cannot be built.
    pub fn new(config: &SimulationConfig, store: TyphoonTrackStore) -> Result<Self, TickError> {
        config.validate()?;

        let track_range = store.time_range();
        let start = config
            .simulation
            .start()?
            .or_else(|| track_range.map(|(first, _)| first));
        let end = config
            .simulation
            .end()?
            .or_else(|| track_range.map(|(_, last)| last));
        let (Some(start), Some(end)) = (start, end) else {
            return Err(TickError::Config {
                source: ConfigError::Invalid {
                    reason: "no simulation time range: set simulation.start_time and \
                             simulation.end_time or load track data"
                        .to_owned(),
                },
            });
        };
        let clock = SimClock::new(start, end, config.simulation.tick_hours)?;

        let mut forecaster = Forecaster::new(
            config.forecaster.forecast_time,
            config.forecaster.forecast_error_slope,
            config.simulation.tick_hours,
        );
        if let Some(seed) = config.forecaster.noise_seed {
            forecaster = forecaster.with_noise_seed(seed);
        }

        let ships = config
            .tpg_ships
            .iter()
            .zip(1_u32..)
            .map(|(params, raw)| TpgShip::new(ShipId::new(raw), params.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        let support_ships = config
            .support_ships
            .iter()
            .zip(1_u32..)
            .map(|(params, raw)| SupportShip::new(SupportShipId::new(raw), params.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            start = %start,
            end = %end,
            tick_hours = config.simulation.tick_hours,
            ships = ships.len(),
            support_ships = support_ships.len(),
            typhoons = store.typhoon_count(),
            "Simulation state built"
        );

        Ok(Self {
            clock,
            store,
            forecaster,
            waters: NavigableWaters::new(config.navigation.sea_bands.clone()),
            logistics: config.logistics.clone(),
            ships,
            base: StorageBase::new(config.storage_base.clone())?,
            support_ships,
            ledger: Ledger::new(),
            max_ticks: config.simulation.max_ticks,
        })
    }

    /// Stored energy of every holder, keyed by entity.
    pub fn holdings(&self) -> BTreeMap<EntityRef, Decimal> {
        let mut holdings = BTreeMap::new();
        for ship in &self.ships {
            holdings.insert(EntityRef::TpgShip(ship.id()), ship.account().stored_wh());
        }
        holdings.insert(EntityRef::StorageBase, self.base.account().stored_wh());
        for support in &self.support_ships {
            holdings.insert(
                EntityRef::SupportShip(support.id()),
                support.account().stored_wh(),
            );
        }
        holdings
    }

    /// Read-only state of every agent, stamped with `tick` and `time`.
    pub fn snapshot(&self, tick: u64, time: DateTime<Utc>) -> TickSnapshot {
        TickSnapshot {
            tick,
            time,
            ships: self.ships.iter().map(TpgShip::snapshot).collect(),
            support_ships: self.support_ships.iter().map(SupportShip::snapshot).collect(),
            storage_base: self.base.snapshot(),
            typhoons: self.store.active_at(time),
        }
    }
}

/// Execute one complete tick of the simulation.
///
/// # Errors
///
/// Returns [`TickError::Clock`] if simulated time overflows and
/// [`TickError::Fleet`] if an energy movement cannot be recorded.
pub fn run_tick(state: &mut SimulationState) -> Result<TickSummary, TickError> {
    let tick = state
        .clock
        .tick()
        .checked_add(1)
        .ok_or(ClockError::TickOverflow)?;
    let now = state.clock.now();
    let next = state.clock.next()?;
    let tick_hours = f64::from(state.clock.tick_hours());

    // --- Phase 1: Forecast ---
    let forecasts = state.forecaster.forecast_all(&state.store, now);
    debug!(tick, time = %now, trackable = forecasts.len(), "Tick started");

    // --- Phase 2: Base ---
    let support_capacity = state
        .support_ships
        .first()
        .map(|support| support.account().capacity_wh());
    state.base.update(support_capacity);

    let opening = state.holdings();
    let views: Vec<_> = state.ships.iter().map(TpgShip::view).collect();

    // --- Phase 3: Ships ---
    let ship_ctx = ShipContext {
        tick,
        now,
        next,
        tick_hours,
        store: &state.store,
        forecasts: &forecasts,
        waters: &state.waters,
        base_position: state.base.position(),
        base_stored_wh: state.base.account().stored_wh(),
        dock_tolerance_km: state.logistics.rendezvous_tolerance_km,
    };
    for ship in &mut state.ships {
        ship.step(&ship_ctx, &mut state.ledger)?;
    }

    // --- Phase 4: Support ships ---
    let support_ctx = SupportContext {
        tick_hours,
        ships: &views,
        base_position: state.base.position(),
        base_pickup_requested: state.base.pickup_requested(),
        logistics: &state.logistics,
    };
    let mut board = DispatchBoard::from_fleet(&state.support_ships);
    for support in &mut state.support_ships {
        support.step(&support_ctx, &mut board);
    }

    // --- Phase 5: Logistics ---
    let logistics = run_logistics(
        tick,
        tick_hours,
        state.logistics.rendezvous_tolerance_km,
        &mut state.ships,
        &mut state.base,
        &mut state.support_ships,
        &mut state.ledger,
    )?;

    // --- Phase 6: Verify ---
    let anomaly = verify_tick(state, tick, &opening);

    // --- Phase 7: Snapshot ---
    let snapshot = state.snapshot(tick, next);
    state.clock.advance()?;

    Ok(TickSummary {
        tick,
        time: next,
        trackable_typhoons: forecasts.len(),
        flows: state.ledger.flow_totals(tick),
        logistics,
        anomaly,
        snapshot,
    })
}

/// Check the ledger against every holder's opening and closing balance.
fn verify_tick(
    state: &SimulationState,
    tick: u64,
    opening: &BTreeMap<EntityRef, Decimal>,
) -> Option<LedgerAnomaly> {
    let balances: HolderBalances = state
        .holdings()
        .into_iter()
        .map(|(entity, closing_wh)| {
            let opening_wh = opening.get(&entity).copied().unwrap_or(Decimal::ZERO);
            (
                entity,
                HolderBalance {
                    opening_wh,
                    closing_wh,
                },
            )
        })
        .collect();

    match state.ledger.verify_conservation(tick, &balances) {
        ConservationResult::Balanced => None,
        ConservationResult::Anomaly(anomaly) => {
            error!(
                tick,
                holders = anomaly.imbalances.len(),
                message = %anomaly.message,
                "Energy conservation violated"
            );
            Some(anomaly)
        }
    }
}
