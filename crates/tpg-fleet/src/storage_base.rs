//! The storage base: a fixed energy store that ships unload into and
//! recharge from, and that support ships empty when it fills up.

use rust_decimal::Decimal;
use tracing::info;

use tpg_ledger::{EnergyAccount, wh_from_f64};
use tpg_types::{GeoPosition, StorageBaseSnapshot};

use crate::FleetError;
use crate::config::StorageBaseParams;

/// The fleet's storage base.
#[derive(Debug, Clone)]
pub struct StorageBase {
    params: StorageBaseParams,
    account: EnergyAccount,
    pickup_requested: bool,
}

impl StorageBase {
    /// Build the base from its parameters.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::InvalidParameter`] for inconsistent parameters.
    pub fn new(params: StorageBaseParams) -> Result<Self, FleetError> {
        params.validate()?;
        let account = EnergyAccount::new(
            wh_from_f64(params.max_storage_wh),
            wh_from_f64(params.initial_storage_wh),
        )?;
        Ok(Self {
            params,
            account,
            pickup_requested: false,
        })
    }

    /// Fixed position.
    pub const fn position(&self) -> GeoPosition {
        self.params.locate
    }

    /// The base's parameters.
    pub const fn params(&self) -> &StorageBaseParams {
        &self.params
    }

    /// The base's energy account.
    pub const fn account(&self) -> &EnergyAccount {
        &self.account
    }

    /// Mutable access to the energy account, for transfers.
    pub const fn account_mut(&mut self) -> &mut EnergyAccount {
        &mut self.account
    }

    /// Whether the base is calling for a support ship.
    pub const fn pickup_requested(&self) -> bool {
        self.pickup_requested
    }

    /// Most energy one ship transfer may move in a tick of `tick_hours`.
    pub fn transfer_limit_wh(&self, tick_hours: f64) -> Decimal {
        self.params
            .transfer_rate_w
            .map_or(Decimal::MAX, |rate_w| wh_from_f64(rate_w * tick_hours))
    }

    /// Stored energy at which the base calls a support ship of the given
    /// capacity.
    pub fn call_threshold_wh(&self, support_capacity_wh: Decimal) -> Decimal {
        wh_from_f64(self.params.call_per)
            .checked_mul(support_capacity_wh)
            .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
            .unwrap_or(Decimal::MAX)
    }

    /// Start-of-tick update: raise or drop the pickup call.
    ///
    /// `support_capacity_wh` is the capacity of the support ship the base
    /// calls; `None` when there are no support ships.
    pub fn update(&mut self, support_capacity_wh: Option<Decimal>) {
        let stored = self.account.stored_wh();
        let calling = support_capacity_wh
            .is_some_and(|capacity| !stored.is_zero() && stored >= self.call_threshold_wh(capacity));
        if calling && !self.pickup_requested {
            info!(stored_wh = %stored, "Storage base calling for pickup");
        }
        self.pickup_requested = calling;
    }

    /// A support ship has loaded from the base.
    pub const fn pickup_done(&mut self) {
        self.pickup_requested = false;
    }

    /// Read-only state for the tick log.
    pub fn snapshot(&self) -> StorageBaseSnapshot {
        StorageBaseSnapshot {
            position: self.position(),
            stored_wh: self.account.stored_wh(),
            capacity_wh: self.account.capacity_wh(),
            pickup_requested: self.pickup_requested,
        }
    }
}
