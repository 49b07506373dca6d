//! Thread-safe handle for racing callers.
//!
//! Each call takes the lock for the whole operation, so concurrent `settle`
//! and `claim` calls serialize and only the first one per round (or per
//! round and account) has effect.

use crate::pool::claim::{BatchClaimReceipt, ClaimQuote};
use crate::pool::engine::PoolEngine;
use crate::pool::error::EngineError;
use crate::pool::history::MetricSource;
use crate::pool::ledger::ValueLedger;
use crate::pool::settlement::SettlementReport;
use crate::pool::stake::StakeReceipt;
use crate::pool::types::{AccountId, Amount, CycleId, Side, UnixSecs};
use parking_lot::Mutex;
use std::sync::Arc;

pub struct SharedEngine<L: ValueLedger, M: MetricSource> {
    inner: Arc<Mutex<PoolEngine<L, M>>>,
}

impl<L: ValueLedger, M: MetricSource> Clone for SharedEngine<L, M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: ValueLedger, M: MetricSource> SharedEngine<L, M> {
    pub fn new(engine: PoolEngine<L, M>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Run `f` with exclusive access, e.g. for reads spanning several calls.
    pub fn with<R>(&self, f: impl FnOnce(&mut PoolEngine<L, M>) -> R) -> R {
        f(&mut self.inner.lock())
    }

    pub fn add_stake(
        &self,
        now: UnixSecs,
        cycle_id: CycleId,
        account: &AccountId,
        side: Side,
        amount: Amount,
    ) -> Result<StakeReceipt, EngineError> {
        self.inner
            .lock()
            .add_stake(now, cycle_id, account, side, amount)
    }

    pub fn retract_stake(
        &self,
        now: UnixSecs,
        cycle_id: CycleId,
        account: &AccountId,
        side: Side,
        amount: Amount,
    ) -> Result<StakeReceipt, EngineError> {
        self.inner
            .lock()
            .retract_stake(now, cycle_id, account, side, amount)
    }

    pub fn settle(
        &self,
        now: UnixSecs,
        cycle_id: CycleId,
        keeper: &AccountId,
    ) -> Result<SettlementReport, EngineError> {
        self.inner.lock().settle(now, cycle_id, keeper)
    }

    pub fn claim(&self, cycle_id: CycleId, account: &AccountId) -> Result<ClaimQuote, EngineError> {
        self.inner.lock().claim(cycle_id, account)
    }

    pub fn claim_batch(
        &self,
        cycle_ids: &[CycleId],
        account: &AccountId,
    ) -> Result<BatchClaimReceipt, EngineError> {
        self.inner.lock().claim_batch(cycle_ids, account)
    }
}
