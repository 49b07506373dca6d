//! Parimutuel Volatility Pool
//!
//! Repeating fixed-length rounds: accounts stake on side A or side B, the
//! realized variance of two tracked assets over the measurement window picks
//! the winner, and winners split the pot pro rata after the keeper bounty and
//! protocol fee.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          PoolEngine                             │
//! │     (&mut self per operation, explicit `now`, event log)        │
//! └─────────────────────────────────────────────────────────────────┘
//!        │               │                 │               │
//!        ▼               ▼                 ▼               ▼
//! ┌─────────────┐ ┌─────────────┐  ┌──────────────┐ ┌─────────────┐
//! │ RoundReg.   │ │ StakeLedger │  │ Settlement   │ │ ClaimProc.  │
//! │ (lazy init) │ │ (positions) │  │ (once/round) │ │ (once/acct) │
//! └─────────────┘ └─────────────┘  └──────┬───────┘ └─────────────┘
//!                                         │
//!                        ┌────────────────┼────────────────┐
//!                        ▼                ▼                ▼
//!                 ┌─────────────┐  ┌─────────────┐  ┌─────────────┐
//!                 │ MetricSource│  │ Metric      │  │ ValueLedger │
//!                 │ (trait)     │  │ (variance)  │  │ (trait)     │
//!                 └─────────────┘  └─────────────┘  └─────────────┘
//! ```
//!
//! # Round lifecycle
//!
//! `Staking → Measuring → Finality → Settleable → Settled`, derived from
//! `(now, round)` and never stored.
//!
//! # Guarantees
//!
//! - **Conservation**: side totals equal the sum of account stakes
//! - **Settlement**: at most once per round, always terminates (void paths)
//! - **Claims**: at most once per (round, account), flag set before payout
//! - **Payout bound**: floor division never pays out more than distributable

pub mod audit;
pub mod claim;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod history;
pub mod ledger;
pub mod metric;
pub mod round;
pub mod settlement;
pub mod shared;
pub mod stake;
pub mod stats;
pub mod types;
pub mod views;

#[cfg(test)]
mod test_support;

#[cfg(test)]
mod claim_tests;
#[cfg(test)]
mod metric_tests;
#[cfg(test)]
mod stake_tests;

pub use audit::{AuditCheck, AuditReport, AuditViolation};
pub use claim::{BatchClaimReceipt, ClaimKind, ClaimQuote};
pub use clock::SimClock;
pub use config::{ConfigError, EngineConfig, MAX_INCENTIVE_BPS};
pub use engine::PoolEngine;
pub use error::{EngineError, ErrorClass, ObservationError, TransferError};
pub use events::{EngineEvent, EventLog, VoidReason};
pub use history::{MetricSource, TickHistory};
pub use ledger::{InMemoryLedger, ValueLedger};
pub use metric::{MetricOutcome, SamplingPlan, TIE_WINNER};
pub use round::{Phase, Round};
pub use settlement::{SettlementOutcome, SettlementReport};
pub use shared::SharedEngine;
pub use stake::{Position, StakeReceipt};
pub use stats::{GlobalStats, UserStats};
pub use types::{AccountId, Amount, CycleId, Side, UnixSecs};
pub use views::{ClaimableRound, RoundView};
