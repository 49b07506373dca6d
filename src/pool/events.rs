//! Engine notifications.
//!
//! Every externally visible transition appends one [`EngineEvent`] to the
//! [`EventLog`]. Presentation layers poll or drain the log; nothing in the
//! engine reads it back.

use crate::pool::types::{AccountId, Amount, CycleId, Side, UnixSecs};
use serde::{Deserialize, Serialize};

/// Why a round resolved without a winner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VoidReason {
    /// Settlement came after `window_end + finality + resolve_deadline`.
    DeadlineExceeded,
    /// The metric source could not serve the measurement window.
    ObservationUnavailable { asset: Side, detail: String },
    /// Nobody staked on the side that won.
    NoWinningStake { would_have_won: Side },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    RoundOpened {
        cycle_id: CycleId,
        start_time: UnixSecs,
        staking_end_time: UnixSecs,
        window_end_time: UnixSecs,
    },
    StakeAdded {
        cycle_id: CycleId,
        account: AccountId,
        side: Side,
        amount: Amount,
        side_total: Amount,
    },
    StakeRetracted {
        cycle_id: CycleId,
        account: AccountId,
        side: Side,
        amount: Amount,
        side_total: Amount,
    },
    RoundSettled {
        cycle_id: CycleId,
        winning_side: Side,
        metric_a: u128,
        metric_b: u128,
        keeper: AccountId,
        bounty: Amount,
        protocol_fee: Amount,
        settled_at: UnixSecs,
    },
    RoundVoided {
        cycle_id: CycleId,
        reason: VoidReason,
        metric_a: u128,
        metric_b: u128,
        settled_at: UnixSecs,
    },
    Claimed {
        cycle_id: CycleId,
        account: AccountId,
        amount: Amount,
        refund: bool,
    },
    BatchClaimed {
        account: AccountId,
        cycle_ids: Vec<CycleId>,
        total: Amount,
    },
}

impl EngineEvent {
    pub fn cycle_id(&self) -> Option<CycleId> {
        match self {
            Self::RoundOpened { cycle_id, .. }
            | Self::StakeAdded { cycle_id, .. }
            | Self::StakeRetracted { cycle_id, .. }
            | Self::RoundSettled { cycle_id, .. }
            | Self::RoundVoided { cycle_id, .. }
            | Self::Claimed { cycle_id, .. } => Some(*cycle_id),
            Self::BatchClaimed { .. } => None,
        }
    }
}

/// Append-only notification buffer.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<EngineEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: EngineEvent) {
        self.events.push(event);
    }

    pub fn as_slice(&self) -> &[EngineEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Hand the buffered events to the caller and start over.
    pub fn drain(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }
}
