//! Error types for the pool engine.
//!
//! Every failing operation aborts as a whole: callers observe either the full
//! effect or none of it. Source failures never surface from settlement; they
//! become a [`VoidReason`](crate::pool::events::VoidReason) instead.

use crate::pool::types::{AccountId, Amount, CycleId, Side, UnixSecs};
use std::fmt;

// =============================================================================
// ENGINE ERRORS
// =============================================================================

/// Coarse classification used by callers deciding whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Caller mistake; no state change.
    Input,
    /// Acted outside the valid phase; retry later.
    Timing,
    /// The effect already happened or never will.
    Terminal,
    /// The value ledger refused a transfer.
    Transfer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Stake or retraction of zero.
    InvalidAmount,
    /// Retraction larger than the recorded stake on that side.
    InsufficientStake {
        cycle_id: CycleId,
        side: Side,
        requested: Amount,
        available: Amount,
    },
    /// The round's staking window has closed.
    WindowClosed {
        cycle_id: CycleId,
        staking_end_time: UnixSecs,
    },
    /// The round has not started yet.
    RoundNotOpen {
        cycle_id: CycleId,
        start_time: UnixSecs,
    },
    /// Settlement before finality, or claim before settlement.
    TooEarly {
        cycle_id: CycleId,
        ready_at: Option<UnixSecs>,
    },
    AlreadySettled {
        cycle_id: CycleId,
    },
    AlreadyClaimed {
        cycle_id: CycleId,
    },
    NotAWinner {
        cycle_id: CycleId,
    },
    NoStake {
        cycle_id: CycleId,
    },
    NothingToClaim,
    Transfer(TransferError),
}

impl EngineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidAmount | Self::InsufficientStake { .. } => ErrorClass::Input,
            Self::WindowClosed { .. } | Self::RoundNotOpen { .. } | Self::TooEarly { .. } => {
                ErrorClass::Timing
            }
            Self::AlreadySettled { .. }
            | Self::AlreadyClaimed { .. }
            | Self::NotAWinner { .. }
            | Self::NoStake { .. }
            | Self::NothingToClaim => ErrorClass::Terminal,
            Self::Transfer(_) => ErrorClass::Transfer,
        }
    }

    /// Only timing errors can succeed on a later identical call.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Timing
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAmount => write!(f, "Amount must be greater than zero"),
            Self::InsufficientStake {
                cycle_id,
                side,
                requested,
                available,
            } => write!(
                f,
                "Insufficient stake in cycle {} on side {}: requested {}, available {}",
                cycle_id, side, requested, available
            ),
            Self::WindowClosed {
                cycle_id,
                staking_end_time,
            } => write!(
                f,
                "Staking window for cycle {} closed at {}",
                cycle_id, staking_end_time
            ),
            Self::RoundNotOpen {
                cycle_id,
                start_time,
            } => write!(f, "Cycle {} does not open until {}", cycle_id, start_time),
            Self::TooEarly { cycle_id, ready_at } => match ready_at {
                Some(at) => write!(f, "Cycle {} cannot be settled before {}", cycle_id, at),
                None => write!(f, "Cycle {} is not settled yet", cycle_id),
            },
            Self::AlreadySettled { cycle_id } => write!(f, "Cycle {} already settled", cycle_id),
            Self::AlreadyClaimed { cycle_id } => {
                write!(f, "Payout for cycle {} already claimed", cycle_id)
            }
            Self::NotAWinner { cycle_id } => {
                write!(f, "No stake on the winning side of cycle {}", cycle_id)
            }
            Self::NoStake { cycle_id } => write!(f, "No stake to refund in cycle {}", cycle_id),
            Self::NothingToClaim => write!(f, "Nothing to claim in the requested cycles"),
            Self::Transfer(e) => write!(f, "Value transfer failed: {}", e),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transfer(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransferError> for EngineError {
    fn from(e: TransferError) -> Self {
        Self::Transfer(e)
    }
}

// =============================================================================
// COLLABORATOR ERRORS
// =============================================================================

/// Failure reported by a [`ValueLedger`](crate::pool::ledger::ValueLedger).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    InsufficientFunds {
        account: AccountId,
        needed: Amount,
        available: Amount,
    },
    InvalidAccount {
        account: AccountId,
    },
    ZeroAmount,
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientFunds {
                account,
                needed,
                available,
            } => write!(
                f,
                "Account {} has {} but {} is required",
                account, available, needed
            ),
            Self::InvalidAccount { account } => write!(f, "Invalid account '{}'", account),
            Self::ZeroAmount => write!(f, "Transfer amount must be non-zero"),
        }
    }
}

impl std::error::Error for TransferError {}

/// Failure reported by a [`MetricSource`](crate::pool::history::MetricSource).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservationError {
    /// The source has nothing recorded for the asset.
    Unavailable { asset: Side },
    /// A requested point is older than the oldest retained observation.
    InsufficientHistory {
        asset: Side,
        oldest: UnixSecs,
        requested: UnixSecs,
    },
    /// The source answered with the wrong number of points.
    Malformed {
        asset: Side,
        expected: usize,
        actual: usize,
    },
}

impl fmt::Display for ObservationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { asset } => write!(f, "No observations for asset {}", asset),
            Self::InsufficientHistory {
                asset,
                oldest,
                requested,
            } => write!(
                f,
                "Asset {} history starts at {}, requested {}",
                asset, oldest, requested
            ),
            Self::Malformed {
                asset,
                expected,
                actual,
            } => write!(
                f,
                "Asset {} returned {} points, expected {}",
                asset, actual, expected
            ),
        }
    }
}

impl std::error::Error for ObservationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert_eq!(EngineError::InvalidAmount.class(), ErrorClass::Input);
        assert!(EngineError::TooEarly {
            cycle_id: 1,
            ready_at: Some(10)
        }
        .is_retryable());
        assert!(!EngineError::AlreadySettled { cycle_id: 1 }.is_retryable());
        assert_eq!(EngineError::NothingToClaim.class(), ErrorClass::Terminal);
        assert_eq!(
            EngineError::from(TransferError::ZeroAmount).class(),
            ErrorClass::Transfer
        );
    }
}
