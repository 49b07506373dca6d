//! Primitive types shared by every pool component.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unix time in whole seconds. Every operation receives `now` explicitly.
pub type UnixSecs = u64;

/// Ordinal of a round: `floor(time / cycle_duration)`.
pub type CycleId = u64;

/// Value units moved through the [`ValueLedger`](crate::pool::ledger::ValueLedger).
pub type Amount = u128;

/// Basis-point denominator (100% = 10_000 bps).
pub const BPS_DENOMINATOR: u128 = 10_000;

// =============================================================================
// SIDE
// =============================================================================

/// One of the two mutually exclusive outcomes.
///
/// A side also names the tracked asset backing it: the round's winner is the
/// side whose asset realized the larger metric over the measurement window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::A, Side::B];

    pub fn opposite(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::A => "A",
            Side::B => "B",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ACCOUNT
// =============================================================================

/// Normalized account identifier (trimmed, lower-cased).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for AccountId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for AccountId {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
