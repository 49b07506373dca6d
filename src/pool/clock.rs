//! Simulation Clock
//!
//! Monotonic clock with one-second resolution for driving the pool outside a
//! host runtime. The engine itself never reads system time: callers hand it
//! `now` on every operation.

use crate::pool::types::UnixSecs;
use std::fmt;

/// Monotonic simulation clock.
///
/// `advance_to()` only moves forward and panics (in debug builds) on backward
/// movement, since phase derivation assumes time never decreases.
#[derive(Debug, Clone)]
pub struct SimClock {
    current: UnixSecs,
}

impl SimClock {
    #[inline]
    pub fn new(start: UnixSecs) -> Self {
        Self { current: start }
    }

    #[inline]
    pub fn now(&self) -> UnixSecs {
        self.current
    }

    /// Advance clock to a new time. Panics if time would go backward.
    #[inline]
    pub fn advance_to(&mut self, new_time: UnixSecs) {
        debug_assert!(
            new_time >= self.current,
            "SimClock: cannot go backward from {} to {}",
            self.current,
            new_time
        );
        self.current = new_time.max(self.current);
    }

    #[inline]
    pub fn advance_by(&mut self, delta: UnixSecs) {
        self.current = self.current.saturating_add(delta);
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl fmt::Display for SimClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match to_datetime(self.current) {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}s", self.current),
        }
    }
}

/// Convert unix seconds to a chrono timestamp for display.
pub fn to_datetime(secs: UnixSecs) -> Option<chrono::DateTime<chrono::Utc>> {
    use chrono::TimeZone;
    let secs = i64::try_from(secs).ok()?;
    chrono::Utc.timestamp_opt(secs, 0).single()
}

/// Parse an RFC3339 string to unix seconds. Pre-epoch instants are rejected.
pub fn parse_timestamp(s: &str) -> Option<UnixSecs> {
    chrono::DateTime::parse_from_rfc3339(s)
        .ok()
        .and_then(|dt| UnixSecs::try_from(dt.timestamp()).ok())
}
