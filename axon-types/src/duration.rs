//! Millisecond duration with a stable wire format.
//!
//! [`DurationMs`] serializes as a bare integer, not as serde's internal
//! `{"secs": N, "nanos": N}` representation of `std::time::Duration`.
//! Audit records and performance metrics in the context snapshot rely
//! on this staying a plain number.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Duration in milliseconds, serialized as a plain `u64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DurationMs(u64);

impl DurationMs {
    /// Zero duration.
    pub const ZERO: Self = Self(0);

    /// Create from milliseconds.
    pub fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// Create from seconds.
    pub fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1000))
    }

    /// The value in milliseconds.
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Saturating sum of two durations.
    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Convert to `std::time::Duration`.
    pub fn to_std(&self) -> Duration {
        Duration::from_millis(self.0)
    }
}

impl From<Duration> for DurationMs {
    fn from(d: Duration) -> Self {
        Self(d.as_millis() as u64)
    }
}

impl From<DurationMs> for Duration {
    fn from(d: DurationMs) -> Self {
        Duration::from_millis(d.0)
    }
}

impl Default for DurationMs {
    fn default() -> Self {
        Self::ZERO
    }
}

impl std::fmt::Display for DurationMs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_bare_integer() {
        let d = DurationMs::from_secs(2);
        assert_eq!(serde_json::to_string(&d).unwrap(), "2000");
        let back: DurationMs = serde_json::from_str("2000").unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn saturating_add_does_not_wrap() {
        let a = DurationMs::from_millis(u64::MAX);
        assert_eq!(a.saturating_add(DurationMs::from_millis(1)), a);
    }
}
