//! Unix timestamps at second and millisecond precision.
//!
//! Two precisions coexist on the wire: signature validity windows and
//! requirement timeouts are counted in whole seconds, while payment payloads
//! and ledger records carry millisecond timestamps. Keeping them as distinct
//! types prevents the two units from being mixed at a boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;
use std::time::SystemTime;

/// Seconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct UnixTimestamp(u64);

impl UnixTimestamp {
    /// Creates a timestamp from a raw seconds value.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Returns the current system time.
    ///
    /// # Panics
    ///
    /// Panics if the system clock is set before the Unix epoch, which should
    /// never happen on properly configured systems.
    #[must_use]
    pub fn now() -> Self {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .expect("system clock before Unix epoch")
            .as_secs();
        Self(now)
    }

    /// Returns the raw seconds value.
    #[must_use]
    pub const fn as_secs(&self) -> u64 {
        self.0
    }

    /// Returns the wall-clock hour this timestamp falls into.
    ///
    /// Hour buckets key the spending ledger: two timestamps share a bucket
    /// exactly when they fall within the same wall-clock hour.
    #[must_use]
    pub const fn hour_bucket(&self) -> u64 {
        self.0 / 3600
    }
}

impl Add<u64> for UnixTimestamp {
    type Output = Self;

    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0.saturating_add(rhs))
    }
}

impl fmt::Display for UnixTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Milliseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct UnixMillis(u64);

impl UnixMillis {
    /// Creates a timestamp from a raw milliseconds value.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns the current system time.
    ///
    /// # Panics
    ///
    /// Panics if the system clock is set before the Unix epoch, which should
    /// never happen on properly configured systems.
    #[must_use]
    pub fn now() -> Self {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .expect("system clock before Unix epoch")
            .as_millis();
        #[allow(clippy::cast_possible_truncation)]
        Self(now as u64)
    }

    /// Returns the raw milliseconds value.
    #[must_use]
    pub const fn as_millis(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for UnixMillis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hour_bucket_boundaries() {
        assert_eq!(UnixTimestamp::from_secs(0).hour_bucket(), 0);
        assert_eq!(UnixTimestamp::from_secs(3599).hour_bucket(), 0);
        assert_eq!(UnixTimestamp::from_secs(3600).hour_bucket(), 1);
        assert_eq!(UnixTimestamp::from_secs(7200).hour_bucket(), 2);
    }

    #[test]
    fn test_timestamp_serializes_as_number() {
        let ts = UnixMillis::from_millis(1_699_999_999_000);
        assert_eq!(serde_json::to_string(&ts).unwrap(), "1699999999000");
    }

    #[test]
    fn test_add_seconds() {
        let ts = UnixTimestamp::from_secs(100) + 300;
        assert_eq!(ts.as_secs(), 400);
    }
}
