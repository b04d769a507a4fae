//! Modification timestamps and the clocks that issue them

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// Point in time of the last modification of an entry (Unix ms).
///
/// Ordering is numeric. On the wire the value is rendered as fixed-width
/// ISO-8601 UTC with millisecond precision (`2024-01-01T09:30:00.000Z`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    #[must_use]
    pub const fn as_millis(self) -> i64 {
        self.0
    }

    /// Current wall-clock time without any monotonic guarantee
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    /// Render as fixed-width ISO-8601 UTC
    #[must_use]
    pub fn to_iso(self) -> String {
        DateTime::<Utc>::from_timestamp_millis(self.0).map_or_else(
            || self.0.to_string(),
            |datetime| datetime.to_rfc3339_opts(SecondsFormat::Millis, true),
        )
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso())
    }
}

impl FromStr for Timestamp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = DateTime::parse_from_rfc3339(s.trim())
            .map_err(|error| Error::InvalidInput(format!("invalid timestamp '{s}': {error}")))?;
        Ok(Self(parsed.with_timezone(&Utc).timestamp_millis()))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_iso())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Source of modification timestamps
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock that never hands out the same or an earlier value twice.
#[derive(Debug)]
pub struct SystemClock {
    last: AtomicI64,
}

impl SystemClock {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: AtomicI64::new(i64::MIN),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let wall = Utc::now().timestamp_millis();
        let next = |last: i64| wall.max(last.saturating_add(1));
        let previous = match self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(next(last)))
        {
            Ok(value) | Err(value) => value,
        };
        Timestamp(next(previous))
    }
}

/// Deterministic clock for tests: returns the current value, then ticks 1ms.
#[derive(Debug)]
pub struct ManualClock {
    current: AtomicI64,
}

impl ManualClock {
    #[must_use]
    pub const fn starting_at(millis: i64) -> Self {
        Self {
            current: AtomicI64::new(millis),
        }
    }

    /// Jump to an absolute time
    pub fn set(&self, millis: i64) {
        self.current.store(millis, Ordering::SeqCst);
    }

    /// Peek at the next value without consuming it
    pub fn peek(&self) -> Timestamp {
        Timestamp(self.current.load(Ordering::SeqCst))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.current.fetch_add(1, Ordering::SeqCst))
    }
}
