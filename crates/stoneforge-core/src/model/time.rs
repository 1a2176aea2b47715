// crates/stoneforge-core/src/model/time.rs
// ============================================================================
// Module: Stoneforge Time Model
// Description: Canonical timestamp representation and injectable clock source.
// Purpose: Keep gate evaluation and event logging deterministic and replayable.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Stoneforge represents all timestamps as UTC unix milliseconds. The engine
//! never reads the wall clock directly; every operation that needs "now"
//! receives it through a [`ClockSource`], so gate evaluation and tests stay
//! deterministic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Canonical timestamp, UTC milliseconds since the unix epoch.
///
/// # Invariants
/// - No validation is performed; ordering is plain integer comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as unix milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Parses an ISO-8601 / RFC 3339 UTC timestamp string.
    ///
    /// # Errors
    ///
    /// Returns a parse error description when `value` is not well-formed
    /// RFC 3339.
    pub fn parse_rfc3339(value: &str) -> Result<Self, TimestampParseError> {
        let parsed = time::OffsetDateTime::parse(value, &time::format_description::well_known::Rfc3339)
            .map_err(|err| TimestampParseError(err.to_string()))?;
        let millis = parsed.unix_timestamp() * 1_000 + i64::from(parsed.millisecond());
        Ok(Self(millis))
    }

    /// Formats the timestamp as RFC 3339 UTC.
    ///
    /// # Errors
    ///
    /// Returns a formatting error if the underlying value is out of the
    /// representable range.
    pub fn to_rfc3339(self) -> Result<String, TimestampParseError> {
        let odt = time::OffsetDateTime::from_unix_timestamp(self.0 / 1_000)
            .map_err(|err| TimestampParseError(err.to_string()))?;
        odt.format(&time::format_description::well_known::Rfc3339)
            .map_err(|err| TimestampParseError(err.to_string()))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when a timestamp string cannot be parsed or formatted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampParseError(String);

impl fmt::Display for TimestampParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid timestamp: {}", self.0)
    }
}

impl std::error::Error for TimestampParseError {}

// ============================================================================
// SECTION: Clock Source
// ============================================================================

/// Injectable source of "now", so gate evaluation is deterministic under test.
///
/// Corresponds to the `gate.clockSource` configuration option in spec.md §6.
pub trait ClockSource: Send + Sync {
    /// Returns the current timestamp.
    fn now(&self) -> Timestamp;
}

/// Wall-clock [`ClockSource`] used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now(&self) -> Timestamp {
        let duration = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        let millis = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        Timestamp::from_unix_millis(millis)
    }
}

/// Fixed [`ClockSource`] for deterministic tests; advanceable without
/// reconstructing the clock so tests can model "time passing".
#[derive(Debug)]
pub struct FixedClock {
    /// Current value returned by [`ClockSource::now`].
    millis: AtomicI64,
}

impl FixedClock {
    /// Creates a fixed clock starting at `millis`.
    #[must_use]
    pub const fn new(millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(millis),
        }
    }

    /// Advances the clock by `delta_millis` (may be negative).
    pub fn advance(&self, delta_millis: i64) {
        self.millis.fetch_add(delta_millis, Ordering::SeqCst);
    }

    /// Sets the clock to an absolute value.
    pub fn set(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl ClockSource for FixedClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_unix_millis(self.millis.load(Ordering::SeqCst))
    }
}
