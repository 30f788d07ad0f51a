// crates/capgate-core/src/core/time.rs
// ============================================================================
// Module: Capgate Time Model
// Description: Canonical timestamp representation for records and expiry.
// Purpose: Provide explicit, replayable time values across gateway records.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The gateway stores and compares time as unix epoch seconds. Expiry checks
//! in the grant store and token codec take an explicit `now` value so that
//! behavior is replayable in tests; only outer layers read the wall clock.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Canonical timestamp in unix epoch seconds.
///
/// # Invariants
/// - Values are explicit; core logic never reads the wall clock implicitly.
/// - Comparisons are plain integer comparisons; no timezone handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix epoch seconds.
    #[must_use]
    pub const fn from_unix_seconds(seconds: i64) -> Self {
        Self(seconds)
    }

    /// Returns the timestamp as unix epoch seconds.
    #[must_use]
    pub const fn as_unix_seconds(self) -> i64 {
        self.0
    }

    /// Reads the current wall-clock time.
    ///
    /// Times before the unix epoch clamp to zero.
    #[must_use]
    pub fn now() -> Self {
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX));
        Self(seconds)
    }

    /// Returns a timestamp offset by the given number of seconds.
    #[must_use]
    pub const fn offset(self, seconds: i64) -> Self {
        Self(self.0.saturating_add(seconds))
    }

    /// Returns true when this timestamp is strictly before `other`.
    #[must_use]
    pub const fn is_before(self, other: Self) -> bool {
        self.0 < other.0
    }
}
