//! Timestamp type used throughout the protocol.
//!
//! Timestamps are Unix epoch seconds (UTC), matching how the ledger stores
//! deadlines.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Format used when rendering a deadline for display, e.g. `Thu Jan 1, 1970`.
pub const CALENDAR_DATE_FORMAT: &str = "%a %b %-d, %Y";

/// A Unix timestamp in seconds since epoch (UTC).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The epoch (time zero).
    pub const EPOCH: Self = Self(0);

    pub fn new(secs: u64) -> Self {
        Self(secs)
    }

    /// Get the current system time as a `Timestamp`.
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Whether `now` is strictly after this timestamp.
    pub fn has_passed(&self, now: Timestamp) -> bool {
        now.0 > self.0
    }

    /// This timestamp shifted forward by `secs`, saturating at the maximum.
    pub fn plus_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    /// Render as a calendar date in UTC.
    ///
    /// Values chrono cannot represent fall back to the raw seconds.
    pub fn to_calendar_date(&self) -> String {
        i64::try_from(self.0)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|dt| dt.format(CALENDAR_DATE_FORMAT).to_string())
            .unwrap_or_else(|| self.to_string())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}
