//! Time-of-day arithmetic shared by the expander and the free-time calculator.
//!
//! Everything here works at minute precision: the external representation is
//! `hh.mm`, so seconds never influence an emitted interval.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{FreetimeError, Result};

const HHMM: &str = "%H.%M";

/// Parse an `hh.mm` time of day.
pub fn parse_hhmm(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), HHMM)
        .map_err(|_| FreetimeError::InvalidFormat(format!("expected hh.mm, got '{}'", s)))
}

/// Format a time of day as `hh.mm`.
pub fn format_hhmm(time: NaiveTime) -> String {
    time.format(HHMM).to_string()
}

/// Drop seconds and sub-second precision.
pub(crate) fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}

/// Whole minutes from `from` to `to` (negative when `to` is earlier).
pub(crate) fn minutes_between(from: NaiveTime, to: NaiveTime) -> i64 {
    to.signed_duration_since(from).num_minutes()
}

/// Round an hour count to one decimal place. Exact halves go to the even
/// digit, so 10.25 becomes 10.2 and 10.35 becomes 10.4.
pub fn round_hours(hours: f64) -> f64 {
    (hours * 10.0).round_ties_even() / 10.0
}

/// A free or occupied span within a single day, formatted as `hh.mm-hh.mm`.
///
/// Invariant: `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeInterval {
    start: NaiveTime,
    end: NaiveTime,
}

impl TimeInterval {
    /// Build an interval, rejecting empty or inverted spans.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self> {
        if start >= end {
            return Err(FreetimeError::InvalidFormat(format!(
                "interval start {} is not before end {}",
                format_hhmm(start),
                format_hhmm(end)
            )));
        }
        Ok(Self { start, end })
    }

    /// Callers guarantee `start < end`.
    pub(crate) fn new_unchecked(start: NaiveTime, end: NaiveTime) -> Self {
        debug_assert!(start < end);
        Self { start, end }
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    pub fn duration_minutes(&self) -> i64 {
        minutes_between(self.start, self.end)
    }

    /// Unrounded duration in hours.
    pub fn hours(&self) -> f64 {
        self.duration_minutes() as f64 / 60.0
    }

    /// True when the two intervals share any instant (touching ends do not count).
    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", format_hhmm(self.start), format_hhmm(self.end))
    }
}

impl FromStr for TimeInterval {
    type Err = FreetimeError;

    fn from_str(s: &str) -> Result<Self> {
        let (start, end) = s.trim().split_once('-').ok_or_else(|| {
            FreetimeError::InvalidFormat(format!("expected hh.mm-hh.mm, got '{}'", s))
        })?;
        TimeInterval::new(parse_hhmm(start)?, parse_hhmm(end)?)
    }
}

impl Serialize for TimeInterval {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The usable portion of every day: free time is only reported inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EnvelopeRepr", into = "EnvelopeRepr")]
pub struct DayEnvelope {
    start: NaiveTime,
    end: NaiveTime,
}

impl DayEnvelope {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self> {
        if start >= end {
            return Err(FreetimeError::InvalidEnvelope { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parse an envelope from two `hh.mm` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Self::new(parse_hhmm(start)?, parse_hhmm(end)?)
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    pub fn duration_minutes(&self) -> i64 {
        minutes_between(self.start, self.end)
    }

    /// Clamp a time of day into `[start, end]`.
    pub(crate) fn clamp(&self, time: NaiveTime) -> NaiveTime {
        time.clamp(self.start, self.end)
    }
}

impl Default for DayEnvelope {
    /// Midnight to 23:59.
    fn default() -> Self {
        Self {
            start: NaiveTime::MIN,
            end: NaiveTime::from_hms_opt(23, 59, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl fmt::Display for DayEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", format_hhmm(self.start), format_hhmm(self.end))
    }
}

/// Wire form of [`DayEnvelope`]: `{"start": "hh.mm", "end": "hh.mm"}`.
#[derive(Serialize, Deserialize)]
struct EnvelopeRepr {
    start: String,
    end: String,
}

impl TryFrom<EnvelopeRepr> for DayEnvelope {
    type Error = FreetimeError;

    fn try_from(repr: EnvelopeRepr) -> Result<Self> {
        DayEnvelope::parse(&repr.start, &repr.end)
    }
}

impl From<DayEnvelope> for EnvelopeRepr {
    fn from(envelope: DayEnvelope) -> Self {
        Self {
            start: format_hhmm(envelope.start),
            end: format_hhmm(envelope.end),
        }
    }
}

