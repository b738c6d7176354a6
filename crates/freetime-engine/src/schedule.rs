//! Per-day occurrence grouping.
//!
//! A [`DaySchedule`] is the output of the expander and the input of the
//! free-time calculator: days in chronological order, each holding its
//! occurrences sorted by start time (ties keep input order).

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};

use crate::error::{FreetimeError, Result};
use crate::interval::{format_hhmm, parse_hhmm};

/// Length given to an occurrence whose source event has no usable end.
pub const DEFAULT_DURATION_MINUTES: i64 = 60;

const DAY_FORMAT: &str = "%d.%m.%Y";

/// A calendar date used as the grouping key, written `dd.mm.yyyy`.
///
/// Ordering follows the underlying date, never the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl From<NaiveDate> for DayKey {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DAY_FORMAT))
    }
}

impl FromStr for DayKey {
    type Err = FreetimeError;

    fn from_str(s: &str) -> Result<Self> {
        NaiveDate::parse_from_str(s.trim(), DAY_FORMAT)
            .map(DayKey)
            .map_err(|_| FreetimeError::InvalidFormat(format!("expected dd.mm.yyyy, got '{}'", s)))
    }
}

impl Serialize for DayKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One concrete instance of an event after recurrence expansion.
///
/// Times are wall-clock values in the zone the source event was written in.
/// Invariant: `start < end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    start: NaiveDateTime,
    end: NaiveDateTime,
    title: String,
}

impl Occurrence {
    /// Build an occurrence, replacing a missing or non-positive end with
    /// `start + DEFAULT_DURATION_MINUTES`.
    pub fn new(start: NaiveDateTime, end: Option<NaiveDateTime>, title: impl Into<String>) -> Self {
        let end = match end {
            Some(end) if end > start => end,
            _ => start + Duration::minutes(DEFAULT_DURATION_MINUTES),
        };
        Self {
            start,
            end,
            title: title.into(),
        }
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// The day this occurrence is grouped under: the date of its start.
    pub fn day(&self) -> DayKey {
        DayKey(self.start.date())
    }

    /// `hh.mm-hh.mm` of the start and end wall-clock times.
    pub fn time_range(&self) -> String {
        format!(
            "{}-{}",
            format_hhmm(self.start.time()),
            format_hhmm(self.end.time())
        )
    }
}

impl fmt::Display for Occurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.title.is_empty() {
            write!(f, "{}", self.time_range())
        } else {
            write!(f, "{} {}", self.time_range(), self.title)
        }
    }
}

/// Occurrences grouped per day, days in chronological order.
///
/// Days without occurrences are absent rather than empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DaySchedule {
    days: Vec<(DayKey, Vec<Occurrence>)>,
    skipped: Vec<FreetimeError>,
}

impl DaySchedule {
    /// Group occurrences by day and sort each day by start time.
    ///
    /// The sort is stable, so occurrences starting at the same instant keep
    /// the order they were supplied in.
    pub fn from_occurrences<I>(occurrences: I) -> Self
    where
        I: IntoIterator<Item = Occurrence>,
    {
        let mut all: Vec<Occurrence> = occurrences.into_iter().collect();
        all.sort_by_key(|o| (o.day(), o.start));

        let mut days: Vec<(DayKey, Vec<Occurrence>)> = Vec::new();
        for occurrence in all {
            match days.last_mut() {
                Some((day, list)) if *day == occurrence.day() => list.push(occurrence),
                _ => days.push((occurrence.day(), vec![occurrence])),
            }
        }

        Self {
            days,
            skipped: Vec::new(),
        }
    }

    /// Parse the textual form `dd.mm.yyyy -> ["hh.mm-hh.mm Title", ...]`.
    ///
    /// An end time earlier than the start time is read as falling on the
    /// following day.
    ///
    /// # Errors
    /// Returns `FreetimeError::InvalidFormat` for the first key or entry that
    /// does not match the expected shape.
    pub fn from_formatted<I, K, E, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, E)>,
        K: AsRef<str>,
        E: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut occurrences = Vec::new();
        for (key, items) in entries {
            let day: DayKey = key.as_ref().parse()?;
            for item in items {
                occurrences.push(parse_entry(day, item.as_ref())?);
            }
        }
        Ok(Self::from_occurrences(occurrences))
    }

    pub(crate) fn with_skipped(mut self, skipped: Vec<FreetimeError>) -> Self {
        self.skipped = skipped;
        self
    }

    /// Days in chronological order with their sorted occurrences.
    pub fn iter(&self) -> impl Iterator<Item = (DayKey, &[Occurrence])> {
        self.days.iter().map(|(day, list)| (*day, list.as_slice()))
    }

    /// Occurrences on `day`, or `None` when the day has no entry.
    pub fn get(&self, day: DayKey) -> Option<&[Occurrence]> {
        self.days
            .binary_search_by_key(&day, |(key, _)| *key)
            .ok()
            .map(|idx| self.days[idx].1.as_slice())
    }

    /// Occurrences on `day`; a missing day reads as no occurrences.
    pub fn occurrences_on(&self, day: DayKey) -> &[Occurrence] {
        self.get(day).unwrap_or(&[])
    }

    /// Number of days with at least one occurrence.
    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn occurrence_count(&self) -> usize {
        self.days.iter().map(|(_, list)| list.len()).sum()
    }

    /// Events left out of the expansion, with the reason each was skipped.
    pub fn skipped(&self) -> &[FreetimeError] {
        &self.skipped
    }

    /// `(dd.mm.yyyy, ["hh.mm-hh.mm Title", ...])` pairs in day order.
    pub fn to_formatted(&self) -> Vec<(String, Vec<String>)> {
        self.days
            .iter()
            .map(|(day, list)| (day.to_string(), list.iter().map(|o| o.to_string()).collect()))
            .collect()
    }
}

impl Serialize for DaySchedule {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.days.iter().map(|(day, list)| {
            let entries: Vec<String> = list.iter().map(|o| o.to_string()).collect();
            (*day, entries)
        }))
    }
}

/// Parse one `hh.mm-hh.mm Title` entry on `day`.
fn parse_entry(day: DayKey, entry: &str) -> Result<Occurrence> {
    let entry = entry.trim();
    let (range, title) = entry.split_once(' ').unwrap_or((entry, ""));
    let (start, end) = range.split_once('-').ok_or_else(|| {
        FreetimeError::InvalidFormat(format!("expected 'hh.mm-hh.mm Title', got '{}'", entry))
    })?;
    let (start, end) = (parse_hhmm(start)?, parse_hhmm(end)?);
    if start == end {
        return Err(FreetimeError::InvalidFormat(format!(
            "entry '{}' has zero length",
            entry
        )));
    }

    let start = day.date().and_time(start);
    let mut end = day.date().and_time(end);
    if end < start {
        end += Duration::days(1);
    }
    Ok(Occurrence::new(start, Some(end), title.trim()))
}
