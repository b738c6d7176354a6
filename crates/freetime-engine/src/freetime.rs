//! Compute free time per day from a [`DaySchedule`].
//!
//! Each day is walked with a cursor starting at the envelope start. Every
//! occurrence that begins more than `min_gap_minutes` after the cursor opens
//! a free interval; the cursor then advances to the latest end seen so far,
//! which merges overlapping and back-to-back occurrences without a separate
//! merge pass.
//!
//! Rounding: each day's free hours are rounded to one decimal, and the total
//! is the sum of those rounded values, rounded once more.

use chrono::{NaiveDate, NaiveTime};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use tracing::debug;

use crate::error::Result;
use crate::expander::check_range;
use crate::interval::{minutes_between, round_hours, truncate_to_minute, DayEnvelope, TimeInterval};
use crate::schedule::{DayKey, DaySchedule, Occurrence};

/// Candidate gaps must be strictly longer than this many minutes by default.
pub const DEFAULT_MIN_GAP_MINUTES: u32 = 30;

/// Tunables for the free-time calculation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreeTimeOptions {
    /// Portion of each day in which free time is reported.
    pub envelope: DayEnvelope,
    /// Gaps of this many minutes or fewer are not reported.
    pub min_gap_minutes: u32,
}

impl Default for FreeTimeOptions {
    fn default() -> Self {
        Self {
            envelope: DayEnvelope::default(),
            min_gap_minutes: DEFAULT_MIN_GAP_MINUTES,
        }
    }
}

/// Free intervals of a single day.
#[derive(Debug, Clone, PartialEq)]
pub struct DayFreeTime {
    pub day: DayKey,
    /// Chronological, pairwise non-overlapping.
    pub intervals: Vec<TimeInterval>,
    /// Sum of `intervals`, rounded to one decimal.
    pub hours: f64,
}

/// Free time across a date range.
#[derive(Debug, Clone, PartialEq)]
pub struct FreeTimeReport {
    days: Vec<DayFreeTime>,
    total_free_hours: f64,
    free_time_days: Vec<(DayKey, f64)>,
}

impl FreeTimeReport {
    /// Every day of the range, in order, including days with no free time.
    pub fn days(&self) -> &[DayFreeTime] {
        &self.days
    }

    pub fn intervals_on(&self, day: DayKey) -> Option<&[TimeInterval]> {
        self.days
            .binary_search_by_key(&day, |d| d.day)
            .ok()
            .map(|idx| self.days[idx].intervals.as_slice())
    }

    pub fn total_free_hours(&self) -> f64 {
        self.total_free_hours
    }

    /// `(day, hours)` for days with any free time, in day order.
    pub fn free_time_days(&self) -> &[(DayKey, f64)] {
        &self.free_time_days
    }

    /// True when the range holds at least `hours` of free time in total.
    pub fn can_fit(&self, hours: f64) -> bool {
        hours <= self.total_free_hours
    }

    /// The earliest free interval lasting at least `min_minutes`.
    pub fn first_slot(&self, min_minutes: i64) -> Option<(DayKey, TimeInterval)> {
        self.days.iter().find_map(|d| {
            d.intervals
                .iter()
                .find(|interval| interval.duration_minutes() >= min_minutes)
                .map(|interval| (d.day, *interval))
        })
    }
}

impl Serialize for FreeTimeReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("FreeTimeReport", 3)?;
        state.serialize_field("free_time", &FreeTimeByDay(&self.days))?;
        state.serialize_field("total_free_hours", &self.total_free_hours)?;
        state.serialize_field("free_time_days", &self.free_time_days)?;
        state.end()
    }
}

/// `{ "dd.mm.yyyy": ["hh.mm-hh.mm", ...] }` view of the per-day intervals.
struct FreeTimeByDay<'a>(&'a [DayFreeTime]);

impl Serialize for FreeTimeByDay<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|d| (d.day, &d.intervals)))
    }
}

/// Compute free intervals for every day in `[range_start, range_end]`.
///
/// Days missing from `schedule` are treated as having no occurrences.
///
/// # Errors
/// Returns `FreetimeError::Range` if `range_start > range_end`; nothing is
/// computed in that case.
pub fn compute_free(
    range_start: NaiveDate,
    range_end: NaiveDate,
    schedule: &DaySchedule,
    options: &FreeTimeOptions,
) -> Result<FreeTimeReport> {
    check_range(range_start, range_end)?;

    let days: Vec<DayFreeTime> = range_start
        .iter_days()
        .take_while(|date| *date <= range_end)
        .map(|date| {
            let day = DayKey::new(date);
            let intervals = free_intervals(day, schedule.occurrences_on(day), options);
            let minutes: i64 = intervals.iter().map(TimeInterval::duration_minutes).sum();
            DayFreeTime {
                day,
                intervals,
                hours: round_hours(minutes as f64 / 60.0),
            }
        })
        .collect();

    let free_time_days: Vec<(DayKey, f64)> = days
        .iter()
        .filter(|d| d.hours > 0.0)
        .map(|d| (d.day, d.hours))
        .collect();
    let total_free_hours = round_hours(free_time_days.iter().map(|(_, hours)| hours).sum());

    debug!(
        days = days.len(),
        free_days = free_time_days.len(),
        total_free_hours,
        "computed free time"
    );

    Ok(FreeTimeReport {
        days,
        total_free_hours,
        free_time_days,
    })
}

/// Free intervals within one day's envelope.
///
/// `occurrences` need not be sorted. Occurrence bounds are clamped into the
/// envelope; an occurrence running past midnight occupies the rest of the day
/// and is not carried over to the next one.
pub fn free_intervals(
    day: DayKey,
    occurrences: &[Occurrence],
    options: &FreeTimeOptions,
) -> Vec<TimeInterval> {
    let envelope = options.envelope;
    let min_gap = i64::from(options.min_gap_minutes);

    let mut spans: Vec<(NaiveTime, NaiveTime)> = occurrences
        .iter()
        .map(|o| occupied_span(day.date(), o, &envelope))
        .collect();
    spans.sort_by_key(|(start, _)| *start);

    let mut free = Vec::new();
    let mut cursor = envelope.start();
    for (start, end) in spans {
        if minutes_between(cursor, start) > min_gap {
            free.push(TimeInterval::new_unchecked(cursor, start));
        }
        cursor = cursor.max(end);
    }

    if minutes_between(cursor, envelope.end()) > min_gap {
        free.push(TimeInterval::new_unchecked(cursor, envelope.end()));
    }

    free
}

/// Start and end of an occurrence as times of day on `date`, clamped into the envelope.
fn occupied_span(date: NaiveDate, occurrence: &Occurrence, envelope: &DayEnvelope) -> (NaiveTime, NaiveTime) {
    let bound = |at: chrono::NaiveDateTime| {
        if at.date() < date {
            envelope.start()
        } else if at.date() > date {
            envelope.end()
        } else {
            envelope.clamp(truncate_to_minute(at.time()))
        }
    };
    (bound(occurrence.start()), bound(occurrence.end()))
}
