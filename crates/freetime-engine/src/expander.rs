//! Occurrence expansion -- turns calendar events into concrete dated occurrences.
//!
//! Recurring events are expanded with the `rrule` crate. Everything is worked
//! out in the wall-clock frame of each event's `DTSTART`, so an occurrence's
//! day is the calendar date the event author sees.
//!
//! Only the start of an occurrence is tested against the requested range:
//! an event starting on the last day of the range is kept even when it ends
//! after it.

use std::collections::HashMap;

use chrono::{DateTime, Days, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rrule::{RRuleSet, Tz};
use tracing::{debug, warn};

use crate::calendar::{CalendarDocument, CalendarEvent, EventTime, Frame};
use crate::error::{FreetimeError, Result};
use crate::schedule::{DaySchedule, Occurrence};

/// Upper bound on recurrence instances generated for one event inside the window.
pub const MAX_INSTANCES_PER_EVENT: u16 = u16::MAX;

/// Expand every event in `document` into the occurrences starting within
/// `[range_start, range_end]` (both dates inclusive), grouped per day.
///
/// Events without a usable `DTSTART`, or with an `RRULE` the recurrence engine
/// rejects, are skipped. Each skip is logged and recorded in
/// [`DaySchedule::skipped`].
///
/// # Errors
/// Returns `FreetimeError::Range` if `range_start > range_end`.
pub fn expand(
    document: &CalendarDocument,
    range_start: NaiveDate,
    range_end: NaiveDate,
) -> Result<DaySchedule> {
    check_range(range_start, range_end)?;

    let overrides = collect_overrides(document);
    let mut occurrences = Vec::new();
    let mut skipped = Vec::new();

    for event in document.events() {
        let overridden = match (&event.uid, event.recurrence_id) {
            (Some(uid), None) => overrides.get(uid.as_str()).map(Vec::as_slice),
            _ => None,
        };
        match expand_event(event, overridden.unwrap_or(&[]), range_start, range_end) {
            Ok(found) => occurrences.extend(found),
            Err(err) => {
                warn!(error = %err, "skipping calendar event");
                skipped.push(err);
            }
        }
    }

    debug!(
        events = document.events().len(),
        occurrences = occurrences.len(),
        skipped = skipped.len(),
        %range_start,
        %range_end,
        "expanded calendar"
    );

    Ok(DaySchedule::from_occurrences(occurrences).with_skipped(skipped))
}

/// Parse an iCalendar payload and expand it over `[range_start, range_end]`.
///
/// The range is checked before the payload is read.
///
/// # Errors
/// Returns `FreetimeError::Range` for an inverted range and
/// `FreetimeError::Parse` for an unreadable payload.
pub fn expand_ics(payload: &[u8], range_start: NaiveDate, range_end: NaiveDate) -> Result<DaySchedule> {
    check_range(range_start, range_end)?;
    let document = CalendarDocument::parse(payload)?;
    expand(&document, range_start, range_end)
}

pub(crate) fn check_range(range_start: NaiveDate, range_end: NaiveDate) -> Result<()> {
    if range_start > range_end {
        return Err(FreetimeError::Range {
            start: range_start,
            end: range_end,
        });
    }
    Ok(())
}

/// `RECURRENCE-ID`s of override events, keyed by the `UID` they modify.
fn collect_overrides(document: &CalendarDocument) -> HashMap<&str, Vec<EventTime>> {
    let mut overrides: HashMap<&str, Vec<EventTime>> = HashMap::new();
    for event in document.events() {
        if let (Some(uid), Some(recurrence_id)) = (&event.uid, event.recurrence_id) {
            overrides.entry(uid.as_str()).or_default().push(recurrence_id);
        }
    }
    overrides
}

fn expand_event(
    event: &CalendarEvent,
    overridden: &[EventTime],
    range_start: NaiveDate,
    range_end: NaiveDate,
) -> Result<Vec<Occurrence>> {
    let dtstart = event.start.ok_or_else(|| FreetimeError::MissingField {
        event: event.label(),
        field: "DTSTART",
    })?;
    let frame = dtstart.frame();
    let first = dtstart.wall_in(frame);
    let length = event_length(event, first, frame);

    let mut starts = match &event.rrule {
        Some(rule) => expand_rule(rule, dtstart, range_start, range_end).map_err(|reason| {
            FreetimeError::InvalidRule {
                event: event.label(),
                reason,
            }
        })?,
        None => vec![first],
    };
    starts.extend(event.rdates.iter().map(|d| d.wall_in(frame)));
    starts.sort();
    starts.dedup();

    Ok(starts
        .into_iter()
        .filter(|s| (range_start..=range_end).contains(&s.date()))
        .filter(|s| !matches_any(*s, &event.exdates, frame))
        .filter(|s| !matches_any(*s, overridden, frame))
        .map(|s| {
            let end = length.and_then(|l| s.checked_add_signed(l));
            Occurrence::new(s, end, event.summary.as_str())
        })
        .collect())
}

/// Length of every instance: `DTEND - DTSTART`, else `DURATION`.
///
/// `None` lets [`Occurrence::new`] apply the default duration.
fn event_length(event: &CalendarEvent, first: NaiveDateTime, frame: Frame) -> Option<Duration> {
    let length = match (event.end, event.duration) {
        (Some(end), _) => Some(end.wall_in(frame) - first),
        (None, Some(duration)) => Some(duration),
        (None, None) => None,
    }?;

    if length <= Duration::zero() {
        warn!(event = %event.label(), "event ends before it starts, using default duration");
        return None;
    }
    Some(length)
}

/// True when `start` is one of `dates`. A date-only entry matches the whole day.
fn matches_any(start: NaiveDateTime, dates: &[EventTime], frame: Frame) -> bool {
    dates.iter().any(|date| match date {
        EventTime::Date(day) => start.date() == *day,
        other => other.wall_in(frame) == start,
    })
}

/// Expand an RRULE into instance starts in the event's wall-clock frame.
///
/// The window handed to the `rrule` crate is padded by a day on each side so
/// zone offsets cannot clip instances; callers filter to the exact range.
/// `UNTIL` is stripped from the rule and applied here, which sidesteps the
/// crate's requirement that `UNTIL` and `DTSTART` share a zone.
fn expand_rule(
    rule: &str,
    dtstart: EventTime,
    range_start: NaiveDate,
    range_end: NaiveDate,
) -> std::result::Result<Vec<NaiveDateTime>, String> {
    let frame = dtstart.frame();
    let (rule, until) = split_until(rule);
    if rule.is_empty() {
        return Err("empty RRULE".to_string());
    }

    let until = match until {
        Some(raw) => Some(
            EventTime::parse(&raw, None)
                .ok_or_else(|| format!("unreadable UNTIL '{}'", raw))?,
        ),
        None => None,
    };
    // A date-only UNTIL includes that whole day.
    let until = until.map(|u| match u {
        EventTime::Date(day) => day.and_time(NaiveTime::MIN) + Duration::days(1) - Duration::seconds(1),
        other => other.wall_in(frame),
    });

    let first = dtstart.wall_in(frame);
    let dtstart_line = match dtstart {
        EventTime::Zoned(local, tz) => format!("DTSTART;TZID={}:{}", tz.name(), ical_stamp(local)),
        _ => format!("DTSTART:{}Z", ical_stamp(first)),
    };
    let rrule_text = format!("{}\nRRULE:{}", dtstart_line, rule);

    let rrule_set: RRuleSet = rrule_text.parse().map_err(|e| format!("{}", e))?;

    let window_start = utc_midnight(range_start.checked_sub_days(Days::new(1)).unwrap_or(range_start));
    let window_end = utc_midnight(range_end.checked_add_days(Days::new(2)).unwrap_or(range_end));

    let result = rrule_set
        .after(window_start.with_timezone(&Tz::UTC))
        .before(window_end.with_timezone(&Tz::UTC))
        .all(MAX_INSTANCES_PER_EVENT);
    if result.limited {
        warn!(
            rule = %rule,
            limit = MAX_INSTANCES_PER_EVENT,
            "recurrence expansion hit the instance cap"
        );
    }

    // Floating and UTC starts were handed over as UTC, so the UTC wall time
    // is the event's own wall time.
    Ok(result
        .dates
        .into_iter()
        .map(|dt| match frame {
            Frame::Zoned(_) => dt.naive_local(),
            Frame::Floating | Frame::Utc => dt.naive_utc(),
        })
        .filter(|s| until.is_none_or(|u| *s <= u))
        .collect())
}

/// Remove the `UNTIL=` part from a rule, returning the rest and the raw value.
fn split_until(rule: &str) -> (String, Option<String>) {
    let rule = rule.trim();
    let rule = rule
        .strip_prefix("RRULE:")
        .or_else(|| rule.strip_prefix("rrule:"))
        .unwrap_or(rule);

    let mut until = None;
    let parts: Vec<&str> = rule
        .split(';')
        .filter(|part| !part.trim().is_empty())
        .filter(|part| match part.split_once('=') {
            Some((key, value)) if key.trim().eq_ignore_ascii_case("UNTIL") => {
                until = Some(value.trim().to_string());
                false
            }
            _ => true,
        })
        .collect();

    (parts.join(";"), until)
}

fn ical_stamp(local: NaiveDateTime) -> String {
    local.format("%Y%m%dT%H%M%S").to_string()
}

fn utc_midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}
