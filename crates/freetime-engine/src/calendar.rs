//! iCalendar ingestion -- turns a raw `.ics` payload into a [`CalendarDocument`].
//!
//! Parsing of the line structure (unfolding, `BEGIN`/`END` nesting, parameters)
//! is delegated to the `ical` crate. This module interprets the `VEVENT`
//! properties the expander needs: `UID`, `SUMMARY`, `DTSTART`, `DTEND`,
//! `DURATION`, `RRULE`, `RDATE`, `EXDATE` and `RECURRENCE-ID`.
//!
//! A property whose value cannot be read is treated as absent. Whether that
//! makes the event unusable is decided by the expander, not here.

use std::io::BufReader;

use chrono::{Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use ical::parser::ical::component::IcalEvent;
use ical::property::Property;
use ical::IcalParser;
use tracing::warn;

use crate::error::{FreetimeError, Result};

/// The zone an event's times are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// No zone: the wall-clock time as written.
    Floating,
    Utc,
    Zoned(Tz),
}

/// A `DATE` or `DATE-TIME` property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTime {
    Floating(NaiveDateTime),
    Utc(NaiveDateTime),
    Zoned(NaiveDateTime, Tz),
    /// `VALUE=DATE`: a whole day, starting at midnight.
    Date(NaiveDate),
}

impl EventTime {
    /// Parse a raw value such as `20250120T100000Z`, `20250120T100000` or `20250120`.
    ///
    /// `tzid` is the `TZID` parameter, if any. An unknown zone name degrades to
    /// floating time so a single odd `VTIMEZONE` does not hide the event.
    pub fn parse(value: &str, tzid: Option<&str>) -> Option<Self> {
        let value = value.trim();
        if value.len() == 8 {
            return NaiveDate::parse_from_str(value, "%Y%m%d")
                .ok()
                .map(EventTime::Date);
        }

        if let Some(utc) = value.strip_suffix('Z').or_else(|| value.strip_suffix('z')) {
            return parse_date_time(utc).map(EventTime::Utc);
        }

        let local = parse_date_time(value)?;
        match tzid {
            Some(name) => {
                let name = name.trim_matches('"').trim_start_matches('/');
                match name.parse::<Tz>() {
                    Ok(tz) => Some(EventTime::Zoned(local, tz)),
                    Err(_) => {
                        warn!(tzid = name, "unknown TZID, reading time as floating");
                        Some(EventTime::Floating(local))
                    }
                }
            }
            None => Some(EventTime::Floating(local)),
        }
    }

    /// The frame this value is written in. Dates are floating.
    pub fn frame(&self) -> Frame {
        match self {
            EventTime::Floating(_) | EventTime::Date(_) => Frame::Floating,
            EventTime::Utc(_) => Frame::Utc,
            EventTime::Zoned(_, tz) => Frame::Zoned(*tz),
        }
    }

    /// The wall-clock time of this value as seen from `frame`.
    ///
    /// Floating values and dates have no zone to convert from and are
    /// returned as written.
    pub fn wall_in(&self, frame: Frame) -> NaiveDateTime {
        match (*self, frame) {
            (EventTime::Date(date), _) => date.and_time(chrono::NaiveTime::MIN),
            (EventTime::Floating(local), _) => local,
            (EventTime::Utc(utc), Frame::Zoned(tz)) => tz.from_utc_datetime(&utc).naive_local(),
            (EventTime::Utc(utc), _) => utc,
            (EventTime::Zoned(local, tz), Frame::Utc) => zoned_to_utc(local, tz),
            (EventTime::Zoned(local, tz), Frame::Zoned(target)) if tz != target => target
                .from_utc_datetime(&zoned_to_utc(local, tz))
                .naive_local(),
            (EventTime::Zoned(local, _), _) => local,
        }
    }

    pub fn is_date(&self) -> bool {
        matches!(self, EventTime::Date(_))
    }
}

/// One `VEVENT` as read from the payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalendarEvent {
    pub uid: Option<String>,
    pub summary: String,
    pub start: Option<EventTime>,
    pub end: Option<EventTime>,
    pub duration: Option<Duration>,
    pub rrule: Option<String>,
    pub rdates: Vec<EventTime>,
    pub exdates: Vec<EventTime>,
    pub recurrence_id: Option<EventTime>,
}

impl CalendarEvent {
    fn from_ical(event: &IcalEvent) -> Self {
        let mut parsed = CalendarEvent::default();

        for property in &event.properties {
            let Some(value) = property.value.as_deref() else {
                continue;
            };
            let name = property.name.to_ascii_uppercase();
            match name.as_str() {
                "UID" => parsed.uid = Some(value.trim().to_string()),
                "SUMMARY" => parsed.summary = unescape_text(value),
                "DTSTART" => parsed.start = parse_time_property(property, value),
                "DTEND" => {
                    parsed.end = parse_time_property(property, value);
                    if parsed.end.is_none() {
                        warn!(value, "unreadable DTEND ignored");
                    }
                }
                "DURATION" => {
                    parsed.duration = parse_duration(value);
                    if parsed.duration.is_none() {
                        warn!(value, "unreadable DURATION ignored");
                    }
                }
                "RRULE" => parsed.rrule = Some(value.trim().to_string()),
                "RDATE" => parsed.rdates.extend(parse_time_list(property, value)),
                "EXDATE" => parsed.exdates.extend(parse_time_list(property, value)),
                "RECURRENCE-ID" => parsed.recurrence_id = parse_time_property(property, value),
                _ => {}
            }
        }

        parsed
    }

    /// A name for log lines and error messages.
    pub fn label(&self) -> String {
        match (&self.uid, self.summary.is_empty()) {
            (_, false) => self.summary.clone(),
            (Some(uid), true) => uid.clone(),
            (None, true) => "<untitled>".to_string(),
        }
    }
}

/// A parsed calendar feed. Read-only input to the expander.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalendarDocument {
    events: Vec<CalendarEvent>,
}

impl CalendarDocument {
    /// Parse an iCalendar payload. Every `VCALENDAR` block in it is read.
    ///
    /// # Errors
    /// Returns `FreetimeError::Parse` if the payload is not UTF-8, contains no
    /// `VCALENDAR`, or its component structure is broken.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(payload)
            .map_err(|e| FreetimeError::Parse(format!("payload is not UTF-8: {}", e)))?;
        let text = strip_unknown_components(text.trim_start_matches('\u{feff}'));

        let mut events = Vec::new();
        let mut calendars = 0usize;
        for calendar in IcalParser::new(BufReader::new(text.as_bytes())) {
            let calendar = calendar.map_err(|e| FreetimeError::Parse(e.to_string()))?;
            calendars += 1;
            events.extend(calendar.events.iter().map(CalendarEvent::from_ical));
        }

        if calendars == 0 {
            return Err(FreetimeError::Parse("no VCALENDAR block found".to_string()));
        }

        Ok(Self { events })
    }

    /// Build a document from already-interpreted events.
    pub fn from_events(events: Vec<CalendarEvent>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[CalendarEvent] {
        &self.events
    }
}

// ---------------------------------------------------------------------------
// Component filtering
// ---------------------------------------------------------------------------

/// Sub-components the `ical` parser models inside `parent`.
fn known_children(parent: &str) -> &'static [&'static str] {
    match parent {
        "VCALENDAR" => &["VEVENT", "VTODO", "VJOURNAL", "VFREEBUSY", "VTIMEZONE"],
        "VEVENT" | "VTODO" => &["VALARM"],
        "VTIMEZONE" => &["STANDARD", "DAYLIGHT"],
        _ => &[],
    }
}

/// Drop every component nested in a calendar that the `ical` parser would
/// reject, such as `BEGIN:X-FOO ... END:X-FOO`, together with its contents.
///
/// Content lines are unfolded only to read `BEGIN`/`END`; kept lines are
/// passed through untouched. Text outside any component is left to the parser.
fn strip_unknown_components(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut stack: Vec<String> = Vec::new();
    let mut skip_depth = 0usize;

    for raw in logical_lines(text) {
        let unfolded: String = raw
            .split('\n')
            .map(|line| line.trim_end_matches('\r'))
            .enumerate()
            .map(|(i, line)| if i == 0 { line } else { &line[1.min(line.len())..] })
            .collect();
        let marker = unfolded
            .split_once(':')
            .map(|(name, value)| (name.trim().to_ascii_uppercase(), value.trim().to_ascii_uppercase()));

        if skip_depth > 0 {
            match marker.as_ref().map(|(name, _)| name.as_str()) {
                Some("BEGIN") => skip_depth += 1,
                Some("END") => skip_depth -= 1,
                _ => {}
            }
            continue;
        }

        match marker {
            Some((name, value)) if name == "BEGIN" => {
                let known = match stack.last() {
                    Some(parent) => known_children(parent).iter().any(|child| *child == value),
                    None => true,
                };
                if !known {
                    warn!(component = %value, "ignoring unsupported calendar component");
                    skip_depth = 1;
                    continue;
                }
                // The parser matches component names case-sensitively.
                out.push_str("BEGIN:");
                out.push_str(&value);
                out.push_str("\r\n");
                stack.push(value);
                continue;
            }
            Some((name, _)) if name == "END" => {
                stack.pop();
            }
            _ => {}
        }
        out.push_str(raw);
    }

    out
}

/// Split `text` into content lines, keeping each line's folded continuations
/// and line endings attached.
fn logical_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() {
        let end = match text[pos..].find('\n') {
            Some(offset) => pos + offset + 1,
            None => bytes.len(),
        };
        let continued = matches!(bytes.get(end), Some(b' ') | Some(b'\t'));
        if !continued {
            lines.push(&text[start..end]);
            start = end;
        }
        pos = end;
    }
    lines
}

// ---------------------------------------------------------------------------
// Property value helpers
// ---------------------------------------------------------------------------

fn parse_date_time(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M"))
        .ok()
}

fn zoned_to_utc(local: NaiveDateTime, tz: Tz) -> NaiveDateTime {
    match tz.from_local_datetime(&local).earliest() {
        Some(dt) => dt.with_timezone(&Utc).naive_utc(),
        // Inside a DST gap: the wall time never exists, so it is read one
        // offset later.
        None => tz
            .from_local_datetime(&(local + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc).naive_utc())
            .unwrap_or(local),
    }
}

fn param<'a>(property: &'a Property, name: &str) -> Option<&'a str> {
    property
        .params
        .as_ref()?
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, values)| values.first())
        .map(String::as_str)
}

fn parse_time_property(property: &Property, value: &str) -> Option<EventTime> {
    let time = EventTime::parse(value, param(property, "TZID"))?;
    // `VALUE=DATE` with a date-time shaped value is read at its date.
    match (param(property, "VALUE"), time) {
        (Some(kind), EventTime::Floating(local)) if kind.eq_ignore_ascii_case("DATE") => {
            Some(EventTime::Date(local.date()))
        }
        _ => Some(time),
    }
}

/// `RDATE`/`EXDATE` carry comma-separated lists. `PERIOD` values keep their start.
fn parse_time_list(property: &Property, value: &str) -> Vec<EventTime> {
    value
        .split(',')
        .filter(|item| !item.trim().is_empty())
        .filter_map(|item| {
            let item = item.split('/').next().unwrap_or(item);
            let parsed = parse_time_property(property, item);
            if parsed.is_none() {
                warn!(property = %property.name, value = item, "unreadable date ignored");
            }
            parsed
        })
        .collect()
}

/// Parse an RFC 5545 duration such as `PT1H30M`, `P1D` or `P2W`.
///
/// Negative durations are rejected: an event cannot end before it starts.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let value = value.strip_prefix('+').unwrap_or(value);
    let body = value.strip_prefix('P')?;

    let mut total = Duration::zero();
    let mut digits = String::new();
    let mut in_time = false;
    let mut seen_unit = false;

    for c in body.chars() {
        match c {
            '0'..='9' => digits.push(c),
            'T' if !in_time && digits.is_empty() => in_time = true,
            unit => {
                let n: i64 = digits.parse().ok()?;
                digits.clear();
                // Out-of-range components read as unreadable, never wrap.
                let part = match (unit, in_time) {
                    ('W', false) => Duration::try_weeks(n),
                    ('D', false) => Duration::try_days(n),
                    ('H', true) => Duration::try_hours(n),
                    ('M', true) => Duration::try_minutes(n),
                    ('S', true) => Duration::try_seconds(n),
                    _ => return None,
                }?;
                total = total.checked_add(&part)?;
                seen_unit = true;
            }
        }
    }

    if !digits.is_empty() || !seen_unit {
        return None;
    }
    Some(total)
}

/// Undo RFC 5545 TEXT escaping.
pub(crate) fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out.trim().to_string()
}

/// Apply RFC 5545 TEXT escaping.
pub(crate) fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}
