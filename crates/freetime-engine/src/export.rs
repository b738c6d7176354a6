//! Render a [`DaySchedule`] as iCalendar text.
//!
//! Used to hand a planned schedule (for example one parsed with
//! [`DaySchedule::from_formatted`]) back to a calendar application. Output is
//! deterministic: `UID` and `DTSTAMP` are derived from the occurrence itself.

use chrono::NaiveDateTime;

use crate::calendar::escape_text;
use crate::schedule::DaySchedule;

pub const PRODID: &str = "-//freetime-engine//EN";

/// Content lines longer than this many octets are folded.
const MAX_LINE_OCTETS: usize = 75;

/// Write every occurrence in `schedule` as a floating-time `VEVENT`.
pub fn to_ics(schedule: &DaySchedule) -> String {
    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        "CALSCALE:GREGORIAN".to_string(),
        format!("PRODID:{}", PRODID),
    ];

    for (index, occurrence) in schedule.iter().flat_map(|(_, list)| list).enumerate() {
        lines.push("BEGIN:VEVENT".to_string());
        lines.push(format!(
            "UID:{}-{}@freetime-engine",
            stamp(occurrence.start()),
            index
        ));
        lines.push(format!("DTSTAMP:{}Z", stamp(occurrence.start())));
        lines.push(format!("DTSTART:{}", stamp(occurrence.start())));
        lines.push(format!("DTEND:{}", stamp(occurrence.end())));
        lines.push(format!("SUMMARY:{}", escape_text(occurrence.title())));
        lines.push("END:VEVENT".to_string());
    }

    lines.push("END:VCALENDAR".to_string());

    let mut out = String::new();
    for line in &lines {
        fold_line(line, &mut out);
    }
    out
}

fn stamp(at: NaiveDateTime) -> String {
    at.format("%Y%m%dT%H%M%S").to_string()
}

/// Append `line` with CRLF endings, folding at 75 octets without splitting a
/// UTF-8 sequence. Continuation lines start with a space, which counts
/// toward their length.
fn fold_line(line: &str, out: &mut String) {
    let mut budget = MAX_LINE_OCTETS;
    let mut used = 0;
    for c in line.chars() {
        if used + c.len_utf8() > budget {
            out.push_str("\r\n ");
            budget = MAX_LINE_OCTETS - 1;
            used = 0;
        }
        out.push(c);
        used += c.len_utf8();
    }
    out.push_str("\r\n");
}
