//! Tests for rendering a schedule as iCalendar text.

use chrono::NaiveDate;
use freetime_engine::export::PRODID;
use freetime_engine::{expand_ics, to_ics, DaySchedule};

fn plan() -> DaySchedule {
    DaySchedule::from_formatted([
        (
            "20.01.2025",
            vec!["10.00-12.00 swimming practice", "13.00-14.00 Lecture, part 1"],
        ),
        ("23.01.2025", vec!["10.00-11.00 swimming practice"]),
    ])
    .unwrap()
}

#[test]
fn writes_calendar_envelope_and_events() {
    let ics = to_ics(&plan());

    assert!(ics.starts_with("BEGIN:VCALENDAR\r\nVERSION:2.0\r\nCALSCALE:GREGORIAN\r\n"));
    assert!(ics.contains(&format!("PRODID:{}\r\n", PRODID)));
    assert!(ics.ends_with("END:VCALENDAR\r\n"));
    assert_eq!(ics.matches("BEGIN:VEVENT").count(), 3);
    assert!(ics.contains("DTSTART:20250120T100000\r\nDTEND:20250120T120000\r\n"));
    assert!(ics.contains("SUMMARY:Lecture\\, part 1\r\n"));
}

#[test]
fn output_is_deterministic() {
    assert_eq!(to_ics(&plan()), to_ics(&plan()));
}

#[test]
fn long_lines_are_folded() {
    let title = "x".repeat(200);
    let entry = format!("09.00-10.00 {}", title);
    let schedule = DaySchedule::from_formatted([("20.01.2025", [entry.as_str()])]).unwrap();

    let ics = to_ics(&schedule);

    for line in ics.split("\r\n") {
        assert!(line.len() <= 75, "line too long: {} octets", line.len());
    }
    assert!(ics.contains("\r\n x"));
}

#[test]
fn exported_plan_reads_back_as_same_schedule() {
    let original = plan();
    let ics = to_ics(&original);

    let reread = expand_ics(
        ics.as_bytes(),
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
    )
    .unwrap();

    assert_eq!(reread.to_formatted(), original.to_formatted());
}
