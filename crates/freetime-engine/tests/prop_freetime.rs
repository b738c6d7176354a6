//! Property-based tests for free-time computation and expansion using proptest.
//!
//! These verify invariants that hold for *any* day layout, not just the
//! scenarios in `freetime_tests.rs`.

use chrono::{Duration, NaiveDate, NaiveTime, Timelike};
use freetime_engine::freetime::free_intervals;
use freetime_engine::{
    compute_free, expand_ics, DayEnvelope, DayKey, DaySchedule, FreeTimeOptions, Occurrence,
    TimeInterval,
};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 20).unwrap()
}

/// Up to 12 events on `day()`, each starting at a whole minute and lasting
/// 1-300 minutes (so some run past midnight).
fn arb_occurrences() -> impl Strategy<Value = Vec<Occurrence>> {
    prop::collection::vec((0i64..1440, 1i64..=300), 0..12).prop_map(|spans| {
        spans
            .into_iter()
            .map(|(start, len)| {
                let start = day().and_hms_opt(0, 0, 0).unwrap() + Duration::minutes(start);
                Occurrence::new(start, Some(start + Duration::minutes(len)), "busy")
            })
            .collect()
    })
}

fn arb_envelope() -> impl Strategy<Value = DayEnvelope> {
    (0u32..1380, 1u32..=1439)
        .prop_filter("start before end", |(start, end)| start < end)
        .prop_map(|(start, end)| DayEnvelope::new(minute(start), minute(end)).unwrap())
}

fn minute(m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(m / 60, m % 60, 0).unwrap()
}

fn minute_of(time: NaiveTime) -> i64 {
    i64::from(time.hour() * 60 + time.minute())
}

/// Occupied minutes inside the envelope after merging overlaps.
fn merged_occupied_minutes(occurrences: &[Occurrence], envelope: &DayEnvelope) -> i64 {
    let (lo, hi) = (minute_of(envelope.start()), minute_of(envelope.end()));
    let mut spans: Vec<(i64, i64)> = occurrences
        .iter()
        .map(|o| {
            let start = minute_of(o.start().time());
            let end = if o.end().date() > day() {
                hi
            } else {
                minute_of(o.end().time())
            };
            (start.clamp(lo, hi), end.clamp(lo, hi))
        })
        .filter(|(start, end)| start < end)
        .collect();
    spans.sort();

    let mut total = 0;
    let mut cursor = lo;
    for (start, end) in spans {
        let start = start.max(cursor);
        if end > start {
            total += end - start;
            cursor = end;
        }
    }
    total
}

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: 256,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Property 1: Free intervals are ordered, disjoint, and inside the envelope
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(config())]

    #[test]
    fn intervals_ordered_disjoint_and_enveloped(
        occurrences in arb_occurrences(),
        envelope in arb_envelope(),
        gap in 0u32..120,
    ) {
        let options = FreeTimeOptions { envelope, min_gap_minutes: gap };
        let free = free_intervals(DayKey::new(day()), &occurrences, &options);

        for window in free.windows(2) {
            prop_assert!(window[0].end() <= window[1].start(), "{} then {}", window[0], window[1]);
        }
        for interval in &free {
            prop_assert!(interval.start() >= envelope.start());
            prop_assert!(interval.end() <= envelope.end());
            prop_assert!(interval.duration_minutes() > i64::from(gap));
        }
    }
}

// ---------------------------------------------------------------------------
// Property 2: Free time never overlaps an occurrence
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(config())]

    #[test]
    fn free_time_never_overlaps_occurrences(
        occurrences in arb_occurrences(),
        gap in 0u32..120,
    ) {
        let options = FreeTimeOptions { min_gap_minutes: gap, ..FreeTimeOptions::default() };
        let free = free_intervals(DayKey::new(day()), &occurrences, &options);

        for occurrence in &occurrences {
            let end = if occurrence.end().date() > day() {
                options.envelope.end()
            } else {
                occurrence.end().time()
            };
            if let Ok(busy) = TimeInterval::new(occurrence.start().time(), end) {
                for interval in &free {
                    prop_assert!(!interval.overlaps(&busy), "{} overlaps {}", interval, busy);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Property 3: free + merged occupied <= envelope, with equality at gap 0
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(config())]

    #[test]
    fn free_and_occupied_fill_at_most_the_envelope(
        occurrences in arb_occurrences(),
        envelope in arb_envelope(),
        gap in 0u32..120,
    ) {
        let occupied = merged_occupied_minutes(&occurrences, &envelope);

        let options = FreeTimeOptions { envelope, min_gap_minutes: gap };
        let free: i64 = free_intervals(DayKey::new(day()), &occurrences, &options)
            .iter()
            .map(TimeInterval::duration_minutes)
            .sum();
        prop_assert!(free + occupied <= envelope.duration_minutes());

        let exact = FreeTimeOptions { envelope, min_gap_minutes: 0 };
        let free: i64 = free_intervals(DayKey::new(day()), &occurrences, &exact)
            .iter()
            .map(TimeInterval::duration_minutes)
            .sum();
        prop_assert_eq!(free + occupied, envelope.duration_minutes());
    }
}

// ---------------------------------------------------------------------------
// Property 4: compute_free is a pure function of its inputs
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(config())]

    #[test]
    fn compute_free_is_idempotent(occurrences in arb_occurrences()) {
        let schedule = DaySchedule::from_occurrences(occurrences);
        let options = FreeTimeOptions::default();
        let end = day() + Duration::days(1);

        let first = compute_free(day(), end, &schedule, &options).unwrap();
        let second = compute_free(day(), end, &schedule, &options).unwrap();

        prop_assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}

// ---------------------------------------------------------------------------
// Property 5: Expanded occurrences land inside the range, sorted per day
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(config())]

    #[test]
    fn expansion_stays_in_range_and_sorted(
        freq in prop_oneof![Just("DAILY"), Just("WEEKLY")],
        hour in 0u32..24,
        offset in 0i64..60,
        span in 0i64..30,
    ) {
        let payload = format!(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:1\r\n\
             DTSTART:20250101T{:02}0000\r\nRRULE:FREQ={}\r\nSUMMARY:A\r\nEND:VEVENT\r\n\
             BEGIN:VEVENT\r\nUID:2\r\nDTSTART:20250101T120000\r\nRRULE:FREQ=DAILY\r\n\
             SUMMARY:B\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n",
            hour, freq
        );
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap() + Duration::days(offset);
        let end = start + Duration::days(span);

        let schedule = expand_ics(payload.as_bytes(), start, end).unwrap();

        for (key, occurrences) in schedule.iter() {
            prop_assert!(key.date() >= start && key.date() <= end);
            for occurrence in occurrences {
                prop_assert_eq!(occurrence.day(), key);
            }
            for window in occurrences.windows(2) {
                prop_assert!(window[0].start() <= window[1].start());
            }
        }
        // The daily event lands on every day of the range.
        prop_assert_eq!(schedule.len() as i64, span + 1);
    }
}
