//! # freetime-engine
//!
//! Deterministic occurrence expansion and free-time computation for iCalendar feeds.
//!
//! Given a calendar payload and a date range, the engine produces the concrete
//! occurrences landing in that range (recurring events expanded via the `rrule`
//! crate) and, per day, the unoccupied intervals left inside a configurable day
//! envelope, with aggregate free-hour figures. All functions are pure: no I/O,
//! no clock, no shared state.
//!
//! ## Quick start
//!
//! ```rust
//! use chrono::NaiveDate;
//! use freetime_engine::{compute_free, expand_ics, FreeTimeOptions};
//!
//! let ics = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:1\r\n\
//!            DTSTART:20250120T090000\r\nDTEND:20250120T110000\r\n\
//!            SUMMARY:Lecture\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
//! let day = NaiveDate::from_ymd_opt(2025, 1, 20).unwrap();
//!
//! let schedule = expand_ics(ics.as_bytes(), day, day).unwrap();
//! assert_eq!(schedule.to_formatted()[0].1, vec!["09.00-11.00 Lecture"]);
//!
//! let report = compute_free(day, day, &schedule, &FreeTimeOptions::default()).unwrap();
//! assert_eq!(report.total_free_hours(), 22.0);
//! ```
//!
//! ## Modules
//!
//! - [`calendar`]: `.ics` payload → `CalendarDocument`
//! - [`expander`]: `CalendarDocument` + range → `DaySchedule`
//! - [`freetime`]: `DaySchedule` + range → `FreeTimeReport`
//! - [`schedule`]: `DayKey`, `Occurrence`, `DaySchedule`
//! - [`interval`]: `TimeInterval`, `DayEnvelope`, minute arithmetic
//! - [`export`]: `DaySchedule` → `.ics` text
//! - [`error`]: Error types

pub mod calendar;
pub mod error;
pub mod expander;
pub mod export;
pub mod freetime;
pub mod interval;
pub mod schedule;

pub use calendar::CalendarDocument;
pub use error::FreetimeError;
pub use expander::{expand, expand_ics};
pub use export::to_ics;
pub use freetime::{compute_free, DayFreeTime, FreeTimeOptions, FreeTimeReport};
pub use interval::{DayEnvelope, TimeInterval};
pub use schedule::{DayKey, DaySchedule, Occurrence};
