//! Error types for freetime-engine operations.

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FreetimeError {
    /// The calendar payload could not be read as iCalendar.
    #[error("Calendar parse error: {0}")]
    Parse(String),

    #[error("Invalid date range: {start} is after {end}")]
    Range { start: NaiveDate, end: NaiveDate },

    /// An event has no usable value for a required property.
    #[error("Event '{event}' has no usable {field}")]
    MissingField { event: String, field: &'static str },

    #[error("Invalid RRULE for event '{event}': {reason}")]
    InvalidRule { event: String, reason: String },

    /// A `dd.mm.yyyy`, `hh.mm` or `hh.mm-hh.mm Title` value failed to parse.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Invalid day envelope: {start} is not before {end}")]
    InvalidEnvelope { start: NaiveTime, end: NaiveTime },
}

pub type Result<T> = std::result::Result<T, FreetimeError>;
