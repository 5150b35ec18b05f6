//! Time and duration codec
//!
//! TRIAS mixes three textual time formats: UTC "Zulu" timestamps for the
//! envelope, zone-less local timestamps for `DepArrTime`, and ISO-8601
//! durations (`PT1H30M`) for trip and leg lengths.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Serialize, Serializer};

use crate::error::TriasError;

/// Zone used for local request times unless configured otherwise
pub const REFERENCE_ZONE: Tz = chrono_tz::Europe::Berlin;

const LOCAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const ZULU_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// A point in time handed in by a caller, with or without zone information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestTime {
    /// Timezone-aware instant
    Aware(DateTime<FixedOffset>),
    /// Wall-clock time without zone
    Naive(NaiveDateTime),
}

impl<T: TimeZone> From<DateTime<T>> for RequestTime {
    fn from(value: DateTime<T>) -> Self {
        Self::Aware(value.fixed_offset())
    }
}

impl From<NaiveDateTime> for RequestTime {
    fn from(value: NaiveDateTime) -> Self {
        Self::Naive(value)
    }
}

/// Format an instant as `YYYY-MM-DDTHH:MM:SS.mmmZ`
///
/// # Errors
///
/// Returns [`TriasError::InvalidInput`] for naive datetimes.
pub fn to_zulu_string(time: impl Into<RequestTime>) -> Result<String, TriasError> {
    match time.into() {
        RequestTime::Aware(dt) => Ok(format_zulu(&dt.with_timezone(&Utc))),
        RequestTime::Naive(naive) => Err(TriasError::InvalidInput(format!(
            "datetime {naive} must carry a timezone"
        ))),
    }
}

/// The current instant in Zulu format
#[must_use]
pub fn zulu_now() -> String {
    format_zulu(&Utc::now())
}

fn format_zulu(dt: &DateTime<Utc>) -> String {
    dt.format(ZULU_FORMAT).to_string()
}

/// Format a time as `YYYY-MM-DDTHH:MM:SS` in `zone`
///
/// Aware input is converted to `zone` first; naive input is written as is.
#[must_use]
pub fn to_local_string(time: impl Into<RequestTime>, zone: Tz) -> String {
    match time.into() {
        RequestTime::Aware(dt) => dt.with_timezone(&zone).format(LOCAL_FORMAT).to_string(),
        RequestTime::Naive(naive) => naive.format(LOCAL_FORMAT).to_string(),
    }
}

/// Parse an ISO-8601 timestamp from a response
///
/// Empty or absent input yields `None`. Timestamps without an offset are
/// read as UTC.
///
/// # Errors
///
/// Returns [`TriasError::ParseError`] if the text is not a timestamp.
pub fn parse_instant(value: Option<&str>) -> Result<Option<DateTime<FixedOffset>>, TriasError> {
    let Some(text) = value.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(Some(dt));
    }

    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc().fixed_offset()))
        .map_err(|e| TriasError::ParseError(format!("invalid timestamp '{text}': {e}")))
}

/// Parse a `PT[<h>H][<m>M]` duration
///
/// Components that are missing or unreadable count as zero.
#[must_use]
pub fn parse_duration(value: &str) -> Span {
    let body = value.find('T').map_or(value, |idx| &value[idx + 1..]);

    let (hours, rest) = match body.find('H') {
        Some(idx) => (body[..idx].parse::<u32>().unwrap_or(0), &body[idx + 1..]),
        None => (0, body),
    };
    let minutes = rest
        .find('M')
        .and_then(|idx| rest[..idx].parse::<u32>().ok())
        .unwrap_or(0);

    Span::new(TimeDelta::hours(i64::from(hours)) + TimeDelta::minutes(i64::from(minutes)))
}

/// `estimated - timetabled`, or `None` unless both are known
#[must_use]
pub fn delay_between(
    estimated: Option<DateTime<FixedOffset>>,
    timetabled: Option<DateTime<FixedOffset>>,
) -> Option<Span> {
    Some(Span::new(estimated? - timetabled?))
}

/// Signed duration rendered as `H:MM:SS`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Span(TimeDelta);

impl Span {
    /// Wrap a [`TimeDelta`]
    #[must_use]
    pub const fn new(delta: TimeDelta) -> Self {
        Self(delta)
    }

    /// The underlying delta
    #[must_use]
    pub const fn as_delta(&self) -> TimeDelta {
        self.0
    }

    /// Whole seconds, negative when early
    #[must_use]
    pub fn num_seconds(&self) -> i64 {
        self.0.num_seconds()
    }
}

impl From<TimeDelta> for Span {
    fn from(value: TimeDelta) -> Self {
        Self(value)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.0.num_seconds();
        let sign = if total < 0 { "-" } else { "" };
        let abs = total.unsigned_abs();

        let days = abs / 86_400;
        let hours = abs % 86_400 / 3_600;
        let minutes = abs % 3_600 / 60;
        let seconds = abs % 60;

        match days {
            0 => write!(f, "{sign}{hours}:{minutes:02}:{seconds:02}"),
            1 => write!(f, "{sign}1 day, {hours}:{minutes:02}:{seconds:02}"),
            n => write!(f, "{sign}{n} days, {hours}:{minutes:02}:{seconds:02}"),
        }
    }
}

impl Serialize for Span {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
