use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, DurationRound, NaiveDateTime, TimeDelta, Utc};
use regex::Regex;

use crate::error::ImportError;

/// Accepted shape of a command-line instant, `YYYY-MM-DD HH:MM`.
pub const INPUT_FORMAT: &str = "%Y-%m-%d %H:%M";

/// OpenSky only serves state vectors older than this lag.
pub const HISTORY_LAG_WEEKS: i64 = 4;

pub const SLOT_MINUTES: i64 = 15;

const HOUR_SECONDS: i64 = 3600;

static INPUT_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}$").expect("valid regex"));

/// The time range imported and replaced by one run.
///
/// `start` and `end` carry minute precision. The second-level bounds filter
/// rows and store documents; the hour-aligned bounds only feed the upstream
/// `hour` partition filter and always enclose the second-level range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ImportError> {
        if start >= end {
            return Err(ImportError::InvalidArguments(format!(
                "start {} must be before end {}",
                start.format(INPUT_FORMAT),
                end.format(INPUT_FORMAT)
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn start_epoch(&self) -> i64 {
        self.start.timestamp()
    }

    pub fn end_epoch(&self) -> i64 {
        self.end.timestamp()
    }

    pub fn start_hour_epoch(&self) -> i64 {
        floor_to_hour(self.start_epoch())
    }

    /// Hour boundary strictly after `end`, so an `end` sitting exactly on an
    /// hour still has its partition included.
    pub fn end_hour_epoch(&self) -> i64 {
        floor_to_hour(self.end_epoch() + HOUR_SECONDS)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}",
            self.start.format(INPUT_FORMAT),
            self.end.format(INPUT_FORMAT)
        )
    }
}

/// Resolves the window for this run from the optional command-line bounds.
pub fn resolve(start: Option<&str>, end: Option<&str>) -> Result<TimeWindow, ImportError> {
    resolve_at(start, end, Utc::now())
}

pub fn resolve_at(
    start: Option<&str>,
    end: Option<&str>,
    now: DateTime<Utc>,
) -> Result<TimeWindow, ImportError> {
    match (start, end) {
        (None, None) => last_interval(now),
        (Some(start), Some(end)) => parse_range(start, end),
        _ => Err(ImportError::InvalidArguments(
            "expected either no dates or both a start and an end date".to_string(),
        )),
    }
}

pub fn parse_range(start: &str, end: &str) -> Result<TimeWindow, ImportError> {
    let start_at = parse_instant(start)?;
    let end_at = parse_instant(end)?;
    // Fixed-width input, so lexical order is chronological order.
    if start >= end {
        return Err(ImportError::InvalidArguments(format!(
            "start '{start}' must be before end '{end}'"
        )));
    }
    TimeWindow::new(start_at, end_at)
}

pub fn parse_instant(value: &str) -> Result<DateTime<Utc>, ImportError> {
    if value.len() != 16 || !INPUT_SHAPE.is_match(value) {
        return Err(ImportError::InvalidArguments(format!(
            "'{value}' does not match YYYY-MM-DD HH:MM"
        )));
    }
    let naive = NaiveDateTime::parse_from_str(value, INPUT_FORMAT)
        .map_err(|err| ImportError::InvalidArguments(format!("'{value}': {err}")))?;
    Ok(naive.and_utc())
}

/// Most recently completed 15-minute slot, taken `HISTORY_LAG_WEEKS` back from `now`.
pub fn last_interval(now: DateTime<Utc>) -> Result<TimeWindow, ImportError> {
    let request_time = now - TimeDelta::weeks(HISTORY_LAG_WEEKS);
    let slot_start = request_time
        .duration_trunc(TimeDelta::minutes(SLOT_MINUTES))
        .map_err(|err| ImportError::InvalidArguments(format!("cannot derive import slot: {err}")))?;
    TimeWindow::new(slot_start, slot_start + TimeDelta::minutes(SLOT_MINUTES))
}

fn floor_to_hour(epoch: i64) -> i64 {
    epoch - epoch.rem_euclid(HOUR_SECONDS)
}
