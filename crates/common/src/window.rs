//! Date window utilities.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// An inclusive `[start, end]` time range used to select audit entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawWindow")]
pub struct DateWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TryFrom<RawWindow> for DateWindow {
    type Error = crate::Error;

    fn try_from(raw: RawWindow) -> crate::Result<Self> {
        DateWindow::new(raw.start, raw.end)
    }
}

impl DateWindow {
    /// Create a window, rejecting `start > end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> crate::Result<Self> {
        if start > end {
            return Err(crate::Error::validation(format!(
                "start {} is after end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    /// The `days` days ending now.
    pub fn last_days(days: u32) -> Self {
        let end = Utc::now();
        Self {
            start: end - Duration::days(i64::from(days)),
            end,
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }
}

impl std::fmt::Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} .. {}",
            self.start.format("%Y-%m-%dT%H:%M:%SZ"),
            self.end.format("%Y-%m-%dT%H:%M:%SZ")
        )
    }
}

/// Parse an instant given as RFC 3339 or a bare `YYYY-MM-DD` date.
///
/// Bare dates resolve to midnight UTC, or to the last second of the day
/// when `end_of_day` is set so that `--end 2024-01-31` covers that day.
pub fn parse_instant(s: &str, end_of_day: bool) -> crate::Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| crate::Error::validation(format!("invalid date: {}", s)))?;
    let time = if end_of_day {
        NaiveTime::from_hms_opt(23, 59, 59)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .ok_or_else(|| crate::Error::validation("invalid time of day"))?;

    Ok(date.and_time(time).and_utc())
}
