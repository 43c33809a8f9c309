//! Calendar helpers for unix-second timestamps.
//!
//! Every encoding stores times as unix seconds, some also as broken-down
//! UTC calendar fields. These helpers convert between the two with `chrono`.

use crate::error::{Error, Result};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike, Utc};
use std::time::{SystemTime, UNIX_EPOCH};

/// Broken-down UTC calendar time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarTime {
    /// Four-digit year
    pub year: i32,
    /// Month, 1-12
    pub month: u32,
    /// Day of month, 1-31
    pub day: u32,
    /// Hour, 0-23
    pub hour: u32,
    /// Minute, 0-59
    pub min: u32,
    /// Second, 0-59
    pub sec: u32,
}

impl CalendarTime {
    /// Break a unix time down into UTC calendar fields.
    pub fn from_unix(unix: i64) -> Self {
        let dt: DateTime<Utc> = Utc
            .timestamp_opt(unix, 0)
            .single()
            .unwrap_or_default();
        CalendarTime {
            year: dt.year(),
            month: dt.month(),
            day: dt.day(),
            hour: dt.hour(),
            min: dt.minute(),
            sec: dt.second(),
        }
    }

    /// Convert back to unix seconds.
    pub fn to_unix(&self) -> Result<i64> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
            .and_then(|d| d.and_hms_opt(self.hour, self.min, self.sec))
            .map(|dt| dt.and_utc().timestamp())
            .ok_or_else(|| Error::InvalidTime(self.to_string()))
    }

    /// `YYYYMMDD`, the day-directory naming used for data and catalogs.
    pub fn day_dir_name(&self) -> String {
        format!("{:04}{:02}{:02}", self.year, self.month, self.day)
    }

    /// `HHMMSS`, the time-of-day file naming used for data files.
    pub fn time_file_stem(&self) -> String {
        format!("{:02}{:02}{:02}", self.hour, self.min, self.sec)
    }
}

impl std::fmt::Display for CalendarTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.min, self.sec
        )
    }
}

/// Current wall-clock time in unix seconds.
pub fn now_unix() -> i64 {
    Utc::now().timestamp()
}

/// Convert a `SystemTime` (e.g. a file mtime) to unix seconds.
pub fn system_time_to_unix(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}
