//! The notification record
//!
//! A `NotificationRecord` is the logical "new data available" announcement
//! shared by every on-disk encoding.
//!
//! # Optional fields
//!
//! The encodings carry absent string fields as sentinel strings (`"unknown"`
//! or `"none"`, depending on the field). In memory those fields are plain
//! `Option<String>`; [`sentinel`] holds the mapping in both directions.
//!
//! # Aliases
//!
//! Older producers only filled `user_info1`/`user_info2`, using them for
//! the writer name and the relative data path. The pairs
//! `writer`/`user_info1` and `rel_data_path`/`user_info2` therefore act as
//! fallbacks for each other. The rule lives in [`resolve_aliases`] and
//! nowhere else.

use crate::time::CalendarTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel strings used by the encodings for absent fields.
pub mod sentinel {
    /// Sentinel for `rel_data_path`, `data_type` and `writer`.
    pub const UNKNOWN: &str = "unknown";
    /// Sentinel for `data_file_ext`, `user_info1` and `user_info2`.
    pub const NONE: &str = "none";

    /// Encode an optional field, substituting the sentinel when absent.
    pub fn field_or<'a>(value: Option<&'a str>, sentinel: &'a str) -> &'a str {
        value.unwrap_or(sentinel)
    }

    /// Decode a field, mapping the sentinel back to `None`.
    pub fn from_field(value: &str, sentinel: &str) -> Option<String> {
        if value == sentinel {
            None
        } else {
            Some(value.to_string())
        }
    }
}

/// Latest-data announcement.
///
/// `latest_time <= max_time` holds for every value reachable through the
/// public API: every setter that moves `latest_time` also moves the
/// watermark, and the watermark never decreases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    latest_time: i64,
    max_time: i64,
    rel_data_path: Option<String>,
    data_file_ext: Option<String>,
    data_type: Option<String>,
    writer: Option<String>,
    user_info1: Option<String>,
    user_info2: Option<String>,
    is_forecast: bool,
    forecast_lead_secs: i32,
    displaced_dir_path: Option<String>,
    prev_mod_time: i64,
}

impl NotificationRecord {
    /// Create an empty record (all fields absent, times zero).
    pub fn new() -> Self {
        Self::default()
    }

    // ---------------------------------------------------------------
    // Times
    // ---------------------------------------------------------------

    /// Latest time: valid time for observations, generate time for forecasts.
    pub fn latest_time(&self) -> i64 {
        self.latest_time
    }

    /// Set the latest time, advancing the watermark if needed.
    pub fn set_latest_time(&mut self, unix: i64) {
        self.latest_time = unix;
        if unix > self.max_time {
            self.max_time = unix;
        }
    }

    /// Largest latest time ever held by this record.
    pub fn max_time(&self) -> i64 {
        self.max_time
    }

    /// Raise the watermark. Values below the current watermark are ignored.
    pub fn raise_max_time(&mut self, unix: i64) {
        if unix > self.max_time {
            self.max_time = unix;
        }
    }

    /// Latest valid time: generate time plus lead time for forecasts.
    pub fn latest_valid_time(&self) -> i64 {
        if self.is_forecast {
            self.latest_time
                .saturating_add(i64::from(self.forecast_lead_secs))
        } else {
            self.latest_time
        }
    }

    /// Latest time broken down into UTC calendar fields.
    pub fn latest_calendar(&self) -> CalendarTime {
        CalendarTime::from_unix(self.latest_time)
    }

    /// Modification time (unix secs) of the encoding this record was last read from.
    pub fn prev_mod_time(&self) -> i64 {
        self.prev_mod_time
    }

    /// Set the previous modification time.
    pub fn set_prev_mod_time(&mut self, unix: i64) {
        self.prev_mod_time = unix;
    }

    // ---------------------------------------------------------------
    // Forecast
    // ---------------------------------------------------------------

    /// Whether the announced data is a forecast.
    pub fn is_forecast(&self) -> bool {
        self.is_forecast
    }

    /// Forecast lead time in seconds (0 when not a forecast).
    pub fn forecast_lead_secs(&self) -> i32 {
        if self.is_forecast {
            self.forecast_lead_secs
        } else {
            0
        }
    }

    /// Mark the record as a forecast with the given lead time.
    pub fn set_forecast(&mut self, lead_secs: i32) {
        self.is_forecast = true;
        self.forecast_lead_secs = lead_secs;
    }

    /// Mark the record as observation data.
    pub fn clear_forecast(&mut self) {
        self.is_forecast = false;
        self.forecast_lead_secs = 0;
    }

    // ---------------------------------------------------------------
    // String fields
    // ---------------------------------------------------------------

    /// Path of the data file relative to the data directory.
    pub fn rel_data_path(&self) -> Option<&str> {
        self.rel_data_path.as_deref()
    }

    /// Set the relative data path.
    pub fn set_rel_data_path(&mut self, path: impl Into<String>) {
        self.rel_data_path = Some(path.into());
    }

    /// Data file extension.
    pub fn data_file_ext(&self) -> Option<&str> {
        self.data_file_ext.as_deref()
    }

    /// Set the data file extension.
    pub fn set_data_file_ext(&mut self, ext: impl Into<String>) {
        self.data_file_ext = Some(ext.into());
    }

    /// Data type, e.g. `mdv`.
    pub fn data_type(&self) -> Option<&str> {
        self.data_type.as_deref()
    }

    /// Set the data type.
    pub fn set_data_type(&mut self, data_type: impl Into<String>) {
        self.data_type = Some(data_type.into());
    }

    /// Name of the writing application, as stored.
    pub fn writer(&self) -> Option<&str> {
        self.writer.as_deref()
    }

    /// Set the writer application name.
    pub fn set_writer(&mut self, writer: impl Into<String>) {
        self.writer = Some(writer.into());
    }

    /// Free-form user info 1, as stored.
    pub fn user_info1(&self) -> Option<&str> {
        self.user_info1.as_deref()
    }

    /// Set user info 1.
    pub fn set_user_info1(&mut self, info: impl Into<String>) {
        self.user_info1 = Some(info.into());
    }

    /// Free-form user info 2, as stored.
    pub fn user_info2(&self) -> Option<&str> {
        self.user_info2.as_deref()
    }

    /// Set user info 2.
    pub fn set_user_info2(&mut self, info: impl Into<String>) {
        self.user_info2 = Some(info.into());
    }

    /// Directory overriding the data directory when resolving `rel_data_path`.
    pub fn displaced_dir_path(&self) -> Option<&str> {
        self.displaced_dir_path.as_deref()
    }

    /// Set the displaced directory path. An empty path clears it.
    pub fn set_displaced_dir_path(&mut self, path: impl Into<String>) {
        let path = path.into();
        self.displaced_dir_path = if path.is_empty() { None } else { Some(path) };
    }

    // ---------------------------------------------------------------
    // Builders
    // ---------------------------------------------------------------

    /// Builder form of [`set_latest_time`](Self::set_latest_time).
    pub fn with_latest_time(mut self, unix: i64) -> Self {
        self.set_latest_time(unix);
        self
    }

    /// Builder form of [`set_rel_data_path`](Self::set_rel_data_path).
    pub fn with_rel_data_path(mut self, path: impl Into<String>) -> Self {
        self.set_rel_data_path(path);
        self
    }

    /// Builder form of [`set_data_file_ext`](Self::set_data_file_ext).
    pub fn with_data_file_ext(mut self, ext: impl Into<String>) -> Self {
        self.set_data_file_ext(ext);
        self
    }

    /// Builder form of [`set_data_type`](Self::set_data_type).
    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.set_data_type(data_type);
        self
    }

    /// Builder form of [`set_writer`](Self::set_writer).
    pub fn with_writer(mut self, writer: impl Into<String>) -> Self {
        self.set_writer(writer);
        self
    }

    /// Builder form of [`set_user_info1`](Self::set_user_info1).
    pub fn with_user_info1(mut self, info: impl Into<String>) -> Self {
        self.set_user_info1(info);
        self
    }

    /// Builder form of [`set_user_info2`](Self::set_user_info2).
    pub fn with_user_info2(mut self, info: impl Into<String>) -> Self {
        self.set_user_info2(info);
        self
    }

    /// Builder form of [`set_forecast`](Self::set_forecast).
    pub fn with_forecast(mut self, lead_secs: i32) -> Self {
        self.set_forecast(lead_secs);
        self
    }

    /// Builder form of [`set_displaced_dir_path`](Self::set_displaced_dir_path).
    pub fn with_displaced_dir_path(mut self, path: impl Into<String>) -> Self {
        self.set_displaced_dir_path(path);
        self
    }

    // ---------------------------------------------------------------
    // Reader-side state
    // ---------------------------------------------------------------

    /// Reset every announcement field, keeping the watermark and mod time.
    pub fn clear_info(&mut self) {
        let max_time = self.max_time;
        let prev_mod_time = self.prev_mod_time;
        *self = NotificationRecord {
            max_time,
            prev_mod_time,
            ..NotificationRecord::default()
        };
    }

    /// Overwrite this record in place with a freshly decoded one.
    ///
    /// Announcement fields are replaced wholesale. The watermark keeps the
    /// maximum of both records, and `prev_mod_time` is left to the caller.
    pub fn absorb(&mut self, decoded: NotificationRecord) {
        let max_time = self.max_time.max(decoded.max_time).max(decoded.latest_time);
        let prev_mod_time = self.prev_mod_time;
        *self = decoded;
        self.max_time = max_time;
        self.prev_mod_time = prev_mod_time;
    }

    /// Resolve the legacy field aliases. See [`resolve_aliases`].
    pub fn resolved(&self) -> ResolvedFields<'_> {
        resolve_aliases(self)
    }
}

/// String fields after applying the legacy alias rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedFields<'a> {
    /// `writer`, else `user_info1`
    pub writer: Option<&'a str>,
    /// `user_info1`, else `writer`
    pub user_info1: Option<&'a str>,
    /// `user_info2`, else `rel_data_path`
    pub user_info2: Option<&'a str>,
    /// `rel_data_path`, else `user_info2`
    pub rel_data_path: Option<&'a str>,
}

/// Apply the alias rules between the legacy and current field sets.
///
/// - `writer` falls back to `user_info1`, and vice versa
/// - `rel_data_path` falls back to `user_info2`, and vice versa
///
/// A field that is present is always returned as stored.
pub fn resolve_aliases(record: &NotificationRecord) -> ResolvedFields<'_> {
    let writer = record.writer();
    let info1 = record.user_info1();
    let info2 = record.user_info2();
    let rel = record.rel_data_path();
    ResolvedFields {
        writer: writer.or(info1),
        user_info1: info1.or(writer),
        user_info2: info2.or(rel),
        rel_data_path: rel.or(info2),
    }
}

impl fmt::Display for NotificationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use sentinel::{field_or, NONE, UNKNOWN};
        let resolved = self.resolved();
        writeln!(f, "--------- NotificationRecord ---------")?;
        writeln!(f, "LatestTime  : {}", self.latest_calendar())?;
        writeln!(f, "RelDataPath : {}", field_or(resolved.rel_data_path, UNKNOWN))?;
        writeln!(f, "DataFileExt : {}", field_or(self.data_file_ext(), NONE))?;
        writeln!(f, "DataType    : {}", field_or(self.data_type(), UNKNOWN))?;
        writeln!(f, "Writer      : {}", field_or(resolved.writer, UNKNOWN))?;
        writeln!(f, "UserInfo1   : {}", field_or(resolved.user_info1, NONE))?;
        writeln!(f, "UserInfo2   : {}", field_or(resolved.user_info2, NONE))?;
        writeln!(f, "IsFcast     : {}", self.is_forecast())?;
        writeln!(f, "LeadTime    : {}", self.forecast_lead_secs())?;
        if let Some(displaced) = self.displaced_dir_path() {
            writeln!(f, "DisplacedDirPath : {}", displaced)?;
        }
        write!(f, "--------------------------------------")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_empty() {
        let r = NotificationRecord::new();
        assert_eq!(r.latest_time(), 0);
        assert_eq!(r.max_time(), 0);
        assert_eq!(r.rel_data_path(), None);
        assert_eq!(r.data_type(), None);
        assert!(!r.is_forecast());
    }

    #[test]
    fn test_watermark_never_decreases() {
        let mut r = NotificationRecord::new();
        for (t, expected_max) in [(100, 100), (50, 100), (200, 200), (80, 200)] {
            r.set_latest_time(t);
            assert_eq!(r.latest_time(), t);
            assert_eq!(r.max_time(), expected_max);
            assert!(r.latest_time() <= r.max_time());
        }
    }

    #[test]
    fn test_raise_max_time_ignores_lower() {
        let mut r = NotificationRecord::new().with_latest_time(500);
        r.raise_max_time(100);
        assert_eq!(r.max_time(), 500);
        r.raise_max_time(900);
        assert_eq!(r.max_time(), 900);
    }

    #[test]
    fn test_latest_valid_time() {
        let obs = NotificationRecord::new().with_latest_time(1000);
        assert_eq!(obs.latest_valid_time(), 1000);

        let fcast = NotificationRecord::new()
            .with_latest_time(1000)
            .with_forecast(3600);
        assert_eq!(fcast.latest_valid_time(), 4600);
        assert_eq!(fcast.forecast_lead_secs(), 3600);
    }

    #[test]
    fn test_latest_valid_time_saturates() {
        let late = NotificationRecord::new()
            .with_latest_time(i64::MAX)
            .with_forecast(60);
        assert_eq!(late.latest_valid_time(), i64::MAX);

        let early = NotificationRecord::new()
            .with_latest_time(i64::MIN)
            .with_forecast(-60);
        assert_eq!(early.latest_valid_time(), i64::MIN);
    }

    #[test]
    fn test_clear_forecast_zeroes_lead() {
        let mut r = NotificationRecord::new().with_forecast(60);
        r.clear_forecast();
        assert!(!r.is_forecast());
        assert_eq!(r.forecast_lead_secs(), 0);
    }

    #[test]
    fn test_resolve_aliases_fallbacks() {
        let legacy = NotificationRecord::new()
            .with_user_info1("ingest")
            .with_user_info2("20200101/000000.dat");
        let resolved = legacy.resolved();
        assert_eq!(resolved.writer, Some("ingest"));
        assert_eq!(resolved.rel_data_path, Some("20200101/000000.dat"));

        let modern = NotificationRecord::new()
            .with_writer("ingest")
            .with_rel_data_path("a/b.nc");
        let resolved = modern.resolved();
        assert_eq!(resolved.user_info1, Some("ingest"));
        assert_eq!(resolved.user_info2, Some("a/b.nc"));
    }

    #[test]
    fn test_resolve_aliases_keeps_explicit_values() {
        let r = NotificationRecord::new()
            .with_writer("w")
            .with_user_info1("u1")
            .with_rel_data_path("p")
            .with_user_info2("u2");
        let resolved = resolve_aliases(&r);
        assert_eq!(resolved.writer, Some("w"));
        assert_eq!(resolved.user_info1, Some("u1"));
        assert_eq!(resolved.rel_data_path, Some("p"));
        assert_eq!(resolved.user_info2, Some("u2"));
    }

    #[test]
    fn test_absorb_keeps_watermark_and_mod_time() {
        let mut reader_side = NotificationRecord::new().with_latest_time(500);
        reader_side.set_prev_mod_time(42);

        let decoded = NotificationRecord::new()
            .with_latest_time(300)
            .with_writer("ingest");
        reader_side.absorb(decoded);

        assert_eq!(reader_side.latest_time(), 300);
        assert_eq!(reader_side.max_time(), 500);
        assert_eq!(reader_side.prev_mod_time(), 42);
        assert_eq!(reader_side.writer(), Some("ingest"));
    }

    #[test]
    fn test_clear_info() {
        let mut r = NotificationRecord::new()
            .with_latest_time(10)
            .with_writer("x")
            .with_forecast(5);
        r.clear_info();
        assert_eq!(r.latest_time(), 0);
        assert_eq!(r.max_time(), 10);
        assert_eq!(r.writer(), None);
        assert!(!r.is_forecast());
    }

    #[test]
    fn test_empty_displaced_dir_is_absent() {
        let r = NotificationRecord::new().with_displaced_dir_path("");
        assert_eq!(r.displaced_dir_path(), None);
    }

    #[test]
    fn test_sentinel_mapping() {
        assert_eq!(sentinel::from_field("unknown", sentinel::UNKNOWN), None);
        assert_eq!(
            sentinel::from_field("mdv", sentinel::UNKNOWN),
            Some("mdv".to_string())
        );
        assert_eq!(sentinel::field_or(None, sentinel::NONE), "none");
    }

    #[test]
    fn test_display_contains_fields() {
        let r = NotificationRecord::new()
            .with_latest_time(1577836800)
            .with_rel_data_path("20200101/000000.dat");
        let text = r.to_string();
        assert!(text.contains("2020-01-01T00:00:00"));
        assert!(text.contains("RelDataPath : 20200101/000000.dat"));
        assert!(text.contains("DataType    : unknown"));
    }

    #[test]
    fn test_serde_json_roundtrip() {
        let r = NotificationRecord::new()
            .with_latest_time(1577836800)
            .with_writer("ingest");
        let json = serde_json::to_string(&r).unwrap();
        let back: NotificationRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}
