//! Data file naming conventions.
//!
//! Data sets are laid out by time under a data directory:
//!
//! ```text
//! <dir>/YYYYMMDD/HHMMSS.<ext>                       observations
//! <dir>/YYYYMMDD/g_HHMMSS/f_LLLLLLLL.<ext>          forecasts (gen time, lead secs)
//! <dir>/.../<prefix>YYYYMMDD_HHMMSS<suffix>.<ext>   time in the file name
//! ```
//!
//! This module derives times from such paths and resolves the absolute data
//! path a record points at.

use crate::error::{Error, Result};
use crate::record::NotificationRecord;
use crate::time::CalendarTime;
use std::path::{Component, Path, PathBuf};

/// Data types recognised from directory names, in priority order.
const DATA_TYPE_DIRS: [&str; 11] = [
    "grib",
    "mdv",
    "md",
    "nc",
    "raw",
    "sim",
    "simulate",
    "spdb",
    "titan",
    "www",
    "www_content",
];

/// Time information carried by a data file path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataTime {
    /// Valid time for observations, generate time for forecasts
    pub unix: i64,
    /// Forecast lead time if the path follows the forecast layout
    pub lead_secs: Option<i32>,
}

/// Parse the time out of a data file path (relative or absolute).
pub fn data_time_from_path(path: &str) -> Result<DataTime> {
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    let stem = parts.last().map(|name| file_stem(name)).unwrap_or("");

    // forecast layout: YYYYMMDD/g_HHMMSS/f_LLLLLLLL.ext
    if parts.len() >= 3 {
        let day = parts[parts.len() - 3];
        let gen = parts[parts.len() - 2];
        if let (Some(date), Some(hms), Some(lead)) = (
            parse_date(day),
            gen.strip_prefix("g_").and_then(parse_hms),
            stem.strip_prefix("f_").and_then(|s| s.parse::<i32>().ok()),
        ) {
            return Ok(DataTime {
                unix: to_unix(date, hms)?,
                lead_secs: Some(lead),
            });
        }
    }

    // observation layout: YYYYMMDD/HHMMSS.ext
    if parts.len() >= 2 {
        if let (Some(date), Some(hms)) = (parse_date(parts[parts.len() - 2]), parse_hms(stem)) {
            return Ok(DataTime {
                unix: to_unix(date, hms)?,
                lead_secs: None,
            });
        }
    }

    // time embedded in the file name
    if let Some((date, hms)) = find_embedded_time(stem) {
        return Ok(DataTime {
            unix: to_unix(date, hms)?,
            lead_secs: None,
        });
    }

    Err(Error::NoTimeInPath(path.to_string()))
}

/// Path of `file_path` relative to `dir`, with `/` separators.
///
/// Returns `file_path` unchanged when it does not live under `dir`.
pub fn relative_path(dir: &Path, file_path: &Path) -> String {
    let rel = file_path.strip_prefix(dir).unwrap_or(file_path);
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

impl NotificationRecord {
    /// Set relative path, extension and latest time from a data file path.
    ///
    /// `dir` is the top-level directory of the data set. Forecast paths
    /// also set the forecast lead time.
    pub fn set_path_and_time(&mut self, dir: &Path, file_path: &Path) -> Result<()> {
        let rel = relative_path(dir, file_path);
        self.set_rel_data_path(rel.clone());
        if let Some(ext) = file_path.extension() {
            self.set_data_file_ext(ext.to_string_lossy());
        }
        let data_time = data_time_from_path(&rel)?;
        self.set_latest_time(data_time.unix);
        if let Some(lead) = data_time.lead_secs {
            self.set_forecast(lead);
        }
        Ok(())
    }
}

/// Resolve the absolute path of the data file a record announces.
///
/// `displaced_dir_path` in the record overrides `data_dir`. Candidates are
/// tried in order and the first existing regular file wins:
///
/// 1. `rel_data_path`
/// 2. `YYYYMMDD/HHMMSS.ext` from the latest time
/// 3. `user_info2`
/// 4. `user_info1.ext`
/// 5. `user_info1`
/// 6. `user_info2.ext`
/// 7. forecast layout `YYYYMMDD/g_HHMMSS/f_LLLLLLLL.ext`
pub fn resolve_data_path(data_dir: &Path, record: &NotificationRecord) -> Option<PathBuf> {
    let dir = match record.displaced_dir_path() {
        Some(displaced) => PathBuf::from(displaced),
        None => data_dir.to_path_buf(),
    };
    let ext = record.data_file_ext().unwrap_or("");
    let with_ext = |name: &str| format!("{}.{}", name, ext);
    let cal = record.latest_calendar();
    let day = cal.day_dir_name();
    let stem = cal.time_file_stem();

    let mut candidates: Vec<String> = Vec::new();
    if let Some(rel) = record.rel_data_path() {
        candidates.push(rel.to_string());
    }
    candidates.push(format!("{}/{}", day, with_ext(&stem)));
    if let Some(info2) = record.user_info2() {
        candidates.push(info2.to_string());
    }
    if let Some(info1) = record.user_info1() {
        candidates.push(with_ext(info1));
        candidates.push(info1.to_string());
    }
    if let Some(info2) = record.user_info2() {
        candidates.push(with_ext(info2));
    }
    if record.is_forecast() {
        candidates.push(format!(
            "{}/g_{}/{}",
            day,
            stem,
            with_ext(&format!("f_{:08}", record.forecast_lead_secs()))
        ));
    }

    candidates
        .into_iter()
        .map(|c| dir.join(c))
        .find(|p| p.is_file())
}

/// Guess the data type from the components of a data directory path.
pub fn guess_data_type(data_dir: &Path) -> Option<&'static str> {
    let names: Vec<String> = data_dir
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    DATA_TYPE_DIRS
        .iter()
        .copied()
        .find(|ty| names.iter().any(|n| n == ty))
}

fn file_stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    }
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn parse_date(s: &str) -> Option<(i32, u32, u32)> {
    if s.len() != 8 || !all_digits(s) {
        return None;
    }
    Some((
        s[0..4].parse().ok()?,
        s[4..6].parse().ok()?,
        s[6..8].parse().ok()?,
    ))
}

/// Parse a leading `HHMMSS` (the rest of the string is ignored).
fn parse_hms(s: &str) -> Option<(u32, u32, u32)> {
    if !s.get(..6).is_some_and(all_digits) {
        return None;
    }
    let (h, m, sec) = (
        s[0..2].parse().ok()?,
        s[2..4].parse().ok()?,
        s[4..6].parse().ok()?,
    );
    if h > 23 || m > 59 || sec > 59 {
        return None;
    }
    Some((h, m, sec))
}

/// Find `YYYYMMDD[_-T.]?HHMMSS` anywhere in a file stem.
fn find_embedded_time(stem: &str) -> Option<((i32, u32, u32), (u32, u32, u32))> {
    if !stem.is_ascii() {
        return None;
    }
    let len = stem.len();
    for start in 0..len.saturating_sub(13) {
        let Some(date) = stem.get(start..start + 8).and_then(parse_date) else {
            continue;
        };
        for skip in [0usize, 1] {
            let hms_start = start + 8 + skip;
            if skip == 1 {
                let sep = stem.as_bytes().get(start + 8).copied();
                if !matches!(sep, Some(b'_') | Some(b'-') | Some(b'T') | Some(b'.')) {
                    continue;
                }
            }
            if let Some(hms) = stem.get(hms_start..hms_start + 6).and_then(parse_hms) {
                return Some((date, hms));
            }
        }
    }
    None
}

fn to_unix(date: (i32, u32, u32), hms: (u32, u32, u32)) -> Result<i64> {
    CalendarTime {
        year: date.0,
        month: date.1,
        day: date.2,
        hour: hms.0,
        min: hms.1,
        sec: hms.2,
    }
    .to_unix()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    #[test]
    fn test_time_from_observation_layout() {
        let t = data_time_from_path("20200101/000000.dat").unwrap();
        assert_eq!(t.unix, 1577836800);
        assert_eq!(t.lead_secs, None);
    }

    #[test]
    fn test_time_from_forecast_layout() {
        let t = data_time_from_path("mdv/model/20200101/g_120000/f_00003600.mdv").unwrap();
        assert_eq!(t.unix, 1577836800 + 12 * 3600);
        assert_eq!(t.lead_secs, Some(3600));
    }

    #[test]
    fn test_time_embedded_in_name() {
        let t = data_time_from_path("radar/KFTG_20200101_000130.nc").unwrap();
        assert_eq!(t.unix, 1577836800 + 90);

        let t = data_time_from_path("cfrad.20200101000130.nc").unwrap();
        assert_eq!(t.unix, 1577836800 + 90);
    }

    #[test]
    fn test_no_time_in_path() {
        assert!(matches!(
            data_time_from_path("some/file.nc"),
            Err(Error::NoTimeInPath(_))
        ));
    }

    #[test]
    fn test_relative_path() {
        let rel = relative_path(
            Path::new("/data/mdv/radar"),
            Path::new("/data/mdv/radar/20200101/000000.mdv"),
        );
        assert_eq!(rel, "20200101/000000.mdv");
    }

    #[test]
    fn test_set_path_and_time() {
        let mut r = NotificationRecord::new();
        r.set_path_and_time(
            Path::new("/data/radar"),
            Path::new("/data/radar/20200101/000000.dat"),
        )
        .unwrap();
        assert_eq!(r.rel_data_path(), Some("20200101/000000.dat"));
        assert_eq!(r.data_file_ext(), Some("dat"));
        assert_eq!(r.latest_time(), 1577836800);
        assert!(!r.is_forecast());
    }

    #[test]
    fn test_resolve_prefers_rel_path() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("20200101")).unwrap();
        std::fs::write(dir.path().join("20200101/000000.dat"), b"x").unwrap();

        let r = NotificationRecord::new()
            .with_latest_time(1577836800)
            .with_rel_data_path("20200101/000000.dat");
        assert_eq!(
            resolve_data_path(dir.path(), &r),
            Some(dir.path().join("20200101/000000.dat"))
        );
    }

    #[test]
    fn test_resolve_falls_back_to_time_path() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("20200101")).unwrap();
        std::fs::write(dir.path().join("20200101/000000.mdv"), b"x").unwrap();

        let r = NotificationRecord::new()
            .with_latest_time(1577836800)
            .with_data_file_ext("mdv");
        assert_eq!(
            resolve_data_path(dir.path(), &r),
            Some(dir.path().join("20200101/000000.mdv"))
        );
    }

    #[test]
    fn test_resolve_uses_displaced_dir() {
        let data = tempdir().unwrap();
        let displaced = tempdir().unwrap();
        std::fs::write(displaced.path().join("file.nc"), b"x").unwrap();

        let r = NotificationRecord::new()
            .with_rel_data_path("file.nc")
            .with_displaced_dir_path(displaced.path().to_string_lossy());
        assert_eq!(
            resolve_data_path(data.path(), &r),
            Some(displaced.path().join("file.nc"))
        );
    }

    #[test]
    fn test_resolve_nothing_found() {
        let dir = tempdir().unwrap();
        let r = NotificationRecord::new().with_rel_data_path("missing.nc");
        assert_eq!(resolve_data_path(dir.path(), &r), None);
    }

    #[test]
    fn test_guess_data_type() {
        assert_eq!(guess_data_type(Path::new("/data/mdv/radar")), Some("mdv"));
        assert_eq!(guess_data_type(Path::new("spdb/tracks")), Some("spdb"));
        assert_eq!(guess_data_type(Path::new("/tmp/mdvx")), None);
    }

    #[test]
    fn test_non_ascii_stem_has_no_time() {
        assert!(data_time_from_path("20200101/ééé.nc").is_err());
        assert!(data_time_from_path("20200101/g_ééé/f_00000060.nc").is_err());
    }

    proptest! {
        #[test]
        fn prop_observation_path_time(unix in 0i64..4_102_444_800, ext in "[a-z]{1,4}") {
            let cal = CalendarTime::from_unix(unix);
            let path = format!("{}/{}.{}", cal.day_dir_name(), cal.time_file_stem(), ext);
            let parsed = data_time_from_path(&path).unwrap();
            prop_assert_eq!(parsed.unix, unix);
            prop_assert_eq!(parsed.lead_secs, None);
        }

        #[test]
        fn prop_forecast_path_time(unix in 0i64..4_102_444_800, lead in 0i32..10_000_000) {
            let cal = CalendarTime::from_unix(unix);
            let path = format!(
                "/data/{}/g_{}/f_{:08}.nc",
                cal.day_dir_name(),
                cal.time_file_stem(),
                lead
            );
            let parsed = data_time_from_path(&path).unwrap();
            prop_assert_eq!(parsed.unix, unix);
            prop_assert_eq!(parsed.lead_secs, Some(lead));
        }
    }
}
