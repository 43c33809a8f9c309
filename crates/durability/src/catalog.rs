//! Day catalog
//!
//! When the trigger file `_ldata_write_catalog` exists in the data
//! directory, each publish appends one line to
//! `<dir>/YYYYMMDD/ldata_file_catalog`, the day taken from the record's
//! latest time. The catalog is an audit trail only; nothing reads it back.

use crate::codec::TaggedTextCodec;
use crate::error::LdataError;
use crate::paths::LdataPaths;
use ldata_core::NotificationRecord;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

/// Whether the catalog trigger is present.
pub fn catalog_enabled(paths: &LdataPaths) -> bool {
    paths.catalog_trigger().exists()
}

/// Append the record's catalog line if the trigger is present.
///
/// Returns the catalog path when a line was written.
pub fn append_catalog_line(
    paths: &LdataPaths,
    record: &NotificationRecord,
) -> Result<Option<PathBuf>, LdataError> {
    if !catalog_enabled(paths) {
        return Ok(None);
    }

    let catalog = paths.catalog_for(&record.latest_calendar());
    if let Some(day_dir) = catalog.parent() {
        fs::create_dir_all(day_dir).map_err(|e| LdataError::io(day_dir, e))?;
    }

    let mut line = TaggedTextCodec::catalog_line(record);
    line.push('\n');
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&catalog)
        .map_err(|e| LdataError::io(&catalog, e))?;
    file.write_all(line.as_bytes())
        .map_err(|e| LdataError::io(&catalog, e))?;

    debug!(target: "ldata::catalog", path = %catalog.display(), "Appended catalog line");
    Ok(Some(catalog))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record() -> NotificationRecord {
        NotificationRecord::new()
            .with_latest_time(1577836800)
            .with_rel_data_path("20200101/000000.nc")
    }

    #[test]
    fn test_no_trigger_no_catalog() {
        let dir = tempdir().unwrap();
        let paths = LdataPaths::from_dir(dir.path());
        assert_eq!(append_catalog_line(&paths, &record()).unwrap(), None);
        assert!(!dir.path().join("20200101").exists());
    }

    #[test]
    fn test_appends_one_line_per_call() {
        let dir = tempdir().unwrap();
        let paths = LdataPaths::from_dir(dir.path());
        fs::write(paths.catalog_trigger(), b"").unwrap();

        let path = append_catalog_line(&paths, &record()).unwrap().unwrap();
        append_catalog_line(&paths, &record()).unwrap();

        assert_eq!(path, dir.path().join("20200101/ldata_file_catalog"));
        let text = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("<utime>1577836800</utime>"));
        assert!(lines[0].contains("<rpath>20200101/000000.nc</rpath>"));
    }
}
