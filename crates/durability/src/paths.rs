//! Notification file layout
//!
//! Every file lives directly in the watched data directory, named after a
//! base name `F` (default `latest_data_info`):
//!
//! ```text
//! <dir>/
//! ├── _F                        # fixed-line text encoding
//! ├── _F.xml                    # tagged markup encoding
//! ├── _F.lock                   # writer lock
//! ├── _F.stat                   # durable queue slot table
//! ├── _F.buf                    # durable queue ring buffer
//! ├── _F.tmp.<pid>              # transient, renamed onto _F / _F.xml
//! ├── _ldata_write_catalog      # trigger: presence enables the catalog
//! └── YYYYMMDD/
//!     └── ldata_file_catalog    # one line per publish for that day
//! ```

use crate::codec::Encoding;
use ldata_core::CalendarTime;
use std::path::{Path, PathBuf};

/// Default base name of the notification files.
pub const DEFAULT_FILE_NAME: &str = "latest_data_info";

/// Trigger file enabling the day catalog.
pub const CATALOG_TRIGGER: &str = "_ldata_write_catalog";

/// Name of the per-day catalog file.
pub const CATALOG_FILE: &str = "ldata_file_catalog";

/// Paths of the notification files for one data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdataPaths {
    dir: PathBuf,
    file_name: String,
}

impl LdataPaths {
    /// Paths for `dir` with the default base name.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        LdataPaths {
            dir: dir.as_ref().to_path_buf(),
            file_name: DEFAULT_FILE_NAME.to_string(),
        }
    }

    /// Use a different base name (builder pattern).
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    /// The data directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The base name `F`.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// `_F`: fixed-line text file.
    pub fn legacy(&self) -> PathBuf {
        self.dir.join(format!("_{}", self.file_name))
    }

    /// `_F.xml`: tagged markup file.
    pub fn tagged(&self) -> PathBuf {
        self.with_suffix(".xml")
    }

    /// `_F.lock`: writer lock file.
    pub fn lock(&self) -> PathBuf {
        self.with_suffix(".lock")
    }

    /// Base path handed to the queue, which adds `.stat` and `.buf`.
    pub fn queue_base(&self) -> PathBuf {
        self.legacy()
    }

    /// `_F.stat`: queue slot table.
    pub fn queue_stat(&self) -> PathBuf {
        self.with_suffix(".stat")
    }

    /// `_F.buf`: queue ring buffer.
    pub fn queue_buf(&self) -> PathBuf {
        self.with_suffix(".buf")
    }

    /// `_F.tmp.<pid>`: temp file for atomic replacement.
    pub fn tmp(&self) -> PathBuf {
        self.with_suffix(&format!(".tmp.{}", std::process::id()))
    }

    /// The file an encoding is read from; its mtime drives freshness.
    pub fn encoding_file(&self, encoding: Encoding) -> PathBuf {
        match encoding {
            Encoding::Queue => self.queue_stat(),
            Encoding::Tagged => self.tagged(),
            Encoding::Legacy => self.legacy(),
        }
    }

    /// Trigger file enabling the day catalog.
    pub fn catalog_trigger(&self) -> PathBuf {
        self.dir.join(CATALOG_TRIGGER)
    }

    /// Catalog file for the day of `time`.
    pub fn catalog_for(&self, time: &CalendarTime) -> PathBuf {
        self.dir.join(time.day_dir_name()).join(CATALOG_FILE)
    }

    fn with_suffix(&self, suffix: &str) -> PathBuf {
        self.dir.join(format!("_{}{}", self.file_name, suffix))
    }
}
