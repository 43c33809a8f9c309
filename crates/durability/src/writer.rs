//! Publishing notifications
//!
//! A publish creates the data directory, appends the optional catalog line,
//! takes the directory lock and then writes every enabled encoding:
//!
//! - text encodings: temp file, fsync, remove target, rename onto target
//! - queue: one append to `_F.stat` / `_F.buf`
//!
//! A failing encoding does not stop the others. The writer keeps its own
//! watermark and stamps it into every published record as `max_time`.

use crate::catalog;
use crate::codec::{get_codec, Encoding, QueueCodec, RecordCodec};
use crate::config::LdataConfig;
use crate::error::{LdataError, PublishError};
use crate::lock::LockGuard;
use crate::paths::LdataPaths;
use crate::queue::{DurableQueue, FileQueue};
use ldata_core::NotificationRecord;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Publishes notification records for one data directory.
#[derive(Debug)]
pub struct NotificationWriter {
    paths: LdataPaths,
    config: LdataConfig,
    /// Largest latest time this writer has published
    max_time: i64,
    queue: Option<FileQueue>,
}

impl NotificationWriter {
    /// Writer for `dir` with the default file name.
    pub fn new(dir: impl AsRef<Path>, config: LdataConfig) -> Self {
        Self::with_paths(LdataPaths::from_dir(dir), config)
    }

    /// Writer for an explicit file layout.
    pub fn with_paths(paths: LdataPaths, config: LdataConfig) -> Self {
        NotificationWriter {
            paths,
            config,
            max_time: 0,
            queue: None,
        }
    }

    /// File layout this writer publishes to.
    pub fn paths(&self) -> &LdataPaths {
        &self.paths
    }

    /// Active configuration.
    pub fn config(&self) -> &LdataConfig {
        &self.config
    }

    /// Writer-side watermark.
    pub fn max_time(&self) -> i64 {
        self.max_time
    }

    /// Publish `record` in every enabled encoding.
    pub fn publish(&mut self, record: &NotificationRecord) -> Result<(), PublishError> {
        if self.config.no_write {
            debug!(target: "ldata::writer", dir = %self.paths.dir().display(), "Writes disabled, skipping publish");
            return Ok(());
        }
        let record = self.stamp(record);

        let dir = self.paths.dir();
        fs::create_dir_all(dir).map_err(|e| PublishError::Fatal(LdataError::io(dir, e)))?;

        if let Err(e) = catalog::append_catalog_line(&self.paths, &record) {
            warn!(target: "ldata::writer", error = %e, "Catalog append failed");
        }

        let _guard = LockGuard::acquire(&self.paths.lock()).map_err(PublishError::Fatal)?;

        let mut failures = Vec::new();
        for encoding in Encoding::WRITE_ORDER {
            if !self.config.is_enabled(encoding) {
                continue;
            }
            let result = match encoding {
                Encoding::Queue => self.append_queue(&record).map(|_| ()),
                Encoding::Tagged | Encoding::Legacy => self.write_text(encoding, &record),
            };
            if let Err(e) = result {
                warn!(target: "ldata::writer", %encoding, error = %e, "Encoding write failed");
                failures.push((encoding, e));
            }
        }

        info!(
            target: "ldata::writer",
            dir = %self.paths.dir().display(),
            latest_time = record.latest_time(),
            rel_data_path = record.rel_data_path().unwrap_or(""),
            failed = failures.len(),
            "Published"
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PublishError::Partial(failures))
        }
    }

    /// Append `record` to the durable queue only: no lock, no text files.
    ///
    /// Returns the queue message id, or `None` when writes or the queue are
    /// disabled.
    pub fn publish_queue_only(
        &mut self,
        record: &NotificationRecord,
    ) -> Result<Option<u64>, PublishError> {
        if self.config.no_write || !self.config.use_queue {
            debug!(target: "ldata::writer", "Queue writes disabled, skipping publish");
            return Ok(None);
        }
        let record = self.stamp(record);
        let dir = self.paths.dir();
        fs::create_dir_all(dir).map_err(|e| PublishError::Fatal(LdataError::io(dir, e)))?;
        self.append_queue(&record)
            .map(Some)
            .map_err(PublishError::Fatal)
    }

    /// Advance the watermark and copy it into the record.
    fn stamp(&mut self, record: &NotificationRecord) -> NotificationRecord {
        self.max_time = self
            .max_time
            .max(record.latest_time())
            .max(record.max_time());
        let mut stamped = record.clone();
        stamped.raise_max_time(self.max_time);
        stamped
    }

    fn write_text(
        &self,
        encoding: Encoding,
        record: &NotificationRecord,
    ) -> Result<(), LdataError> {
        let bytes = get_codec(encoding, self.config.use_legacy).encode(record);
        let target = self.paths.encoding_file(encoding);
        write_atomic(&self.paths.tmp(), &target, &bytes)
    }

    fn append_queue(&mut self, record: &NotificationRecord) -> Result<u64, LdataError> {
        let payload = QueueCodec::new(self.config.use_legacy).encode(record);
        let mut queue = match self.queue.take() {
            Some(queue) if queue.is_current() => queue,
            stale => {
                if stale.is_some() {
                    debug!(target: "ldata::writer", path = %self.paths.queue_stat().display(), "Queue files replaced, reopening");
                }
                FileQueue::open_rdwr(&self.paths.queue_base(), &self.config.queue_config())?
            }
        };
        // a failed append drops the handle so the next publish reopens
        let id = queue.append(&payload)?;
        self.queue = Some(queue);
        Ok(id)
    }
}

/// Replace `target` with `bytes` through `tmp`.
///
/// The target is removed before the rename so network file system clients
/// notice the change.
fn write_atomic(tmp: &Path, target: &Path, bytes: &[u8]) -> Result<(), LdataError> {
    remove_if_exists(tmp)?;

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(tmp)
        .map_err(|e| LdataError::io(tmp, e))?;
    file.write_all(bytes)
        .and_then(|_| file.sync_all())
        .map_err(|e| LdataError::io(tmp, e))?;
    drop(file);

    remove_if_exists(target)?;
    fs::rename(tmp, target).map_err(|e| LdataError::io(target, e))?;

    if let Some(parent) = target.parent() {
        // directory fsync is best effort
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<(), LdataError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(LdataError::io(PathBuf::from(path), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{LegacyTextCodec, TaggedTextCodec};
    use tempfile::tempdir;

    fn record(t: i64) -> NotificationRecord {
        NotificationRecord::new()
            .with_latest_time(t)
            .with_rel_data_path("20200101/000000.nc")
            .with_data_file_ext("nc")
            .with_writer("test")
    }

    #[test]
    fn test_publish_writes_every_encoding() {
        let dir = tempdir().unwrap();
        let mut writer = NotificationWriter::new(dir.path(), LdataConfig::for_testing());
        writer.publish(&record(1577836800)).unwrap();

        let paths = writer.paths().clone();
        assert!(paths.legacy().is_file());
        assert!(paths.tagged().is_file());
        assert!(paths.queue_stat().is_file());
        assert!(paths.queue_buf().is_file());
        assert!(paths.lock().is_file());
        assert!(!paths.tmp().exists());

        let tagged = TaggedTextCodec
            .decode(&fs::read(paths.tagged()).unwrap())
            .unwrap();
        assert_eq!(tagged.latest_time(), 1577836800);
        assert_eq!(tagged.writer(), Some("test"));

        let legacy = LegacyTextCodec
            .decode(&fs::read(paths.legacy()).unwrap())
            .unwrap();
        assert_eq!(legacy.user_info1(), Some("test"));
    }

    #[test]
    fn test_publish_creates_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        let mut writer = NotificationWriter::new(&nested, LdataConfig::for_testing());
        writer.publish(&record(100)).unwrap();
        assert!(nested.join("_latest_data_info.xml").is_file());
    }

    #[test]
    fn test_disabled_encodings_not_written() {
        let dir = tempdir().unwrap();
        let config = LdataConfig::for_testing()
            .with_queue(false)
            .with_legacy(false);
        let mut writer = NotificationWriter::new(dir.path(), config);
        writer.publish(&record(100)).unwrap();
        let paths = writer.paths();
        assert!(paths.tagged().is_file());
        assert!(!paths.legacy().exists());
        assert!(!paths.queue_stat().exists());
    }

    #[test]
    fn test_no_write_touches_nothing() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("never");
        let mut writer =
            NotificationWriter::new(&target, LdataConfig::for_testing().with_no_write(true));
        writer.publish(&record(100)).unwrap();
        assert_eq!(writer.publish_queue_only(&record(100)).unwrap(), None);
        assert!(!target.exists());
    }

    #[test]
    fn test_watermark_stamped() {
        let dir = tempdir().unwrap();
        let config = LdataConfig::for_testing().with_queue(false);
        let mut writer = NotificationWriter::new(dir.path(), config);
        let tagged_path = writer.paths().tagged();

        for (t, expected_max) in [(100, 100), (50, 100), (200, 200), (80, 200)] {
            writer.publish(&record(t)).unwrap();
            assert_eq!(writer.max_time(), expected_max);
            let on_disk = TaggedTextCodec
                .decode(&fs::read(&tagged_path).unwrap())
                .unwrap();
            assert_eq!(on_disk.latest_time(), t);
            assert_eq!(on_disk.max_time(), expected_max);
        }
    }

    #[test]
    fn test_publish_queue_only() {
        let dir = tempdir().unwrap();
        let mut writer = NotificationWriter::new(dir.path(), LdataConfig::for_testing());
        assert_eq!(writer.publish_queue_only(&record(1)).unwrap(), Some(1));
        assert_eq!(writer.publish_queue_only(&record(2)).unwrap(), Some(2));
        let paths = writer.paths();
        assert!(paths.queue_stat().is_file());
        assert!(!paths.tagged().exists());
        assert!(!paths.lock().exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_reopens_queue_after_files_replaced() {
        let dir = tempdir().unwrap();
        let mut first = NotificationWriter::new(dir.path(), LdataConfig::for_testing());
        first.publish_queue_only(&record(1)).unwrap();

        let paths = first.paths().clone();
        fs::remove_file(paths.queue_stat()).unwrap();
        fs::remove_file(paths.queue_buf()).unwrap();

        let mut second = NotificationWriter::new(dir.path(), LdataConfig::for_testing());
        assert_eq!(second.publish_queue_only(&record(2)).unwrap(), Some(1));
        assert_eq!(first.publish_queue_only(&record(3)).unwrap(), Some(2));

        let mut queue = FileQueue::open_rdonly(&paths.queue_base()).unwrap();
        queue.seek_to_start().unwrap();
        let codec = QueueCodec::default();
        let mut seen = Vec::new();
        while let Some(msg) = queue.read_next().unwrap() {
            seen.push(codec.decode(&msg.payload).unwrap().latest_time());
        }
        assert_eq!(seen, vec![2, 3]);
    }

    #[test]
    fn test_partial_failure_reported() {
        let dir = tempdir().unwrap();
        let config = LdataConfig::for_testing().with_queue(false);
        let mut writer = NotificationWriter::new(dir.path(), config);
        // a directory squatting on the legacy path makes its rename fail
        fs::create_dir_all(writer.paths().legacy().join("blocker")).unwrap();

        let err = writer.publish(&record(100)).unwrap_err();
        assert_eq!(err.failed_encodings(), vec![Encoding::Legacy]);
        assert!(writer.paths().tagged().is_file());
    }

    #[test]
    fn test_write_atomic_replaces_target() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("target");
        let tmp = dir.path().join("target.tmp");
        fs::write(&target, b"old").unwrap();
        write_atomic(&tmp, &target, b"new").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"new");
        assert!(!tmp.exists());
    }
}
