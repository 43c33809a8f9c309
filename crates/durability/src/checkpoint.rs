//! Consumer checkpoint
//!
//! A reader that must not lose queue messages across restarts records the
//! id of the last message it processed. The checkpoint is itself a
//! notification record, published tagged-only into a private state
//! directory under the base name
//! `latest_read_info.<label>.<data dir with separators replaced by '_'>`.
//! The id travels in `user_info1` as `FMQ_id:<id>`.

use crate::config::LdataConfig;
use crate::error::PublishError;
use crate::paths::LdataPaths;
use crate::reader::{MaxAge, NotificationReader, ReadOutcome};
use crate::writer::NotificationWriter;
use ldata_core::NotificationRecord;
use std::path::Path;
use tracing::{debug, warn};

/// Prefix of the message id in the checkpoint's `user_info1`.
pub const ID_PREFIX: &str = "FMQ_id:";

/// Saved position of one consumer in one data directory's queue.
#[derive(Debug)]
pub struct ReadCheckpoint {
    writer: NotificationWriter,
}

impl ReadCheckpoint {
    /// Checkpoint kept in the system temp directory.
    pub fn new(label: &str, data_dir: impl AsRef<Path>) -> Self {
        Self::with_state_dir(label, data_dir, std::env::temp_dir())
    }

    /// Checkpoint kept in `state_dir`.
    pub fn with_state_dir(
        label: &str,
        data_dir: impl AsRef<Path>,
        state_dir: impl AsRef<Path>,
    ) -> Self {
        let paths = LdataPaths::from_dir(state_dir)
            .with_file_name(Self::file_name(label, data_dir.as_ref()));
        ReadCheckpoint {
            writer: NotificationWriter::with_paths(paths, Self::tagged_only()),
        }
    }

    /// Do not write the checkpoint, as for a reader whose writes are disabled.
    pub fn with_no_write(mut self, no_write: bool) -> Self {
        let config = self.writer.config().clone().with_no_write(no_write);
        let paths = self.writer.paths().clone();
        self.writer = NotificationWriter::with_paths(paths, config);
        self
    }

    /// Base file name for `label` and `data_dir`.
    pub fn file_name(label: &str, data_dir: &Path) -> String {
        let dir = data_dir.to_string_lossy().replace(['/', '\\'], "_");
        format!("latest_read_info.{}.{}", label, dir)
    }

    /// Layout of the checkpoint files.
    pub fn paths(&self) -> &LdataPaths {
        self.writer.paths()
    }

    /// Record that message `id` carrying `record` has been processed.
    pub fn save(&mut self, record: &NotificationRecord, id: u64) -> Result<(), PublishError> {
        let mut state = NotificationRecord::new()
            .with_latest_time(record.latest_valid_time())
            .with_user_info1(format!("{}{}", ID_PREFIX, id));
        if let Some(rel) = record.rel_data_path() {
            state.set_rel_data_path(rel);
        }
        self.writer.publish(&state)?;
        debug!(target: "ldata::checkpoint", id, "Saved checkpoint");
        Ok(())
    }

    /// Last saved message id, if a checkpoint younger than `max_age` exists.
    pub fn restore(&self, max_age: impl Into<MaxAge>) -> Option<u64> {
        let mut reader =
            NotificationReader::with_paths(self.paths().clone(), Self::tagged_only());
        match reader.read_forced(max_age) {
            Ok(ReadOutcome::NewData) => {}
            Ok(ReadOutcome::NoNewData) => {
                debug!(target: "ldata::checkpoint", "No usable checkpoint");
                return None;
            }
            Err(e) => {
                warn!(target: "ldata::checkpoint", error = %e, "Checkpoint unreadable");
                return None;
            }
        }

        let info = reader.record().user_info1().unwrap_or_default();
        match parse_id(info) {
            Some(id) => Some(id),
            None => {
                warn!(target: "ldata::checkpoint", info, "Checkpoint has no message id");
                None
            }
        }
    }

    fn tagged_only() -> LdataConfig {
        LdataConfig::new().with_queue(false).with_legacy(false)
    }
}

fn parse_id(info: &str) -> Option<u64> {
    info.strip_prefix(ID_PREFIX)?.trim().parse().ok()
}
