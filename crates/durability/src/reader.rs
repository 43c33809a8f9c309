//! Reading notifications
//!
//! A reader owns one [`NotificationRecord`] and overwrites it in place on
//! every successful read. Encodings are tried in [`Encoding::READ_ORDER`]:
//! the queue delivers every message in turn, the text files only ever show
//! the latest one.
//!
//! Freshness is judged per backing file from its modification time. A text
//! file whose modification time has not moved since the last successful
//! read is reported as [`ReadOutcome::NoNewData`] without being decoded.

use crate::checkpoint::ReadCheckpoint;
use crate::codec::{get_codec, Encoding, QueueCodec, RecordCodec};
use crate::config::LdataConfig;
use crate::error::{LdataError, ReadError};
use crate::paths::LdataPaths;
use crate::queue::{DurableQueue, FileQueue};
use ldata_core::{guess_data_type, resolve_data_path, system_time_to_unix, NotificationRecord};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Oldest acceptable age of a backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaxAge {
    /// No age limit
    #[default]
    Any,
    /// Files older than this many seconds are ignored
    Secs(u64),
}

impl MaxAge {
    /// Negative values mean no limit.
    pub fn from_secs(secs: i64) -> Self {
        if secs < 0 {
            MaxAge::Any
        } else {
            MaxAge::Secs(secs as u64)
        }
    }

    /// Whether a file `age_secs` old is young enough.
    pub fn allows(&self, age_secs: u64) -> bool {
        match self {
            MaxAge::Any => true,
            MaxAge::Secs(limit) => age_secs <= *limit,
        }
    }
}

impl From<i64> for MaxAge {
    fn from(secs: i64) -> Self {
        MaxAge::from_secs(secs)
    }
}

impl fmt::Display for MaxAge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxAge::Any => write!(f, "any"),
            MaxAge::Secs(secs) => write!(f, "{}s", secs),
        }
    }
}

/// Result of a read that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The record was replaced with a newer announcement.
    NewData,
    /// Nothing newer than what the record already holds.
    NoNewData,
}

/// Debug messages that would repeat on every poll.
#[derive(Debug, Default)]
struct Reported {
    not_exist: bool,
    too_old: bool,
    not_modified: bool,
}

#[derive(Debug, Clone, Copy)]
enum Repeat {
    NotExist,
    TooOld,
    NotModified,
}

/// Reads notifications published for one data directory.
#[derive(Debug)]
pub struct NotificationReader {
    paths: LdataPaths,
    config: LdataConfig,
    record: NotificationRecord,
    queue: Option<FileQueue>,
    /// Modification time of the file behind the last successful read
    prev_mod_stamp: Option<SystemTime>,
    last_queue_id: Option<u64>,
    checkpoint: Option<ReadCheckpoint>,
    reported: Reported,
}

impl NotificationReader {
    /// Reader for `dir` with the default file name.
    pub fn new(dir: impl AsRef<Path>, config: LdataConfig) -> Self {
        Self::with_paths(LdataPaths::from_dir(dir), config)
    }

    /// Reader for an explicit file layout.
    pub fn with_paths(paths: LdataPaths, config: LdataConfig) -> Self {
        NotificationReader {
            paths,
            config,
            record: NotificationRecord::new(),
            queue: None,
            prev_mod_stamp: None,
            last_queue_id: None,
            checkpoint: None,
            reported: Reported::default(),
        }
    }

    /// The record as of the last successful read.
    pub fn record(&self) -> &NotificationRecord {
        &self.record
    }

    /// File layout this reader watches.
    pub fn paths(&self) -> &LdataPaths {
        &self.paths
    }

    /// Active configuration.
    pub fn config(&self) -> &LdataConfig {
        &self.config
    }

    /// Id of the last queue message delivered, if the queue has delivered any.
    pub fn last_queue_message_id(&self) -> Option<u64> {
        self.last_queue_id
    }

    /// Absolute path of the announced data file, if it exists.
    pub fn data_path(&self) -> Option<PathBuf> {
        resolve_data_path(self.paths.dir(), &self.record)
    }

    /// Announced data type, else one guessed from the directory name.
    pub fn resolved_data_type(&self) -> Option<String> {
        self.record
            .data_type()
            .map(str::to_string)
            .or_else(|| guess_data_type(self.paths.dir()).map(str::to_string))
    }

    /// Read the next announcement, if there is one.
    pub fn read(&mut self, max_age: impl Into<MaxAge>) -> Result<ReadOutcome, ReadError> {
        self.read_inner(max_age.into(), false)
    }

    /// Re-read the latest announcement even if it was already delivered.
    pub fn read_forced(&mut self, max_age: impl Into<MaxAge>) -> Result<ReadOutcome, ReadError> {
        self.read_inner(max_age.into(), true)
    }

    /// Resume from a checkpoint stored under the system temp directory.
    ///
    /// See [`enable_checkpoint_in`](Self::enable_checkpoint_in).
    pub fn enable_checkpoint(
        &mut self,
        label: &str,
        max_age: impl Into<MaxAge>,
    ) -> Result<Option<u64>, LdataError> {
        let checkpoint =
            ReadCheckpoint::new(label, self.paths.dir()).with_no_write(self.config.no_write);
        self.install_checkpoint(checkpoint, max_age.into())
    }

    /// Resume from a checkpoint stored in `state_dir`.
    ///
    /// Restores the last saved queue message id and positions the queue so
    /// the next read returns the message after it. Every later queue read
    /// saves the checkpoint again. Returns the restored id.
    pub fn enable_checkpoint_in(
        &mut self,
        label: &str,
        state_dir: impl AsRef<Path>,
        max_age: impl Into<MaxAge>,
    ) -> Result<Option<u64>, LdataError> {
        let checkpoint = ReadCheckpoint::with_state_dir(label, self.paths.dir(), state_dir)
            .with_no_write(self.config.no_write);
        self.install_checkpoint(checkpoint, max_age.into())
    }

    fn install_checkpoint(
        &mut self,
        checkpoint: ReadCheckpoint,
        max_age: MaxAge,
    ) -> Result<Option<u64>, LdataError> {
        if !self.config.use_queue {
            debug!(target: "ldata::reader", "Queue disabled, checkpoint not used");
            return Ok(None);
        }
        self.config.read_from_start = false;

        let restored = checkpoint.restore(max_age);
        if let Some(id) = restored {
            if self.queue_fresh(max_age, SystemTime::now()).is_some() {
                let mut queue = self.open_queue()?;
                queue.seek_to_id(id)?;
                self.queue = Some(queue);
                info!(
                    target: "ldata::reader",
                    dir = %self.paths.dir().display(),
                    id,
                    "Resumed queue from checkpoint"
                );
            }
        }
        self.checkpoint = Some(checkpoint);
        Ok(restored)
    }

    fn read_inner(&mut self, max_age: MaxAge, forced: bool) -> Result<ReadOutcome, ReadError> {
        let now = SystemTime::now();
        let mut failures = Vec::new();

        let queue_mtime = self.queue_fresh(max_age, now);
        if queue_mtime.is_none() && self.queue.take().is_some() {
            self.trace(|| debug!(target: "ldata::reader", "Queue not usable, closed handle"));
        }

        for encoding in Encoding::READ_ORDER {
            if !self.config.is_enabled(encoding) {
                continue;
            }
            let attempt = match encoding {
                Encoding::Queue => match queue_mtime {
                    Some(mtime) => self.read_queue(mtime, forced),
                    None => continue,
                },
                Encoding::Tagged | Encoding::Legacy => {
                    let path = self.paths.encoding_file(encoding);
                    match self.fresh_mtime(&path, max_age, now) {
                        Some(mtime) => self.read_text(encoding, &path, mtime, forced),
                        None => continue,
                    }
                }
            };
            match attempt {
                Ok(outcome) => {
                    self.trace(|| debug!(target: "ldata::reader", %encoding, ?outcome, "Read finished"));
                    return Ok(outcome);
                }
                Err(e) => {
                    self.trace(|| debug!(target: "ldata::reader", %encoding, error = %e, "Read failed, trying next encoding"));
                    failures.push((encoding, e.to_string()));
                }
            }
        }

        if failures.is_empty() {
            Ok(ReadOutcome::NoNewData)
        } else {
            Err(ReadError::AllFailed(failures))
        }
    }

    /// Modification time of the queue stat file if both queue files exist
    /// and the stat file is fresh enough.
    fn queue_fresh(&mut self, max_age: MaxAge, now: SystemTime) -> Option<SystemTime> {
        if !self.config.use_queue {
            return None;
        }
        let buf = self.paths.queue_buf();
        if !buf.exists() {
            self.note_missing(&buf);
            return None;
        }
        let stat = self.paths.queue_stat();
        self.fresh_mtime(&stat, max_age, now)
    }

    /// Modification time of `path` if it exists and is fresh enough.
    fn fresh_mtime(&mut self, path: &Path, max_age: MaxAge, now: SystemTime) -> Option<SystemTime> {
        let mtime = match fs::metadata(path).and_then(|meta| meta.modified()) {
            Ok(mtime) => mtime,
            Err(_) => {
                self.note_missing(path);
                return None;
            }
        };
        // a clock step backwards makes the file look brand new
        let age = now
            .duration_since(mtime)
            .map(|age| age.as_secs())
            .unwrap_or(0);
        if !max_age.allows(age) {
            if self.first_report(Repeat::TooOld) {
                debug!(target: "ldata::reader", path = %path.display(), age, %max_age, "File too old");
            }
            return None;
        }
        Some(mtime)
    }

    fn read_queue(&mut self, stat_mtime: SystemTime, forced: bool) -> Result<ReadOutcome, LdataError> {
        // the handle is dropped on any error so the next read reopens it
        let mut queue = match self.queue.take() {
            Some(mut queue) => {
                if forced {
                    queue.seek_back()?;
                }
                queue
            }
            None => self.open_queue()?,
        };

        let message = match queue.read_next()? {
            Some(message) => message,
            None => {
                self.queue = Some(queue);
                self.trace(|| debug!(target: "ldata::reader", "No new queue message"));
                return Ok(ReadOutcome::NoNewData);
            }
        };
        let decoded = QueueCodec::default().decode(&message.payload)?;
        self.queue = Some(queue);

        self.accept(decoded, stat_mtime);
        self.last_queue_id = Some(message.id);
        self.save_checkpoint(message.id);
        Ok(ReadOutcome::NewData)
    }

    fn open_queue(&self) -> Result<FileQueue, LdataError> {
        let mut queue = FileQueue::open_rdonly(&self.paths.queue_base())?;
        if self.config.read_from_start {
            queue.seek_to_start()?;
        } else {
            queue.seek_to_last()?;
        }
        Ok(queue)
    }

    fn read_text(
        &mut self,
        encoding: Encoding,
        path: &Path,
        mtime: SystemTime,
        forced: bool,
    ) -> Result<ReadOutcome, LdataError> {
        if !forced && self.prev_mod_stamp == Some(mtime) {
            if self.first_report(Repeat::NotModified) {
                debug!(target: "ldata::reader", path = %path.display(), "File not modified");
            }
            return Ok(ReadOutcome::NoNewData);
        }

        let bytes = fs::read(path).map_err(|e| LdataError::io(path, e))?;
        let decoded = match get_codec(encoding, self.config.use_legacy).decode(&bytes) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(target: "ldata::reader", path = %path.display(), error = %e, "Malformed file, removing");
                if let Err(rm) = fs::remove_file(path) {
                    debug!(target: "ldata::reader", path = %path.display(), error = %rm, "Could not remove malformed file");
                }
                return Err(e.into());
            }
        };

        self.accept(decoded, mtime);
        Ok(ReadOutcome::NewData)
    }

    fn accept(&mut self, decoded: NotificationRecord, mtime: SystemTime) {
        self.record.absorb(decoded);
        self.record.set_prev_mod_time(system_time_to_unix(mtime));
        self.prev_mod_stamp = Some(mtime);
        self.reported = Reported::default();
    }

    fn save_checkpoint(&mut self, id: u64) {
        if let Some(checkpoint) = self.checkpoint.as_mut() {
            if let Err(e) = checkpoint.save(&self.record, id) {
                warn!(target: "ldata::reader", id, error = %e, "Checkpoint save failed");
            }
        }
    }

    fn note_missing(&mut self, path: &Path) {
        if self.first_report(Repeat::NotExist) {
            debug!(target: "ldata::reader", path = %path.display(), "File does not exist");
        }
    }

    /// True the first time a repeating message comes up in debug mode.
    fn first_report(&mut self, what: Repeat) -> bool {
        if !self.config.debug {
            return false;
        }
        let flag = match what {
            Repeat::NotExist => &mut self.reported.not_exist,
            Repeat::TooOld => &mut self.reported.too_old,
            Repeat::NotModified => &mut self.reported.not_modified,
        };
        !std::mem::replace(flag, true)
    }

    fn trace(&self, emit: impl FnOnce()) {
        if self.config.debug {
            emit();
        }
    }
}
