//! File-backed durable queue.

use super::format::{SlotEntry, StatHeader, StatTable};
use super::{DurableQueue, QueueConfig, QueueError, QueueMessage};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// zstd level for payload compression
const COMPRESSION_LEVEL: i32 = 3;

/// Attempts at reading a consistent stat table while an append races us.
const STAT_READ_ATTEMPTS: usize = 3;

const STAT_RETRY_DELAY: Duration = Duration::from_millis(5);

/// Durable queue stored as `<base>.stat` + `<base>.buf`.
pub struct FileQueue {
    stat_path: PathBuf,
    buf_path: PathBuf,
    stat_file: File,
    buf_file: File,
    writable: bool,
    compress: bool,
    table: StatTable,
    /// Id of the last message consumed, 0 before the first
    cursor: u64,
    last_read: Option<u64>,
    /// (stat, buf) file sizes when opened
    opened_sizes: (u64, u64),
}

impl FileQueue {
    /// Stat file path for a queue base path.
    pub fn stat_path_for(base: &Path) -> PathBuf {
        with_suffix(base, ".stat")
    }

    /// Buffer file path for a queue base path.
    pub fn buf_path_for(base: &Path) -> PathBuf {
        with_suffix(base, ".buf")
    }

    /// Create an empty queue, replacing any existing one.
    pub fn create(base: &Path, config: &QueueConfig) -> Result<Self, QueueError> {
        config.validate()?;
        let stat_path = Self::stat_path_for(base);
        let buf_path = Self::buf_path_for(base);

        let table = StatTable::new(config.nslots as u32, config.buf_size as u64);

        let buf_file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(&buf_path)
            .map_err(|e| QueueError::io(&buf_path, e))?;
        buf_file
            .set_len(config.buf_size as u64)
            .and_then(|_| buf_file.sync_all())
            .map_err(|e| QueueError::io(&buf_path, e))?;

        let mut stat_file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(&stat_path)
            .map_err(|e| QueueError::io(&stat_path, e))?;
        stat_file
            .write_all(&table.to_bytes())
            .and_then(|_| stat_file.sync_all())
            .map_err(|e| QueueError::io(&stat_path, e))?;

        info!(
            target: "ldata::queue",
            path = %stat_path.display(),
            nslots = config.nslots,
            buf_size = config.buf_size,
            "Created queue"
        );

        Ok(FileQueue {
            opened_sizes: (
                table.header.stat_len() as u64,
                config.buf_size as u64,
            ),
            stat_path,
            buf_path,
            stat_file,
            buf_file,
            writable: true,
            compress: config.compress,
            table,
            cursor: 0,
            last_read: None,
        })
    }

    /// Open for appending, creating the queue if it is missing, unreadable,
    /// or laid out differently from `config`.
    pub fn open_rdwr(base: &Path, config: &QueueConfig) -> Result<Self, QueueError> {
        config.validate()?;
        match Self::open(base, true) {
            Ok(mut queue)
                if queue.table.header.nslots as usize == config.nslots
                    && queue.table.header.buf_size == config.buf_size as u64 =>
            {
                queue.compress = config.compress;
                Ok(queue)
            }
            Ok(queue) => {
                info!(
                    target: "ldata::queue",
                    path = %queue.stat_path.display(),
                    nslots = queue.table.header.nslots,
                    wanted_nslots = config.nslots,
                    "Queue layout changed, recreating"
                );
                drop(queue);
                Self::create(base, config)
            }
            Err(e) if e.is_not_found() => Self::create(base, config),
            Err(e) => {
                warn!(target: "ldata::queue", error = %e, "Queue unreadable, recreating");
                Self::create(base, config)
            }
        }
    }

    /// Open an existing queue for reading.
    pub fn open_rdonly(base: &Path) -> Result<Self, QueueError> {
        Self::open(base, false)
    }

    fn open(base: &Path, writable: bool) -> Result<Self, QueueError> {
        let stat_path = Self::stat_path_for(base);
        let buf_path = Self::buf_path_for(base);

        let mut stat_file = OpenOptions::new()
            .read(true)
            .write(writable)
            .open(&stat_path)
            .map_err(|e| QueueError::io(&stat_path, e))?;
        let table = read_table(&mut stat_file, &stat_path)?;

        let buf_file = OpenOptions::new()
            .read(true)
            .write(writable)
            .open(&buf_path)
            .map_err(|e| QueueError::io(&buf_path, e))?;
        let buf_len = buf_file
            .metadata()
            .map_err(|e| QueueError::io(&buf_path, e))?
            .len();
        if buf_len != table.header.buf_size {
            return Err(QueueError::Corrupt(format!(
                "buffer file is {} bytes, header says {}",
                buf_len, table.header.buf_size
            )));
        }

        debug!(
            target: "ldata::queue",
            path = %stat_path.display(),
            writable,
            next_id = table.header.next_id,
            "Opened queue"
        );

        Ok(FileQueue {
            opened_sizes: (table.header.stat_len() as u64, buf_len),
            stat_path,
            buf_path,
            stat_file,
            buf_file,
            writable,
            compress: true,
            table,
            cursor: 0,
            last_read: None,
        })
    }

    /// Path of the stat file.
    pub fn stat_path(&self) -> &Path {
        &self.stat_path
    }

    /// Header as of the last table load.
    pub fn header(&self) -> &StatHeader {
        &self.table.header
    }

    /// Number of live messages as of the last table load.
    pub fn message_count(&self) -> usize {
        self.table.active_count()
    }

    /// Whether both paths still name the files this handle holds open.
    ///
    /// False once either file was removed or replaced by a new one.
    pub fn is_current(&self) -> bool {
        same_file(&self.stat_file, &self.stat_path) && same_file(&self.buf_file, &self.buf_path)
    }

    fn refresh(&mut self) -> Result<(), QueueError> {
        self.table = read_table(&mut self.stat_file, &self.stat_path)?;
        Ok(())
    }

    /// Fail if the files on disk are no longer the ones this handle opened.
    fn check_not_rewritten(&self) -> Result<(), QueueError> {
        let size = |path: &Path| {
            fs::metadata(path)
                .map(|m| m.len())
                .map_err(|e| QueueError::io(path, e))
        };
        let now = (size(&self.stat_path)?, size(&self.buf_path)?);
        if !self.is_current() {
            return Err(QueueError::Rewritten("files replaced".to_string()));
        }
        if now != self.opened_sizes {
            return Err(QueueError::Rewritten(format!(
                "sizes changed from {:?} to {:?}",
                self.opened_sizes, now
            )));
        }
        Ok(())
    }

    fn read_payload(&mut self, slot: &SlotEntry) -> Result<Vec<u8>, QueueError> {
        let end = slot.offset + u64::from(slot.stored_len);
        if end > self.table.header.buf_size {
            return Err(QueueError::Corrupt(format!(
                "message {} extends past the buffer ({} > {})",
                slot.id, end, self.table.header.buf_size
            )));
        }

        let mut stored = vec![0u8; slot.stored_len as usize];
        self.buf_file
            .seek(SeekFrom::Start(slot.offset))
            .and_then(|_| self.buf_file.read_exact(&mut stored))
            .map_err(|e| QueueError::io(&self.buf_path, e))?;

        let crc = crc32fast::hash(&stored);
        if crc != slot.crc32 {
            return Err(QueueError::ChecksumMismatch {
                what: format!("message {}", slot.id),
                expected: slot.crc32,
                actual: crc,
            });
        }

        let payload = if slot.compressed {
            zstd::decode_all(&stored[..]).map_err(|e| QueueError::io(&self.buf_path, e))?
        } else {
            stored
        };
        if payload.len() != slot.raw_len as usize {
            return Err(QueueError::Corrupt(format!(
                "message {} is {} bytes, slot says {}",
                slot.id,
                payload.len(),
                slot.raw_len
            )));
        }
        Ok(payload)
    }

    fn read_after_cursor(&mut self) -> Result<Option<QueueMessage>, QueueError> {
        let Some(slot) = self.table.next_after(self.cursor).copied() else {
            return Ok(None);
        };
        let payload = self.read_payload(&slot)?;
        self.cursor = slot.id;
        self.last_read = Some(slot.id);
        Ok(Some(QueueMessage {
            id: slot.id,
            payload,
        }))
    }

    fn write_table(&mut self) -> Result<(), QueueError> {
        let bytes = self.table.to_bytes();
        self.stat_file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.stat_file.write_all(&bytes))
            .and_then(|_| self.stat_file.sync_data())
            .map_err(|e| QueueError::io(&self.stat_path, e))
    }

    /// Bytes to store for a payload, and whether they are compressed.
    fn stored_form(&self, payload: &[u8]) -> Result<(Vec<u8>, bool), QueueError> {
        if self.compress {
            let compressed = zstd::encode_all(payload, COMPRESSION_LEVEL)
                .map_err(|e| QueueError::io(&self.buf_path, e))?;
            if compressed.len() < payload.len() {
                return Ok((compressed, true));
            }
        }
        Ok((payload.to_vec(), false))
    }
}

impl DurableQueue for FileQueue {
    fn append(&mut self, payload: &[u8]) -> Result<u64, QueueError> {
        if !self.writable {
            return Err(QueueError::ReadOnly);
        }
        self.refresh()?;

        let buf_size = self.table.header.buf_size;
        let (stored, compressed) = self.stored_form(payload)?;
        let len = stored.len() as u64;
        let too_large = || QueueError::MessageTooLarge {
            len: stored.len(),
            buf_size,
        };
        if len > buf_size {
            return Err(too_large());
        }
        let raw_len = u32::try_from(payload.len()).map_err(|_| too_large())?;

        let mut offset = self.table.header.write_offset;
        if offset + len > buf_size {
            offset = 0;
        }
        let end = offset + len;
        let slot_idx = match self.table.header.youngest_slot {
            Some(s) => (s as usize + 1) % self.table.slots.len(),
            None => 0,
        };

        // drop messages whose bytes are about to be overwritten
        for slot in self.table.slots.iter_mut() {
            if slot.overlaps(offset, end) {
                trace!(target: "ldata::queue", id = slot.id, "Overwriting message");
                slot.active = false;
            }
        }

        self.buf_file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.buf_file.write_all(&stored))
            .and_then(|_| self.buf_file.sync_data())
            .map_err(|e| QueueError::io(&self.buf_path, e))?;

        let id = self.table.header.next_id;
        self.table.slots[slot_idx] = SlotEntry {
            active: true,
            id,
            offset,
            stored_len: len as u32,
            raw_len,
            compressed,
            crc32: crc32fast::hash(&stored),
        };
        self.table.header.next_id = id + 1;
        self.table.header.youngest_slot = Some(slot_idx as u32);
        self.table.header.write_offset = end;
        self.write_table()?;

        debug!(
            target: "ldata::queue",
            id,
            slot = slot_idx,
            offset,
            stored_len = len,
            raw_len,
            compressed,
            "Appended message"
        );
        Ok(id)
    }

    fn read_next(&mut self) -> Result<Option<QueueMessage>, QueueError> {
        self.check_not_rewritten()?;
        self.refresh()?;
        let newest = self.table.header.next_id.saturating_sub(1);
        if newest < self.cursor {
            return Err(QueueError::Rewritten(format!(
                "newest id {} is behind cursor {}",
                newest, self.cursor
            )));
        }

        match self.read_after_cursor() {
            Err(QueueError::ChecksumMismatch { what, .. }) => {
                // an append may have overwritten the slot after we loaded the table
                trace!(target: "ldata::queue", %what, "Payload checksum mismatch, reloading table");
                self.refresh()?;
                self.read_after_cursor()
            }
            other => other,
        }
    }

    fn seek_to_id(&mut self, id: u64) -> Result<(), QueueError> {
        self.cursor = id;
        Ok(())
    }

    fn seek_to_start(&mut self) -> Result<(), QueueError> {
        self.refresh()?;
        self.cursor = self.table.oldest_id().map_or(0, |id| id - 1);
        Ok(())
    }

    fn seek_to_last(&mut self) -> Result<(), QueueError> {
        self.refresh()?;
        self.cursor = match self.table.youngest_id() {
            Some(id) => id - 1,
            None => self.table.header.next_id.saturating_sub(1),
        };
        Ok(())
    }

    fn seek_back(&mut self) -> Result<(), QueueError> {
        self.cursor = self.cursor.saturating_sub(1);
        Ok(())
    }

    fn last_id_read(&self) -> Option<u64> {
        self.last_read
    }
}

impl std::fmt::Debug for FileQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileQueue")
            .field("stat_path", &self.stat_path)
            .field("writable", &self.writable)
            .field("cursor", &self.cursor)
            .field("next_id", &self.table.header.next_id)
            .finish()
    }
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut s = base.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

#[cfg(unix)]
fn same_file(file: &File, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (file.metadata(), fs::metadata(path)) {
        (Ok(open), Ok(named)) => open.dev() == named.dev() && open.ino() == named.ino(),
        _ => false,
    }
}

// no portable inode; a missing path or a length mismatch is all we can see
#[cfg(not(unix))]
fn same_file(file: &File, path: &Path) -> bool {
    match (file.metadata(), fs::metadata(path)) {
        (Ok(open), Ok(named)) => open.len() == named.len(),
        _ => false,
    }
}

fn read_table(file: &mut File, path: &Path) -> Result<StatTable, QueueError> {
    let mut attempt = 1;
    loop {
        let mut bytes = Vec::new();
        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.read_to_end(&mut bytes))
            .map_err(|e| QueueError::io(path, e))?;
        match StatTable::from_bytes(&bytes) {
            Ok(table) => return Ok(table),
            Err(e @ (QueueError::ChecksumMismatch { .. } | QueueError::Corrupt(_)))
                if attempt < STAT_READ_ATTEMPTS =>
            {
                trace!(target: "ldata::queue", attempt, error = %e, "Torn stat read, retrying");
                attempt += 1;
                std::thread::sleep(STAT_RETRY_DELAY);
            }
            Err(e) => return Err(e),
        }
    }
}
