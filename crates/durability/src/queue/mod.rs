//! Durable message queue.
//!
//! An append-only slotted log kept in two files next to each other:
//!
//! - `<base>.stat`: header and slot table, see [`format`]
//! - `<base>.buf`: ring buffer holding the payloads
//!
//! One appender (the holder of the directory lock) and any number of
//! readers. Each reader keeps its own cursor: the id of the last message it
//! read. Ids start at 1 and increase by one per append.

pub mod config;
mod file_queue;
pub mod format;

pub use config::{QueueConfig, QueueConfigError, BYTES_PER_SLOT, DEFAULT_NSLOTS};
pub use file_queue::FileQueue;

use std::io;
use std::path::PathBuf;

/// A message read from the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Message id
    pub id: u64,
    /// Uncompressed payload
    pub payload: Vec<u8>,
}

/// Durable queue operations.
pub trait DurableQueue {
    /// Append a payload, returning its id.
    fn append(&mut self, payload: &[u8]) -> Result<u64, QueueError>;

    /// Read the first message after the cursor and advance past it.
    ///
    /// `Ok(None)` when there is nothing new.
    fn read_next(&mut self) -> Result<Option<QueueMessage>, QueueError>;

    /// Position the cursor so the next read returns the first message after `id`.
    fn seek_to_id(&mut self, id: u64) -> Result<(), QueueError>;

    /// Position the cursor before the oldest message.
    fn seek_to_start(&mut self) -> Result<(), QueueError>;

    /// Position the cursor so the next read returns the youngest message.
    fn seek_to_last(&mut self) -> Result<(), QueueError>;

    /// Step the cursor back one message so it is delivered again.
    fn seek_back(&mut self) -> Result<(), QueueError>;

    /// Id of the last message read, if any.
    fn last_id_read(&self) -> Option<u64>;
}

/// Queue errors.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// I/O error on a queue file.
    #[error("Queue I/O error on {path}: {source}")]
    Io {
        /// File the operation touched
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Stat file does not start with the queue magic.
    #[error("Not a queue stat file (bad magic)")]
    BadMagic,

    /// Stat file written by an unknown format version.
    #[error("Unsupported queue format version {0}")]
    UnsupportedVersion(u32),

    /// Structural damage in the stat file.
    #[error("Corrupt queue: {0}")]
    Corrupt(String),

    /// Checksum mismatch on the stat table or a payload.
    #[error("Checksum mismatch in {what}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// What was being verified
        what: String,
        /// Stored checksum
        expected: u32,
        /// Computed checksum
        actual: u32,
    },

    /// Payload does not fit in the ring buffer.
    #[error("Message of {len} bytes exceeds queue buffer of {buf_size} bytes")]
    MessageTooLarge {
        /// Stored payload length
        len: usize,
        /// Ring buffer size
        buf_size: u64,
    },

    /// The queue files were replaced since this handle opened them.
    #[error("Queue was rewritten externally: {0}")]
    Rewritten(String),

    /// Append on a read-only handle.
    #[error("Queue opened read-only")]
    ReadOnly,

    /// Invalid configuration.
    #[error("Invalid queue configuration: {0}")]
    Config(#[from] QueueConfigError),
}

impl QueueError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        QueueError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error means the queue files do not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, QueueError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}
