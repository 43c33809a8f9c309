//! Durability layer for latest-data notifications
//!
//! This crate handles everything that touches disk:
//!
//! - Codecs: tagged markup, fixed-line legacy text, queue payloads
//! - Durable queue: slotted append-only log in `_F.stat` / `_F.buf`
//! - Writer: lock, catalog, atomic text replace, queue append
//! - Reader: freshness checks, priority fallback, re-read avoidance
//! - Blocking poll and consumer checkpoints
//! - Configuration from the environment

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod checkpoint;
pub mod codec;
pub mod config;
pub mod error;
pub mod lock;
pub mod paths;
pub mod poll;
pub mod queue;
pub mod reader;
pub mod writer;

pub use checkpoint::ReadCheckpoint;
pub use codec::{
    get_codec, CodecError, Encoding, LegacyTextCodec, PayloadLayout, QueueCodec, RecordCodec,
    TaggedTextCodec,
};
pub use config::{ConfigError, LdataConfig};
pub use error::{LdataError, PublishError, ReadError};
pub use lock::LockGuard;
pub use paths::LdataPaths;
pub use poll::HEARTBEAT_LABEL;
pub use queue::{DurableQueue, FileQueue, QueueConfig, QueueError, QueueMessage};
pub use reader::{MaxAge, NotificationReader, ReadOutcome};
pub use writer::NotificationWriter;
