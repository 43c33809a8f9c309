//! ldata - filesystem latest-data notifications
//!
//! A producer announces "new data is available" in a watched directory; a
//! consumer polls the directory, detects the announcement and reads back
//! what was published. Each announcement is written in up to three
//! encodings so that readers of every generation can consume it.
//!
//! # Quick Start
//!
//! ```ignore
//! use ldata::{LdataConfig, NotificationRecord, NotificationReader, NotificationWriter};
//!
//! let mut writer = NotificationWriter::new("/data/radar", LdataConfig::from_env());
//! writer.publish(
//!     &NotificationRecord::new()
//!         .with_latest_time(1577836800)
//!         .with_rel_data_path("20200101/000000.nc")
//!         .with_writer("ingest"),
//! )?;
//!
//! let mut reader = NotificationReader::new("/data/radar", LdataConfig::from_env());
//! reader.read_blocking(-1, std::time::Duration::from_secs(1), |_| {});
//! println!("{}", reader.record());
//! ```
//!
//! # Architecture
//!
//! - `ldata-core`: the record type, alias rules and data file naming
//! - `ldata-durability`: codecs, durable queue, writer, reader, checkpoints

pub use ldata_core::{
    data_time_from_path, guess_data_type, now_unix, resolve_aliases, resolve_data_path,
    CalendarTime, DataTime, NotificationRecord, ResolvedFields,
};
pub use ldata_durability::{
    Encoding, LdataConfig, LdataError, LdataPaths, MaxAge, NotificationReader,
    NotificationWriter, PublishError, ReadCheckpoint, ReadError, ReadOutcome,
};
