//! Core types for latest-data notifications
//!
//! This crate defines the foundational types used throughout the system:
//! - NotificationRecord: the "new data available" announcement
//! - resolve_aliases: legacy writer/user-info and path/user-info fallbacks
//! - CalendarTime: unix time <-> UTC calendar fields
//! - Data file naming: time-from-path, data path resolution, data type guess
//! - Error: Error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod datafile;
pub mod error;
pub mod record;
pub mod time;

pub use datafile::{data_time_from_path, guess_data_type, resolve_data_path, DataTime};
pub use error::{Error, Result};
pub use record::{resolve_aliases, sentinel, NotificationRecord, ResolvedFields};
pub use time::{now_unix, system_time_to_unix, CalendarTime};
