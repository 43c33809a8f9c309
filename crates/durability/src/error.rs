//! Error types for publishing and reading notifications

use crate::codec::{CodecError, Encoding};
use crate::config::ConfigError;
use crate::queue::QueueError;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Errors from a single notification operation.
#[derive(Debug, thiserror::Error)]
pub enum LdataError {
    /// I/O error with path context.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File or directory the operation touched
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Could not open or lock the writer lock file.
    #[error("Cannot lock {path}: {source}")]
    Lock {
        /// Lock file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Encoded bytes could not be decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Durable queue failure.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl LdataError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        LdataError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors from [`NotificationWriter::publish`](crate::NotificationWriter::publish).
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Nothing was written: the directory or lock could not be set up.
    #[error("Publish failed: {0}")]
    Fatal(#[source] LdataError),

    /// Some encodings were written, the listed ones failed.
    #[error("Publish incomplete: {}", publish_failures(.0))]
    Partial(Vec<(Encoding, LdataError)>),
}

impl PublishError {
    /// Encodings that failed. Empty for fatal errors.
    pub fn failed_encodings(&self) -> Vec<Encoding> {
        match self {
            PublishError::Fatal(_) => Vec::new(),
            PublishError::Partial(failures) => failures.iter().map(|(enc, _)| *enc).collect(),
        }
    }
}

/// Errors from [`NotificationReader::read`](crate::NotificationReader::read).
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    /// Every encoding that was tried failed.
    #[error("All reads failed: {}", read_failures(.0))]
    AllFailed(Vec<(Encoding, String)>),
}

fn publish_failures(failures: &[(Encoding, LdataError)]) -> String {
    join_failures(failures)
}

fn read_failures(failures: &[(Encoding, String)]) -> String {
    join_failures(failures)
}

fn join_failures<E: fmt::Display>(failures: &[(Encoding, E)]) -> String {
    failures
        .iter()
        .map(|(encoding, err)| format!("{}: {}", encoding, err))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_display_lists_failures() {
        let err = PublishError::Partial(vec![
            (
                Encoding::Legacy,
                LdataError::io("/d/_f", io::Error::new(io::ErrorKind::Other, "disk full")),
            ),
            (Encoding::Queue, LdataError::Queue(QueueError::ReadOnly)),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("legacy: I/O error on /d/_f: disk full"));
        assert!(msg.contains("; queue: Queue opened read-only"));
        assert_eq!(err.failed_encodings(), vec![Encoding::Legacy, Encoding::Queue]);
    }

    #[test]
    fn test_all_failed_display() {
        let err = ReadError::AllFailed(vec![
            (Encoding::Tagged, "missing marker".to_string()),
            (Encoding::Legacy, "missing time line".to_string()),
        ]);
        assert_eq!(
            err.to_string(),
            "All reads failed: tagged: missing marker; legacy: missing time line"
        );
    }

    #[test]
    fn test_codec_error_converts() {
        let err: LdataError = CodecError::decode("bad", "tagged", 3).into();
        assert!(matches!(err, LdataError::Codec(_)));
    }
}
