//! Record codec trait definitions.

use ldata_core::NotificationRecord;
use std::fmt;

/// Record codec trait.
///
/// Every on-disk encoding of a [`NotificationRecord`] goes through a codec.
///
/// # Failure
///
/// `decode` builds a new record from the bytes. It never touches any
/// existing record, so a failed decode leaves reader state intact.
pub trait RecordCodec: Send + Sync {
    /// Encode a record into the bytes written to disk.
    fn encode(&self, record: &NotificationRecord) -> Vec<u8>;

    /// Decode bytes read from disk.
    fn decode(&self, data: &[u8]) -> Result<NotificationRecord, CodecError>;

    /// Unique codec identifier, used in diagnostics.
    fn codec_id(&self) -> &str;
}

/// The three on-disk encodings, in read priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Durable queue payloads (`_F.stat` / `_F.buf`)
    Queue,
    /// Tagged markup file (`_F.xml`)
    Tagged,
    /// Fixed-line text file (`_F`)
    Legacy,
}

impl Encoding {
    /// Read priority: queue first, legacy last.
    pub const READ_ORDER: [Encoding; 3] = [Encoding::Queue, Encoding::Tagged, Encoding::Legacy];

    /// Write order used by the publisher.
    pub const WRITE_ORDER: [Encoding; 3] = [Encoding::Legacy, Encoding::Tagged, Encoding::Queue];
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Encoding::Queue => "queue",
            Encoding::Tagged => "tagged",
            Encoding::Legacy => "legacy",
        };
        f.write_str(name)
    }
}

/// Codec errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Decoding failed.
    ///
    /// Carries the codec identity and data length so callers can tell a
    /// wrong-encoding error from a truncated file.
    #[error("Decode error (codec={codec_id}, data_len={data_len}): {detail}")]
    DecodeError {
        /// Human-readable error description
        detail: String,
        /// Codec ID that attempted the decode
        codec_id: String,
        /// Length of the data that failed to decode
        data_len: usize,
    },

    /// No queue payload layout matched.
    #[error("No payload layout matched (data_len={data_len}): {}", attempts.join("; "))]
    NoLayoutMatched {
        /// Length of the payload
        data_len: usize,
        /// Failure of each attempted layout
        attempts: Vec<String>,
    },
}

impl CodecError {
    /// Create a decode error with full diagnostic context.
    pub fn decode(detail: impl Into<String>, codec_id: impl Into<String>, data_len: usize) -> Self {
        CodecError::DecodeError {
            detail: detail.into(),
            codec_id: codec_id.into(),
            data_len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::TaggedTextCodec;

    // Test that trait is object-safe
    fn _accepts_box_dyn_codec(_codec: Box<dyn RecordCodec>) {}

    #[test]
    fn test_codec_trait_object_safe() {
        let codec: Box<dyn RecordCodec> = Box::new(TaggedTextCodec);
        let record = NotificationRecord::new().with_latest_time(1577836800);
        let decoded = codec.decode(&codec.encode(&record)).unwrap();
        assert_eq!(decoded.latest_time(), 1577836800);
        assert_eq!(codec.codec_id(), "tagged");
    }

    #[test]
    fn test_codec_error_display() {
        let err = CodecError::decode("missing end marker", "tagged", 42);
        let msg = err.to_string();
        assert!(msg.contains("missing end marker"));
        assert!(msg.contains("tagged"));
        assert!(msg.contains("42"));

        let err = CodecError::NoLayoutMatched {
            data_len: 7,
            attempts: vec!["markup: a".to_string(), "struct: b".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("markup: a; struct: b"));
    }

    #[test]
    fn test_encoding_order() {
        assert_eq!(Encoding::READ_ORDER[0], Encoding::Queue);
        assert_eq!(Encoding::READ_ORDER[2], Encoding::Legacy);
        assert_eq!(Encoding::Tagged.to_string(), "tagged");
    }
}
