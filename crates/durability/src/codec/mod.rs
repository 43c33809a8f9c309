//! Record codecs.
//!
//! Each on-disk encoding of a notification record has one codec behind the
//! [`RecordCodec`] trait:
//!
//! - `LegacyTextCodec`: fixed-line text file `_F`
//! - `TaggedTextCodec`: tagged markup file `_F.xml`, plus the catalog line
//! - `QueueCodec`: durable queue payloads, with the historical layouts
//!
//! # Usage
//!
//! ```ignore
//! use ldata_durability::codec::{get_codec, Encoding};
//!
//! let codec = get_codec(Encoding::Tagged, true);
//! let bytes = codec.encode(&record);
//! let decoded = codec.decode(&bytes)?;
//! ```

mod legacy;
mod queue;
mod tagged;
mod traits;

pub use legacy::LegacyTextCodec;
pub use queue::{PayloadLayout, QueueCodec, STRUCT_FCAST_LEN, STRUCT_LEN, STRUCT_STR_LEN};
pub use tagged::{TaggedTextCodec, OPEN_MARKER, ROOT_TAG};
pub use traits::{CodecError, Encoding, RecordCodec};

/// Get the codec for an encoding.
///
/// `legacy_prefix` only affects the queue codec: whether payloads carry the
/// fixed-size struct in front of the markup.
pub fn get_codec(encoding: Encoding, legacy_prefix: bool) -> Box<dyn RecordCodec> {
    match encoding {
        Encoding::Queue => Box::new(QueueCodec::new(legacy_prefix)),
        Encoding::Tagged => Box::new(TaggedTextCodec),
        Encoding::Legacy => Box::new(LegacyTextCodec),
    }
}
