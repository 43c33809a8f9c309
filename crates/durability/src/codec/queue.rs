//! Durable queue payload encoding.
//!
//! A payload is an optional fixed-size big-endian struct followed by the
//! tagged block:
//!
//! ```text
//! +-------------+----------+-----------+------------+------------+----------+-----------+
//! | latest: i32 | nfc: i32 | ext [64]  | info1 [64] | info2 [64] | [lead:i32]| <markup>  |
//! +-------------+----------+-----------+------------+------------+----------+-----------+
//! ```
//!
//! The struct holds NUL-padded strings and is only written when the legacy
//! prefix is enabled; `lead` is present only when `nfc != 0`. Readers accept
//! any of the historical layouts, see [`PayloadLayout`].

use super::tagged::{TaggedTextCodec, OPEN_MARKER};
use super::traits::{CodecError, RecordCodec};
use byteorder::{BigEndian, ByteOrder};
use ldata_core::sentinel::{self, NONE};
use ldata_core::NotificationRecord;

const CODEC_ID: &str = "queue";

/// Length of each fixed string field in the struct prefix.
pub const STRUCT_STR_LEN: usize = 64;

/// Size of the struct prefix without the lead time.
pub const STRUCT_LEN: usize = 4 + 4 + 3 * STRUCT_STR_LEN;

/// Size of the struct prefix with the lead time.
pub const STRUCT_FCAST_LEN: usize = STRUCT_LEN + 4;

/// Payload layouts, in the order decode tries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadLayout {
    /// Tagged block only
    MarkupOnly,
    /// Struct prefix followed by the tagged block
    StructThenMarkup,
    /// Struct prefix only
    StructOnly,
}

impl PayloadLayout {
    /// Decode attempt order.
    pub const ATTEMPT_ORDER: [PayloadLayout; 3] = [
        PayloadLayout::MarkupOnly,
        PayloadLayout::StructThenMarkup,
        PayloadLayout::StructOnly,
    ];

    fn name(self) -> &'static str {
        match self {
            PayloadLayout::MarkupOnly => "markup-only",
            PayloadLayout::StructThenMarkup => "struct+markup",
            PayloadLayout::StructOnly => "struct-only",
        }
    }
}

/// Codec for durable queue payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueCodec {
    legacy_prefix: bool,
}

impl Default for QueueCodec {
    fn default() -> Self {
        QueueCodec {
            legacy_prefix: true,
        }
    }
}

impl QueueCodec {
    /// Create a codec; `legacy_prefix` writes the struct before the markup.
    pub fn new(legacy_prefix: bool) -> Self {
        QueueCodec { legacy_prefix }
    }

    /// Whether encoded payloads carry the struct prefix.
    pub fn legacy_prefix(&self) -> bool {
        self.legacy_prefix
    }

    /// Decode with an explicit layout.
    pub fn decode_layout(
        &self,
        layout: PayloadLayout,
        data: &[u8],
    ) -> Result<NotificationRecord, String> {
        match layout {
            PayloadLayout::MarkupOnly => {
                if !data.starts_with(OPEN_MARKER.as_bytes()) {
                    return Err("payload does not start with markup".to_string());
                }
                TaggedTextCodec.decode(data).map_err(|e| e.to_string())
            }
            PayloadLayout::StructThenMarkup => {
                let offset = markup_offset(data)
                    .ok_or_else(|| "no markup after struct prefix".to_string())?;
                // markup carries every struct field, so it wins outright
                TaggedTextCodec
                    .decode(&data[offset..])
                    .map_err(|e| e.to_string())
            }
            PayloadLayout::StructOnly => match markup_offset(data) {
                // damaged markup must not degrade to a struct-only record
                Some(offset) => Err(format!("undecodable markup at offset {}", offset)),
                None => decode_struct(data),
            },
        }
    }
}

impl RecordCodec for QueueCodec {
    fn encode(&self, record: &NotificationRecord) -> Vec<u8> {
        let markup = TaggedTextCodec.encode(record);
        if !self.legacy_prefix {
            return markup;
        }
        let mut out = encode_struct(record);
        out.extend_from_slice(&markup);
        out
    }

    fn decode(&self, data: &[u8]) -> Result<NotificationRecord, CodecError> {
        let mut attempts = Vec::with_capacity(PayloadLayout::ATTEMPT_ORDER.len());
        for layout in PayloadLayout::ATTEMPT_ORDER {
            match self.decode_layout(layout, data) {
                Ok(record) => return Ok(record),
                Err(detail) => attempts.push(format!("{}: {}", layout.name(), detail)),
            }
        }
        Err(CodecError::NoLayoutMatched {
            data_len: data.len(),
            attempts,
        })
    }

    fn codec_id(&self) -> &str {
        CODEC_ID
    }
}

/// Offset of the markup block following a struct prefix, if any.
fn markup_offset(data: &[u8]) -> Option<usize> {
    [STRUCT_LEN, STRUCT_FCAST_LEN].into_iter().find(|&off| {
        data.len() > off + OPEN_MARKER.len() && data[off..].starts_with(OPEN_MARKER.as_bytes())
    })
}

fn encode_struct(record: &NotificationRecord) -> Vec<u8> {
    let len = if record.is_forecast() {
        STRUCT_FCAST_LEN
    } else {
        STRUCT_LEN
    };
    let mut buf = vec![0u8; len];
    let resolved = record.resolved();

    // the struct carries 32-bit times
    BigEndian::write_i32(&mut buf[0..4], record.latest_time() as i32);
    BigEndian::write_i32(&mut buf[4..8], i32::from(record.is_forecast()));
    let strings = [
        sentinel::field_or(record.data_file_ext(), NONE),
        sentinel::field_or(resolved.user_info1, NONE),
        sentinel::field_or(resolved.user_info2, NONE),
    ];
    for (i, s) in strings.iter().enumerate() {
        let start = 8 + i * STRUCT_STR_LEN;
        // keep one NUL terminator
        let n = s.len().min(STRUCT_STR_LEN - 1);
        buf[start..start + n].copy_from_slice(&s.as_bytes()[..n]);
    }
    if record.is_forecast() {
        BigEndian::write_i32(
            &mut buf[STRUCT_LEN..STRUCT_FCAST_LEN],
            record.forecast_lead_secs(),
        );
    }
    buf
}

fn decode_struct(data: &[u8]) -> Result<NotificationRecord, String> {
    if data.len() < STRUCT_LEN {
        return Err(format!(
            "buffer too short for struct: {} < {}",
            data.len(),
            STRUCT_LEN
        ));
    }
    let mut record = NotificationRecord::new();
    record.set_latest_time(i64::from(BigEndian::read_i32(&data[0..4])));
    let n_fcasts = BigEndian::read_i32(&data[4..8]);

    let field = |i: usize| {
        let start = 8 + i * STRUCT_STR_LEN;
        let raw = &data[start..start + STRUCT_STR_LEN];
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        String::from_utf8_lossy(&raw[..end]).into_owned()
    };
    if let Some(ext) = sentinel::from_field(&field(0), NONE) {
        record.set_data_file_ext(ext);
    }
    if let Some(info1) = sentinel::from_field(&field(1), NONE) {
        record.set_user_info1(info1);
    }
    if let Some(info2) = sentinel::from_field(&field(2), NONE) {
        record.set_user_info2(info2);
    }

    if n_fcasts != 0 {
        if data.len() < STRUCT_FCAST_LEN {
            return Err(format!(
                "buffer too short for forecast struct: {} < {}",
                data.len(),
                STRUCT_FCAST_LEN
            ));
        }
        record.set_forecast(BigEndian::read_i32(&data[STRUCT_LEN..STRUCT_FCAST_LEN]));
    }
    Ok(record)
}
