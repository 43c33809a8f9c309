//! Queue stat file format.
//!
//! # Stat File Layout
//!
//! ```text
//! ┌────────────────────────────────────┐
//! │ Header (48 bytes)                  │
//! ├────────────────────────────────────┤
//! │ Slot 0 (32 bytes)                  │
//! ├────────────────────────────────────┤
//! │ ...                                │
//! ├────────────────────────────────────┤
//! │ Slot nslots-1                      │
//! └────────────────────────────────────┘
//! ```
//!
//! # Header Layout
//!
//! ```text
//! ┌──────────┬─────────┬────────┬──────────┬──────────┬─────────┬──────────┬─────────┬──────────┐
//! │ Magic (4)│ Ver (4) │ Slots 4│ Young (4)│ BufSz (8)│ NextId 8│ WrOff (8)│ CRC (4) │ Rsvd (4) │
//! └──────────┴─────────┴────────┴──────────┴──────────┴─────────┴──────────┴─────────┴──────────┘
//! ```
//!
//! The CRC covers the first 40 header bytes and the whole slot table, so a
//! reader racing the appender sees a mismatch instead of a torn table.
//! All integers are little-endian.

use super::QueueError;

/// Magic bytes identifying a queue stat file: "LDQS"
pub const STAT_MAGIC: [u8; 4] = *b"LDQS";

/// Current stat format version
pub const STAT_VERSION: u32 = 1;

/// Size of the stat header in bytes
pub const STAT_HEADER_SIZE: usize = 48;

/// Size of one slot entry in bytes
pub const SLOT_SIZE: usize = 32;

const CRC_OFFSET: usize = 40;
const NO_SLOT: u32 = u32::MAX;

/// Stat file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatHeader {
    /// Number of slots in the table
    pub nslots: u32,
    /// Ring buffer size in bytes
    pub buf_size: u64,
    /// Id the next appended message receives (ids start at 1)
    pub next_id: u64,
    /// Slot holding the youngest message
    pub youngest_slot: Option<u32>,
    /// Ring buffer offset of the next write
    pub write_offset: u64,
}

impl StatHeader {
    /// Header of an empty queue.
    pub fn new(nslots: u32, buf_size: u64) -> Self {
        StatHeader {
            nslots,
            buf_size,
            next_id: 1,
            youngest_slot: None,
            write_offset: 0,
        }
    }

    /// Size of the whole stat file for this header.
    pub fn stat_len(&self) -> usize {
        STAT_HEADER_SIZE + self.nslots as usize * SLOT_SIZE
    }
}

/// One slot of the table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotEntry {
    /// Slot holds a live message
    pub active: bool,
    /// Message id
    pub id: u64,
    /// Ring buffer offset of the stored payload
    pub offset: u64,
    /// Stored (possibly compressed) length
    pub stored_len: u32,
    /// Uncompressed length
    pub raw_len: u32,
    /// Stored bytes are zstd-compressed
    pub compressed: bool,
    /// CRC32 of the stored bytes
    pub crc32: u32,
}

impl SlotEntry {
    /// Whether the slot's stored bytes overlap `[start, end)` of the ring.
    pub fn overlaps(&self, start: u64, end: u64) -> bool {
        let slot_end = self.offset + u64::from(self.stored_len);
        self.active && self.offset < end && start < slot_end
    }

    fn write_to(&self, bytes: &mut [u8]) {
        bytes[0] = u8::from(self.active);
        bytes[1] = u8::from(self.compressed);
        bytes[2..4].copy_from_slice(&[0, 0]);
        bytes[4..8].copy_from_slice(&self.stored_len.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.id.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.offset.to_le_bytes());
        bytes[24..28].copy_from_slice(&self.raw_len.to_le_bytes());
        bytes[28..32].copy_from_slice(&self.crc32.to_le_bytes());
    }

    fn read_from(bytes: &[u8]) -> Self {
        SlotEntry {
            active: bytes[0] != 0,
            compressed: bytes[1] != 0,
            stored_len: le_u32(&bytes[4..8]),
            id: le_u64(&bytes[8..16]),
            offset: le_u64(&bytes[16..24]),
            raw_len: le_u32(&bytes[24..28]),
            crc32: le_u32(&bytes[28..32]),
        }
    }
}

/// In-memory image of the stat file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatTable {
    /// Header
    pub header: StatHeader,
    /// Slot table, `header.nslots` entries
    pub slots: Vec<SlotEntry>,
}

impl StatTable {
    /// Empty table.
    pub fn new(nslots: u32, buf_size: u64) -> Self {
        StatTable {
            header: StatHeader::new(nslots, buf_size),
            slots: vec![SlotEntry::default(); nslots as usize],
        }
    }

    /// Serialize the table, computing the checksum.
    pub fn to_bytes(&self) -> Vec<u8> {
        let h = &self.header;
        let mut bytes = vec![0u8; h.stat_len()];
        bytes[0..4].copy_from_slice(&STAT_MAGIC);
        bytes[4..8].copy_from_slice(&STAT_VERSION.to_le_bytes());
        bytes[8..12].copy_from_slice(&h.nslots.to_le_bytes());
        bytes[12..16].copy_from_slice(&h.youngest_slot.unwrap_or(NO_SLOT).to_le_bytes());
        bytes[16..24].copy_from_slice(&h.buf_size.to_le_bytes());
        bytes[24..32].copy_from_slice(&h.next_id.to_le_bytes());
        bytes[32..40].copy_from_slice(&h.write_offset.to_le_bytes());
        for (i, slot) in self.slots.iter().enumerate() {
            let start = STAT_HEADER_SIZE + i * SLOT_SIZE;
            slot.write_to(&mut bytes[start..start + SLOT_SIZE]);
        }
        let crc = checksum(&bytes);
        bytes[CRC_OFFSET..CRC_OFFSET + 4].copy_from_slice(&crc.to_le_bytes());
        bytes
    }

    /// Parse and verify a stat file image.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, QueueError> {
        if bytes.len() < STAT_HEADER_SIZE {
            return Err(QueueError::Corrupt(format!(
                "stat file too short: {} bytes",
                bytes.len()
            )));
        }
        if bytes[0..4] != STAT_MAGIC {
            return Err(QueueError::BadMagic);
        }
        let version = le_u32(&bytes[4..8]);
        if version != STAT_VERSION {
            return Err(QueueError::UnsupportedVersion(version));
        }

        let nslots = le_u32(&bytes[8..12]);
        let youngest = le_u32(&bytes[12..16]);
        let header = StatHeader {
            nslots,
            youngest_slot: (youngest != NO_SLOT).then_some(youngest),
            buf_size: le_u64(&bytes[16..24]),
            next_id: le_u64(&bytes[24..32]),
            write_offset: le_u64(&bytes[32..40]),
        };
        if bytes.len() != header.stat_len() {
            return Err(QueueError::Corrupt(format!(
                "stat file is {} bytes, {} slots need {}",
                bytes.len(),
                nslots,
                header.stat_len()
            )));
        }

        let stored_crc = le_u32(&bytes[CRC_OFFSET..CRC_OFFSET + 4]);
        let computed_crc = checksum(bytes);
        if stored_crc != computed_crc {
            return Err(QueueError::ChecksumMismatch {
                what: "stat file".to_string(),
                expected: stored_crc,
                actual: computed_crc,
            });
        }

        let slots = bytes[STAT_HEADER_SIZE..]
            .chunks_exact(SLOT_SIZE)
            .map(SlotEntry::read_from)
            .collect();
        Ok(StatTable { header, slots })
    }

    /// Active slot with the smallest id greater than `after`.
    pub fn next_after(&self, after: u64) -> Option<&SlotEntry> {
        self.slots
            .iter()
            .filter(|s| s.active && s.id > after)
            .min_by_key(|s| s.id)
    }

    /// Id of the youngest message, if any.
    pub fn youngest_id(&self) -> Option<u64> {
        let slot = self.header.youngest_slot?;
        self.slots
            .get(slot as usize)
            .filter(|s| s.active)
            .map(|s| s.id)
    }

    /// Id of the oldest live message, if any.
    pub fn oldest_id(&self) -> Option<u64> {
        self.slots.iter().filter(|s| s.active).map(|s| s.id).min()
    }

    /// Number of live messages.
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.active).count()
    }
}

/// CRC over the header fields and slot table, skipping the CRC field itself.
fn checksum(bytes: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&bytes[..CRC_OFFSET]);
    hasher.update(&bytes[STAT_HEADER_SIZE..]);
    hasher.finalize()
}

fn le_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(buf)
}

fn le_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}
