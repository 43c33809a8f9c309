//! Queue configuration.

/// Bytes of ring buffer allotted per slot by [`QueueConfig::from_slots`].
pub const BYTES_PER_SLOT: usize = 1024;

/// Default slot count.
pub const DEFAULT_NSLOTS: usize = 256;

/// Durable queue configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Number of slots in the stat file (default: 256).
    ///
    /// Bounds how many messages are retained.
    pub nslots: usize,

    /// Ring buffer size in bytes (default: 256KB).
    pub buf_size: usize,

    /// Compress payloads with zstd when that makes them smaller (default: true).
    pub compress: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::from_slots(DEFAULT_NSLOTS)
    }
}

impl QueueConfig {
    /// Create a queue configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration with `nslots` slots and a matching buffer size.
    pub fn from_slots(nslots: usize) -> Self {
        QueueConfig {
            nslots,
            buf_size: nslots.saturating_mul(BYTES_PER_SLOT),
            compress: true,
        }
    }

    /// Set slot count (builder pattern).
    pub fn with_nslots(mut self, nslots: usize) -> Self {
        self.nslots = nslots;
        self
    }

    /// Set ring buffer size (builder pattern).
    pub fn with_buf_size(mut self, buf_size: usize) -> Self {
        self.buf_size = buf_size;
        self
    }

    /// Enable or disable payload compression (builder pattern).
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), QueueConfigError> {
        if self.nslots < 2 {
            return Err(QueueConfigError::TooFewSlots(self.nslots));
        }
        if self.nslots > u32::MAX as usize - 1 {
            return Err(QueueConfigError::TooManySlots(self.nslots));
        }
        if self.buf_size < BYTES_PER_SLOT {
            return Err(QueueConfigError::BufferTooSmall(self.buf_size));
        }
        Ok(())
    }

    /// Create a configuration optimized for testing (small ring, quick wrap).
    pub fn for_testing() -> Self {
        QueueConfig {
            nslots: 8,
            buf_size: 4 * 1024,
            compress: true,
        }
    }
}

/// Queue configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueConfigError {
    /// Fewer than two slots.
    #[error("Queue needs at least 2 slots, got {0}")]
    TooFewSlots(usize),

    /// Slot count does not fit the stat file format.
    #[error("Queue slot count {0} is too large")]
    TooManySlots(usize),

    /// Ring buffer smaller than one slot allotment.
    #[error("Queue buffer must be at least 1KB, got {0} bytes")]
    BufferTooSmall(usize),
}
