//! Notification configuration
//!
//! One explicit value passed to writers and readers. [`LdataConfig::from_env`]
//! reads the process environment:
//!
//! | Variable           | Effect                                        |
//! |--------------------|-----------------------------------------------|
//! | `LDATA_NO_WRITE`   | `true` turns every publish into a no-op       |
//! | `LDATA_FMQ_ACTIVE` | `false` disables the durable queue            |
//! | `LDATA_FMQ_NSLOTS` | queue slot count (1KB of buffer per slot)     |
//! | `LDATA_AS_XML`     | `false` disables the tagged markup file       |
//! | `LDATA_AS_ASCII`   | `false` disables the fixed-line text file     |

use crate::codec::Encoding;
use crate::queue::{QueueConfig, QueueConfigError, DEFAULT_NSLOTS};
use tracing::warn;

/// Environment variable disabling writes.
pub const ENV_NO_WRITE: &str = "LDATA_NO_WRITE";
/// Environment variable toggling the durable queue.
pub const ENV_QUEUE_ACTIVE: &str = "LDATA_FMQ_ACTIVE";
/// Environment variable setting the queue slot count.
pub const ENV_QUEUE_NSLOTS: &str = "LDATA_FMQ_NSLOTS";
/// Environment variable toggling the tagged markup file.
pub const ENV_AS_TAGGED: &str = "LDATA_AS_XML";
/// Environment variable toggling the fixed-line text file.
pub const ENV_AS_LEGACY: &str = "LDATA_AS_ASCII";

/// Notification subsystem configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdataConfig {
    /// Publish is a no-op (default: false).
    pub no_write: bool,

    /// Write and read the durable queue (default: true).
    pub use_queue: bool,

    /// Write and read the tagged markup file (default: true).
    pub use_tagged: bool,

    /// Write and read the fixed-line text file (default: true).
    ///
    /// Also controls the struct prefix on queue payloads.
    pub use_legacy: bool,

    /// Queue slot count (default: 256).
    pub queue_nslots: usize,

    /// Trace freshness decisions and fallbacks (default: false).
    pub debug: bool,

    /// Readers open the queue at its oldest message instead of its
    /// youngest (default: false).
    pub read_from_start: bool,
}

impl Default for LdataConfig {
    fn default() -> Self {
        LdataConfig {
            no_write: false,
            use_queue: true,
            use_tagged: true,
            use_legacy: true,
            queue_nslots: DEFAULT_NSLOTS,
            debug: false,
            read_from_start: false,
        }
    }
}

impl LdataConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let is = |key: &str, value: &str| lookup(key).is_some_and(|v| v.trim() == value);

        if is(ENV_NO_WRITE, "true") {
            config.no_write = true;
        }
        if is(ENV_QUEUE_ACTIVE, "false") {
            config.use_queue = false;
        }
        if is(ENV_AS_TAGGED, "false") {
            config.use_tagged = false;
        }
        if is(ENV_AS_LEGACY, "false") {
            config.use_legacy = false;
        }
        if let Some(raw) = lookup(ENV_QUEUE_NSLOTS) {
            match raw.trim().parse::<usize>() {
                Ok(n) => config.queue_nslots = n,
                Err(_) => warn!(
                    target: "ldata::config",
                    value = %raw,
                    "Ignoring unparseable {}", ENV_QUEUE_NSLOTS
                ),
            }
        }
        config
    }

    /// Disable writes (builder pattern).
    pub fn with_no_write(mut self, no_write: bool) -> Self {
        self.no_write = no_write;
        self
    }

    /// Enable or disable the durable queue (builder pattern).
    pub fn with_queue(mut self, enabled: bool) -> Self {
        self.use_queue = enabled;
        self
    }

    /// Enable or disable the tagged markup file (builder pattern).
    pub fn with_tagged(mut self, enabled: bool) -> Self {
        self.use_tagged = enabled;
        self
    }

    /// Enable or disable the fixed-line text file (builder pattern).
    pub fn with_legacy(mut self, enabled: bool) -> Self {
        self.use_legacy = enabled;
        self
    }

    /// Set queue slot count (builder pattern).
    pub fn with_queue_nslots(mut self, nslots: usize) -> Self {
        self.queue_nslots = nslots;
        self
    }

    /// Enable debug tracing (builder pattern).
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Read the queue from its oldest message (builder pattern).
    pub fn with_read_from_start(mut self, from_start: bool) -> Self {
        self.read_from_start = from_start;
        self
    }

    /// Whether an encoding is enabled.
    pub fn is_enabled(&self, encoding: Encoding) -> bool {
        match encoding {
            Encoding::Queue => self.use_queue,
            Encoding::Tagged => self.use_tagged,
            Encoding::Legacy => self.use_legacy,
        }
    }

    /// Queue geometry derived from the slot count.
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig::from_slots(self.queue_nslots)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.use_queue || self.use_tagged || self.use_legacy) {
            return Err(ConfigError::NoEncodingEnabled);
        }
        if self.use_queue {
            self.queue_config().validate()?;
        }
        Ok(())
    }

    /// Create a configuration optimized for testing (small queue).
    pub fn for_testing() -> Self {
        LdataConfig {
            queue_nslots: 16,
            ..Self::default()
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Every encoding is disabled.
    #[error("At least one encoding must be enabled")]
    NoEncodingEnabled,

    /// Invalid queue geometry.
    #[error(transparent)]
    Queue(#[from] QueueConfigError),
}
