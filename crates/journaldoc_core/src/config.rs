//! Document configuration.

use crate::error::{CoreError, CoreResult};
use crate::journal::{serialize_info, JournalInfo};
use crate::path::PathCache;
use std::sync::Arc;
use std::time::Duration;

/// Default size of the memory-mapped journal buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Configuration for opening a [`crate::JournaledDocument`].
#[derive(Debug, Clone)]
pub struct DocumentConfig {
    /// Type and version written into every journal header.
    pub info: JournalInfo,

    /// Fixed size of the memory-mapped journal file in bytes.
    pub buffer_size: usize,

    /// Journal size in bytes above which
    /// [`crate::JournaledDocument::snapshot_if_high_water`] takes a snapshot.
    pub high_water: usize,

    /// How often a [`crate::HighWaterMonitor`] checks the high water mark
    /// (zero = no monitor).
    pub snapshot_interval: Duration,

    /// Compiled path cache, shareable between documents.
    pub path_cache: Arc<PathCache>,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            info: JournalInfo::new("journaldoc", 1),
            buffer_size: DEFAULT_BUFFER_SIZE,
            high_water: DEFAULT_BUFFER_SIZE / 4 * 3,
            snapshot_interval: Duration::ZERO, // disabled
            path_cache: Arc::new(PathCache::new()),
        }
    }
}

impl DocumentConfig {
    /// Creates a configuration with default sizes for the given journal type.
    #[must_use]
    pub fn new(journal_type: impl Into<String>, version: u64) -> Self {
        Self {
            info: JournalInfo::new(journal_type, version),
            ..Self::default()
        }
    }

    /// Sets the journal buffer size.
    #[must_use]
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Sets the high water mark.
    #[must_use]
    pub fn high_water(mut self, bytes: usize) -> Self {
        self.high_water = bytes;
        self
    }

    /// Sets the background snapshot check interval.
    #[must_use]
    pub fn snapshot_interval(mut self, interval: Duration) -> Self {
        self.snapshot_interval = interval;
        self
    }

    /// Uses a shared path cache.
    #[must_use]
    pub fn path_cache(mut self, cache: Arc<PathCache>) -> Self {
        self.path_cache = cache;
        self
    }

    /// Checks that the buffer can hold at least the journal header.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] if the buffer is too small.
    pub fn validate(&self) -> CoreResult<()> {
        let header = serialize_info(&self.info)?.len();
        if self.buffer_size <= header {
            return Err(CoreError::invalid_operation(format!(
                "journal buffer of {} bytes cannot hold the {header}-byte header and any command",
                self.buffer_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = DocumentConfig::default();
        assert_eq!(config.buffer_size, DEFAULT_BUFFER_SIZE);
        assert!(config.high_water < config.buffer_size);
        assert_eq!(config.snapshot_interval, Duration::ZERO);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = DocumentConfig::new("state", 3)
            .buffer_size(1024)
            .high_water(512)
            .snapshot_interval(Duration::from_secs(5));

        assert_eq!(config.info, JournalInfo::new("state", 3));
        assert_eq!(config.buffer_size, 1024);
        assert_eq!(config.high_water, 512);
        assert_eq!(config.snapshot_interval, Duration::from_secs(5));
    }

    #[test]
    fn tiny_buffer_rejected() {
        let config = DocumentConfig::new("state", 1).buffer_size(8);
        assert!(matches!(
            config.validate(),
            Err(CoreError::InvalidOperation { .. })
        ));
    }
}
