//! Durable storage for the synchronized quiz state.
//!
//! A single named slot holds the latest serialized [`QuizState`]. Every view
//! of the same installation reads and writes that slot, so a view that starts
//! late (or restarts) hydrates from whatever was written last.

mod sled_store;

pub use sled_store::{QuizStore, StorageError, StorageResult};

#[cfg(test)]
pub(crate) use sled_store::tests::test_store;

use crate::quiz::QuizState;

/// Well-known slot name shared by all views
pub const STATE_SLOT: &str = "quiz_cast_pro_channel";

/// Narrow contract the sync engine needs from durable storage
pub trait StateStore: Send + Sync {
    /// Last persisted state, or the default state if none can be read
    fn load(&self) -> QuizState;

    /// Persist the full state, overwriting the previous value
    fn save(&self, state: &QuizState) -> StorageResult<()>;
}

/// Configuration for the storage layer
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Path to the Sled database directory
    pub path: String,
    /// Slot key the state lives under
    pub slot: String,
    /// Cache size in bytes (default: 16MB)
    pub cache_size: u64,
    /// Flush interval in milliseconds (0 = flush on every save)
    pub flush_interval_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "./data/quizcast.sled".to_string(),
            slot: STATE_SLOT.to_string(),
            cache_size: 16 * 1024 * 1024,
            flush_interval_ms: 0,
        }
    }
}

impl StorageConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_cache_size(mut self, size: u64) -> Self {
        self.cache_size = size;
        self
    }

    pub fn with_flush_interval(mut self, ms: u64) -> Self {
        self.flush_interval_ms = ms;
        self
    }

    pub fn with_slot(mut self, slot: impl Into<String>) -> Self {
        self.slot = slot.into();
        self
    }
}
