//! Sled-based storage for the quiz state slot.
//!
//! The state is stored as JSON text under one key of a dedicated tree. Reads
//! never fail from the caller's point of view: a missing or unreadable value
//! hydrates as the default state.

use sled::{Db, Tree};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use super::{StateStore, StorageConfig};
use crate::quiz::{reconcile, QuizState};

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Sled database error: {0}")]
    Sled(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage initialization failed: {0}")]
    InitFailed(String),

    #[error("Stored state is invalid: question {index} has {reason}")]
    InvalidState { index: usize, reason: &'static str },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

const TREE_SLOTS: &str = "slots";

/// Sled-backed store holding the single quiz state slot
#[derive(Clone)]
pub struct QuizStore {
    db: Arc<Db>,
    slots: Tree,
    config: StorageConfig,
}

impl QuizStore {
    /// Open or create a store at the configured path
    pub fn open(config: StorageConfig) -> StorageResult<Self> {
        let path = Path::new(&config.path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::InitFailed(format!("Failed to create directory: {}", e))
            })?;
        }

        let db = sled::Config::new()
            .path(&config.path)
            .cache_capacity(config.cache_size)
            .flush_every_ms(if config.flush_interval_ms > 0 {
                Some(config.flush_interval_ms)
            } else {
                None
            })
            .open()
            .map_err(|e| {
                StorageError::InitFailed(format!(
                    "Cannot open {} (is another QuizCast process using it?): {}",
                    config.path, e
                ))
            })?;

        let slots = db.open_tree(TREE_SLOTS)?;

        Ok(Self {
            db: Arc::new(db),
            slots,
            config,
        })
    }

    /// Read the slot, distinguishing "absent" from "unreadable".
    ///
    /// Malformed questions reject the whole value; an index or status that
    /// disagrees with the deck is reconciled.
    pub fn try_load(&self) -> StorageResult<Option<QuizState>> {
        let Some(bytes) = self.slots.get(self.config.slot.as_bytes())? else {
            return Ok(None);
        };
        let mut state: QuizState = serde_json::from_slice(&bytes)?;

        for (index, question) in state.questions.iter().enumerate() {
            if let Some(reason) = question.defect() {
                return Err(StorageError::InvalidState { index, reason });
            }
        }
        if reconcile(&mut state) {
            warn!(
                "Stored index/status inconsistent with the deck, reconciled to {}/{}",
                state.current_question_index, state.status
            );
        }
        Ok(Some(state))
    }

    /// Whether the slot holds any value
    pub fn has_state(&self) -> StorageResult<bool> {
        Ok(self.slots.contains_key(self.config.slot.as_bytes())?)
    }

    /// Force flush all pending writes to disk
    pub fn flush(&self) -> StorageResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl StateStore for QuizStore {
    fn load(&self) -> QuizState {
        match self.try_load() {
            Ok(Some(state)) => {
                debug!(
                    "Hydrated state from slot {}: {} questions, status {}",
                    self.config.slot,
                    state.questions.len(),
                    state.status
                );
                state
            }
            Ok(None) => QuizState::default(),
            Err(e) => {
                warn!("Stored state unreadable, using defaults: {}", e);
                QuizState::default()
            }
        }
    }

    fn save(&self, state: &QuizState) -> StorageResult<()> {
        let bytes = serde_json::to_vec(state)?;
        self.slots.insert(self.config.slot.as_bytes(), bytes)?;
        if self.config.flush_interval_ms == 0 {
            self.flush()?;
        }
        Ok(())
    }
}

impl Drop for QuizStore {
    fn drop(&mut self) {
        // Attempt to flush on drop, but don't panic
        let _ = self.flush();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::quiz::tests::question;
    use crate::quiz::{AnimationStyle, SessionStatus};
    use tempfile::{tempdir, TempDir};

    pub(crate) fn test_store() -> (TempDir, QuizStore) {
        let dir = tempdir().unwrap();
        let config = StorageConfig::new(dir.path().join("test.sled").to_string_lossy().to_string());
        let store = QuizStore::open(config).unwrap();
        (dir, store)
    }

    fn write_raw(store: &QuizStore, bytes: &[u8]) {
        store
            .slots
            .insert(store.config.slot.as_bytes(), bytes)
            .unwrap();
    }

    #[test]
    fn test_empty_slot_loads_default() {
        let (_dir, store) = test_store();
        assert!(!store.has_state().unwrap());

        let state = store.load();
        assert!(state.questions.is_empty());
        assert_eq!(state.status, SessionStatus::Idle);
    }

    #[test]
    fn test_save_load_round_trip() {
        let (_dir, store) = test_store();
        let state = QuizState {
            questions: vec![question("one").with_category("misc"), question("two")],
            current_question_index: 1,
            status: SessionStatus::RevealingAnswer,
            last_update: 1_700_000_000_123,
            animation_style: AnimationStyle::Fade,
        };

        store.save(&state).unwrap();
        assert_eq!(store.load(), state);
    }

    #[test]
    fn test_save_overwrites() {
        let (_dir, store) = test_store();
        let mut state = QuizState::default();
        state.questions.push(question("one"));
        store.save(&state).unwrap();

        state.questions.clear();
        store.save(&state).unwrap();

        assert!(store.load().questions.is_empty());
    }

    #[test]
    fn test_corrupt_slot_falls_back_to_default() {
        let (_dir, store) = test_store();
        write_raw(&store, b"{not json");

        assert!(store.try_load().is_err());
        let state = store.load();
        assert_eq!(state.status, SessionStatus::Idle);
        assert!(state.questions.is_empty());
    }

    #[test]
    fn test_wrong_shape_falls_back_to_default() {
        let (_dir, store) = test_store();
        write_raw(&store, br#"{"questions":"nope"}"#);

        assert_eq!(store.load().current_question_index, -1);
    }

    #[test]
    fn test_malformed_question_falls_back_to_default() {
        let (_dir, store) = test_store();
        write_raw(
            &store,
            br#"{"questions":[{"id":"q1","text":"Q","options":["a","b","c","d"],
                "correctAnswer":200,"points":100,"timeLimit":0}],
                "currentQuestionIndex":7,"status":"SHOWING_QUESTION",
                "lastUpdate":1,"animationStyle":"zoom"}"#,
        );

        assert!(matches!(
            store.try_load(),
            Err(StorageError::InvalidState { index: 0, .. })
        ));
        let state = store.load();
        assert_eq!(state.current_question_index, -1);
        assert_eq!(state.status, SessionStatus::Idle);
        assert!(state.questions.is_empty());
    }

    #[test]
    fn test_out_of_range_index_is_reconciled() {
        let (_dir, store) = test_store();
        let state = QuizState {
            questions: vec![question("only")],
            current_question_index: 7,
            status: SessionStatus::ShowingQuestion,
            ..QuizState::default()
        };
        write_raw(&store, &serde_json::to_vec(&state).unwrap());

        let loaded = store.load();
        assert_eq!(loaded.questions.len(), 1);
        assert_eq!(loaded.current_question_index, -1);
        assert_eq!(loaded.status, SessionStatus::Waiting);
    }

    #[test]
    fn test_second_open_is_rejected_while_locked() {
        let (dir, _store) = test_store();
        let path = dir.path().join("test.sled").to_string_lossy().to_string();

        assert!(matches!(
            QuizStore::open(StorageConfig::new(path)),
            Err(StorageError::InitFailed(_))
        ));
    }

    #[test]
    fn test_reopen_recovers_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reopen.sled").to_string_lossy().to_string();

        let mut state = QuizState::default();
        state.questions.push(question("persisted"));
        state.status = SessionStatus::Waiting;
        {
            let store = QuizStore::open(StorageConfig::new(&path)).unwrap();
            store.save(&state).unwrap();
        }

        let store = QuizStore::open(StorageConfig::new(&path)).unwrap();
        assert_eq!(store.load(), state);
    }
}
