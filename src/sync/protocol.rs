//! Wire format for messages on the broadcast channel.
//!
//! A single message kind exists: a full-state replacement. It is encoded as
//! JSON text `{"type": "SYNC_STATE", "payload": <QuizState>}` so that views
//! never share memory, only serialized snapshots.

use serde::{Deserialize, Serialize};

use crate::quiz::QuizState;

/// Fixed channel name shared by all views
pub const CHANNEL_NAME: &str = "quiz_cast_pro_channel";

/// Maximum encoded message size (4MB)
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Protocol errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProtocolError {
    #[error("Invalid message format: {0}")]
    InvalidFormat(String),

    #[error("Message too large: {0} bytes (max: {1})")]
    MessageTooLarge(usize, usize),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            ProtocolError::InvalidFormat(err.to_string())
        } else {
            ProtocolError::Serialization(err.to_string())
        }
    }
}

/// Transient envelope carried over the broadcast channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncMessage {
    /// Replace the receiver's state wholesale
    SyncState(QuizState),
}

impl SyncMessage {
    pub fn sync_state(state: QuizState) -> Self {
        SyncMessage::SyncState(state)
    }

    pub fn payload(&self) -> &QuizState {
        match self {
            SyncMessage::SyncState(state) => state,
        }
    }

    pub fn into_payload(self) -> QuizState {
        match self {
            SyncMessage::SyncState(state) => state,
        }
    }

    /// Encode as JSON text
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let text = serde_json::to_string(self)?;
        if text.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge(text.len(), MAX_MESSAGE_SIZE));
        }
        Ok(text)
    }

    /// Decode from JSON text
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        if text.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge(text.len(), MAX_MESSAGE_SIZE));
        }
        Ok(serde_json::from_str(text)?)
    }
}
