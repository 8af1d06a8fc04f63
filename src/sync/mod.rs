//! Synchronization module for keeping views in lockstep.
//!
//! Every view owns a private copy of the quiz state and a [`SyncEngine`].
//! Engines share only two process-wide services:
//! - The durable state slot (late joiners hydrate from it)
//! - The named broadcast channel (live views receive full-state pushes)
//!
//! Conflicts resolve last-write-wins by arrival order at each view.

pub mod channel;
pub mod engine;
pub mod history;
pub mod protocol;

pub use channel::{BroadcastChannel, Subscription};
pub use engine::{ChangeOrigin, StateChange, SyncEngine};
pub use history::HistoryStack;
pub use protocol::{SyncMessage, CHANNEL_NAME};

use std::fmt;

/// Unique identifier for a view instance
pub type ViewId = String;

/// Which surface a view renders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ViewRole {
    /// Authoring and control surface
    #[default]
    Manager,
    /// Passive display surface
    Presenter,
}

impl ViewRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewRole::Manager => "manager",
            ViewRole::Presenter => "presenter",
        }
    }
}

impl fmt::Display for ViewRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generate a fresh view identifier tagged with its role
pub fn new_view_id(role: ViewRole) -> ViewId {
    let full_uuid = uuid::Uuid::new_v4().to_string();
    let short: String = full_uuid.chars().take(8).collect();
    format!("{}-{}", role, short)
}
