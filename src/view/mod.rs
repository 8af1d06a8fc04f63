//! View drivers built on top of the sync engine.
//!
//! This module handles:
//! - View selection from a fragment identifier
//! - The manager controller (every control action, with undo history)
//! - The presenter (screen derivation and the local countdown)
//! - Parsing of manager console commands

pub mod console;
pub mod manager;
pub mod presenter;

pub use console::{Command, CommandError};
pub use manager::{ManagerController, ManagerError, QuestionDraft, ValidationError};
pub use presenter::{Countdown, Presenter, Redraw, Screen};

use crate::sync::ViewRole;

/// Fragment token that selects the presenter view
pub const PRESENTER_TOKEN: &str = "presenter";

impl ViewRole {
    /// Resolve a fragment identifier (`#presenter`, `presenter`, or anything else)
    pub fn from_fragment(fragment: Option<&str>) -> Self {
        match fragment.map(|f| f.trim().trim_start_matches('#')) {
            Some(PRESENTER_TOKEN) => ViewRole::Presenter,
            _ => ViewRole::Manager,
        }
    }
}
