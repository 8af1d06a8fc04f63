//! Quiz session data model.
//!
//! This module defines the synchronized aggregate shared by every view:
//! - Questions with exactly four answer options
//! - Session lifecycle status
//! - Presentation hints (entry animation)
//! - Partial patches used by merge-based updates
//!
//! The JSON shape of [`QuizState`] is the storage and wire format, so field
//! names are serialized in camelCase.

pub mod machine;

pub use machine::{is_enabled, plan, reconcile, ControlAction};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of answer options every admitted question carries
pub const OPTION_COUNT: usize = 4;

/// Index value meaning "no active question"
pub const NO_QUESTION: i32 = -1;

/// Opaque question identifier, unique within a session
pub type QuestionId = String;

/// A single multiple choice question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub options: [String; OPTION_COUNT],
    /// Index into `options` (0-3)
    pub correct_answer: usize,
    pub points: u32,
    /// Seconds allowed to answer
    pub time_limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Question {
    pub fn new(
        text: impl Into<String>,
        options: [String; OPTION_COUNT],
        correct_answer: usize,
    ) -> Self {
        Self {
            id: new_question_id(),
            text: text.into(),
            options,
            correct_answer,
            points: 100,
            time_limit: 30,
            category: None,
        }
    }

    pub fn with_points(mut self, points: u32) -> Self {
        self.points = points;
        self
    }

    pub fn with_time_limit(mut self, seconds: u32) -> Self {
        self.time_limit = seconds;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Text of the correct option
    pub fn correct_option(&self) -> Option<&str> {
        self.options.get(self.correct_answer).map(String::as_str)
    }

    /// First structural problem with this question, if any
    pub fn defect(&self) -> Option<&'static str> {
        if self.text.trim().is_empty() {
            Some("missing question text")
        } else if self.options.iter().any(|opt| opt.trim().is_empty()) {
            Some("empty answer option")
        } else if self.correct_answer >= OPTION_COUNT {
            Some("correct answer out of range")
        } else if self.time_limit == 0 {
            Some("time limit must be positive")
        } else {
            None
        }
    }
}

/// Generate a short question identifier
pub fn new_question_id() -> QuestionId {
    uuid::Uuid::new_v4().simple().to_string().chars().take(8).collect()
}

/// Entry animation used by the presenter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimationStyle {
    Fade,
    #[default]
    Slide,
    Zoom,
}

impl AnimationStyle {
    pub const ALL: [AnimationStyle; 3] =
        [AnimationStyle::Slide, AnimationStyle::Fade, AnimationStyle::Zoom];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnimationStyle::Fade => "fade",
            AnimationStyle::Slide => "slide",
            AnimationStyle::Zoom => "zoom",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|style| style.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

impl fmt::Display for AnimationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a quiz session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// No questions, or freshly cleared
    #[default]
    Idle,
    /// Questions loaded, quiz not started
    Waiting,
    /// Active question on screen, countdown running
    ShowingQuestion,
    /// Correct answer highlighted, countdown stopped
    RevealingAnswer,
    /// Session ended
    GameOver,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "IDLE",
            SessionStatus::Waiting => "WAITING",
            SessionStatus::ShowingQuestion => "SHOWING_QUESTION",
            SessionStatus::RevealingAnswer => "REVEALING_ANSWER",
            SessionStatus::GameOver => "GAME_OVER",
        }
    }

    /// Whether this status requires a valid current question
    pub fn needs_question(&self) -> bool {
        matches!(
            self,
            SessionStatus::ShowingQuestion | SessionStatus::RevealingAnswer
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The synchronized quiz session aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizState {
    pub questions: Vec<Question>,
    /// -1 means no active question
    pub current_question_index: i32,
    pub status: SessionStatus,
    /// Milliseconds since epoch of the last local mutation
    pub last_update: i64,
    pub animation_style: AnimationStyle,
}

impl Default for QuizState {
    fn default() -> Self {
        Self {
            questions: Vec::new(),
            current_question_index: NO_QUESTION,
            status: SessionStatus::Idle,
            last_update: chrono::Utc::now().timestamp_millis(),
            animation_style: AnimationStyle::default(),
        }
    }
}

impl QuizState {
    /// The active question, if the index points at one
    pub fn current_question(&self) -> Option<&Question> {
        usize::try_from(self.current_question_index)
            .ok()
            .and_then(|idx| self.questions.get(idx))
    }

    pub fn is_last_question(&self) -> bool {
        !self.questions.is_empty()
            && self.current_question_index >= self.questions.len() as i32 - 1
    }

    pub fn has_questions(&self) -> bool {
        !self.questions.is_empty()
    }

    /// Merge a patch over this state, leaving absent fields untouched
    pub fn apply(&mut self, patch: QuizPatch) {
        if let Some(questions) = patch.questions {
            self.questions = questions;
        }
        if let Some(index) = patch.current_question_index {
            self.current_question_index = index;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(last_update) = patch.last_update {
            self.last_update = last_update;
        }
        if let Some(style) = patch.animation_style {
            self.animation_style = style;
        }
    }

    /// Patch that replaces every field with the values of this state
    pub fn to_patch(&self) -> QuizPatch {
        QuizPatch::from(self.clone())
    }
}

/// Partial quiz state used as input to a merge-based update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<Question>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_question_index: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation_style: Option<AnimationStyle>,
}

impl QuizPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn questions(mut self, questions: Vec<Question>) -> Self {
        self.questions = Some(questions);
        self
    }

    pub fn index(mut self, index: i32) -> Self {
        self.current_question_index = Some(index);
        self
    }

    pub fn status(mut self, status: SessionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn animation_style(mut self, style: AnimationStyle) -> Self {
        self.animation_style = Some(style);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl From<QuizState> for QuizPatch {
    fn from(state: QuizState) -> Self {
        Self {
            questions: Some(state.questions),
            current_question_index: Some(state.current_question_index),
            status: Some(state.status),
            last_update: Some(state.last_update),
            animation_style: Some(state.animation_style),
        }
    }
}
