//! Manager-side controller.
//!
//! Every mutating action follows the same path: plan the patch against the
//! current state, record the pre-mutation snapshot in the history stack, and
//! hand the patch to the sync engine. Disabled actions and invalid input stop
//! before the engine, leaving both state and history untouched.

use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::generator::{admit_batch, GenerationError, QuestionGenerator};
use crate::quiz::{
    plan, AnimationStyle, ControlAction, Question, QuizState, SessionStatus, OPTION_COUNT,
};
use crate::sync::{HistoryStack, SyncEngine};

/// Manual authoring failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please fill in the question text")]
    MissingText,

    #[error("Please fill in answer option {0}")]
    MissingOption(usize),

    #[error("Correct answer must be between 1 and 4")]
    CorrectAnswerOutOfRange,

    #[error("Time limit must be at least one second")]
    ZeroTimeLimit,
}

#[derive(Error, Debug)]
pub enum ManagerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Error generating questions: {0}")]
    Generation(#[from] GenerationError),

    #[error("Cannot {action} while {status}")]
    Disabled {
        action: &'static str,
        status: SessionStatus,
    },
}

/// Manual question form contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    pub text: String,
    pub options: [String; OPTION_COUNT],
    pub correct_answer: usize,
    pub points: u32,
    pub time_limit: u32,
    pub category: Option<String>,
}

impl Default for QuestionDraft {
    fn default() -> Self {
        Self {
            text: String::new(),
            options: Default::default(),
            correct_answer: 0,
            points: 100,
            time_limit: 30,
            category: None,
        }
    }
}

impl QuestionDraft {
    /// Check the form and turn it into a question with a fresh id
    pub fn validate(self) -> Result<Question, ValidationError> {
        if self.text.trim().is_empty() {
            return Err(ValidationError::MissingText);
        }
        if let Some(idx) = self.options.iter().position(|opt| opt.trim().is_empty()) {
            return Err(ValidationError::MissingOption(idx + 1));
        }
        if self.correct_answer >= OPTION_COUNT {
            return Err(ValidationError::CorrectAnswerOutOfRange);
        }
        if self.time_limit == 0 {
            return Err(ValidationError::ZeroTimeLimit);
        }

        let mut question = Question::new(self.text, self.options, self.correct_answer)
            .with_points(self.points)
            .with_time_limit(self.time_limit);
        question.category = self.category;
        Ok(question)
    }
}

/// Drives the quiz from the manager view
pub struct ManagerController {
    engine: Arc<SyncEngine>,
    history: Mutex<HistoryStack>,
    generator: Option<Arc<dyn QuestionGenerator>>,
}

impl ManagerController {
    pub fn new(engine: Arc<SyncEngine>, generator: Option<Arc<dyn QuestionGenerator>>) -> Self {
        Self {
            engine,
            history: Mutex::new(HistoryStack::new()),
            generator,
        }
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    pub fn state(&self) -> QuizState {
        self.engine.state()
    }

    pub fn can_generate(&self) -> bool {
        self.generator.is_some()
    }

    /// Snapshots available to undo
    pub fn history_len(&self) -> usize {
        let mut history = self.history.lock();
        history.sync_epoch(self.engine.remote_epoch());
        history.len()
    }

    /// Add one manually authored question
    pub fn add_question(&self, draft: QuestionDraft) -> Result<QuizState, ManagerError> {
        let question = draft.validate()?;
        info!("Adding question {}", question.id);
        self.apply(ControlAction::AddQuestions(vec![question]))
    }

    /// Ask the generator for `count` questions on `topic` and append them
    pub async fn generate(&self, topic: &str, count: usize) -> Result<QuizState, ManagerError> {
        let generator = self.generator.as_ref().ok_or(GenerationError::Unavailable)?;
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(GenerationError::EmptyTopic.into());
        }
        if count == 0 {
            return Err(GenerationError::ZeroCount.into());
        }

        let batch = generator.generate(topic, count).await?;
        let questions = admit_batch(batch, count)?;
        info!("Generated {} questions about {:?}", questions.len(), topic);

        // Planned against the state as it is now, not as it was before the request
        self.apply(ControlAction::AddQuestions(questions))
    }

    pub fn start(&self) -> Result<QuizState, ManagerError> {
        self.apply(ControlAction::Start)
    }

    pub fn reveal(&self) -> Result<QuizState, ManagerError> {
        self.apply(ControlAction::Reveal)
    }

    pub fn next(&self) -> Result<QuizState, ManagerError> {
        self.apply(ControlAction::Next)
    }

    pub fn end(&self) -> Result<QuizState, ManagerError> {
        self.apply(ControlAction::End)
    }

    /// Clear the deck. Nothing happens unless the operator confirmed.
    pub fn clear(&self, confirmed: bool) -> Result<Option<QuizState>, ManagerError> {
        if !confirmed {
            return Ok(None);
        }
        self.apply(ControlAction::Clear).map(Some)
    }

    pub fn set_animation(&self, style: AnimationStyle) -> Result<QuizState, ManagerError> {
        self.apply(ControlAction::SetAnimation(style))
    }

    /// Roll back the last mutation. `None` when there is nothing to undo.
    pub fn undo(&self) -> Option<QuizState> {
        let snapshot = {
            let mut history = self.history.lock();
            if history.sync_epoch(self.engine.remote_epoch()) {
                info!("Undo history discarded after a remote update");
            }
            history.pop()?
        };
        Some(self.engine.update(snapshot.to_patch()))
    }

    fn apply(&self, action: ControlAction) -> Result<QuizState, ManagerError> {
        let current = self.engine.state();
        let name = action.name();
        let patch = plan(&current, action).ok_or(ManagerError::Disabled {
            action: name,
            status: current.status,
        })?;

        {
            let mut history = self.history.lock();
            history.sync_epoch(self.engine.remote_epoch());
            history.push(current);
        }

        Ok(self.engine.update(patch))
    }
}
