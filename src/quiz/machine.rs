//! Session state machine.
//!
//! Control actions are planned against the current state. A disabled action
//! plans to `None` and must not reach the sync engine. Enabled actions plan
//! to the patch the manager feeds into `SyncEngine::update`.

use super::{AnimationStyle, Question, QuizPatch, QuizState, SessionStatus, NO_QUESTION};

/// Manager-side control actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlAction {
    /// Append questions to the deck
    AddQuestions(Vec<Question>),
    Start,
    Reveal,
    Next,
    End,
    Clear,
    SetAnimation(AnimationStyle),
}

impl ControlAction {
    pub fn name(&self) -> &'static str {
        match self {
            ControlAction::AddQuestions(_) => "add",
            ControlAction::Start => "start",
            ControlAction::Reveal => "reveal",
            ControlAction::Next => "next",
            ControlAction::End => "end",
            ControlAction::Clear => "clear",
            ControlAction::SetAnimation(_) => "style",
        }
    }
}

/// Whether `action` produces an effect in `state`
pub fn is_enabled(state: &QuizState, action: &ControlAction) -> bool {
    match action {
        ControlAction::AddQuestions(questions) => !questions.is_empty(),
        ControlAction::Start => {
            matches!(state.status, SessionStatus::Waiting | SessionStatus::Idle)
                && state.has_questions()
        }
        ControlAction::Reveal => state.status == SessionStatus::ShowingQuestion,
        ControlAction::Next => state.status == SessionStatus::RevealingAnswer,
        ControlAction::End | ControlAction::Clear | ControlAction::SetAnimation(_) => true,
    }
}

/// Plan the patch for `action`, or `None` when it is disabled
pub fn plan(state: &QuizState, action: ControlAction) -> Option<QuizPatch> {
    if !is_enabled(state, &action) {
        return None;
    }

    let patch = match action {
        ControlAction::AddQuestions(new_questions) => {
            let mut questions = state.questions.clone();
            questions.extend(new_questions);
            let status = if state.status == SessionStatus::Idle {
                SessionStatus::Waiting
            } else {
                state.status
            };
            QuizPatch::new()
                .questions(questions)
                .index(state.current_question_index)
                .status(status)
        }
        ControlAction::Start => QuizPatch::new()
            .index(0)
            .status(SessionStatus::ShowingQuestion),
        ControlAction::Reveal => QuizPatch::new().status(SessionStatus::RevealingAnswer),
        ControlAction::Next => {
            if state.is_last_question() {
                QuizPatch::new().status(SessionStatus::GameOver)
            } else {
                QuizPatch::new()
                    .index(state.current_question_index + 1)
                    .status(SessionStatus::ShowingQuestion)
            }
        }
        ControlAction::End => QuizPatch::new().status(SessionStatus::GameOver),
        ControlAction::Clear => QuizPatch::new()
            .questions(Vec::new())
            .index(NO_QUESTION)
            .status(SessionStatus::Idle),
        ControlAction::SetAnimation(style) => QuizPatch::new().animation_style(style),
    };

    Some(patch)
}

/// Restore joint consistency of index and status after a merge.
///
/// Returns true if anything was changed.
pub fn reconcile(state: &mut QuizState) -> bool {
    let before = (state.current_question_index, state.status);

    let len = state.questions.len() as i32;
    if state.current_question_index < NO_QUESTION || state.current_question_index >= len {
        state.current_question_index = NO_QUESTION;
    }

    if state.status.needs_question() && state.current_question().is_none() {
        state.status = if state.has_questions() {
            SessionStatus::Waiting
        } else {
            SessionStatus::Idle
        };
    }

    if state.status == SessionStatus::Idle && state.has_questions() {
        state.status = SessionStatus::Waiting;
    }

    before != (state.current_question_index, state.status)
}
