//! Question generation collaborator.
//!
//! The manager asks a generator for a batch of questions on a topic. The
//! generator is a black box behind [`QuestionGenerator`]; whatever it returns
//! is validated here before anything reaches the session, so a bad batch is
//! rejected whole.

mod gemini;

pub use gemini::{GeminiConfig, GeminiGenerator};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::quiz::{Question, OPTION_COUNT};

/// Questions requested when the operator does not say otherwise
pub const DEFAULT_COUNT: usize = 5;

/// Errors that can occur while generating questions
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Question generator is not configured")]
    Unavailable,

    #[error("Topic must not be empty")]
    EmptyTopic,

    #[error("At least one question must be requested")]
    ZeroCount,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Generator returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Generator returned no content")]
    EmptyResponse,

    #[error("Could not parse generated questions: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Expected {expected} questions, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Generated question {index} is invalid: {reason}")]
    Invalid { index: usize, reason: String },
}

/// A generated question as returned by the collaborator (no id yet)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuestion {
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    pub points: u32,
    pub time_limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl GeneratedQuestion {
    /// Check the record and admit it as a session question with a fresh id
    pub fn into_question(self, index: usize) -> Result<Question, GenerationError> {
        let invalid = |reason: &str| GenerationError::Invalid {
            index,
            reason: reason.to_string(),
        };

        let options: [String; OPTION_COUNT] = self
            .options
            .try_into()
            .map_err(|opts: Vec<String>| invalid(&format!("expected 4 options, got {}", opts.len())))?;

        let mut question = Question::new(self.text, options, self.correct_answer)
            .with_points(self.points)
            .with_time_limit(self.time_limit);
        question.category = self.category;
        match question.defect() {
            Some(reason) => Err(invalid(reason)),
            None => Ok(question),
        }
    }
}

/// Validate a whole batch; any bad record rejects the batch
pub fn admit_batch(
    batch: Vec<GeneratedQuestion>,
    expected: usize,
) -> Result<Vec<Question>, GenerationError> {
    if expected == 0 {
        return Err(GenerationError::ZeroCount);
    }
    if batch.len() != expected {
        return Err(GenerationError::CountMismatch {
            expected,
            actual: batch.len(),
        });
    }
    batch
        .into_iter()
        .enumerate()
        .map(|(index, generated)| generated.into_question(index))
        .collect()
}

/// External service producing quiz questions for a topic
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    /// Generate exactly `count` questions about `topic`
    async fn generate(&self, topic: &str, count: usize) -> Result<Vec<GeneratedQuestion>, GenerationError>;
}
