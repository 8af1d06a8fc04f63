//! Gemini-backed question generator.
//!
//! Calls the `generateContent` REST endpoint with a JSON response schema and
//! parses the first candidate's text as an array of questions.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{GeneratedQuestion, GenerationError, QuestionGenerator};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

/// Configuration for the Gemini generator
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key sent as `x-goog-api-key`
    pub api_key: String,
    /// Model name, e.g. `gemini-3-flash-preview`
    pub model: String,
    /// API root without trailing slash
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Create from environment variables. `None` when no key is set.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty())?;

        let mut config = Self::new(api_key);
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            config.model = model;
        }
        if let Ok(base_url) = std::env::var("GEMINI_BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = std::env::var("GEMINI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }
        Some(config)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

/// Question generator calling the Gemini API
pub struct GeminiGenerator {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiGenerator {
    pub fn new(config: GeminiConfig) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        info!("Gemini generator configured with model {}", config.model);
        Ok(Self { client, config })
    }

    /// The key travels in a header so it never appears in the URL
    fn request(&self, topic: &str, count: usize) -> reqwest::RequestBuilder {
        self.client
            .post(self.config.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request_body(topic, count))
    }
}

#[async_trait]
impl QuestionGenerator for GeminiGenerator {
    async fn generate(
        &self,
        topic: &str,
        count: usize,
    ) -> Result<Vec<GeneratedQuestion>, GenerationError> {
        if topic.trim().is_empty() {
            return Err(GenerationError::EmptyTopic);
        }
        if count == 0 {
            return Err(GenerationError::ZeroCount);
        }

        debug!("Requesting {} questions about {:?}", count, topic);
        let response = self.request(topic, count).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Generator request failed with {}", status);
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: GenerateContentResponse = response.json().await?;
        parse_questions(body)
    }
}

fn prompt(topic: &str, count: usize) -> String {
    format!(
        "Generate {} high-quality quiz questions about: {}. Each question must have exactly 4 options and one correct answer.",
        count, topic
    )
}

fn request_body(topic: &str, count: usize) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": prompt(topic, count) }] }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "text": { "type": "STRING", "description": "The quiz question text." },
                        "options": {
                            "type": "ARRAY",
                            "items": { "type": "STRING" },
                            "description": "Array of exactly 4 options."
                        },
                        "correctAnswer": {
                            "type": "INTEGER",
                            "description": "The 0-based index of the correct answer."
                        },
                        "points": {
                            "type": "INTEGER",
                            "description": "Points for this question (e.g., 100, 200, 500)."
                        },
                        "timeLimit": { "type": "INTEGER", "description": "Seconds allowed to answer." }
                    },
                    "required": ["text", "options", "correctAnswer", "points", "timeLimit"]
                }
            }
        }
    })
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

fn parse_questions(
    response: GenerateContentResponse,
) -> Result<Vec<GeneratedQuestion>, GenerationError> {
    let text = response
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .find_map(|p| p.text)
        .ok_or(GenerationError::EmptyResponse)?;

    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(text: &str) -> GenerateContentResponse {
        serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": text }], "role": "model" } }]
        }))
        .unwrap()
    }

    #[test]
    fn test_request_body() {
        let body = request_body("Space Exploration", 5);
        let text = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(text.starts_with("Generate 5 high-quality quiz questions about: Space Exploration."));
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(
            body["generationConfig"]["responseSchema"]["items"]["required"][2],
            "correctAnswer"
        );
    }

    #[test]
    fn test_endpoint() {
        let config = GeminiConfig::new("key")
            .with_model("test-model")
            .with_base_url("http://localhost:9000/v1");
        assert_eq!(
            config.endpoint(),
            "http://localhost:9000/v1/models/test-model:generateContent"
        );
    }

    #[test]
    fn test_parse_questions() {
        let text = r#"[{"text":"Largest planet?","options":["Mars","Jupiter","Venus","Earth"],
            "correctAnswer":1,"points":100,"timeLimit":30}]"#;
        let questions = parse_questions(response(text)).unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].options[1], "Jupiter");
    }

    #[test]
    fn test_parse_garbage() {
        let err = parse_questions(response("Sure! Here are some questions")).unwrap_err();
        assert!(matches!(err, GenerationError::Parse(_)));
    }

    #[test]
    fn test_parse_no_candidates() {
        let empty: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            parse_questions(empty),
            Err(GenerationError::EmptyResponse)
        ));
    }

    #[test]
    fn test_api_key_sent_as_header() {
        let generator = GeminiGenerator::new(
            GeminiConfig::new("secret").with_base_url("http://localhost:9000/v1"),
        )
        .unwrap();
        let request = generator.request("Space", 3).build().unwrap();

        assert_eq!(request.headers()["x-goog-api-key"], "secret");
        assert!(request.url().query().is_none());
        assert!(!request.url().as_str().contains("secret"));
    }

    #[tokio::test]
    async fn test_zero_count_rejected_before_request() {
        let generator = GeminiGenerator::new(GeminiConfig::new("key")).unwrap();
        let err = generator.generate("Space", 0).await.unwrap_err();
        assert!(matches!(err, GenerationError::ZeroCount));
    }

    #[tokio::test]
    async fn test_empty_topic_rejected_before_request() {
        let generator = GeminiGenerator::new(GeminiConfig::new("key")).unwrap();
        let err = generator.generate("   ", 5).await.unwrap_err();
        assert!(matches!(err, GenerationError::EmptyTopic));
    }
}
