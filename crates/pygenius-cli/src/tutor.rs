//! Client for the remote tutor: an OpenAI-compatible chat-completions
//! endpoint.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ToolingError;

/// Code context sent with a question is cut to this many characters.
pub const CODE_CONTEXT_LIMIT: usize = 1000;

const TUTOR_SYSTEM: &str = "You are a Python tutor. Be concise.";
const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 2000;

#[derive(Debug, Clone)]
pub struct TutorConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

/// What to ask the tutor about a whole snippet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Review {
    Explain,
    Bugs,
    Optimize,
}

impl Review {
    fn system(&self) -> &'static str {
        match self {
            Review::Explain => "Explain Python code clearly.",
            Review::Bugs => "Find bugs in Python code.",
            Review::Optimize => "Optimize Python code.",
        }
    }

    fn prompt(&self, code: &str) -> String {
        let task = match self {
            Review::Explain => "Explain",
            Review::Bugs => "Find bugs",
            Review::Optimize => "Optimize",
        };
        format!("{}:\n{}", task, code.trim())
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

pub struct TutorClient {
    http: reqwest::Client,
    config: TutorConfig,
}

impl TutorClient {
    pub fn new(config: TutorConfig) -> Result<Self, ToolingError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    /// Send one system + user exchange. Failures come back as text
    /// starting with `"Error: "`.
    pub async fn complete(&self, system: &str, user: &str) -> String {
        match self.request(system, user).await {
            Ok(content) => content,
            Err(err) => format!("Error: {}", err),
        }
    }

    /// Ask a free-form question, optionally about some code.
    pub async fn ask(&self, question: &str, code: &str) -> String {
        self.complete(TUTOR_SYSTEM, &question_prompt(question, code))
            .await
    }

    pub async fn review(&self, review: Review, code: &str) -> String {
        self.complete(review.system(), &review.prompt(code)).await
    }

    async fn request(&self, system: &str, user: &str) -> Result<String, ToolingError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(ToolingError::MissingApiKey)?;
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        debug!(%url, model = %self.config.model, "sending tutor request");
        let response = self
            .http
            .post(url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ToolingError::Status(status));
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(ToolingError::EmptyResponse)
    }
}

/// Build the user prompt for a question, truncating the code context.
pub fn question_prompt(question: &str, code: &str) -> String {
    let code: String = code.chars().take(CODE_CONTEXT_LIMIT).collect();
    format!("Q: {}\nCode: {}", question.trim(), code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config(api_key: Option<&str>) -> TutorConfig {
        TutorConfig {
            base_url: "http://127.0.0.1:9/v1".to_string(),
            api_key: api_key.map(str::to_string),
            model: "test-model".to_string(),
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_question_prompt_truncates_code() {
        let code = "x".repeat(1500);
        let prompt = question_prompt("  why?  ", &code);
        assert_eq!(prompt, format!("Q: why?\nCode: {}", "x".repeat(1000)));
    }

    #[test]
    fn test_review_prompts() {
        assert_eq!(Review::Bugs.prompt("\nx = 1\n"), "Find bugs:\nx = 1");
        assert_eq!(Review::Explain.system(), "Explain Python code clearly.");
    }

    #[test]
    fn test_request_body_shape() {
        let body = ChatRequest {
            model: "m",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["max_tokens"], 2000);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn test_missing_key_is_reported_as_text() {
        let client = TutorClient::new(config(None)).unwrap();
        assert_eq!(
            client.ask("what is a list?", "").await,
            "Error: API key is not configured (set API_KEY)"
        );
    }

    #[tokio::test]
    async fn test_transport_failure_is_reported_as_text() {
        let client = TutorClient::new(config(Some("key"))).unwrap();
        let reply = client.review(Review::Explain, "print(1)").await;
        assert!(reply.starts_with("Error: "), "got: {}", reply);
    }
}
