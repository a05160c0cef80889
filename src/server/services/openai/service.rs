use std::{sync::Arc, time::Duration};

use reqwest::Client;
use thiserror::Error;
use tracing::{info, warn};

use super::normalizer::normalize_qa_responses;
use super::parser::{parse_any, ParseError};
use super::types::{ChatMessage, ChatRequest, ChatResponse, InvocationOutcome, ResponseFormat};
use crate::server::config::QaConfig;
use crate::server::services::qa::prompt::format_qa_prompt;
use crate::server::services::qa::types::QaAnswer;

const MAX_PROMPT_CHARS: usize = 120_000;
const TIMEOUT_MESSAGE: &str = "Request timeout";
const SYSTEM_PROMPT: &str =
    "Eres un experto en análisis de contratos. Responde ÚNICAMENTE con JSON válido.";

/// Invocation failure surfaced after the fallback model has also been tried.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("OpenAI API error: Request timeout")]
    Timeout,
    #[error("OpenAI API error: {0}")]
    Api(String),
}

/// Why a single model attempt failed. Decides both whether the fallback
/// runs and which error is ultimately surfaced.
#[derive(Debug, Error)]
enum AttemptFailure {
    #[error("{message}")]
    Transport { message: String, timeout: bool },
    #[error("{message}")]
    Http { status: u16, message: String },
    #[error("no message content in completion response")]
    MissingContent,
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl AttemptFailure {
    /// The surfaced error always reflects the primary attempt: its
    /// transport/HTTP message when there was one, a generic message when the
    /// failure happened after a successful HTTP exchange.
    fn into_model_error(self) -> ModelError {
        match self {
            AttemptFailure::Transport { timeout: true, .. } => ModelError::Timeout,
            AttemptFailure::Transport { message, .. } => ModelError::Api(message),
            AttemptFailure::Http { message, .. } => ModelError::Api(message),
            AttemptFailure::MissingContent | AttemptFailure::Parse(_) => {
                ModelError::Api("Unknown API error".to_string())
            }
        }
    }
}

/// Client for an OpenAI-compatible chat-completion endpoint, with a
/// primary/fallback model strategy around tolerant response parsing.
#[derive(Debug, Clone)]
pub struct OpenAiService {
    client: Client,
    api_key: String,
    base_url: String,
    config: Arc<QaConfig>,
}

impl OpenAiService {
    pub fn new(api_key: String, config: Arc<QaConfig>) -> Self {
        let base_url = std::env::var("OPENAI_API_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        Self::with_base_url(api_key, base_url, config)
    }

    pub fn with_base_url(api_key: String, base_url: String, config: Arc<QaConfig>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
            config,
        }
    }

    /// Answers `questions` about `contract_text`. Tries the configured
    /// default model first; on any failure (transport, HTTP, empty or
    /// unparseable output) retries once with the fallback model when it is
    /// distinct. Returns normalized answers aligned with the question list.
    pub async fn run_qa(
        &self,
        contract_text: &str,
        questions: &[String],
        include_reasoning: bool,
    ) -> Result<Vec<QaAnswer>, ModelError> {
        let prompt = self.trim_prompt(format_qa_prompt(contract_text, questions, include_reasoning));

        let primary_model = &self.config.default_model;
        info!(model = %primary_model, question_count = questions.len(), "running contract QA");

        let primary_failure = match self
            .qa_attempt(&prompt, primary_model, questions, include_reasoning)
            .await
        {
            Ok(answers) => {
                info!(model = %primary_model, answer_count = answers.len(), "contract QA succeeded");
                return Ok(answers);
            }
            Err(failure) => {
                warn!(model = %primary_model, error = %failure, "primary model attempt failed");
                failure
            }
        };

        let fallback_model = &self.config.fallback_model;
        if !fallback_model.is_empty() && fallback_model != primary_model {
            info!(model = %fallback_model, "retrying with fallback model");
            match self
                .qa_attempt(&prompt, fallback_model, questions, include_reasoning)
                .await
            {
                Ok(answers) => {
                    info!(model = %fallback_model, answer_count = answers.len(), "fallback model succeeded");
                    return Ok(answers);
                }
                Err(failure) => {
                    warn!(model = %fallback_model, error = %failure, "fallback model attempt failed");
                }
            }
        }

        Err(primary_failure.into_model_error())
    }

    async fn qa_attempt(
        &self,
        prompt: &str,
        model: &str,
        questions: &[String],
        include_reasoning: bool,
    ) -> Result<Vec<QaAnswer>, AttemptFailure> {
        let body = self.build_chat_body(prompt, model);
        let outcome = self.post_chat(&body).await;

        if !outcome.is_ok() {
            return Err(match outcome.status {
                Some(status) => AttemptFailure::Http {
                    status,
                    message: outcome.error.unwrap_or_else(|| format!("HTTP {status}")),
                },
                None => {
                    let message = outcome
                        .error
                        .unwrap_or_else(|| "Unknown transport error".to_string());
                    AttemptFailure::Transport {
                        timeout: message == TIMEOUT_MESSAGE,
                        message,
                    }
                }
            });
        }

        let raw = outcome.body.unwrap_or_default();
        let content = extract_message_content(&raw).ok_or(AttemptFailure::MissingContent)?;
        let parsed = parse_any(&content)?;
        Ok(normalize_qa_responses(&parsed, questions, include_reasoning))
    }

    fn build_chat_body(&self, prompt: &str, model: &str) -> ChatRequest {
        ChatRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            max_completion_tokens: self.config.max_output_tokens,
            response_format: ResponseFormat::json_object(),
            // Low temperature keeps repeated runs over the same contract consistent.
            temperature: 0.1,
        }
    }

    /// One POST to the completion endpoint. Transport problems never become
    /// an Err here; they are encoded in the outcome so the caller can decide
    /// on the fallback attempt.
    async fn post_chat(&self, body: &ChatRequest) -> InvocationOutcome {
        let result = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.api_key),
            )
            .timeout(Duration::from_secs(self.config.openai_timeout_secs))
            .json(body)
            .send()
            .await;

        match result {
            Ok(response) => {
                let status = response.status().as_u16();
                let error = (!(200..300).contains(&status)).then(|| format!("HTTP {status}"));
                match response.text().await {
                    Ok(text) => InvocationOutcome {
                        status: Some(status),
                        body: Some(text),
                        error,
                    },
                    Err(e) => InvocationOutcome {
                        status: Some(status),
                        body: None,
                        error: Some(e.to_string()),
                    },
                }
            }
            Err(e) if e.is_timeout() => InvocationOutcome {
                status: None,
                body: None,
                error: Some(TIMEOUT_MESSAGE.to_string()),
            },
            Err(e) => InvocationOutcome {
                status: None,
                body: None,
                error: Some(e.to_string()),
            },
        }
    }

    fn trim_prompt(&self, prompt: String) -> String {
        let length = prompt.chars().count();
        if length <= MAX_PROMPT_CHARS {
            return prompt;
        }
        warn!(original_chars = length, max_chars = MAX_PROMPT_CHARS, "prompt truncated");
        prompt.chars().take(MAX_PROMPT_CHARS).collect()
    }
}

fn extract_message_content(raw: &str) -> Option<String> {
    serde_json::from_str::<ChatResponse>(raw)
        .ok()?
        .choices
        .into_iter()
        .next()?
        .message
        .content
        .filter(|content| !content.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service() -> OpenAiService {
        OpenAiService::with_base_url(
            "test-key".to_string(),
            "http://localhost:0/v1".to_string(),
            Arc::new(QaConfig::default()),
        )
    }

    #[test]
    fn chat_body_pins_json_output_and_temperature() {
        let body = service().build_chat_body("hola", "gpt-4o-mini");
        assert_eq!(body.model, "gpt-4o-mini");
        assert_eq!(body.messages.len(), 2);
        assert_eq!(body.messages[0].role, "system");
        assert!(body.messages[0].content.contains("JSON válido"));
        assert_eq!(body.messages[1].content, "hola");
        assert_eq!(body.response_format.format_type, "json_object");
        assert_eq!(body.temperature, 0.1);
        assert_eq!(body.max_completion_tokens, 4096);
    }

    #[test]
    fn long_prompts_are_truncated_to_the_budget() {
        let trimmed = service().trim_prompt("x".repeat(MAX_PROMPT_CHARS + 10));
        assert_eq!(trimmed.chars().count(), MAX_PROMPT_CHARS);

        let untouched = service().trim_prompt("corto".to_string());
        assert_eq!(untouched, "corto");
    }

    #[test]
    fn extracts_first_choice_content() {
        let raw = json!({
            "choices": [
                {"message": {"content": "{\"qa_resultados\": []}"}},
                {"message": {"content": "segundo"}}
            ]
        })
        .to_string();
        assert_eq!(
            extract_message_content(&raw).as_deref(),
            Some("{\"qa_resultados\": []}")
        );
    }

    #[test]
    fn missing_or_empty_content_is_none() {
        assert!(extract_message_content("{}").is_none());
        assert!(extract_message_content("not json").is_none());
        let empty = json!({"choices": [{"message": {"content": ""}}]}).to_string();
        assert!(extract_message_content(&empty).is_none());
        let null = json!({"choices": [{"message": {"content": null}}]}).to_string();
        assert!(extract_message_content(&null).is_none());
    }

    #[test]
    fn parse_failures_surface_as_unknown_api_error() {
        let failure = AttemptFailure::Parse(ParseError::Unparseable);
        match failure.into_model_error() {
            ModelError::Api(message) => assert_eq!(message, "Unknown API error"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn transport_timeout_maps_to_timeout_error() {
        let failure = AttemptFailure::Transport {
            message: TIMEOUT_MESSAGE.to_string(),
            timeout: true,
        };
        assert!(matches!(failure.into_model_error(), ModelError::Timeout));
    }
}
