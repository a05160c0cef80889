use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
}

impl ResponseFormat {
    pub fn json_object() -> Self {
        Self {
            format_type: "json_object".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_completion_tokens: u32,
    pub response_format: ResponseFormat,
    pub temperature: f32,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponseMessage {
    pub content: Option<String>,
}

/// Result of one POST to the completion endpoint. Absent status and body
/// mean the request never produced an HTTP response (timeout, connection
/// failure); a present status with an error means an HTTP-level failure.
#[derive(Debug, Clone, Default)]
pub struct InvocationOutcome {
    pub status: Option<u16>,
    pub body: Option<String>,
    pub error: Option<String>,
}

impl InvocationOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self.status, Some(status) if (200..300).contains(&status))
            && self.body.as_deref().is_some_and(|body| !body.is_empty())
    }
}
