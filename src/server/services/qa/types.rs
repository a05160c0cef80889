use serde::{Deserialize, Serialize};

/// Error codes surfaced in failure envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "BAD_REQUEST")]
    BadRequest,
    #[serde(rename = "TIMEOUT")]
    Timeout,
    #[serde(rename = "MODEL_ERROR")]
    ModelError,
    #[serde(rename = "WEBHOOK_ERROR")]
    WebhookError,
}

/// One normalized answer. Wire field names match the public contract,
/// which uses Spanish identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaAnswer {
    /// 1-based position of the question in the request.
    #[serde(rename = "pregunta_orden")]
    pub order: u32,
    #[serde(rename = "pregunta")]
    pub question: String,
    #[serde(rename = "respuesta")]
    pub answer: String,
    #[serde(rename = "confianza")]
    pub confidence: f64,
    #[serde(rename = "razonamiento", skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    Sync,
    Async,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaMetadata {
    #[serde(rename = "modelo")]
    pub model: String,
    #[serde(rename = "latencia_ms")]
    pub latency_ms: u64,
    #[serde(rename = "modo")]
    pub mode: DeliveryMode,
    #[serde(rename = "webhook_disparado")]
    pub webhook_fired: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaSuccess {
    pub success: bool,
    pub reference_id: String,
    #[serde(rename = "qa_resultados")]
    pub answers: Vec<QaAnswer>,
    #[serde(rename = "metadatos")]
    pub metadata: QaMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(rename = "codigo")]
    pub code: ErrorCode,
    #[serde(rename = "detalle")]
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaFailure {
    pub success: bool,
    pub reference_id: Option<String>,
    pub error: ErrorDetail,
}

/// Top-level response envelope. Serializes as either the success or the
/// failure shape with no wrapper tag.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum QaResponse {
    Success(QaSuccess),
    Failure(QaFailure),
}

impl QaResponse {
    pub fn failure(code: ErrorCode, detail: impl Into<String>, reference_id: Option<String>) -> Self {
        QaResponse::Failure(QaFailure {
            success: false,
            reference_id,
            error: ErrorDetail {
                code,
                detail: detail.into(),
            },
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, QaResponse::Success(_))
    }
}

/// A request that passed validation. Downstream code works from this,
/// never from the raw JSON body.
#[derive(Debug, Clone)]
pub struct ValidRequest {
    pub contract_text: String,
    pub reference_id: String,
    pub questions: Vec<String>,
    pub webhook_url: Option<String>,
    pub include_reasoning: bool,
}
