use std::{sync::Arc, time::Instant};

use serde_json::Value;
use tracing::{error, info, warn};

use super::types::{DeliveryMode, ErrorCode, QaMetadata, QaResponse, QaSuccess};
use super::validator::QaValidator;
use crate::server::config::QaConfig;
use crate::server::services::openai::{ModelError, OpenAiService};
use crate::server::services::webhook::WebhookService;

/// Sequences one request through validation, model invocation and optional
/// webhook delivery, and assembles the response envelope. Holds no
/// per-request state.
pub struct QaController {
    config: Arc<QaConfig>,
    validator: QaValidator,
    openai: Arc<OpenAiService>,
    webhook: WebhookService,
}

impl QaController {
    pub fn new(config: Arc<QaConfig>, openai: Arc<OpenAiService>) -> Self {
        Self {
            validator: QaValidator::new(config.clone()),
            webhook: WebhookService::new(config.clone()),
            config,
            openai,
        }
    }

    /// Always returns a well-formed envelope; failures in validation or
    /// invocation become error envelopes, webhook failures are recorded in
    /// metadata only and never fail the request.
    pub async fn handle_request(&self, body: &Value) -> QaResponse {
        let started = Instant::now();
        let reference_id = body
            .get("reference_id")
            .and_then(Value::as_str)
            .map(String::from);

        let request = match self.validator.validate_request(body) {
            Ok(request) => request,
            Err(rejection) => {
                warn!(id = ?reference_id, error = %rejection, "request rejected");
                return QaResponse::failure(ErrorCode::BadRequest, rejection.detail, reference_id);
            }
        };

        info!(
            id = %request.reference_id,
            question_count = request.questions.len(),
            include_reasoning = request.include_reasoning,
            has_webhook = request.webhook_url.is_some(),
            "qa request accepted"
        );

        let answers = match self
            .openai
            .run_qa(&request.contract_text, &request.questions, request.include_reasoning)
            .await
        {
            Ok(answers) => answers,
            Err(failure) => {
                let latency_ms = started.elapsed().as_millis() as u64;
                error!(id = %request.reference_id, error = %failure, latency_ms, "contract QA failed");
                let code = match failure {
                    ModelError::Timeout => ErrorCode::Timeout,
                    ModelError::Api(_) => ErrorCode::ModelError,
                };
                return QaResponse::failure(code, failure.to_string(), Some(request.reference_id));
            }
        };

        // Latency covers validation through answer normalization; webhook
        // delivery is excluded in both modes.
        let latency_ms = started.elapsed().as_millis() as u64;

        let mut success = QaSuccess {
            success: true,
            reference_id: request.reference_id.clone(),
            answers,
            metadata: QaMetadata {
                model: self.config.default_model.clone(),
                latency_ms,
                mode: DeliveryMode::Sync,
                webhook_fired: false,
            },
        };

        if let Some(url) = &request.webhook_url {
            // The delivered payload is snapshotted before the metadata
            // update, so the webhook body always reads webhook_disparado:
            // false / modo: "sync".
            match serde_json::to_value(&success) {
                Ok(payload) => {
                    if self.config.webhook_async_mode {
                        self.webhook.send_detached(url.clone(), payload);
                        success.metadata.webhook_fired = true;
                        success.metadata.mode = DeliveryMode::Async;
                        info!(id = %request.reference_id, url = %url, "webhook dispatched detached");
                    } else {
                        match self.webhook.send(url, &payload).await {
                            Ok(()) => success.metadata.webhook_fired = true,
                            Err(failure) => {
                                warn!(id = %request.reference_id, error = %failure, "webhook delivery failed");
                            }
                        }
                    }
                }
                Err(failure) => {
                    warn!(id = %request.reference_id, error = %failure, "webhook payload serialization failed");
                }
            }
        }

        info!(
            id = %request.reference_id,
            answer_count = success.answers.len(),
            latency_ms,
            webhook_fired = success.metadata.webhook_fired,
            "qa request completed"
        );

        QaResponse::Success(success)
    }
}
