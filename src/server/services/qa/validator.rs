use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use super::types::ValidRequest;
use crate::server::config::QaConfig;
use crate::server::services::webhook::validate_webhook_url;

/// A request rejected by validation. Always surfaced to callers as
/// BAD_REQUEST with the detail naming the offending field.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{detail}")]
pub struct ValidationError {
    pub detail: String,
}

impl ValidationError {
    fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// Structural and semantic checks on the inbound request body, applied in a
/// fixed order and short-circuiting on the first failure. Pure: no I/O, no
/// caching, no partial results.
#[derive(Debug, Clone)]
pub struct QaValidator {
    config: Arc<QaConfig>,
}

impl QaValidator {
    pub fn new(config: Arc<QaConfig>) -> Self {
        Self { config }
    }

    pub fn validate_request(&self, body: &Value) -> Result<ValidRequest, ValidationError> {
        let object = body
            .as_object()
            .ok_or_else(|| ValidationError::new("Request body must be a JSON object"))?;

        for field in ["texto_contrato", "reference_id", "qa"] {
            if !object.contains_key(field) {
                return Err(ValidationError::new(format!("Missing required field: {field}")));
            }
        }

        let contract_text = object
            .get("texto_contrato")
            .and_then(Value::as_str)
            .filter(|text| text.trim().chars().count() >= self.config.min_contract_chars)
            .ok_or_else(|| {
                ValidationError::new(format!(
                    "texto_contrato must be a string with at least {} characters",
                    self.config.min_contract_chars
                ))
            })?;

        let reference_id = object
            .get("reference_id")
            .and_then(Value::as_str)
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ValidationError::new("reference_id must be a non-empty string"))?;

        let qa_section = object
            .get("qa")
            .and_then(Value::as_object)
            .ok_or_else(|| ValidationError::new("qa section must be an object"))?;

        let questions = qa_section
            .get("preguntas")
            .and_then(Value::as_array)
            .ok_or_else(|| ValidationError::new("preguntas must be an array"))?;

        if questions.is_empty() {
            return Err(ValidationError::new("preguntas array cannot be empty"));
        }
        if questions.len() > self.config.max_questions {
            return Err(ValidationError::new(format!(
                "Maximum {} preguntas allowed",
                self.config.max_questions
            )));
        }

        let mut validated_questions = Vec::with_capacity(questions.len());
        for (index, question) in questions.iter().enumerate() {
            let position = index + 1;
            let text = question
                .as_str()
                .ok_or_else(|| ValidationError::new(format!("pregunta {position} must be a string")))?;
            if text.trim().is_empty() {
                return Err(ValidationError::new(format!("pregunta {position} cannot be empty")));
            }
            if text.chars().count() > self.config.max_question_chars {
                return Err(ValidationError::new(format!(
                    "pregunta {position} exceeds maximum length of {} characters",
                    self.config.max_question_chars
                )));
            }
            validated_questions.push(text.to_string());
        }

        let webhook_url = match qa_section.get("webhook_url") {
            None | Some(Value::Null) => None,
            Some(value) => {
                let url = value
                    .as_str()
                    .ok_or_else(|| ValidationError::new("webhook_url must be a string"))?;
                validate_webhook_url(url, &self.config).map_err(|reason| {
                    ValidationError::new(format!("Invalid webhook_url: {reason}"))
                })?;
                Some(url.to_string())
            }
        };

        let include_reasoning = match qa_section.get("incluir_razonamiento") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(flag)) => *flag,
            Some(_) => {
                return Err(ValidationError::new("incluir_razonamiento must be a boolean"));
            }
        };

        Ok(ValidRequest {
            contract_text: contract_text.to_string(),
            reference_id: reference_id.to_string(),
            questions: validated_questions,
            webhook_url,
            include_reasoning,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validator() -> QaValidator {
        QaValidator::new(Arc::new(QaConfig::default()))
    }

    fn valid_body() -> Value {
        json!({
            "texto_contrato": "x".repeat(200),
            "reference_id": "ref-001",
            "qa": {
                "preguntas": ["¿Cuál es el objeto del contrato?"]
            }
        })
    }

    #[test]
    fn accepts_minimal_valid_request() {
        let request = validator().validate_request(&valid_body()).unwrap();
        assert_eq!(request.reference_id, "ref-001");
        assert_eq!(request.questions.len(), 1);
        assert!(request.webhook_url.is_none());
        assert!(!request.include_reasoning);
    }

    #[test]
    fn rejects_non_object_body() {
        let err = validator().validate_request(&json!("nope")).unwrap_err();
        assert_eq!(err.detail, "Request body must be a JSON object");
    }

    #[test]
    fn rejects_missing_fields_in_order() {
        let err = validator().validate_request(&json!({})).unwrap_err();
        assert_eq!(err.detail, "Missing required field: texto_contrato");

        let err = validator()
            .validate_request(&json!({"texto_contrato": "x"}))
            .unwrap_err();
        assert_eq!(err.detail, "Missing required field: reference_id");

        let err = validator()
            .validate_request(&json!({"texto_contrato": "x", "reference_id": "r"}))
            .unwrap_err();
        assert_eq!(err.detail, "Missing required field: qa");
    }

    #[test]
    fn contract_length_boundary_is_exact() {
        let mut body = valid_body();
        body["texto_contrato"] = json!("x".repeat(99));
        let err = validator().validate_request(&body).unwrap_err();
        assert!(err.detail.contains("texto_contrato"));

        body["texto_contrato"] = json!("x".repeat(100));
        assert!(validator().validate_request(&body).is_ok());
    }

    #[test]
    fn contract_length_is_measured_after_trimming() {
        let mut body = valid_body();
        let padded = format!("  {}  ", "x".repeat(99));
        body["texto_contrato"] = json!(padded);
        assert!(validator().validate_request(&body).is_err());
    }

    #[test]
    fn rejects_blank_reference_id() {
        let mut body = valid_body();
        body["reference_id"] = json!("   ");
        let err = validator().validate_request(&body).unwrap_err();
        assert_eq!(err.detail, "reference_id must be a non-empty string");
    }

    #[test]
    fn rejects_empty_question_list() {
        let mut body = valid_body();
        body["qa"]["preguntas"] = json!([]);
        let err = validator().validate_request(&body).unwrap_err();
        assert_eq!(err.detail, "preguntas array cannot be empty");
    }

    #[test]
    fn rejects_too_many_questions() {
        let mut body = valid_body();
        let questions: Vec<String> = (0..51).map(|i| format!("pregunta {i}")).collect();
        body["qa"]["preguntas"] = json!(questions);
        let err = validator().validate_request(&body).unwrap_err();
        assert_eq!(err.detail, "Maximum 50 preguntas allowed");
    }

    #[test]
    fn rejects_overlong_question_with_position() {
        let mut body = valid_body();
        body["qa"]["preguntas"] = json!(["ok", "y".repeat(301)]);
        let err = validator().validate_request(&body).unwrap_err();
        assert_eq!(
            err.detail,
            "pregunta 2 exceeds maximum length of 300 characters"
        );
    }

    #[test]
    fn rejects_non_string_question() {
        let mut body = valid_body();
        body["qa"]["preguntas"] = json!([42]);
        let err = validator().validate_request(&body).unwrap_err();
        assert_eq!(err.detail, "pregunta 1 must be a string");
    }

    #[test]
    fn rejects_ftp_webhook_url() {
        let mut body = valid_body();
        body["qa"]["webhook_url"] = json!("ftp://example.com/hook");
        let err = validator().validate_request(&body).unwrap_err();
        assert!(err.detail.starts_with("Invalid webhook_url:"));
    }

    #[test]
    fn rejects_non_string_webhook_url() {
        let mut body = valid_body();
        body["qa"]["webhook_url"] = json!(7);
        let err = validator().validate_request(&body).unwrap_err();
        assert_eq!(err.detail, "webhook_url must be a string");
    }

    #[test]
    fn enforces_https_only_mode() {
        let config = QaConfig {
            require_https_webhook: true,
            ..QaConfig::default()
        };
        let validator = QaValidator::new(Arc::new(config));
        let mut body = valid_body();
        body["qa"]["webhook_url"] = json!("http://example.com/hook");
        let err = validator.validate_request(&body).unwrap_err();
        assert!(err.detail.contains("HTTPS required"));
    }

    #[test]
    fn enforces_domain_allow_list() {
        let config = QaConfig {
            allowed_webhook_domains: vec!["example.com".to_string()],
            ..QaConfig::default()
        };
        let validator = QaValidator::new(Arc::new(config));

        let mut body = valid_body();
        body["qa"]["webhook_url"] = json!("https://hooks.example.com/hook");
        assert!(validator.validate_request(&body).is_ok());

        body["qa"]["webhook_url"] = json!("https://elsewhere.com/hook");
        assert!(validator.validate_request(&body).is_err());
    }

    #[test]
    fn rejects_non_boolean_reasoning_flag() {
        let mut body = valid_body();
        body["qa"]["incluir_razonamiento"] = json!("yes");
        let err = validator().validate_request(&body).unwrap_err();
        assert_eq!(err.detail, "incluir_razonamiento must be a boolean");
    }

    #[test]
    fn reasoning_flag_is_carried_through() {
        let mut body = valid_body();
        body["qa"]["incluir_razonamiento"] = json!(true);
        let request = validator().validate_request(&body).unwrap();
        assert!(request.include_reasoning);
    }
}
