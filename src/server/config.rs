use std::{env, str::FromStr, sync::Arc, time::Duration};

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use super::handlers::qa::{handle_qa, health};
use super::services::openai::OpenAiService;
use super::services::qa::QaController;

/// Runtime configuration, loaded once from the environment at startup.
/// Every field has a default so a bare environment still boots.
#[derive(Debug, Clone)]
pub struct QaConfig {
    // Validation limits
    pub max_questions: usize,
    pub max_question_chars: usize,
    pub min_contract_chars: usize,

    // Timeouts (seconds)
    pub openai_timeout_secs: u64,
    pub webhook_timeout_secs: u64,

    // Models
    pub default_model: String,
    pub fallback_model: String,
    pub max_output_tokens: u32,

    // Webhook delivery
    pub webhook_retry_attempts: u32,
    pub webhook_backoff_base: f64,
    pub webhook_async_mode: bool,
    pub require_https_webhook: bool,
    pub allowed_webhook_domains: Vec<String>,

    // CORS
    pub allowed_origin: String,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            max_questions: 50,
            max_question_chars: 300,
            min_contract_chars: 100,
            openai_timeout_secs: 60,
            webhook_timeout_secs: 30,
            default_model: "gpt-4o-mini".to_string(),
            fallback_model: "gpt-3.5-turbo".to_string(),
            max_output_tokens: 4096,
            webhook_retry_attempts: 3,
            webhook_backoff_base: 1.5,
            webhook_async_mode: false,
            require_https_webhook: false,
            allowed_webhook_domains: Vec::new(),
            allowed_origin: "*".to_string(),
        }
    }
}

impl QaConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_questions: env_parse("QA_MAX_PREGUNTAS", defaults.max_questions),
            max_question_chars: env_parse("QA_MAX_CHARS_PREGUNTA", defaults.max_question_chars),
            min_contract_chars: env_parse("QA_MIN_CHARS_CONTRATO", defaults.min_contract_chars),
            openai_timeout_secs: env_parse("OPENAI_TIMEOUT", defaults.openai_timeout_secs),
            webhook_timeout_secs: env_parse("WEBHOOK_TIMEOUT", defaults.webhook_timeout_secs),
            default_model: env::var("OPENAI_MODEL").unwrap_or(defaults.default_model),
            fallback_model: env::var("OPENAI_FALLBACK_MODEL").unwrap_or(defaults.fallback_model),
            max_output_tokens: env_parse("OPENAI_MAX_OUTPUT_TOKENS", defaults.max_output_tokens),
            webhook_retry_attempts: env_parse("WEBHOOK_RETRY_ATTEMPTS", defaults.webhook_retry_attempts),
            webhook_backoff_base: env_parse("WEBHOOK_BACKOFF_BASE", defaults.webhook_backoff_base),
            webhook_async_mode: env_flag("WEBHOOK_ASYNC_MODE", defaults.webhook_async_mode),
            require_https_webhook: env_flag("REQUIRE_HTTPS_WEBHOOK", defaults.require_https_webhook),
            allowed_webhook_domains: env_list("ALLOWED_WEBHOOK_DOMAINS"),
            allowed_origin: env::var("ALLOWED_ORIGIN").unwrap_or(defaults.allowed_origin),
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|raw| raw.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn env_list(key: &str) -> Vec<String> {
    env::var(key)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(String::from)
        .collect()
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<QaConfig>,
    pub controller: Arc<QaController>,
}

/// Builds the application router from the process environment.
pub fn configure_app() -> Router {
    let config = Arc::new(QaConfig::from_env());

    let openai_service = Arc::new(OpenAiService::new(
        env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY must be set"),
        config.clone(),
    ));

    let controller = Arc::new(QaController::new(config.clone(), openai_service));

    app_router(AppState { config, controller })
}

/// Router construction from an already-built state. Tests use this to inject
/// services pointed at mock servers.
pub fn app_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(health))
        .route("/qa", post(handle_qa))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(config: &QaConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(600));

    if config.allowed_origin == "*" {
        return layer.allow_origin(Any);
    }
    match config.allowed_origin.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => layer.allow_origin(Any),
    }
}
