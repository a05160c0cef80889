use std::{sync::Arc, time::Duration};

use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::server::config::QaConfig;

const USER_AGENT: &str = "contract-qa-service/1.0";
const ERROR_BODY_LIMIT: usize = 500;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("{0}")]
    InvalidUrl(String),
    #[error("{0}")]
    Delivery(String),
}

/// Checks a webhook URL against the configured delivery policy: http/https
/// scheme, optional HTTPS requirement, optional domain allow-list (exact
/// hostname or subdomain, case-insensitive). Used at request validation time
/// and again right before delivery.
pub fn validate_webhook_url(url: &str, config: &QaConfig) -> Result<(), String> {
    let parsed = Url::parse(url).map_err(|e| format!("Invalid URL format: {e}"))?;

    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(format!("Invalid scheme: {scheme}. Only HTTP/HTTPS allowed."));
    }
    if config.require_https_webhook && scheme != "https" {
        return Err("HTTPS required for webhook URLs".to_string());
    }

    if !config.allowed_webhook_domains.is_empty() {
        let host = parsed
            .host_str()
            .ok_or_else(|| "Missing host in URL".to_string())?
            .to_ascii_lowercase();
        let allowed = config.allowed_webhook_domains.iter().any(|domain| {
            let domain = domain.to_ascii_lowercase();
            host == domain || host.ends_with(&format!(".{domain}"))
        });
        if !allowed {
            return Err(format!("Domain {host} not in allowed list"));
        }
    }

    Ok(())
}

/// Delivers response payloads to caller-supplied webhook endpoints with
/// bounded retries and exponential backoff. Stateless across calls.
#[derive(Debug, Clone)]
pub struct WebhookService {
    client: Client,
    config: Arc<QaConfig>,
}

impl WebhookService {
    pub fn new(config: Arc<QaConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Sends `payload` to `url`, retrying up to the configured attempt count.
    /// Before attempt k (k > 0) sleeps backoff_base^k seconds. Returns the
    /// last attempt's error when every attempt fails.
    pub async fn send(&self, url: &str, payload: &Value) -> Result<(), WebhookError> {
        if let Err(reason) = validate_webhook_url(url, &self.config) {
            warn!(url, error = %reason, "webhook url rejected before delivery");
            return Err(WebhookError::InvalidUrl(reason));
        }

        let attempts = self.config.webhook_retry_attempts;
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.config.webhook_backoff_base.powi(attempt as i32);
                info!(attempt = attempt + 1, delay_secs = delay, "retrying webhook delivery");
                if delay.is_finite() && delay > 0.0 {
                    tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                }
            }

            match self.post_once(url, payload).await {
                Ok(()) => {
                    info!(attempt = attempt + 1, "webhook delivered");
                    return Ok(());
                }
                Err(reason) => {
                    warn!(attempt = attempt + 1, error = %reason, "webhook attempt failed");
                    last_error = Some(reason);
                }
            }
        }

        let reason = last_error.unwrap_or_else(|| "webhook delivery failed".to_string());
        warn!(attempts, error = %reason, "webhook delivery gave up");
        Err(WebhookError::Delivery(reason))
    }

    /// Fire-and-forget delivery: spawns the retrying send on the runtime and
    /// returns immediately. The caller never observes the outcome; it is
    /// only logged.
    pub fn send_detached(&self, url: String, payload: Value) {
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.send(&url, &payload).await {
                warn!(url = %url, error = %e, "detached webhook delivery failed");
            }
        });
    }

    async fn post_once(&self, url: &str, payload: &Value) -> Result<(), String> {
        let response = self
            .client
            .post(url)
            .timeout(Duration::from_secs(self.config.webhook_timeout_secs))
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    "Request timeout".to_string()
                } else {
                    e.to_string()
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let truncated: String = body.chars().take(ERROR_BODY_LIMIT).collect();
        Err(format!("HTTP {}: {}", status.as_u16(), truncated))
    }
}
