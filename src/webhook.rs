use anyhow::{Context, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use std::env;
use std::time::Duration;
use tracing::{debug, warn};

use crate::forms::FormKind;

/// Normalized outcome of a delivery attempt. Never persisted; the route
/// handler translates it straight into the HTTP response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default, alias = "leadId")]
    pub lead_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl WebhookResult {
    fn failure(error: String) -> Self {
        WebhookResult {
            success: false,
            lead_id: None,
            error: Some(error),
        }
    }
}

#[async_trait]
pub trait WebhookApi: Send + Sync {
    /// Single delivery attempt, no retry. Duplicate leads from blind retries
    /// are worse than a lost request the user can re-submit.
    async fn deliver(&self, kind: FormKind, payload: Value) -> WebhookResult;
}

#[derive(Debug, Clone)]
pub struct WebhookClient {
    client: Client,
    base_url: String,
    signing_secret: Option<String>,
}

impl WebhookClient {
    pub fn from_env() -> Result<Self> {
        let base_url = env::var("WEBHOOK_BASE_URL").context("WEBHOOK_BASE_URL not set")?;
        let signing_secret = env::var("WEBHOOK_SIGNING_SECRET")
            .ok()
            .filter(|s| !s.is_empty());
        if signing_secret.is_none() {
            warn!("WEBHOOK_SIGNING_SECRET not set - outbound webhooks will be unsigned");
        }
        let user_agent = format!("leadlink/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()
            .context("Failed to build webhook HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            signing_secret,
        })
    }

    fn endpoint(&self, kind: FormKind) -> String {
        let path = match kind {
            FormKind::Contact => "webhook/contact-form",
            FormKind::Quote => "webhook/quote-request",
            FormKind::Emergency => "webhook/emergency-request",
        };
        format!("{}/{}", self.base_url, path)
    }
}

/// HMAC-SHA256 over the request body, hex-encoded with a `sha256=` prefix.
pub fn sign_body(secret: &str, body: &[u8]) -> Option<String> {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return None;
    };
    mac.update(body);
    Some(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

#[async_trait]
impl WebhookApi for WebhookClient {
    async fn deliver(&self, kind: FormKind, payload: Value) -> WebhookResult {
        let url = self.endpoint(kind);
        // Serialize once so the signature covers the exact bytes sent.
        let body = payload.to_string();

        let mut request = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.clone());
        if let Some(secret) = &self.signing_secret {
            if let Some(signature) = sign_body(secret, body.as_bytes()) {
                request = request.header("X-Webhook-Signature", signature);
            }
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Webhook request for {} form failed: {}", kind.as_str(), e);
                return WebhookResult::failure(format!("Webhook request failed: {}", e));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                "Webhook for {} form responded with status {}: {}",
                kind.as_str(),
                status,
                body
            );
            return WebhookResult::failure(format!("Webhook responded with status {}", status));
        }

        match response.json::<WebhookResult>().await {
            Ok(result) => {
                debug!(
                    "Webhook for {} form accepted (lead id: {:?})",
                    kind.as_str(),
                    result.lead_id
                );
                result
            }
            Err(e) => WebhookResult::failure(format!("Invalid webhook response: {}", e)),
        }
    }
}
