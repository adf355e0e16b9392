use crate::forms::{ContactSubmission, EmergencySubmission, FormKind, LeadForm, QuoteSubmission};
use crate::messages;
use crate::ratelimit::{RateLimitDecision, RateLimiter};
use crate::webhook::{WebhookApi, WebhookClient};
use anyhow::Result;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Map, Value};
use std::{net::SocketAddr, sync::Arc};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{debug, error, info, warn};

const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub webhook: Arc<dyn WebhookApi>,
    pub limiter: Arc<RateLimiter>,
}

pub async fn run_server() -> Result<()> {
    let webhook: Arc<dyn WebhookApi> = Arc::new(WebhookClient::from_env()?);
    let state = AppState {
        webhook,
        limiter: Arc::new(RateLimiter::new()),
    };

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 8090));
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/contact", post(contact_handler))
        .route("/api/quote", post(quote_handler))
        .route("/api/emergency", post(emergency_handler))
        .route("/health", get(health))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn contact_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle_submission::<ContactSubmission>(&state, &headers, &body).await
}

async fn quote_handler(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    handle_submission::<QuoteSubmission>(&state, &headers, &body).await
}

async fn emergency_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle_submission::<EmergencySubmission>(&state, &headers, &body).await
}

/// Linear per-request pipeline: rate-limit gate, parse, validate, honeypot
/// gate, webhook delivery. No retries; every rejection carries a localized
/// message the form can display as-is.
async fn handle_submission<F: LeadForm>(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Response {
    let kind = F::KIND;
    let ip = extract_ip(headers);

    let decision = state.limiter.check(&ip, kind).await;
    if !decision.allowed {
        warn!("Rate limit exceeded for {} on {} form", ip, kind.as_str());
        return rate_limited_response(kind, decision);
    }

    let form: F = match serde_json::from_slice(body) {
        Ok(form) => form,
        Err(e) => {
            warn!(
                "Rejecting {} submission: invalid JSON body: {}",
                kind.as_str(),
                e
            );
            return error_response(StatusCode::BAD_REQUEST, messages::MALFORMED_REQUEST);
        }
    };

    if let Err(report) = form.validate() {
        // Field detail stays in the log; the client gets the generic message.
        debug!(
            "Validation failed for {} submission: {}",
            kind.as_str(),
            report
        );
        return error_response(StatusCode::BAD_REQUEST, messages::INVALID_FORM_DATA);
    }

    if !form.honeypot().is_empty() {
        warn!("Honeypot tripped on {} form from {}", kind.as_str(), ip);
        return error_response(StatusCode::BAD_REQUEST, messages::SPAM_REJECTED);
    }

    let result = state.webhook.deliver(kind, form.webhook_payload()).await;
    if !result.success {
        error!(
            "Webhook delivery failed for {} submission: {}",
            kind.as_str(),
            result.error.as_deref().unwrap_or("unknown error")
        );
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &messages::delivery_failed(),
        );
    }

    info!(
        "Forwarded {} lead (id: {})",
        kind.as_str(),
        result.lead_id.as_deref().unwrap_or("-")
    );
    let mut payload = Map::new();
    payload.insert("success".to_string(), Value::Bool(true));
    payload.insert(
        "message".to_string(),
        Value::String(messages::confirmation(kind)),
    );
    if let Some(lead_id) = result.lead_id {
        payload.insert("leadId".to_string(), Value::String(lead_id));
    }
    (StatusCode::OK, Json(Value::Object(payload))).into_response()
}

fn error_response(status: StatusCode, error: &str) -> Response {
    (status, Json(json!({ "success": false, "error": error }))).into_response()
}

fn rate_limited_response(kind: FormKind, decision: RateLimitDecision) -> Response {
    let headers = [
        (header::RETRY_AFTER, decision.reset_in.to_string()),
        (
            HeaderName::from_static("x-ratelimit-remaining"),
            "0".to_string(),
        ),
        (
            HeaderName::from_static("x-ratelimit-reset"),
            decision.reset_at.to_string(),
        ),
    ];
    (
        StatusCode::TOO_MANY_REQUESTS,
        headers,
        Json(json!({
            "success": false,
            "error": messages::rate_limited(kind, decision.reset_in)
        })),
    )
        .into_response()
}

fn extract_ip(headers: &HeaderMap) -> String {
    headers
        .get("cf-connecting-ip")
        .or_else(|| headers.get("x-real-ip"))
        .or_else(|| headers.get("x-forwarded-for"))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        term.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
