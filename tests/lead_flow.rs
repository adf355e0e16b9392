use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use leadlink::app::{build_router, AppState};
use leadlink::forms::FormKind;
use leadlink::ratelimit::RateLimiter;
use leadlink::webhook::{WebhookApi, WebhookResult};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;

struct FakeWebhook {
    result: WebhookResult,
    calls: Mutex<Vec<(FormKind, Value)>>,
}

#[async_trait::async_trait]
impl WebhookApi for FakeWebhook {
    async fn deliver(&self, kind: FormKind, payload: Value) -> WebhookResult {
        self.calls.lock().unwrap().push((kind, payload));
        self.result.clone()
    }
}

fn accepted_lead() -> WebhookResult {
    WebhookResult {
        success: true,
        lead_id: Some("LEAD-42".to_string()),
        error: None,
    }
}

fn failed_delivery() -> WebhookResult {
    WebhookResult {
        success: false,
        lead_id: None,
        error: Some("Webhook responded with status 500 Internal Server Error".to_string()),
    }
}

fn app_with(result: WebhookResult) -> (Router, Arc<FakeWebhook>) {
    let webhook = Arc::new(FakeWebhook {
        result,
        calls: Mutex::new(Vec::new()),
    });
    let state = AppState {
        webhook: webhook.clone(),
        limiter: Arc::new(RateLimiter::new()),
    };
    (build_router(state), webhook)
}

fn post_json(uri: &str, body: String) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .expect("failed to build request")
}

async fn body_json(res: Response<Body>) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn contact_body() -> Value {
    json!({
        "name": "Max Mustermann",
        "email": "max@example.com",
        "subject": "Terminanfrage",
        "message": "Bitte um Rückruf wegen Wartung der Heizung.",
        "gdprConsent": true
    })
}

fn quote_body() -> Value {
    json!({
        "name": "Erika Beispiel",
        "email": "erika@example.com",
        "phone": "0821 5550123",
        "postalCode": "86150",
        "city": "Augsburg",
        "serviceType": "waermepumpe",
        "gdprConsent": true,
        "honeypot": ""
    })
}

fn emergency_body() -> Value {
    json!({
        "name": "Max Mustermann",
        "phone": "0171 1234567",
        "address": "Musterstr. 1",
        "postalCode": "86399",
        "city": "Bobingen",
        "emergencyType": "rohrbruch",
        "description": "Wasser läuft aus der Wand",
        "gdprConsent": true,
        "honeypot": ""
    })
}

#[tokio::test]
async fn contact_submission_is_forwarded() {
    let (app, webhook) = app_with(accepted_lead());

    let res = app
        .oneshot(post_json("/api/contact", contact_body().to_string()))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["leadId"], "LEAD-42");
    assert!(body["message"].as_str().unwrap().contains("Vielen Dank"));

    let calls = webhook.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (kind, payload) = &calls[0];
    assert_eq!(*kind, FormKind::Contact);
    assert_eq!(payload["source"], "website");
    assert_eq!(payload["name"], "Max Mustermann");
    assert!(payload.get("honeypot").is_none());
}

#[tokio::test]
async fn emergency_submission_confirms_with_lead_id() {
    let (app, webhook) = app_with(accepted_lead());

    let res = app
        .oneshot(post_json("/api/emergency", emergency_body().to_string()))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["leadId"], "LEAD-42");
    assert!(body["message"].as_str().unwrap().contains("Notfallanfrage"));

    let calls = webhook.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (kind, payload) = &calls[0];
    assert_eq!(*kind, FormKind::Emergency);
    assert_eq!(payload["fullAddress"], "Musterstr. 1, 86399 Bobingen");
    assert_eq!(payload["emergencyType"], "rohrbruch");
}

#[tokio::test]
async fn invalid_postal_code_is_rejected_before_delivery() {
    let (app, webhook) = app_with(accepted_lead());

    let mut body = emergency_body();
    body["postalCode"] = json!("123");
    let res = app
        .oneshot(post_json("/api/emergency", body.to_string()))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = body_json(res).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Ungültige Formulardaten");
    assert!(webhook.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_consent_is_rejected() {
    let (app, webhook) = app_with(accepted_lead());

    let mut body = contact_body();
    body.as_object_mut().unwrap().remove("gdprConsent");
    let res = app
        .oneshot(post_json("/api/contact", body.to_string()))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = body_json(res).await;
    assert_eq!(body["error"], "Ungültige Formulardaten");
    assert!(webhook.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn filled_honeypot_short_circuits_without_delivery() {
    let (app, webhook) = app_with(accepted_lead());

    let mut body = contact_body();
    body["honeypot"] = json!("https://spam.example.com");
    let res = app
        .oneshot(post_json("/api/contact", body.to_string()))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = body_json(res).await;
    assert_eq!(body["error"], "Invalid submission");
    assert!(webhook.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_json_is_rejected() {
    let (app, webhook) = app_with(accepted_lead());

    let res = app
        .oneshot(post_json("/api/quote", "{not json".to_string()))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = body_json(res).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Ungültige Anfrage");
    assert!(webhook.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_service_type_is_rejected() {
    let (app, webhook) = app_with(accepted_lead());

    let mut body = quote_body();
    body["serviceType"] = json!("atomkraft");
    let res = app
        .oneshot(post_json("/api/quote", body.to_string()))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(webhook.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn webhook_failure_answers_with_hotline_fallback() {
    let (app, webhook) = app_with(failed_delivery());

    let res = app
        .oneshot(post_json("/api/emergency", emergency_body().to_string()))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(res).await;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("+49 8234 9665900"));
    // A single attempt was made, no retry.
    assert_eq!(webhook.calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn quote_form_is_rate_limited_after_budget() {
    let (app, webhook) = app_with(accepted_lead());

    for i in 0..20 {
        let res = app
            .clone()
            .oneshot(post_json("/api/quote", quote_body().to_string()))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK, "request {} should pass", i + 1);
    }

    let res = app
        .oneshot(post_json("/api/quote", quote_body().to_string()))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(res.headers().contains_key("retry-after"));
    assert_eq!(
        res.headers().get("x-ratelimit-remaining").unwrap(),
        "0"
    );
    assert!(res.headers().contains_key("x-ratelimit-reset"));
    let body = body_json(res).await;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("Minute"));

    // Only the 20 in-budget requests reached the webhook.
    assert_eq!(webhook.calls.lock().unwrap().len(), 20);
}

#[tokio::test]
async fn emergency_rate_limit_message_offers_the_hotline() {
    let (app, _webhook) = app_with(accepted_lead());

    for _ in 0..40 {
        let res = app
            .clone()
            .oneshot(post_json("/api/emergency", emergency_body().to_string()))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = app
        .oneshot(post_json("/api/emergency", emergency_body().to_string()))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = body_json(res).await;
    assert!(body["error"].as_str().unwrap().contains("+49 8234 9665900"));
}

#[tokio::test]
async fn health_endpoint_responds() {
    let (app, _webhook) = app_with(accepted_lead());
    let res = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}
