use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use dress_designer::{
    config::Config,
    messages::{Locale, Message},
    openrouter::{ChatProvider, ChatRequest, ChatResponse, ProviderError},
    relay::RetryPolicy,
    routes::{router, AppState},
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

/// Replays queued outcomes and records each request it receives.
struct StubProvider {
    credential: bool,
    replies: Mutex<Vec<Result<ChatResponse, ProviderError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl StubProvider {
    fn new(replies: Vec<Result<ChatResponse, ProviderError>>) -> Arc<Self> {
        Arc::new(Self { credential: true, replies: Mutex::new(replies), requests: Mutex::new(Vec::new()) })
    }

    fn without_credential() -> Arc<Self> {
        Arc::new(Self { credential: false, replies: Mutex::new(Vec::new()), requests: Mutex::new(Vec::new()) })
    }

    fn calls(&self) -> usize { self.requests.lock().len() }
}

#[async_trait]
impl ChatProvider for StubProvider {
    fn has_credential(&self) -> bool { self.credential }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        self.requests.lock().push(request.clone());
        let mut replies = self.replies.lock();
        if replies.is_empty() {
            return Err(ProviderError::Http("no reply queued".into()));
        }
        replies.remove(0)
    }
}

fn fast_config() -> Config {
    let policy = RetryPolicy::fixed(3, Duration::from_millis(5), Duration::from_secs(5));
    Config { api_key: Some("test-key".into()), enhance_retry: policy, image_retry: policy, ..Config::default() }
}

fn app(provider: Arc<StubProvider>) -> Router {
    router(AppState::new(fast_config(), provider))
}

async fn post(app: Router, uri: &str, body: Value) -> Response {
    app.oneshot(
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

async fn json_of(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn enhance_prompt_returns_provider_text_for_answers() {
    let provider = StubProvider::new(vec![Ok(ChatResponse::with_text("A flowing ivory lace gown..."))]);
    let answers = json!({
        "dressType": "wedding",
        "dressLength": "floor",
        "fabricType": "lace",
        "primaryColor": "ivory",
        "embellishments": ["beads"],
        "embellishmentPlacement": "bodice",
    });

    let response = post(app(provider.clone()), "/api/enhance-prompt", json!({ "questionnaireAnswers": answers })).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_of(response).await, json!({ "enhancedPrompt": "A flowing ivory lace gown..." }));
    let sent = provider.requests.lock()[0].prompt_text().unwrap_or_default().to_string();
    assert!(sent.contains("**Primary Color:** ivory"));
    assert!(sent.contains("beads - Placement: bodice"));
}

#[tokio::test]
async fn enhance_prompt_without_input_is_bad_request() {
    let provider = StubProvider::new(vec![]);
    let response = post(app(provider.clone()), "/api/enhance-prompt", json!({ "description": "   " })).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_of(response).await["error"], Message::MissingDescription.text(Locale::En));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn generate_image_returns_image_data() {
    let provider = StubProvider::new(vec![Ok(ChatResponse::with_image("data:image/png;base64,iVBORw0KGgo="))]);

    let response = post(app(provider.clone()), "/api/generate-image", json!({ "prompt": "A flowing ivory lace gown" })).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_of(response).await, json!({ "imageData": "data:image/png;base64,iVBORw0KGgo=" }));
    assert!(!provider.requests.lock()[0].has_image_attachment());
}

#[tokio::test]
async fn empty_prompt_never_reaches_provider() {
    let provider = StubProvider::new(vec![]);
    let response = post(app(provider.clone()), "/api/generate-image", json!({ "prompt": "" })).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn missing_credential_is_server_error_without_network_call() {
    let provider = StubProvider::without_credential();
    let response = post(app(provider.clone()), "/api/generate-image", json!({ "prompt": "A flowing ivory lace gown" })).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_of(response).await, json!({ "error": Message::MissingApiKey.text(Locale::En) }));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn edit_design_rejects_non_data_url() {
    let provider = StubProvider::new(vec![]);
    let response = post(
        app(provider.clone()),
        "/api/edit-design",
        json!({ "originalImageUrl": "https://example.com/x.png", "editRequest": "add a belt" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn edit_design_with_data_url_reaches_provider() {
    let provider = StubProvider::new(vec![Ok(ChatResponse::with_image("data:image/png;base64,QUJD"))]);
    let response = post(
        app(provider.clone()),
        "/api/edit-design",
        json!({ "originalImageUrl": "data:image/png;base64,AAAA", "editRequest": "add a belt" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(provider.calls(), 1);
    assert!(provider.requests.lock()[0].has_image_attachment());
}

#[tokio::test]
async fn busy_upstream_exhausts_retries_with_localized_message() {
    let busy = || Err(ProviderError::Status { status: reqwest::StatusCode::SERVICE_UNAVAILABLE, body: "overloaded".into() });
    let provider = StubProvider::new(vec![busy(), busy(), busy(), busy()]);

    let response = app(provider.clone())
        .oneshot(
            Request::post("/api/generate-image")
                .header("content-type", "application/json")
                .header("accept-language", "ar-SY,ar;q=0.9")
                .body(Body::from(json!({ "prompt": "gown" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_of(response).await["error"], Message::ServiceBusyMinute.text(Locale::Ar));
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn health_reports_provider_configuration() {
    let response = app(StubProvider::without_credential())
        .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_of(response).await, json!({ "status": "ok", "providerConfigured": false }));
}

#[tokio::test]
async fn design_gallery_create_edit_list_delete() {
    let provider = StubProvider::new(vec![
        Ok(ChatResponse::with_text("An emerald party dress")),
        Ok(ChatResponse::with_image("data:image/png;base64,T05F")),
        Ok(ChatResponse::with_image("data:image/png;base64,VFdP")),
    ]);
    let app = app(provider.clone());

    let created = post(app.clone(), "/api/designs/alice", json!({ "questionnaireAnswers": { "dressType": "party", "primaryColor": "emerald" } })).await;
    assert_eq!(created.status(), StatusCode::OK);
    let created = json_of(created).await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["enhancedPrompt"], "An emerald party dress");

    let edited = post(app.clone(), &format!("/api/designs/alice/{id}/edit"), json!({ "editRequest": "shorter hem" })).await;
    assert_eq!(edited.status(), StatusCode::OK);
    assert_eq!(json_of(edited).await["enhancedPrompt"], "An emerald party dress\n\nEdit: shorter hem");

    let listed = app.clone().oneshot(Request::get("/api/designs/alice").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(json_of(listed).await.as_array().map(Vec::len), Some(2));

    let others = app.clone().oneshot(Request::get(format!("/api/designs/bob/{id}")).body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(others.status(), StatusCode::NOT_FOUND);

    let deleted = app.clone().oneshot(Request::delete(format!("/api/designs/alice/{id}")).body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
    let gone = app.oneshot(Request::get(format!("/api/designs/alice/{id}")).body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}
