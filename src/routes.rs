use std::{any::Any, sync::Arc};

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any as AnyOrigin, CorsLayer},
};
use uuid::Uuid;

use crate::{
    config::Config,
    designs::{Design, DesignStore, LIST_LIMIT},
    messages::{Locale, Message},
    models::{
        AnswerAggregate, CreateDesignRequest, EditDesignRequest, EditStoredDesignRequest, EnhancePromptRequest,
        EnhancePromptResponse, GenerateImageRequest, ImageResponse,
    },
    openrouter::{preview, ChatProvider},
    pipeline::DesignPipeline,
    relay::{ApiError, RelayService},
    wizard::steps::{self, StepView, TOTAL_STEPS},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub relay: Arc<RelayService>,
    pub designs: Arc<DesignStore>,
    pub pipeline: DesignPipeline,
}

impl AppState {
    pub fn new(config: Config, provider: Arc<dyn ChatProvider>) -> Self {
        let relay = Arc::new(RelayService::new(&config, provider));
        let designs = Arc::new(DesignStore::new());
        let pipeline = DesignPipeline::new(relay.clone(), designs.clone());
        Self { config: Arc::new(config), relay, designs, pipeline }
    }

    fn locale(&self, headers: &HeaderMap) -> Locale {
        Locale::from_headers(headers, self.config.default_locale)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/enhance-prompt", post(enhance_prompt))
        .route("/api/generate-image", post(generate_image))
        .route("/api/edit-design", post(edit_design))
        .route("/api/questionnaire", get(questionnaire))
        .route("/api/questionnaire/:step", get(questionnaire_step))
        .route("/api/designs/:user_id", post(create_design).get(list_designs))
        .route("/api/designs/:user_id/:id", get(get_design).delete(delete_design))
        .route("/api/designs/:user_id/:id/edit", post(edit_stored_design))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(
            CorsLayer::new()
                .allow_origin(AnyOrigin)
                .allow_methods(AnyOrigin)
                .allow_headers(AnyOrigin)
        )
        .with_state(state)
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!("💥 Handler panicked: {}", detail);
    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
}

/// Unwraps a JSON body, turning axum's rejection into the `{ error }` envelope.
fn body<T>(payload: Result<Json<T>, JsonRejection>, locale: Locale) -> Result<T, ApiError> {
    payload.map(|Json(v)| v).map_err(|rejection| {
        tracing::warn!("❌ Rejected request body: {}", rejection.body_text());
        ApiError::new(StatusCode::BAD_REQUEST, Message::MalformedBody.text(locale))
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub status: &'static str,
    pub provider_configured: bool,
}

pub async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health { status: "ok", provider_configured: state.relay.provider_configured() })
}

pub async fn enhance_prompt(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<EnhancePromptRequest>, JsonRejection>,
) -> Result<Json<EnhancePromptResponse>, ApiError> {
    let locale = state.locale(&headers);
    let input = body(payload, locale)?;
    tracing::info!("📝 Enhance prompt request received");
    let enhanced_prompt = state.relay.enhance(&input).await.map_err(|e| e.to_api_error(locale))?;
    Ok(Json(EnhancePromptResponse { enhanced_prompt }))
}

pub async fn generate_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<GenerateImageRequest>, JsonRejection>,
) -> Result<Json<ImageResponse>, ApiError> {
    let locale = state.locale(&headers);
    let input = body(payload, locale)?;
    tracing::info!("🎨 Generate image request received (fabric image: {})", input.fabric_image.is_some());
    let image_data = state.relay.generate(&input).await.map_err(|e| e.to_api_error(locale))?;
    tracing::info!("✅ Image generated: {}", preview(&image_data));
    Ok(Json(ImageResponse { image_data }))
}

pub async fn edit_design(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<EditDesignRequest>, JsonRejection>,
) -> Result<Json<ImageResponse>, ApiError> {
    let locale = state.locale(&headers);
    let input = body(payload, locale)?;
    tracing::info!("✏️ Edit design request received: {}", input.edit_request);
    let image_data = state.relay.edit(&input).await.map_err(|e| e.to_api_error(locale))?;
    Ok(Json(ImageResponse { image_data }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Questionnaire {
    pub total_steps: usize,
    pub steps: Vec<StepView>,
}

pub async fn questionnaire() -> Json<Questionnaire> {
    let blank = AnswerAggregate::default();
    let steps = (1..=TOTAL_STEPS).filter_map(|n| steps::render(n, &blank)).collect();
    Json(Questionnaire { total_steps: TOTAL_STEPS, steps })
}

/// Out-of-range and non-numeric steps both answer 404 with the `{ error }` envelope.
pub async fn questionnaire_step(
    step: Result<Path<usize>, PathRejection>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<StepView>, ApiError> {
    step.ok()
        .and_then(|Path(n)| steps::render(n, &AnswerAggregate::default()))
        .map(Json)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, Message::StepNotFound.text(state.locale(&headers))))
}

pub async fn create_design(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateDesignRequest>, JsonRejection>,
) -> Result<Json<Design>, ApiError> {
    let locale = state.locale(&headers);
    let input = body(payload, locale)?;
    // Dropping the handler future (client went away) cancels the pipeline.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let design = state
        .pipeline
        .create(&user_id, &input.questionnaire_answers, &cancel)
        .await
        .map_err(|e| e.to_api_error(locale))?;
    tracing::info!("✅ Design {} created for user {}", design.id, user_id);
    Ok(Json(design))
}

pub async fn list_designs(Path(user_id): Path<String>, State(state): State<AppState>) -> Json<Vec<Design>> {
    Json(state.designs.list_for_user(&user_id, LIST_LIMIT))
}

pub async fn get_design(
    Path((user_id, id)): Path<(String, Uuid)>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Design>, ApiError> {
    state
        .designs
        .get(&user_id, id)
        .map(Json)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, Message::DesignNotFound.text(state.locale(&headers))))
}

pub async fn delete_design(
    Path((user_id, id)): Path<(String, Uuid)>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    if state.designs.delete(&user_id, id) {
        tracing::info!("🗑️ Deleted design {} for user {}", id, user_id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::new(StatusCode::NOT_FOUND, Message::DesignNotFound.text(state.locale(&headers))))
    }
}

pub async fn edit_stored_design(
    Path((user_id, id)): Path<(String, Uuid)>,
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<EditStoredDesignRequest>, JsonRejection>,
) -> Result<Json<Design>, ApiError> {
    let locale = state.locale(&headers);
    let input = body(payload, locale)?;
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let design = state
        .pipeline
        .edit(&user_id, id, &input.edit_request, &cancel)
        .await
        .map_err(|e| e.to_api_error(locale))?;
    Ok(Json(design))
}
