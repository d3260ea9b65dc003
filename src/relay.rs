//! Templated relay calls: validate, template, call the provider with a bounded
//! fixed-delay retry, and normalise the outcome into a small JSON envelope.

use std::{future::Future, sync::Arc, time::Duration};

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    config::Config,
    messages::{Locale, Message},
    models::{EditDesignRequest, EnhancePromptRequest, ErrorEnvelope, GenerateImageRequest},
    openrouter::{preview, ChatProvider, ChatRequest, ChatResponse, ProviderError},
    prompts,
};

/// Constant attempt ceiling, constant wait between attempts, and a deadline per attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration, attempt_timeout: Duration) -> Self {
        Self { max_attempts, delay, attempt_timeout }
    }
}

#[derive(Debug)]
pub struct RetryExhausted {
    pub attempts: u32,
    pub last_error: Option<ProviderError>,
    /// Stopped early on a non-transient error.
    pub aborted: bool,
}

/// Runs `attempt` until it succeeds or the policy's attempts are used up.
/// Every attempt is a fresh call; only the most recent error is kept.
pub async fn with_retry<T, F, Fut>(label: &str, policy: &RetryPolicy, mut attempt: F) -> Result<T, RetryExhausted>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let max = policy.max_attempts.max(1);
    let mut last_error = None;

    for n in 1..=max {
        let outcome = match tokio::time::timeout(policy.attempt_timeout, attempt(n)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(policy.attempt_timeout)),
        };
        match outcome {
            Ok(value) => {
                if n > 1 { info!("✅ {} succeeded on attempt {}/{}", label, n, max); }
                return Ok(value);
            }
            Err(e) => {
                error!("❌ {} attempt {}/{} failed: {}", label, n, max, e);
                if !e.is_transient() {
                    return Err(RetryExhausted { attempts: n, last_error: Some(e), aborted: true });
                }
                last_error = Some(e);
                if n < max {
                    info!("⏳ Waiting {:?} before the next attempt", policy.delay);
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }

    Err(RetryExhausted { attempts: max, last_error, aborted: false })
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid input: {0:?}")]
    InvalidInput(Message),
    #[error("provider credential is not configured")]
    MissingCredential,
    #[error("provider failed after {attempts} attempts: {}", .last_error.as_deref().unwrap_or("no error recorded"))]
    Exhausted { attempts: u32, last_error: Option<String>, busy: Message, fallback: Message },
    #[error("unexpected relay failure: {message}")]
    Unexpected { message: String, fallback: Message },
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            RelayError::MissingCredential | RelayError::Unexpected { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::Exhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// The short human-readable text for the `{ error }` envelope.
    pub fn user_message(&self, locale: Locale) -> String {
        match self {
            RelayError::InvalidInput(m) => m.text(locale).to_string(),
            RelayError::MissingCredential => Message::MissingApiKey.text(locale).to_string(),
            RelayError::Exhausted { last_error, busy, fallback, .. } => match last_error.as_deref() {
                Some(last) if last.contains("503") || last.contains("overloaded") => busy.text(locale).to_string(),
                Some(last) if !last.trim().is_empty() => last.to_string(),
                _ => fallback.text(locale).to_string(),
            },
            RelayError::Unexpected { message, fallback } => refine_unexpected(message, *fallback, locale),
        }
    }

    pub fn to_api_error(&self, locale: Locale) -> ApiError {
        ApiError { status: self.status(), message: self.user_message(locale) }
    }
}

/// Renders with the default locale; handlers that know the caller's locale
/// go through [`RelayError::to_api_error`].
impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        self.to_api_error(Locale::default()).into_response()
    }
}

/// Friendlier text for well-known failure keywords, else the raw message.
pub fn refine_unexpected(message: &str, fallback: Message, locale: Locale) -> String {
    if message.contains("API key") {
        Message::InvalidApiKey.text(locale).to_string()
    } else if message.contains("quota") {
        Message::QuotaExceeded.text(locale).to_string()
    } else if message.contains("model") {
        Message::ModelUnavailable.text(locale).to_string()
    } else if message.trim().is_empty() {
        fallback.text(locale).to_string()
    } else {
        message.to_string()
    }
}

/// A status plus a ready-to-send message, rendered as `{ "error": ... }`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorEnvelope { error: self.message })).into_response()
    }
}

/// One relay endpoint expressed as configuration of the shared primitive.
pub trait RelayOperation: Send + Sync {
    type Input: Send + Sync;
    type Output: Send;

    const NAME: &'static str;

    fn policy(&self) -> &RetryPolicy;
    fn validate(&self, input: &Self::Input) -> Result<(), Message>;
    fn build_request(&self, input: &Self::Input) -> ChatRequest;
    fn extract(&self, response: ChatResponse) -> Result<Self::Output, ProviderError>;
    fn busy_message(&self) -> Message;
    fn failure_message(&self) -> Message;
    fn unexpected_message(&self) -> Message;
}

pub async fn relay<O: RelayOperation>(provider: &dyn ChatProvider, op: &O, input: &O::Input) -> Result<O::Output, RelayError> {
    if let Err(message) = op.validate(input) {
        warn!("{} validation failed: {:?}", O::NAME, message);
        return Err(RelayError::InvalidInput(message));
    }
    if !provider.has_credential() {
        error!("{} aborted: provider API key is not configured", O::NAME);
        return Err(RelayError::MissingCredential);
    }

    let request = op.build_request(input);
    info!("🎯 {} prompt ({} chars): {}", O::NAME, request.prompt_text().map_or(0, str::len), preview(request.prompt_text().unwrap_or_default()));

    let result = with_retry(O::NAME, op.policy(), |_| {
        let request = &request;
        async move {
            let response = provider.complete(request).await?;
            op.extract(response)
        }
    })
    .await;

    result.map_err(|exhausted| {
        if exhausted.aborted {
            let message = exhausted.last_error.map(|e| e.to_string()).unwrap_or_default();
            error!("❌ {} failed unexpectedly: {}", O::NAME, message);
            return RelayError::Unexpected { message, fallback: op.unexpected_message() };
        }
        error!("❌ {} gave up after {} attempts", O::NAME, exhausted.attempts);
        RelayError::Exhausted {
            attempts: exhausted.attempts,
            last_error: exhausted.last_error.map(|e| e.to_string()),
            busy: op.busy_message(),
            fallback: op.failure_message(),
        }
    })
}

fn is_blank(s: &str) -> bool { s.trim().is_empty() }

pub struct EnhancePrompt { pub model: String, pub policy: RetryPolicy }

impl RelayOperation for EnhancePrompt {
    type Input = EnhancePromptRequest;
    type Output = String;
    const NAME: &'static str = "enhance-prompt";

    fn policy(&self) -> &RetryPolicy { &self.policy }

    fn validate(&self, input: &Self::Input) -> Result<(), Message> {
        let has_description = input.description.as_deref().is_some_and(|d| !is_blank(d));
        if input.questionnaire_answers.is_none() && !has_description {
            return Err(Message::MissingDescription);
        }
        Ok(())
    }

    fn build_request(&self, input: &Self::Input) -> ChatRequest {
        let client_answers = match (&input.questionnaire_answers, &input.description) {
            (Some(answers), _) => prompts::format_answers(answers),
            (None, Some(description)) => prompts::describe_free_text(description),
            (None, None) => String::new(),
        };
        ChatRequest::text(&self.model, prompts::enhance_prompt(&client_answers))
    }

    fn extract(&self, response: ChatResponse) -> Result<String, ProviderError> {
        response
            .first_text()
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or(ProviderError::MissingPayload("No response from OpenRouter API"))
    }

    fn busy_message(&self) -> Message { Message::ServiceBusyShortly }
    fn failure_message(&self) -> Message { Message::EnhanceFailed }
    fn unexpected_message(&self) -> Message { Message::EnhanceUnexpected }
}

fn extract_image(response: ChatResponse) -> Result<String, ProviderError> {
    match response.first_image_url() {
        Some(url) => {
            info!("🖼️ Extracted image from response: {}", preview(url));
            Ok(url.to_string())
        }
        None => Err(ProviderError::MissingPayload("No image data in response")),
    }
}

pub struct GenerateImage { pub model: String, pub policy: RetryPolicy }

impl GenerateImage {
    fn fabric<'a>(&self, input: &'a GenerateImageRequest) -> Option<&'a str> {
        input.fabric_image.as_deref().filter(|f| !is_blank(f))
    }
}

impl RelayOperation for GenerateImage {
    type Input = GenerateImageRequest;
    type Output = String;
    const NAME: &'static str = "generate-image";

    fn policy(&self) -> &RetryPolicy { &self.policy }

    fn validate(&self, input: &Self::Input) -> Result<(), Message> {
        if is_blank(&input.prompt) { Err(Message::MissingPrompt) } else { Ok(()) }
    }

    fn build_request(&self, input: &Self::Input) -> ChatRequest {
        let fabric = self.fabric(input);
        ChatRequest::image(&self.model, prompts::image_prompt(&input.prompt, fabric.is_some()), fabric)
    }

    fn extract(&self, response: ChatResponse) -> Result<String, ProviderError> { extract_image(response) }

    fn busy_message(&self) -> Message { Message::ServiceBusyMinute }
    fn failure_message(&self) -> Message { Message::GenerateFailed }
    fn unexpected_message(&self) -> Message { Message::GenerateUnexpected }
}

pub const DATA_URL_IMAGE_PREFIX: &str = "data:image/";

pub struct EditDesign { pub model: String, pub policy: RetryPolicy }

impl RelayOperation for EditDesign {
    type Input = EditDesignRequest;
    type Output = String;
    const NAME: &'static str = "edit-design";

    fn policy(&self) -> &RetryPolicy { &self.policy }

    fn validate(&self, input: &Self::Input) -> Result<(), Message> {
        if is_blank(&input.edit_request) {
            return Err(Message::MissingEditRequest);
        }
        if is_blank(&input.original_image_url) {
            return Err(Message::MissingOriginalImage);
        }
        if !input.original_image_url.starts_with(DATA_URL_IMAGE_PREFIX) {
            return Err(Message::ImageNotDataUrl);
        }
        Ok(())
    }

    fn build_request(&self, input: &Self::Input) -> ChatRequest {
        ChatRequest::image(&self.model, prompts::edit_prompt(&input.edit_request), Some(&input.original_image_url))
    }

    fn extract(&self, response: ChatResponse) -> Result<String, ProviderError> { extract_image(response) }

    fn busy_message(&self) -> Message { Message::ServiceBusyMinute }
    fn failure_message(&self) -> Message { Message::EditFailed }
    fn unexpected_message(&self) -> Message { Message::EditUnexpected }
}

/// The three relay operations bound to one provider.
pub struct RelayService {
    provider: Arc<dyn ChatProvider>,
    enhance: EnhancePrompt,
    generate: GenerateImage,
    edit: EditDesign,
}

impl RelayService {
    pub fn new(config: &Config, provider: Arc<dyn ChatProvider>) -> Self {
        Self {
            provider,
            enhance: EnhancePrompt { model: config.text_model.clone(), policy: config.enhance_retry },
            generate: GenerateImage { model: config.image_model.clone(), policy: config.image_retry },
            edit: EditDesign { model: config.image_model.clone(), policy: config.image_retry },
        }
    }

    pub fn provider_configured(&self) -> bool { self.provider.has_credential() }

    pub async fn enhance(&self, input: &EnhancePromptRequest) -> Result<String, RelayError> {
        relay(self.provider.as_ref(), &self.enhance, input).await
    }

    pub async fn generate(&self, input: &GenerateImageRequest) -> Result<String, RelayError> {
        relay(self.provider.as_ref(), &self.generate, input).await
    }

    pub async fn edit(&self, input: &EditDesignRequest) -> Result<String, RelayError> {
        relay(self.provider.as_ref(), &self.edit, input).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::AnswerAggregate;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use reqwest::StatusCode as UpstreamStatus;
    use tokio::time::Instant;

    /// Provider stub that replays scripted outcomes and records every request.
    pub(crate) struct ScriptedProvider {
        pub credential: bool,
        script: Mutex<Vec<Result<ChatResponse, ProviderError>>>,
        pub calls: Mutex<Vec<(ChatRequest, Instant)>>,
    }

    impl ScriptedProvider {
        pub(crate) fn new(script: Vec<Result<ChatResponse, ProviderError>>) -> Self {
            Self { credential: true, script: Mutex::new(script), calls: Mutex::new(Vec::new()) }
        }

        pub(crate) fn call_count(&self) -> usize { self.calls.lock().len() }
    }

    #[async_trait]
    impl ChatProvider for ScriptedProvider {
        fn has_credential(&self) -> bool { self.credential }

        async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            self.calls.lock().push((request.clone(), Instant::now()));
            let mut script = self.script.lock();
            if script.is_empty() {
                return Err(ProviderError::Http("script exhausted".into()));
            }
            script.remove(0)
        }
    }

    fn unavailable() -> ProviderError {
        ProviderError::Status { status: UpstreamStatus::SERVICE_UNAVAILABLE, body: "upstream overloaded".into() }
    }

    fn image_op() -> GenerateImage {
        GenerateImage { model: "img".into(), policy: RetryPolicy::fixed(3, Duration::from_secs(3), Duration::from_secs(90)) }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_attempt_after_fixed_delays() {
        let provider = ScriptedProvider::new(vec![
            Err(unavailable()),
            Ok(ChatResponse::default()),
            Ok(ChatResponse::with_image("data:image/png;base64,QUJD")),
        ]);
        let input = GenerateImageRequest { prompt: "A flowing ivory lace gown".into(), fabric_image: None };

        let image = relay(&provider, &image_op(), &input).await.unwrap();

        assert_eq!(image, "data:image/png;base64,QUJD");
        let calls = provider.calls.lock();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].1 - calls[0].1, Duration::from_secs(3));
        assert_eq!(calls[2].1 - calls[1].1, Duration::from_secs(3));
        assert_eq!(calls[0].0, calls[2].0);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_three_attempts_with_busy_message() {
        let provider = ScriptedProvider::new(vec![Err(unavailable()), Err(unavailable()), Err(unavailable()), Ok(ChatResponse::with_image("data:x"))]);
        let input = GenerateImageRequest { prompt: "gown".into(), fabric_image: None };

        let err = relay(&provider, &image_op(), &input).await.unwrap_err();

        assert_eq!(provider.call_count(), 3);
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.user_message(Locale::En), Message::ServiceBusyMinute.text(Locale::En));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_without_busy_hint_reports_last_error() {
        let provider = ScriptedProvider::new(vec![
            Err(ProviderError::Http("connection reset".into())),
            Err(ProviderError::Http("connection reset".into())),
            Ok(ChatResponse::default()),
        ]);
        let op = EnhancePrompt { model: "txt".into(), policy: RetryPolicy::fixed(3, Duration::from_secs(2), Duration::from_secs(90)) };
        let input = EnhancePromptRequest { description: Some("red gown".into()), questionnaire_answers: None };

        let err = relay(&provider, &op, &input).await.unwrap_err();
        assert_eq!(err.user_message(Locale::En), "No response from OpenRouter API");
    }

    #[tokio::test(start_paused = true)]
    async fn hung_attempt_times_out_and_retries() {
        struct Hanging(Mutex<u32>);

        #[async_trait]
        impl ChatProvider for Hanging {
            fn has_credential(&self) -> bool { true }
            async fn complete(&self, _: &ChatRequest) -> Result<ChatResponse, ProviderError> {
                let first = { let mut n = self.0.lock(); *n += 1; *n == 1 };
                if first { std::future::pending::<()>().await; }
                Ok(ChatResponse::with_text("ok"))
            }
        }

        let provider = Hanging(Mutex::new(0));
        let op = EnhancePrompt { model: "txt".into(), policy: RetryPolicy::fixed(3, Duration::from_secs(2), Duration::from_secs(5)) };
        let input = EnhancePromptRequest { description: Some("red".into()), questionnaire_answers: None };
        let started = Instant::now();

        assert_eq!(relay(&provider, &op, &input).await.unwrap(), "ok");
        assert_eq!(started.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test]
    async fn undecodable_response_is_not_retried() {
        let provider = ScriptedProvider::new(vec![Err(ProviderError::Decode("expected value at line 1".into())), Ok(ChatResponse::with_image("data:x"))]);
        let err = relay(&provider, &image_op(), &GenerateImageRequest { prompt: "gown".into(), fabric_image: None }).await.unwrap_err();
        assert!(matches!(err, RelayError::Unexpected { fallback: Message::GenerateUnexpected, .. }));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn undecodable_body_mentioning_model_is_not_reported_as_model_outage() {
        let body = r#"{"id":"gen-9","model":"google/gemini-2.5-flash-image","choices":[{"#;
        let parse = serde_json::from_str::<ChatResponse>(body).unwrap_err();
        let provider = ScriptedProvider::new(vec![Err(crate::openrouter::decode_error(parse, body))]);

        let err = relay(&provider, &image_op(), &GenerateImageRequest { prompt: "gown".into(), fabric_image: None }).await.unwrap_err();

        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_ne!(err.user_message(Locale::En), Message::ModelUnavailable.text(Locale::En));
        assert!(err.user_message(Locale::En).starts_with("parse error:"));
    }

    #[tokio::test]
    async fn validation_short_circuits_provider() {
        let provider = ScriptedProvider::new(vec![]);
        let err = relay(&provider, &image_op(), &GenerateImageRequest { prompt: "   ".into(), fabric_image: None }).await.unwrap_err();
        assert!(matches!(err, RelayError::InvalidInput(Message::MissingPrompt)));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_credential_is_a_configuration_fault() {
        let mut provider = ScriptedProvider::new(vec![]);
        provider.credential = false;
        let err = relay(&provider, &image_op(), &GenerateImageRequest { prompt: "gown".into(), fabric_image: None }).await.unwrap_err();
        assert!(matches!(err, RelayError::MissingCredential));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(provider.call_count(), 0);
    }

    #[test]
    fn edit_validation_order_and_data_url_guard() {
        let op = EditDesign { model: "img".into(), policy: RetryPolicy::fixed(3, Duration::from_secs(3), Duration::from_secs(90)) };
        let req = |url: &str, edit: &str| EditDesignRequest { original_image_url: url.into(), edit_request: edit.into() };

        assert_eq!(op.validate(&req("", "")), Err(Message::MissingEditRequest));
        assert_eq!(op.validate(&req("", "longer sleeves")), Err(Message::MissingOriginalImage));
        assert_eq!(op.validate(&req("https://example.com/x.png", "longer sleeves")), Err(Message::ImageNotDataUrl));
        assert_eq!(op.validate(&req("data:image/png;base64,AAAA", "longer sleeves")), Ok(()));
    }

    #[test]
    fn enhance_prefers_answers_over_description() {
        let op = EnhancePrompt { model: "txt".into(), policy: RetryPolicy::fixed(3, Duration::from_secs(2), Duration::from_secs(90)) };
        let answers = AnswerAggregate { dress_type: "party".into(), ..Default::default() };
        let both = EnhancePromptRequest { description: Some("ignored text".into()), questionnaire_answers: Some(answers) };
        let text = op.build_request(&both).prompt_text().unwrap().to_string();
        assert!(text.contains("**Dress Type:** party"));
        assert!(!text.contains("ignored text"));

        assert_eq!(op.validate(&EnhancePromptRequest { description: Some(" ".into()), questionnaire_answers: None }), Err(Message::MissingDescription));
        assert_eq!(op.validate(&EnhancePromptRequest::default()), Err(Message::MissingDescription));
    }

    #[test]
    fn fabric_image_turns_request_multipart() {
        let op = image_op();
        let plain = op.build_request(&GenerateImageRequest { prompt: "gown".into(), fabric_image: None });
        let fabric = op.build_request(&GenerateImageRequest { prompt: "gown".into(), fabric_image: Some("data:image/jpeg;base64,/9j/".into()) });
        assert!(!plain.has_image_attachment());
        assert!(fabric.has_image_attachment());
        assert!(fabric.prompt_text().unwrap().contains("FABRIC INSTRUCTION"));
    }

    #[test]
    fn unexpected_errors_get_keyword_refinement() {
        let err = |m: &str| RelayError::Unexpected { message: m.into(), fallback: Message::GenerateUnexpected };
        assert_eq!(err("Invalid API key provided").user_message(Locale::En), "Invalid API key");
        assert_eq!(err("quota exhausted").user_message(Locale::En), "Usage limit exceeded");
        assert_eq!(err("model not found").user_message(Locale::Ar), Message::ModelUnavailable.text(Locale::Ar));
        assert_eq!(err("boom").user_message(Locale::En), "boom");
        assert_eq!(err("").user_message(Locale::En), Message::GenerateUnexpected.text(Locale::En));
    }
}
