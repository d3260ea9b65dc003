use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};
use thiserror::Error;
use tracing::{error, info};

use crate::config::Config;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")] Http(String),
    #[error("OpenRouter API error: {status} - {body}")] Status { status: StatusCode, body: String },
    #[error("parse error: {0}")] Decode(String),
    #[error("{0}")] MissingPayload(&'static str),
    #[error("attempt timed out after {0:?}")] Timeout(Duration),
    #[error("API key is not configured")] MissingApiKey,
}

impl ProviderError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, ProviderError::Decode(_) | ProviderError::MissingApiKey)
    }
}

// --- Request wire types ---

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,
}

impl ChatRequest {
    /// Single user message, text only.
    pub fn text(model: &str, prompt: String) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![ChatMessage::user(MessageContent::Text(prompt))],
            modalities: None,
        }
    }

    /// Single user message asking for an image back, optionally with an attached image.
    pub fn image(model: &str, prompt: String, attachment: Option<&str>) -> Self {
        let content = match attachment {
            Some(url) => MessageContent::Parts(vec![
                ContentPart::Text { text: prompt },
                ContentPart::ImageUrl { image_url: ImageUrl { url: url.to_string() } },
            ]),
            None => MessageContent::Text(prompt),
        };
        Self {
            model: model.to_string(),
            messages: vec![ChatMessage::user(content)],
            modalities: Some(vec!["image".to_string(), "text".to_string()]),
        }
    }

    /// The instructional text of the first message, for logging and tests.
    pub fn prompt_text(&self) -> Option<&str> {
        match &self.messages.first()?.content {
            MessageContent::Text(t) => Some(t),
            MessageContent::Parts(parts) => parts.iter().find_map(|p| match p {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            }),
        }
    }

    pub fn has_image_attachment(&self) -> bool {
        self.messages.iter().any(|m| matches!(&m.content, MessageContent::Parts(parts)
            if parts.iter().any(|p| matches!(p, ContentPart::ImageUrl { .. }))))
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn user(content: MessageContent) -> Self { Self { role: "user".to_string(), content } }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageUrl { pub url: String }

// --- Response Parsing Helpers ---

// Providers send explicit nulls for absent collections, so missing and null both mean empty.
#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub message: ResponseMessage,
}

#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub images: Vec<ResponseImage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseImage {
    #[serde(default)]
    pub image_url: Option<ImageUrl>,
}

impl ChatResponse {
    /// `choices[0].message.content`, trimmed.
    pub fn first_text(&self) -> Option<&str> {
        self.choices.first()?.message.content.as_deref().map(str::trim)
    }

    /// `choices[0].message.images[0].image_url.url`.
    pub fn first_image_url(&self) -> Option<&str> {
        let image = self.choices.first()?.message.images.first()?;
        image.image_url.as_ref().map(|u| u.url.as_str()).filter(|u| !u.is_empty())
    }

    pub fn with_text(text: &str) -> Self {
        Self { choices: vec![Choice { message: ResponseMessage { content: Some(text.to_string()), images: vec![] } }] }
    }

    pub fn with_image(url: &str) -> Self {
        Self {
            choices: vec![Choice {
                message: ResponseMessage {
                    content: None,
                    images: vec![ResponseImage { image_url: Some(ImageUrl { url: url.to_string() }) }],
                },
            }],
        }
    }
}

/// A chat-completions style generative backend.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Whether an upstream credential is configured at all.
    fn has_credential(&self) -> bool;

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}

pub struct OpenRouterClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    referer: String,
    title: String,
}

impl OpenRouterClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.api_base.clone(),
            referer: config.referer.clone(),
            title: config.title.clone(),
        }
    }
}

#[async_trait]
impl ChatProvider for OpenRouterClient {
    fn has_credential(&self) -> bool { self.api_key.is_some() }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or(ProviderError::MissingApiKey)?;
        let url = format!("{}/chat/completions", self.base_url);

        info!("🔗 Calling {} with model {} (image attached: {})", url, request.model, request.has_image_attachment());

        let response = self.client
            .post(&url)
            .bearer_auth(api_key)
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(request)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("❌ API Error response: {}", truncate_for_log(&body, 500));
            return Err(ProviderError::Status { status, body });
        }

        let response_text = response.text().await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        info!("📥 Raw OpenRouter response: {}", log_safe_json(&response_text));

        serde_json::from_str(&response_text).map_err(|e| decode_error(e, &response_text))
    }
}

/// The body goes to the log only; the error text stays free of provider content.
pub(crate) fn decode_error(err: serde_json::Error, body: &str) -> ProviderError {
    error!("❌ Undecodable OpenRouter response: {}", truncate_for_log(body, 200));
    ProviderError::Decode(err.to_string())
}

// Data URLs in responses are megabytes long; shorten them before logging
fn truncate_data_urls(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::String(s) if s.starts_with("data:") && s.len() > 100 => {
            *s = preview(s);
        }
        serde_json::Value::Object(map) => map.values_mut().for_each(truncate_data_urls),
        serde_json::Value::Array(arr) => arr.iter_mut().for_each(truncate_data_urls),
        _ => {}
    }
}

fn log_safe_json(raw: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(mut json) => {
            truncate_data_urls(&mut json);
            json.to_string()
        }
        Err(_) => truncate_for_log(raw, 1000),
    }
}

fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max { return s.to_string(); }
    let cut: String = s.chars().take(max).collect();
    format!("{}...", cut)
}

/// Short form of a (possibly huge) payload: the first 50 characters plus its length.
pub fn preview(data: &str) -> String {
    if data.len() > 50 {
        format!("{}...[{} chars total]", data.chars().take(50).collect::<String>(), data.len())
    } else {
        data.to_string()
    }
}
