//! Model Gateway Abstraction
//!
//! This module defines the contract every component uses to talk to the
//! generative backend: a message list plus a `GenerationParams` bundle in,
//! a trimmed reply string out. Errors are a typed enum; the legacy
//! user-visible error strings are produced only at the HTTP/loop edges
//! via [`render_chat_error`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod venice;

pub use venice::VeniceGateway;

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors that can occur when talking to the generative backend
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Non-success HTTP status from the backend
    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Transport-level failure (connect, TLS, body read)
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// A 200 reply that is missing the expected fields
    #[error("malformed reply from backend")]
    MalformedReply,

    /// A 200 reply carrying an application-level error
    #[error("{0}")]
    Backend(String),
}

/// Render a gateway error the way the chat surface reports it.
///
/// Status errors keep the raw status and body; everything else collapses
/// to an "Exception occurred" line, matching what clients have always seen.
pub fn render_chat_error(err: &GatewayError) -> String {
    match err {
        GatewayError::Status { status, body } => format!("Error {}: {}", status, body),
        other => format!("Exception occurred: {}", other),
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Parse a stored role string. Only the three closed values are valid.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "system" => Some(Role::System),
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One role/content pair in a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Generation parameters bundled with every chat-completion call.
///
/// The same shape is reused by every component that talks to the gateway;
/// components that need fixed values (the summarizer) copy and override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
    pub presence_penalty: f64,
    pub frequency_penalty: f64,
}

impl GenerationParams {
    /// Build params for `model` from the configured generation defaults.
    pub fn for_model(model: impl Into<String>, defaults: &crate::config::GenerationConfig) -> Self {
        Self {
            model: model.into(),
            temperature: defaults.temperature,
            top_p: defaults.top_p,
            max_tokens: defaults.max_tokens,
            presence_penalty: defaults.presence_penalty,
            frequency_penalty: defaults.frequency_penalty,
        }
    }
}

/// Output format for generated images
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Webp,
    Jpg,
}

impl ImageFormat {
    pub fn mime(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Webp => "image/webp",
            ImageFormat::Jpg => "image/jpeg",
        }
    }
}

/// Image generation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRequest {
    pub model: String,
    pub prompt: String,
    pub height: u32,
    pub width: u32,
    pub steps: u32,
    pub format: ImageFormat,
    pub hide_watermark: bool,
    pub embed_exif_metadata: bool,
    pub negative_prompt: String,
    pub cfg_scale: f64,
    pub lora_strength: f64,
    pub seed: Option<i64>,
    /// Opaque inpaint payload forwarded to the backend verbatim
    pub inpaint: Option<serde_json::Value>,
}

impl ImageRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            height: 1024,
            width: 1024,
            steps: 20,
            format: ImageFormat::Png,
            hide_watermark: false,
            embed_exif_metadata: false,
            negative_prompt: String::new(),
            cfg_scale: 7.5,
            lora_strength: 50.0,
            seed: None,
            inpaint: None,
        }
    }
}

/// A generated image: base64 data plus the format it was requested in
#[derive(Debug, Clone)]
pub struct ImageReply {
    pub data: String,
    pub format: ImageFormat,
}

impl ImageReply {
    /// Render as a `data:` URL the browser can display inline.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.format.mime(), self.data)
    }
}

/// Contract for the generative backend.
///
/// One synchronous (awaited) request per call, no retries. Implementations
/// never panic; callers receive either a usable reply or a typed error.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Send one chat-completion request and return the first choice's
    /// text, trimmed of surrounding whitespace.
    ///
    /// `credential` overrides the configured key for this call only.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
        credential: Option<&str>,
    ) -> Result<String>;

    /// Send one image-generation request. A sibling capability to chat;
    /// a single pass-through call with no decomposition logic.
    async fn generate_image(
        &self,
        request: &ImageRequest,
        credential: Option<&str>,
    ) -> Result<ImageReply>;
}
