//! Venice.ai gateway implementation
//!
//! One POST per call against the Venice chat-completions and
//! image-generation endpoints. No retries, no explicit per-call timeout
//! beyond the transport defaults.

use super::{
    ChatMessage, GatewayError, GenerationParams, ImageReply, ImageRequest, ModelGateway, Result,
};
use crate::config::BackendConfig;
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

pub struct VeniceGateway {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl VeniceGateway {
    /// Build a gateway from the backend config. `api_key` is the resolved
    /// default credential (env var or config); per-call credentials
    /// override it.
    pub fn new(config: &BackendConfig, api_key: Option<String>) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn bearer<'a>(&'a self, credential: Option<&'a str>) -> Option<&'a str> {
        credential
            .filter(|k| !k.is_empty())
            .or(self.api_key.as_deref())
    }

    async fn post_json(
        &self,
        url: &str,
        payload: &serde_json::Value,
        credential: Option<&str>,
    ) -> Result<serde_json::Value> {
        let mut request = self.client.post(url).json(payload);
        if let Some(key) = self.bearer(credential) {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), "backend request failed");
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let data: serde_json::Value = response.json().await?;
        Ok(data)
    }
}

#[async_trait]
impl ModelGateway for VeniceGateway {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
        credential: Option<&str>,
    ) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let api_messages: Vec<serde_json::Value> = messages
            .iter()
            .map(|msg| {
                json!({
                    "role": msg.role.to_string(),
                    "content": msg.content,
                })
            })
            .collect();

        let payload = json!({
            "model": params.model,
            "messages": api_messages,
            "temperature": params.temperature,
            "top_p": params.top_p,
            "max_tokens": params.max_tokens,
            "presence_penalty": params.presence_penalty,
            "frequency_penalty": params.frequency_penalty,
        });

        let data = self.post_json(&url, &payload, credential).await?;

        let content = data
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or(GatewayError::MalformedReply)?;

        Ok(content.trim().to_string())
    }

    async fn generate_image(
        &self,
        request: &ImageRequest,
        credential: Option<&str>,
    ) -> Result<ImageReply> {
        let url = format!("{}/image/generate", self.base_url);

        let mut payload = json!({
            "model": request.model,
            "prompt": request.prompt,
            "height": request.height,
            "width": request.width,
            "steps": request.steps,
            "return_binary": false,
            "hide_watermark": request.hide_watermark,
            "format": request.format,
            "safe_mode": false,
            "embed_exif_metadata": request.embed_exif_metadata,
            "negative_prompt": request.negative_prompt,
            "cfg_scale": request.cfg_scale,
            "lora_strength": request.lora_strength,
        });
        if let Some(seed) = request.seed {
            payload["seed"] = json!(seed);
        }
        if let Some(inpaint) = &request.inpaint {
            payload["inpaint"] = inpaint.clone();
        }

        let data = self.post_json(&url, &payload, credential).await?;

        // The backend returns either a single `image` string or an
        // `images` array; take the first element of the latter.
        let image_data = data
            .get("image")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| {
                data.get("images")
                    .and_then(|v| v.as_array())
                    .and_then(|a| a.first())
                    .and_then(|v| v.as_str())
                    .map(|s| s.trim().to_string())
            });

        match image_data {
            Some(image) if !image.is_empty() => Ok(ImageReply {
                data: image,
                format: request.format,
            }),
            _ => {
                let message = data
                    .get("error")
                    .and_then(|e| e.as_str())
                    .unwrap_or("No image data returned")
                    .to_string();
                Err(GatewayError::Backend(message))
            }
        }
    }
}
