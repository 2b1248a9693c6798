//! Stability AI SDXL text-to-image.

use reqwest::Client;
use serde_json::{json, Value};

use super::BackendSettings;
use crate::error::ProviderError;
use crate::http;
use crate::provider::{
    ensure_supported, GeneratedImage, GenerationOutput, GenerationProvider, GenerationRequest,
    ImageRequest, ProviderKind,
};

const TEXT_TO_IMAGE_API: &str =
    "https://api.stability.ai/v1/generation/stable-diffusion-xl-1024-v1-0/text-to-image";

pub struct StabilityProvider {
    client: Client,
    settings: BackendSettings,
}

impl StabilityProvider {
    pub fn new(client: Client, settings: BackendSettings) -> Self {
        Self { client, settings }
    }
}

pub fn image_body(request: &ImageRequest) -> Value {
    let (width, height) = request.size.unwrap_or((1024, 1024));
    json!({
        "text_prompts": [{ "text": request.prompt }],
        "cfg_scale": 7,
        "height": height,
        "width": width,
        "steps": 30,
        "samples": 1,
    })
}

/// `artifacts[0].base64` as a PNG data URI.
pub fn parse_image_response(value: &Value) -> Result<GeneratedImage, ProviderError> {
    value["artifacts"][0]["base64"]
        .as_str()
        .filter(|b| !b.is_empty())
        .map(|b| GeneratedImage::DataUri(format!("data:image/png;base64,{b}")))
        .ok_or_else(|| ProviderError::format("Stability returned no artifacts"))
}

#[async_trait::async_trait]
impl GenerationProvider for StabilityProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Stability
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, ProviderError> {
        ensure_supported(self.kind(), request)?;
        let GenerationRequest::Image(image) = request else {
            return Err(ProviderError::format("expected an image request"));
        };
        let key = self.settings.require_key(ProviderKind::Stability)?;
        let builder = self
            .client
            .post(TEXT_TO_IMAGE_API)
            .bearer_auth(key)
            .header("Accept", "application/json")
            .json(&image_body(image));
        let value = http::send_json(ProviderKind::Stability, builder).await?;
        parse_image_response(&value).map(GenerationOutput::Image)
    }
}
