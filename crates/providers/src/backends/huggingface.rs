//! Hugging Face inference API with a model fallback list.

use reqwest::Client;
use serde_json::{json, Value};

use super::BackendSettings;
use crate::error::ProviderError;
use crate::http;
use crate::provider::{
    ensure_supported, GeneratedImage, GenerationOutput, GenerationProvider, GenerationRequest,
    ImageRequest, ProviderKind,
};

const INFERENCE_BASE: &str = "https://api-inference.huggingface.co/models";

/// Tried in order until one answers.
pub const FALLBACK_MODELS: [&str; 2] = [
    "stabilityai/stable-diffusion-xl-base-1.0",
    "runwayml/stable-diffusion-v1-5",
];

pub struct HuggingFaceProvider {
    client: Client,
    settings: BackendSettings,
}

impl HuggingFaceProvider {
    pub fn new(client: Client, settings: BackendSettings) -> Self {
        Self { client, settings }
    }

    /// Configured model first, then the fallback list.
    pub fn candidate_models(&self) -> Vec<&str> {
        let configured = self.settings.model.as_deref();
        configured
            .into_iter()
            .chain(FALLBACK_MODELS.iter().copied().filter(|m| Some(*m) != configured))
            .collect()
    }

    async fn try_model(&self, key: &str, model: &str, request: &ImageRequest) -> Result<GeneratedImage, ProviderError> {
        let builder = self
            .client
            .post(format!("{INFERENCE_BASE}/{model}"))
            .bearer_auth(key)
            .json(&image_body(request));
        let response = http::send(ProviderKind::HuggingFace, builder).await?;
        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("image/"))
            .unwrap_or("image/jpeg")
            .to_string();
        let data = response
            .bytes()
            .await
            .map_err(|e| ProviderError::transport(ProviderKind::HuggingFace, e))?;
        Ok(GeneratedImage::Bytes {
            data: data.to_vec(),
            mime,
        })
    }
}

pub fn image_body(request: &ImageRequest) -> Value {
    let (width, height) = request.size.unwrap_or((1024, 1024));
    json!({
        "inputs": request.prompt,
        "parameters": { "width": width, "height": height },
    })
}

#[async_trait::async_trait]
impl GenerationProvider for HuggingFaceProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::HuggingFace
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, ProviderError> {
        ensure_supported(self.kind(), request)?;
        let GenerationRequest::Image(image) = request else {
            return Err(ProviderError::format("expected an image request"));
        };
        let key = self.settings.require_key(ProviderKind::HuggingFace)?;

        for model in self.candidate_models() {
            match self.try_model(key, model, image).await {
                Ok(image) => return Ok(GenerationOutput::Image(image)),
                Err(err @ ProviderError::InvalidCredential { .. }) => return Err(err),
                Err(err) => tracing::warn!(model, error = %err, "Hugging Face model failed"),
            }
        }

        Err(ProviderError::Api {
            provider: ProviderKind::HuggingFace,
            status: 503,
            message: "Hugging Face models are temporarily unavailable; retry later".to_string(),
        })
    }
}
