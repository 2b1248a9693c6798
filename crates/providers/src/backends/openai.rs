//! OpenAI: DALL-E 3 images and chat completions.

use reqwest::Client;
use serde_json::{json, Value};

use super::chat::{self, ChatEndpoint};
use super::{parse_images_data, BackendSettings};
use crate::error::ProviderError;
use crate::http;
use crate::provider::{
    ensure_supported, GenerationOutput, GenerationProvider, GenerationRequest, ImageRequest,
    ProviderKind,
};

const CHAT_API: &str = "https://api.openai.com/v1/chat/completions";
const IMAGE_API: &str = "https://api.openai.com/v1/images/generations";
const TEXT_MODEL: &str = "gpt-4";

pub struct OpenAiProvider {
    client: Client,
    settings: BackendSettings,
}

impl OpenAiProvider {
    pub fn new(client: Client, settings: BackendSettings) -> Self {
        Self { client, settings }
    }
}

pub fn image_body(request: &ImageRequest) -> Value {
    json!({
        "model": "dall-e-3",
        "prompt": request.prompt,
        "n": 1,
        "size": "1024x1024",
        "quality": "standard",
    })
}

#[async_trait::async_trait]
impl GenerationProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, ProviderError> {
        ensure_supported(self.kind(), request)?;
        let key = self.settings.require_key(ProviderKind::OpenAi)?;
        match request {
            GenerationRequest::Image(image) => {
                let builder = self
                    .client
                    .post(IMAGE_API)
                    .bearer_auth(key)
                    .json(&image_body(image));
                let value = http::send_json(ProviderKind::OpenAi, builder).await?;
                parse_images_data(&value).map(GenerationOutput::Image)
            }
            GenerationRequest::Text(text) => {
                let endpoint = ChatEndpoint {
                    provider: ProviderKind::OpenAi,
                    url: CHAT_API,
                    api_key: Some(key),
                    model: self.settings.model_or(TEXT_MODEL),
                    headers: &[],
                };
                chat::complete(&self.client, endpoint, text)
                    .await
                    .map(GenerationOutput::Text)
            }
            _ => Err(ProviderError::Unsupported {
                provider: ProviderKind::OpenAi,
                capability: request.capability(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_body_requests_standard_quality() {
        let body = image_body(&ImageRequest::default());
        assert_eq!(body["quality"], "standard");
        assert_eq!(body["n"], 1);
    }
}
