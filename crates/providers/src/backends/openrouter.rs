//! OpenRouter: DALL-E images and routed chat completions.

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

const API_BASE: &str = "https://openrouter.ai/api/v1";
const TEXT_MODEL: &str = "openai/gpt-4";
const IMAGE_MODEL: &str = "openai/dall-e-3";

/// Attribution headers OpenRouter uses for app rankings.
const APP_HEADERS: [(&str, &str); 2] = [
    ("HTTP-Referer", "http://localhost:3000"),
    ("X-Title", "Storyreel"),
];

pub struct OpenRouterProvider {
    client: Client,
    settings: BackendSettings,
}

impl OpenRouterProvider {
    pub fn new(client: Client, settings: BackendSettings) -> Self {
        Self { client, settings }
    }
}

pub fn image_body(request: &ImageRequest) -> Value {
    json!({
        "model": IMAGE_MODEL,
        "prompt": request.prompt,
        "n": 1,
        "size": "1024x1024",
    })
}

#[async_trait::async_trait]
impl GenerationProvider for OpenRouterProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenRouter
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, ProviderError> {
        ensure_supported(self.kind(), request)?;
        let key = self.settings.require_key(ProviderKind::OpenRouter)?;
        match request {
            GenerationRequest::Image(image) => {
                let mut builder = self
                    .client
                    .post(format!("{API_BASE}/images/generations"))
                    .bearer_auth(key)
                    .json(&image_body(image));
                for (name, value) in APP_HEADERS {
                    builder = builder.header(name, value);
                }
                let value = http::send_json(ProviderKind::OpenRouter, builder).await?;
                parse_images_data(&value).map(GenerationOutput::Image)
            }
            GenerationRequest::Text(text) => {
                let url = format!("{API_BASE}/chat/completions");
                let endpoint = ChatEndpoint {
                    provider: ProviderKind::OpenRouter,
                    url: &url,
                    api_key: Some(key),
                    model: self.settings.model_or(TEXT_MODEL),
                    headers: &APP_HEADERS,
                };
                chat::complete(&self.client, endpoint, text)
                    .await
                    .map(GenerationOutput::Text)
            }
            _ => Err(ProviderError::Unsupported {
                provider: ProviderKind::OpenRouter,
                capability: request.capability(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_body_uses_dalle() {
        let body = image_body(&ImageRequest {
            prompt: "castle".to_string(),
            ..ImageRequest::default()
        });
        assert_eq!(body["model"], "openai/dall-e-3");
        assert_eq!(body["size"], "1024x1024");
    }

    #[tokio::test]
    async fn test_requires_key() {
        let provider = OpenRouterProvider::new(Client::new(), BackendSettings::default());
        let err = provider
            .generate(&GenerationRequest::Text(Default::default()))
            .await
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
