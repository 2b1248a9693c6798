//! Anthropic messages API.

use reqwest::Client;
use serde_json::{json, Value};

use super::BackendSettings;
use crate::error::ProviderError;
use crate::http;
use crate::provider::{
    ensure_supported, GenerationOutput, GenerationProvider, GenerationRequest, ProviderKind,
    TextRequest,
};

const MESSAGES_API: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const TEXT_MODEL: &str = "claude-3-sonnet-20240229";
const MAX_TOKENS: u32 = 4096;

pub struct AnthropicProvider {
    client: Client,
    settings: BackendSettings,
}

impl AnthropicProvider {
    pub fn new(client: Client, settings: BackendSettings) -> Self {
        Self { client, settings }
    }
}

pub fn messages_body(model: &str, request: &TextRequest) -> Value {
    json!({
        "model": model,
        "max_tokens": MAX_TOKENS,
        "system": request.system,
        "messages": [{ "role": "user", "content": request.user }],
    })
}

/// Extract `content[0].text`.
pub fn parse_messages_response(value: &Value) -> Result<String, ProviderError> {
    value["content"][0]["text"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ProviderError::format("message has no content"))
}

#[async_trait::async_trait]
impl GenerationProvider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, ProviderError> {
        ensure_supported(self.kind(), request)?;
        let GenerationRequest::Text(text) = request else {
            return Err(ProviderError::format("expected a text request"));
        };
        let key = self.settings.require_key(ProviderKind::Anthropic)?;
        let model = self.settings.model_or(TEXT_MODEL);

        let builder = self
            .client
            .post(MESSAGES_API)
            .header("x-api-key", key)
            .header("anthropic-version", API_VERSION)
            .json(&messages_body(model, text));
        tracing::debug!(model, "Requesting Anthropic message");
        let value = http::send_json(ProviderKind::Anthropic, builder).await?;
        parse_messages_response(&value).map(GenerationOutput::Text)
    }
}
