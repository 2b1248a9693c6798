//! Local OpenAI-compatible server (Ollama by default).

use reqwest::Client;

use super::chat::{self, ChatEndpoint};
use super::BackendSettings;
use crate::error::ProviderError;
use crate::provider::{
    ensure_supported, GenerationOutput, GenerationProvider, GenerationRequest, ProviderKind,
};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434/v1/chat/completions";
const TEXT_MODEL: &str = "llama2";

pub struct LocalProvider {
    client: Client,
    settings: BackendSettings,
}

impl LocalProvider {
    pub fn new(client: Client, settings: BackendSettings) -> Self {
        Self { client, settings }
    }

    /// Full chat completions URL.
    pub fn endpoint(&self) -> &str {
        self.settings.base_url.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }
}

#[async_trait::async_trait]
impl GenerationProvider for LocalProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, ProviderError> {
        ensure_supported(self.kind(), request)?;
        let GenerationRequest::Text(text) = request else {
            return Err(ProviderError::format("expected a text request"));
        };
        let endpoint = ChatEndpoint {
            provider: ProviderKind::Local,
            url: self.endpoint(),
            api_key: self.settings.api_key.as_deref(),
            model: self.settings.model_or(TEXT_MODEL),
            headers: &[],
        };
        chat::complete(&self.client, endpoint, text)
            .await
            .map(GenerationOutput::Text)
    }
}
