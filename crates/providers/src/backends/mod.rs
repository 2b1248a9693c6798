//! Concrete provider backends.
//!
//! Each backend owns a shared `reqwest::Client` and the credentials from
//! configuration. Request bodies and response parsing are plain functions
//! so they can be tested without network access.

pub mod anthropic;
pub mod chat;
pub mod huggingface;
pub mod local;
pub mod openai;
pub mod openrouter;
pub mod pollinations;
pub mod siliconflow;
pub mod stability;

pub use anthropic::AnthropicProvider;
pub use huggingface::HuggingFaceProvider;
pub use local::LocalProvider;
pub use openai::OpenAiProvider;
pub use openrouter::OpenRouterProvider;
pub use pollinations::PollinationsProvider;
pub use siliconflow::SiliconFlowProvider;
pub use stability::StabilityProvider;

use serde_json::Value;
use storyreel_common::config::ProviderCredentials;

use crate::error::ProviderError;
use crate::provider::{GeneratedImage, ProviderKind};

/// Credentials resolved for one backend.
#[derive(Debug, Clone, Default)]
pub struct BackendSettings {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

impl BackendSettings {
    /// Blank strings count as unset.
    pub fn from_credentials(credentials: &ProviderCredentials) -> Self {
        let clean = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Self {
            api_key: clean(&credentials.api_key),
            model: clean(&credentials.model),
            base_url: clean(&credentials.base_url),
        }
    }

    /// The API key, or a configuration error naming the provider.
    pub fn require_key(&self, provider: ProviderKind) -> Result<&str, ProviderError> {
        self.api_key
            .as_deref()
            .ok_or(ProviderError::MissingCredential { provider })
    }

    pub fn model_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.model.as_deref().unwrap_or(default)
    }
}

/// Parse an OpenAI-style images response: `data[0].url` or `data[0].b64_json`.
pub(crate) fn parse_images_data(value: &Value) -> Result<GeneratedImage, ProviderError> {
    let first = &value["data"][0];
    if let Some(url) = first["url"].as_str().filter(|u| !u.is_empty()) {
        return Ok(GeneratedImage::Url(url.to_string()));
    }
    if let Some(b64) = first["b64_json"].as_str().filter(|b| !b.is_empty()) {
        return Ok(GeneratedImage::DataUri(format!("data:image/png;base64,{b64}")));
    }
    Err(ProviderError::format("no image in the response"))
}

/// `WxH`, falling back to the provider default.
pub(crate) fn size_string(size: Option<(u32, u32)>, default: (u32, u32)) -> String {
    let (w, h) = size.unwrap_or(default);
    format!("{w}x{h}")
}
