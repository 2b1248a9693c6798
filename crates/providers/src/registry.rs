//! Configuration-driven provider selection.

use std::sync::Arc;

use reqwest::Client;
use storyreel_common::config::ProvidersConfig;

use crate::backends::{
    AnthropicProvider, BackendSettings, HuggingFaceProvider, LocalProvider, OpenAiProvider,
    OpenRouterProvider, PollinationsProvider, SiliconFlowProvider, StabilityProvider,
};
use crate::error::ProviderError;
use crate::http;
use crate::provider::{Capability, GenerationProvider, ProviderKind};

/// Builds providers from configuration, sharing one HTTP client.
pub struct ProviderRegistry {
    client: Client,
    config: ProvidersConfig,
}

/// Whether a provider is usable as configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderStatus {
    pub kind: ProviderKind,
    pub has_key: bool,
    pub ready: bool,
}

impl ProviderRegistry {
    pub fn from_config(config: &ProvidersConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http::build_client()?,
            config: config.clone(),
        })
    }

    fn settings(&self, kind: ProviderKind) -> BackendSettings {
        self.config
            .credentials(kind.as_str())
            .map(BackendSettings::from_credentials)
            .unwrap_or_default()
    }

    /// Construct one provider.
    pub fn build(&self, kind: ProviderKind) -> Arc<dyn GenerationProvider> {
        let client = self.client.clone();
        let settings = self.settings(kind);
        match kind {
            ProviderKind::SiliconFlow => Arc::new(SiliconFlowProvider::new(client, settings)),
            ProviderKind::Pollinations => Arc::new(PollinationsProvider::new()),
            ProviderKind::HuggingFace => Arc::new(HuggingFaceProvider::new(client, settings)),
            ProviderKind::Stability => Arc::new(StabilityProvider::new(client, settings)),
            ProviderKind::OpenRouter => Arc::new(OpenRouterProvider::new(client, settings)),
            ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(client, settings)),
            ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(client, settings)),
            ProviderKind::Local => Arc::new(LocalProvider::new(client, settings)),
        }
    }

    /// Construct a provider by identifier, checking it offers `capability`.
    pub fn for_capability(
        &self,
        name: &str,
        capability: Capability,
    ) -> Result<Arc<dyn GenerationProvider>, ProviderError> {
        let kind: ProviderKind = name.parse()?;
        if !kind.supports(capability) {
            return Err(ProviderError::Unsupported {
                provider: kind,
                capability,
            });
        }
        Ok(self.build(kind))
    }

    /// The configured text provider.
    pub fn text_provider(&self) -> Result<Arc<dyn GenerationProvider>, ProviderError> {
        self.for_capability(&self.config.text_provider, Capability::Text)
    }

    /// The configured image provider.
    pub fn image_provider(&self) -> Result<Arc<dyn GenerationProvider>, ProviderError> {
        self.for_capability(&self.config.image_provider, Capability::Image)
    }

    /// Speech synthesis is only offered by SiliconFlow.
    pub fn speech_provider(&self) -> Arc<dyn GenerationProvider> {
        self.build(ProviderKind::SiliconFlow)
    }

    /// Image-to-video jobs are only offered by SiliconFlow.
    pub fn video_provider(&self) -> Arc<dyn GenerationProvider> {
        self.build(ProviderKind::SiliconFlow)
    }

    /// Subtitle segmentation runs on SiliconFlow's chat model.
    pub fn subtitle_provider(&self) -> Arc<dyn GenerationProvider> {
        self.build(ProviderKind::SiliconFlow)
    }

    /// Credential status for every provider.
    pub fn status(&self) -> Vec<ProviderStatus> {
        ProviderKind::ALL
            .into_iter()
            .map(|kind| {
                let has_key = self.settings(kind).api_key.is_some();
                ProviderStatus {
                    kind,
                    has_key,
                    ready: has_key || !kind.requires_key(),
                }
            })
            .collect()
    }
}
