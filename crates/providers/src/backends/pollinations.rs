//! Pollinations: keyless, URL-addressed image generation.
//!
//! The image is rendered when the URL is first fetched, so generation only
//! builds the URL.

use rand::Rng;
use reqwest::Url;

use crate::error::ProviderError;
use crate::provider::{
    ensure_supported, truncate_chars, GeneratedImage, GenerationOutput, GenerationProvider,
    GenerationRequest, ProviderKind,
};

const PROMPT_BASE: &str = "https://image.pollinations.ai/prompt/";
const MAX_PROMPT_CHARS: usize = 400;

#[derive(Debug, Default)]
pub struct PollinationsProvider;

impl PollinationsProvider {
    pub fn new() -> Self {
        Self
    }
}

/// Build the generation URL for a prompt.
pub fn image_url(prompt: &str, size: Option<(u32, u32)>, seed: u32) -> Result<String, ProviderError> {
    let (width, height) = size.unwrap_or((1024, 1024));
    let mut url = Url::parse(PROMPT_BASE).map_err(|e| ProviderError::transport(ProviderKind::Pollinations, e))?;
    url.path_segments_mut()
        .map_err(|_| ProviderError::transport(ProviderKind::Pollinations, "base URL cannot hold a path"))?
        .pop_if_empty()
        .push(truncate_chars(prompt, MAX_PROMPT_CHARS));
    url.query_pairs_mut()
        .append_pair("width", &width.to_string())
        .append_pair("height", &height.to_string())
        .append_pair("seed", &seed.to_string())
        .append_pair("nologo", "true");
    Ok(url.to_string())
}

#[async_trait::async_trait]
impl GenerationProvider for PollinationsProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Pollinations
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, ProviderError> {
        ensure_supported(self.kind(), request)?;
        let GenerationRequest::Image(image) = request else {
            return Err(ProviderError::format("expected an image request"));
        };
        let seed = rand::thread_rng().gen_range(0..1_000_000);
        let url = image_url(&image.prompt, image.size, seed)?;
        tracing::debug!(seed, "Built Pollinations image URL");
        Ok(GenerationOutput::Image(GeneratedImage::Url(url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_encodes_prompt_as_one_segment() {
        let url = image_url("a cat / a dog?", None, 42).unwrap();
        assert!(url.starts_with("https://image.pollinations.ai/prompt/a%20cat%20%2F%20a%20dog%3F?"));
        assert!(url.ends_with("width=1024&height=1024&seed=42&nologo=true"));
    }

    #[test]
    fn test_prompt_is_capped() {
        let url = image_url(&"z".repeat(1000), Some((512, 512)), 1).unwrap();
        let segment = url
            .trim_start_matches(PROMPT_BASE)
            .split('?')
            .next()
            .unwrap_or_default()
            .to_string();
        assert_eq!(segment.len(), 400);
        assert!(url.contains("width=512"));
    }

    #[tokio::test]
    async fn test_text_is_unsupported() {
        let err = PollinationsProvider::new()
            .generate(&GenerationRequest::Text(Default::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unsupported { .. }));
    }
}
