//! The generation-provider interface.

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Every supported provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    SiliconFlow,
    Pollinations,
    HuggingFace,
    Stability,
    OpenRouter,
    OpenAi,
    Anthropic,
    Local,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 8] = [
        ProviderKind::SiliconFlow,
        ProviderKind::Pollinations,
        ProviderKind::HuggingFace,
        ProviderKind::Stability,
        ProviderKind::OpenRouter,
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::Local,
    ];

    /// Identifier used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::SiliconFlow => "siliconflow",
            ProviderKind::Pollinations => "pollinations",
            ProviderKind::HuggingFace => "huggingface",
            ProviderKind::Stability => "stability",
            ProviderKind::OpenRouter => "openrouter",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Local => "local",
        }
    }

    /// Display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::SiliconFlow => "SiliconFlow",
            ProviderKind::Pollinations => "Pollinations",
            ProviderKind::HuggingFace => "Hugging Face",
            ProviderKind::Stability => "Stability AI",
            ProviderKind::OpenRouter => "OpenRouter",
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Anthropic => "Anthropic",
            ProviderKind::Local => "Local model",
        }
    }

    /// Whether an API key must be configured before any request.
    pub fn requires_key(&self) -> bool {
        !matches!(self, ProviderKind::Pollinations | ProviderKind::Local)
    }

    /// Capabilities this provider offers.
    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            ProviderKind::SiliconFlow => &[
                Capability::Image,
                Capability::Text,
                Capability::Speech,
                Capability::Video,
            ],
            ProviderKind::Pollinations | ProviderKind::HuggingFace | ProviderKind::Stability => {
                &[Capability::Image]
            }
            ProviderKind::OpenRouter | ProviderKind::OpenAi => &[Capability::Image, Capability::Text],
            ProviderKind::Anthropic | ProviderKind::Local => &[Capability::Text],
        }
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == needle)
            .ok_or(ProviderError::UnknownProvider { name: needle })
    }
}

/// What a request asks a provider to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Image,
    Text,
    Speech,
    Video,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Image => f.write_str("image generation"),
            Capability::Text => f.write_str("text generation"),
            Capability::Speech => f.write_str("speech synthesis"),
            Capability::Video => f.write_str("image-to-video generation"),
        }
    }
}

/// Text-to-image request. Style hints are already folded into `prompt`.
#[derive(Debug, Clone, Default)]
pub struct ImageRequest {
    pub prompt: String,

    /// Reference image for character consistency (data URI or URL).
    pub reference_image: Option<String>,

    /// Requested size; providers with a fixed size ignore it.
    pub size: Option<(u32, u32)>,
}

/// Chat-style completion request.
#[derive(Debug, Clone, Default)]
pub struct TextRequest {
    pub system: String,
    pub user: String,
}

/// Text-to-speech request.
#[derive(Debug, Clone)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: crate::speech::Voice,
}

/// Image-to-video request: animate one still.
#[derive(Debug, Clone, Default)]
pub struct VideoRequest {
    pub prompt: String,

    /// Starting frame as a base64 data URI.
    pub image: String,
}

/// A request for one generation.
#[derive(Debug, Clone)]
pub enum GenerationRequest {
    Image(ImageRequest),
    Text(TextRequest),
    Speech(SpeechRequest),
    /// Queue a video job; answered with [`GenerationOutput::VideoJob`].
    VideoSubmit(VideoRequest),
    /// Ask about a queued job; answered with [`GenerationOutput::VideoStatus`].
    VideoStatus { request_id: String },
}

impl GenerationRequest {
    pub fn capability(&self) -> Capability {
        match self {
            GenerationRequest::Image(_) => Capability::Image,
            GenerationRequest::Text(_) => Capability::Text,
            GenerationRequest::Speech(_) => Capability::Speech,
            GenerationRequest::VideoSubmit(_) | GenerationRequest::VideoStatus { .. } => {
                Capability::Video
            }
        }
    }
}

/// A generated image as returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedImage {
    /// Remote URL to fetch.
    Url(String),
    /// Inline `data:` URI.
    DataUri(String),
    /// Raw encoded image bytes.
    Bytes { data: Vec<u8>, mime: String },
}

impl GeneratedImage {
    /// A reference suitable for `StoryboardPanel::image_url`.
    ///
    /// Raw bytes are inlined as a base64 data URI.
    pub fn into_reference(self) -> String {
        match self {
            GeneratedImage::Url(url) => url,
            GeneratedImage::DataUri(uri) => uri,
            GeneratedImage::Bytes { data, mime } => format!(
                "data:{};base64,{}",
                mime,
                base64::engine::general_purpose::STANDARD.encode(data)
            ),
        }
    }
}

/// Synthesized audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechAudio {
    pub data: Vec<u8>,
    pub mime: String,
}

impl SpeechAudio {
    /// File extension matching the MIME type.
    pub fn extension(&self) -> &'static str {
        match self.mime.as_str() {
            "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
            "audio/ogg" | "audio/opus" => "ogg",
            "audio/flac" => "flac",
            _ => "mp3",
        }
    }
}

/// State of a queued video job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoJobStatus {
    /// Still queued or rendering.
    Pending,
    /// Finished; the video can be downloaded from the URL.
    Succeeded { url: String },
    Failed { reason: String },
}

/// The result of one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutput {
    Image(GeneratedImage),
    Text(String),
    Speech(SpeechAudio),
    /// Request id of a queued video job.
    VideoJob(String),
    VideoStatus(VideoJobStatus),
}

/// One generative backend.
///
/// Implementations check credentials before touching the network and map
/// every failure to a [`ProviderError`].
#[async_trait::async_trait]
pub trait GenerationProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Perform one generation.
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, ProviderError>;

    /// Whether this provider can serve the given capability.
    fn supports(&self, capability: Capability) -> bool {
        self.kind().supports(capability)
    }
}

impl<'a> dyn GenerationProvider + 'a {
    /// Generate an image and unwrap the output variant.
    pub async fn image(&self, request: ImageRequest) -> Result<GeneratedImage, ProviderError> {
        match self.generate(&GenerationRequest::Image(request)).await? {
            GenerationOutput::Image(image) => Ok(image),
            _ => Err(ProviderError::format("expected an image result")),
        }
    }

    /// Run a completion and unwrap the output variant.
    pub async fn complete(&self, request: TextRequest) -> Result<String, ProviderError> {
        match self.generate(&GenerationRequest::Text(request)).await? {
            GenerationOutput::Text(text) => Ok(text),
            _ => Err(ProviderError::format("expected a text result")),
        }
    }

    /// Synthesize speech and unwrap the output variant.
    pub async fn speech(&self, request: SpeechRequest) -> Result<SpeechAudio, ProviderError> {
        match self.generate(&GenerationRequest::Speech(request)).await? {
            GenerationOutput::Speech(audio) => Ok(audio),
            _ => Err(ProviderError::format("expected an audio result")),
        }
    }

    /// Queue an image-to-video job and return its request id.
    pub async fn submit_video(&self, request: VideoRequest) -> Result<String, ProviderError> {
        match self.generate(&GenerationRequest::VideoSubmit(request)).await? {
            GenerationOutput::VideoJob(id) => Ok(id),
            _ => Err(ProviderError::format("expected a video request id")),
        }
    }

    /// Check on a queued video job.
    pub async fn video_status(&self, request_id: &str) -> Result<VideoJobStatus, ProviderError> {
        let request = GenerationRequest::VideoStatus {
            request_id: request_id.to_string(),
        };
        match self.generate(&request).await? {
            GenerationOutput::VideoStatus(status) => Ok(status),
            _ => Err(ProviderError::format("expected a video job status")),
        }
    }
}

/// Reject requests for capabilities the provider lacks.
pub(crate) fn ensure_supported(
    kind: ProviderKind,
    request: &GenerationRequest,
) -> Result<(), ProviderError> {
    let capability = request.capability();
    if kind.supports(capability) {
        Ok(())
    } else {
        Err(ProviderError::Unsupported {
            provider: kind,
            capability,
        })
    }
}

/// Truncate to at most `max` characters (not bytes).
pub(crate) fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
