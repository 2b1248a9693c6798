//! SiliconFlow: FLUX images, chat completions, CosyVoice speech, and Wan
//! image-to-video jobs.

use reqwest::Client;
use serde_json::{json, Value};

use super::chat::{self, ChatEndpoint};
use super::{size_string, BackendSettings};
use crate::error::ProviderError;
use crate::http;
use crate::provider::{
    ensure_supported, truncate_chars, GeneratedImage, GenerationOutput, GenerationProvider,
    GenerationRequest, ImageRequest, ProviderKind, SpeechAudio, SpeechRequest, VideoJobStatus,
    VideoRequest,
};

const IMAGE_API: &str = "https://api.siliconflow.cn/v1/images/generations";
const CHAT_API: &str = "https://api.siliconflow.cn/v1/chat/completions";
const SPEECH_API: &str = "https://api.siliconflow.cn/v1/audio/speech";
const VIDEO_SUBMIT_API: &str = "https://api.siliconflow.cn/v1/video/submit";
const VIDEO_STATUS_API: &str = "https://api.siliconflow.cn/v1/video/status";

const IMAGE_MODEL: &str = "black-forest-labs/FLUX.1-schnell";
pub const TEXT_MODEL: &str = "deepseek-ai/DeepSeek-R1";
pub const SPEECH_MODEL: &str = "FunAudioLLM/CosyVoice2-0.5B";
pub const VIDEO_MODEL: &str = "Wan-AI/Wan2.2-I2V-A14B";

const MAX_IMAGE_PROMPT_CHARS: usize = 500;
const MAX_VIDEO_PROMPT_CHARS: usize = 500;
pub const MAX_SPEECH_CHARS: usize = 1000;

pub struct SiliconFlowProvider {
    client: Client,
    settings: BackendSettings,
}

impl SiliconFlowProvider {
    pub fn new(client: Client, settings: BackendSettings) -> Self {
        Self { client, settings }
    }

    async fn image(&self, request: &ImageRequest) -> Result<GeneratedImage, ProviderError> {
        let key = self.settings.require_key(ProviderKind::SiliconFlow)?;
        let builder = self
            .client
            .post(IMAGE_API)
            .bearer_auth(key)
            .json(&image_body(request));
        let value = http::send_json(ProviderKind::SiliconFlow, builder).await?;
        parse_image_response(&value)
    }

    async fn speech(&self, request: &SpeechRequest) -> Result<SpeechAudio, ProviderError> {
        let key = self.settings.require_key(ProviderKind::SiliconFlow)?;
        let builder = self
            .client
            .post(SPEECH_API)
            .bearer_auth(key)
            .json(&speech_body(request));
        let response = http::send(ProviderKind::SiliconFlow, builder).await?;
        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .unwrap_or_else(|| "audio/mpeg".to_string());
        let data = response
            .bytes()
            .await
            .map_err(|e| ProviderError::transport(ProviderKind::SiliconFlow, e))?;
        if data.is_empty() {
            return Err(ProviderError::format("speech response was empty"));
        }
        Ok(SpeechAudio {
            data: data.to_vec(),
            mime,
        })
    }

    async fn submit_video(&self, request: &VideoRequest) -> Result<String, ProviderError> {
        let key = self.settings.require_key(ProviderKind::SiliconFlow)?;
        let builder = self
            .client
            .post(VIDEO_SUBMIT_API)
            .bearer_auth(key)
            .json(&video_body(request));
        let value = http::send_json(ProviderKind::SiliconFlow, builder).await?;
        parse_video_request_id(&value)
    }

    async fn video_status(&self, request_id: &str) -> Result<VideoJobStatus, ProviderError> {
        let key = self.settings.require_key(ProviderKind::SiliconFlow)?;
        let builder = self
            .client
            .post(VIDEO_STATUS_API)
            .bearer_auth(key)
            .json(&json!({ "request_id": request_id }));
        let value = http::send_json(ProviderKind::SiliconFlow, builder).await?;
        Ok(parse_video_status(&value))
    }
}

pub fn image_body(request: &ImageRequest) -> Value {
    json!({
        "model": IMAGE_MODEL,
        "prompt": truncate_chars(&request.prompt, MAX_IMAGE_PROMPT_CHARS),
        "image_size": size_string(request.size, (1024, 768)),
        "num_inference_steps": 20,
        "guidance_scale": 7.5,
    })
}

pub fn parse_image_response(value: &Value) -> Result<GeneratedImage, ProviderError> {
    value["images"][0]["url"]
        .as_str()
        .filter(|u| !u.is_empty())
        .map(|u| GeneratedImage::Url(u.to_string()))
        .ok_or_else(|| ProviderError::format("SiliconFlow returned no image URL"))
}

pub fn speech_body(request: &SpeechRequest) -> Value {
    json!({
        "model": SPEECH_MODEL,
        "input": truncate_chars(&request.text, MAX_SPEECH_CHARS),
        "voice": request.voice.siliconflow_id(),
    })
}

pub fn video_body(request: &VideoRequest) -> Value {
    json!({
        "model": VIDEO_MODEL,
        "prompt": truncate_chars(&request.prompt, MAX_VIDEO_PROMPT_CHARS),
        "image": request.image,
    })
}

/// Fields may sit under `data` or at the top level.
fn field<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value
        .pointer(&format!("/data{pointer}"))
        .or_else(|| value.pointer(pointer))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

pub fn parse_video_request_id(value: &Value) -> Result<String, ProviderError> {
    field(value, "/request_id")
        .map(str::to_string)
        .ok_or_else(|| ProviderError::format("SiliconFlow returned no video request id"))
}

/// A finished job without a video URL is still reported as pending.
pub fn parse_video_status(value: &Value) -> VideoJobStatus {
    match field(value, "/status") {
        Some("SUCCEEDED") => match field(value, "/video/url").or_else(|| field(value, "/video_url")) {
            Some(url) => VideoJobStatus::Succeeded {
                url: url.to_string(),
            },
            None => VideoJobStatus::Pending,
        },
        Some("FAILED") => VideoJobStatus::Failed {
            reason: field(value, "/reason")
                .unwrap_or("the provider reported a failed job")
                .to_string(),
        },
        _ => VideoJobStatus::Pending,
    }
}

#[async_trait::async_trait]
impl GenerationProvider for SiliconFlowProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::SiliconFlow
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, ProviderError> {
        ensure_supported(self.kind(), request)?;
        match request {
            GenerationRequest::Image(image) => self.image(image).await.map(GenerationOutput::Image),
            GenerationRequest::Text(text) => {
                let endpoint = ChatEndpoint {
                    provider: ProviderKind::SiliconFlow,
                    url: CHAT_API,
                    api_key: Some(self.settings.require_key(ProviderKind::SiliconFlow)?),
                    model: self.settings.model_or(TEXT_MODEL),
                    headers: &[],
                };
                chat::complete(&self.client, endpoint, text)
                    .await
                    .map(GenerationOutput::Text)
            }
            GenerationRequest::Speech(speech) => self.speech(speech).await.map(GenerationOutput::Speech),
            GenerationRequest::VideoSubmit(video) => {
                self.submit_video(video).await.map(GenerationOutput::VideoJob)
            }
            GenerationRequest::VideoStatus { request_id } => self
                .video_status(request_id)
                .await
                .map(GenerationOutput::VideoStatus),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::Voice;

    #[test]
    fn test_image_body_caps_prompt() {
        let request = ImageRequest {
            prompt: "x".repeat(800),
            ..ImageRequest::default()
        };
        let body = image_body(&request);
        assert_eq!(body["prompt"].as_str().map(|p| p.chars().count()), Some(500));
        assert_eq!(body["image_size"], "1024x768");
        assert_eq!(body["model"], IMAGE_MODEL);
    }

    #[test]
    fn test_parse_image_response() {
        let value = json!({"images": [{"url": "https://sf/img.png"}]});
        assert_eq!(
            parse_image_response(&value).unwrap(),
            GeneratedImage::Url("https://sf/img.png".to_string())
        );
        assert!(parse_image_response(&json!({"images": []})).is_err());
    }

    #[test]
    fn test_speech_body_maps_voice_and_caps_text() {
        let body = speech_body(&SpeechRequest {
            text: "字".repeat(1500),
            voice: Voice::Jenny,
        });
        assert_eq!(body["voice"], "FunAudioLLM/CosyVoice2-0.5B:jenny");
        assert_eq!(body["input"].as_str().map(|t| t.chars().count()), Some(1000));
    }

    #[test]
    fn test_video_body_caps_prompt() {
        let body = video_body(&VideoRequest {
            prompt: "雨".repeat(700),
            image: "data:image/png;base64,AA".to_string(),
        });
        assert_eq!(body["model"], "Wan-AI/Wan2.2-I2V-A14B");
        assert_eq!(body["prompt"].as_str().map(|p| p.chars().count()), Some(500));
        assert_eq!(body["image"], "data:image/png;base64,AA");
    }

    #[test]
    fn test_video_request_id_nested_or_flat() {
        let nested = json!({"data": {"request_id": "job-1"}});
        assert_eq!(parse_video_request_id(&nested).unwrap(), "job-1");
        let flat = json!({"request_id": "job-2"});
        assert_eq!(parse_video_request_id(&flat).unwrap(), "job-2");
        assert!(matches!(
            parse_video_request_id(&json!({"data": {}})),
            Err(ProviderError::FormatUnexpected { .. })
        ));
    }

    #[test]
    fn test_video_status_parsing() {
        assert_eq!(
            parse_video_status(&json!({"data": {"status": "SUCCEEDED", "video": {"url": "https://v/1.mp4"}}})),
            VideoJobStatus::Succeeded {
                url: "https://v/1.mp4".to_string()
            }
        );
        assert_eq!(
            parse_video_status(&json!({"data": {"status": "SUCCEEDED", "video_url": "https://v/2.mp4"}})),
            VideoJobStatus::Succeeded {
                url: "https://v/2.mp4".to_string()
            }
        );
        assert_eq!(
            parse_video_status(&json!({"data": {"status": "SUCCEEDED"}})),
            VideoJobStatus::Pending
        );
        assert!(matches!(
            parse_video_status(&json!({"status": "FAILED"})),
            VideoJobStatus::Failed { .. }
        ));
        assert_eq!(parse_video_status(&json!({"status": "InProgress"})), VideoJobStatus::Pending);
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_network() {
        let client = Client::new();
        let provider = SiliconFlowProvider::new(client, BackendSettings::default());
        let err = provider
            .generate(&GenerationRequest::Image(ImageRequest::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::MissingCredential { .. }));
    }
}
