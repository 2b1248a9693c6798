//! Caption generation with provider replies and failures.

use storyreel_captions::{generate_captions, generate_srt, SegmentationMode};
use storyreel_providers::{
    GenerationOutput, GenerationProvider, GenerationRequest, ProviderError, ProviderKind,
};

struct FixedReply(Result<String, u16>);

#[async_trait::async_trait]
impl GenerationProvider for FixedReply {
    fn kind(&self) -> ProviderKind {
        ProviderKind::SiliconFlow
    }

    async fn generate(&self, _request: &GenerationRequest) -> Result<GenerationOutput, ProviderError> {
        match &self.0 {
            Ok(text) => Ok(GenerationOutput::Text(text.clone())),
            Err(status) => Err(ProviderError::ServerError {
                provider: ProviderKind::SiliconFlow,
                status: *status,
            }),
        }
    }
}

#[tokio::test]
async fn test_provider_timings_are_used() {
    let provider = FixedReply(Ok(
        "<think>split it</think>\n[{\"start\": 0, \"end\": 2.5, \"text\": \"A\"}, {\"start\": 2.5, \"end\": 4, \"text\": \"B\"}]"
            .to_string(),
    ));
    let captions = generate_captions(Some(&provider), "A。B。").await;
    assert_eq!(captions.mode, SegmentationMode::Provider);
    assert_eq!(captions.segments[1].start_secs, 2.5);
}

#[tokio::test]
async fn test_provider_failure_falls_back() {
    let provider = FixedReply(Err(503));
    let captions = generate_captions(Some(&provider), "A。B！C？").await;

    assert_eq!(captions.mode, SegmentationMode::Fallback);
    let starts: Vec<f64> = captions.segments.iter().map(|s| s.start_secs).collect();
    let ends: Vec<f64> = captions.segments.iter().map(|s| s.end_secs).collect();
    assert_eq!(starts, vec![0.0, 3.0, 6.0]);
    assert_eq!(ends, vec![3.0, 6.0, 9.0]);
}

#[tokio::test]
async fn test_prose_reply_uses_simple_mode() {
    let provider = FixedReply(Ok("Sorry, I can't do that.".to_string()));
    let captions = generate_captions(Some(&provider), "One.\nTwo").await;
    assert_eq!(captions.mode, SegmentationMode::Simple);
    assert_eq!(captions.segments.len(), 2);
}

#[tokio::test]
async fn test_malformed_entries_fall_back() {
    let provider = FixedReply(Ok("[{\"start\": 5, \"end\": 1, \"text\": \"backwards\"}]".to_string()));
    let captions = generate_captions(Some(&provider), "A。").await;
    assert_eq!(captions.mode, SegmentationMode::Simple);

    let srt = generate_srt(&captions.segments);
    assert_eq!(srt, "1\n00:00:00,000 --> 00:00:03,000\nA\n\n");
}
