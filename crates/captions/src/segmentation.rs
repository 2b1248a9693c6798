//! Split narration text into timed captions.
//!
//! A text provider is asked first. Whenever it fails or its answer cannot
//! be used, a deterministic local split takes over, so caption generation
//! always succeeds.

use storyreel_providers::{parse_json_span, GenerationProvider, JsonShape, TextRequest};

use crate::subtitles::SubtitleSegment;

/// Duration assigned to each fallback segment.
pub const SEGMENT_SECS: f64 = 3.0;

/// How a caption set was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentationMode {
    /// Timings returned by the provider.
    Provider,
    /// The provider answered but without a usable caption array.
    Simple,
    /// The provider call failed or no provider was available.
    Fallback,
}

/// Captions plus how they were produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Captions {
    pub segments: Vec<SubtitleSegment>,
    pub mode: SegmentationMode,
}

/// Split on sentence-ending punctuation and newlines, giving each non-empty
/// segment a consecutive slot of [`SEGMENT_SECS`].
pub fn fallback_segments(text: &str) -> Vec<SubtitleSegment> {
    split_sentences(text)
        .into_iter()
        .enumerate()
        .map(|(i, sentence)| {
            let start = i as f64 * SEGMENT_SECS;
            SubtitleSegment::new(start, start + SEGMENT_SECS, sentence)
        })
        .collect()
}

/// Full-width `。！？`, ASCII `!?`, newlines, and `.` when followed by
/// whitespace or the end of the text end a sentence.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        let boundary = match c {
            '。' | '！' | '？' | '!' | '?' | '\n' => true,
            '.' => chars.peek().map_or(true, |next| next.is_whitespace()),
            _ => false,
        };
        if boundary {
            push_trimmed(&mut sentences, &current);
            current.clear();
        } else {
            current.push(c);
        }
    }
    push_trimmed(&mut sentences, &current);
    sentences
}

fn push_trimmed(sentences: &mut Vec<String>, candidate: &str) {
    let trimmed = candidate.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
}

fn segmentation_prompt(text: &str) -> String {
    format!(
        "Split the following text into subtitles, one per sentence, as a JSON array. \
         Each entry needs start (seconds), end (seconds) and text fields. \
         Assume each sentence lasts 3 seconds, one after another. \
         Return only the JSON array.\n\n{text}"
    )
}

/// Provider timings are used only when every entry is well formed.
fn usable(segments: &[SubtitleSegment]) -> bool {
    !segments.is_empty()
        && segments.iter().all(|s| {
            s.start_secs.is_finite()
                && s.end_secs.is_finite()
                && s.start_secs >= 0.0
                && s.end_secs >= s.start_secs
                && !s.text.trim().is_empty()
        })
}

/// Produce captions for `text`. Never fails.
pub async fn generate_captions(provider: Option<&dyn GenerationProvider>, text: &str) -> Captions {
    let Some(provider) = provider else {
        return Captions {
            segments: fallback_segments(text),
            mode: SegmentationMode::Fallback,
        };
    };

    let request = TextRequest {
        system: String::new(),
        user: segmentation_prompt(text),
    };

    match provider.complete(request).await {
        Ok(content) => match parse_json_span::<Vec<SubtitleSegment>>(&content, JsonShape::Array) {
            Ok(segments) if usable(&segments) => {
                tracing::info!(entries = segments.len(), "Captions segmented by provider");
                Captions {
                    segments,
                    mode: SegmentationMode::Provider,
                }
            }
            _ => {
                tracing::info!("Provider answer had no usable captions, using simple segmentation");
                Captions {
                    segments: fallback_segments(text),
                    mode: SegmentationMode::Simple,
                }
            }
        },
        Err(err) => {
            tracing::warn!(error = %err, "Caption provider failed, using local segmentation");
            Captions {
                segments: fallback_segments(text),
                mode: SegmentationMode::Fallback,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_three_sentences() {
        let segments = fallback_segments("A。B！C？");
        let summary: Vec<(f64, f64, &str)> = segments
            .iter()
            .map(|s| (s.start_secs, s.end_secs, s.text.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![(0.0, 3.0, "A"), (3.0, 6.0, "B"), (6.0, 9.0, "C")]
        );
    }

    #[test]
    fn test_fallback_drops_empty_segments_and_trims() {
        let segments = fallback_segments("  第一句。。\n\n 第二句  \n");
        let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["第一句", "第二句"]);
        assert_eq!(segments[1].start_secs, 3.0);
    }

    #[test]
    fn test_ascii_period_needs_following_space() {
        let texts: Vec<String> = fallback_segments("Pi is 3.14. Really? Yes")
            .into_iter()
            .map(|s| s.text)
            .collect();
        assert_eq!(texts, vec!["Pi is 3.14", "Really", "Yes"]);
    }

    #[test]
    fn test_fallback_of_blank_text_is_empty() {
        assert!(fallback_segments(" \n。").is_empty());
    }

    #[tokio::test]
    async fn test_no_provider_uses_fallback() {
        let captions = generate_captions(None, "A。B").await;
        assert_eq!(captions.mode, SegmentationMode::Fallback);
        assert_eq!(captions.segments.len(), 2);
    }
}
