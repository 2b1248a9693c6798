//! Subtitle generation in SRT and VTT formats.

use serde::{Deserialize, Serialize};
use storyreel_common::error::StoryreelResult;

/// One timed caption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleSegment {
    /// Start time in seconds.
    #[serde(alias = "start")]
    pub start_secs: f64,

    /// End time in seconds.
    #[serde(alias = "end")]
    pub end_secs: f64,

    pub text: String,
}

impl SubtitleSegment {
    pub fn new(start_secs: f64, end_secs: f64, text: impl Into<String>) -> Self {
        Self {
            start_secs,
            end_secs,
            text: text.into(),
        }
    }
}

/// Generate SRT subtitle content from segments.
///
/// Entries are numbered from 1 and each ends with a blank separator line.
pub fn generate_srt(segments: &[SubtitleSegment]) -> String {
    let mut output = String::new();

    for (i, segment) in segments.iter().enumerate() {
        output.push_str(&format!("{}\n", i + 1));
        output.push_str(&format!(
            "{} --> {}\n",
            format_timestamp(segment.start_secs),
            format_timestamp(segment.end_secs),
        ));
        output.push_str(&segment.text);
        output.push_str("\n\n");
    }

    output
}

/// Generate WebVTT subtitle content from segments.
pub fn generate_vtt(segments: &[SubtitleSegment]) -> String {
    let mut output = String::from("WEBVTT\n\n");

    for segment in segments {
        output.push_str(&format!(
            "{} --> {}\n",
            format_vtt_time(segment.start_secs),
            format_vtt_time(segment.end_secs),
        ));
        output.push_str(&segment.text);
        output.push_str("\n\n");
    }

    output
}

/// Format seconds as an SRT timestamp: HH:MM:SS,mmm
///
/// Negative and non-finite inputs clamp to zero.
pub fn format_timestamp(secs: f64) -> String {
    let (hours, minutes, seconds, millis) = split_time(secs);
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

/// Format seconds as a VTT timestamp: HH:MM:SS.mmm
pub fn format_vtt_time(secs: f64) -> String {
    let (hours, minutes, seconds, millis) = split_time(secs);
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

fn split_time(secs: f64) -> (u64, u64, u64, u64) {
    let total_ms = if secs.is_finite() && secs > 0.0 {
        (secs * 1000.0).round() as u64
    } else {
        0
    };
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    (hours, minutes, seconds, millis)
}

/// Save subtitles to a file; `.vtt` selects WebVTT, anything else SRT.
pub fn save_subtitles(segments: &[SubtitleSegment], path: &std::path::Path) -> StoryreelResult<()> {
    let content = match path.extension().and_then(|e| e.to_str()) {
        Some("vtt") => generate_vtt(segments),
        _ => generate_srt(segments), // default to SRT
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), entries = segments.len(), "Subtitles saved");
    Ok(())
}
