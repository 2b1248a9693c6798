//! Per-run export configuration and output naming.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Title used when a storyboard has none.
pub const DEFAULT_TITLE: &str = "storyreel";

/// How dialogue is drawn onto frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DialogueStyle {
    /// Rounded speech bubble anchored bottom-left.
    #[default]
    Bubble,
    /// Centered caption lines on dark backing bars.
    Subtitle,
}

impl std::str::FromStr for DialogueStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bubble" => Ok(DialogueStyle::Bubble),
            "subtitle" => Ok(DialogueStyle::Subtitle),
            other => Err(format!("unknown dialogue style: {other}")),
        }
    }
}

impl std::fmt::Display for DialogueStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DialogueStyle::Bubble => write!(f, "bubble"),
            DialogueStyle::Subtitle => write!(f, "subtitle"),
        }
    }
}

/// Export configuration. Ephemeral; never persisted with the storyboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExportConfig {
    /// Title used in output file names.
    pub title: String,

    /// Hold time per panel in seconds.
    pub panel_duration_secs: u32,

    /// Whether dialogue is drawn.
    pub show_dialogue: bool,

    pub dialogue_style: DialogueStyle,

    /// Optional background audio file, looped for the whole run.
    pub background_audio: Option<PathBuf>,

    /// Background audio volume in [0.0, 1.0].
    pub audio_volume: f32,

    /// Output width in pixels.
    pub width: u32,

    /// Output height in pixels.
    pub height: u32,

    /// Recording frame rate.
    pub fps: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            title: String::new(),
            panel_duration_secs: 3,
            show_dialogue: true,
            dialogue_style: DialogueStyle::Bubble,
            background_audio: None,
            audio_volume: 0.5,
            width: 1280,
            height: 720,
            fps: 10,
        }
    }
}

impl ExportConfig {
    /// Return a copy with every field inside its valid range.
    ///
    /// Zero durations, rates and sizes become one; volume is clamped to
    /// [0, 1] and NaN becomes silence.
    pub fn sanitized(&self) -> Self {
        let volume = if self.audio_volume.is_nan() {
            0.0
        } else {
            self.audio_volume.clamp(0.0, 1.0)
        };
        Self {
            panel_duration_secs: self.panel_duration_secs.max(1),
            width: self.width.max(1),
            height: self.height.max(1),
            fps: self.fps.max(1),
            audio_volume: volume,
            ..self.clone()
        }
    }

    /// Frames each panel is held for.
    pub fn frames_per_panel(&self) -> u64 {
        self.panel_duration_secs.max(1) as u64 * self.fps.max(1) as u64
    }

    /// Title with a fallback, safe to embed in a file name.
    pub fn file_title(&self) -> String {
        file_safe_title(&self.title)
    }
}

/// Replace path separators and control characters; empty becomes the default title.
pub fn file_safe_title(title: &str) -> String {
    let cleaned: String = title
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if cleaned.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        cleaned
    }
}

/// `<title>_<unix-ms>.<ext>`
pub fn video_file_name(title: &str, unix_ms: i64, extension: &str) -> String {
    format!("{}_{}.{}", file_safe_title(title), unix_ms, extension)
}

/// `<title>_<NNN>.png` for the zero-based `index`.
pub fn image_file_name(title: &str, index: usize) -> String {
    format!("{}_{:03}.png", file_safe_title(title), index + 1)
}

/// `<title>.html`
pub fn html_file_name(title: &str) -> String {
    format!("{}.html", file_safe_title(title))
}

/// `<title>_subtitles.srt`
pub fn subtitle_file_name(title: &str, extension: &str) -> String {
    format!("{}_subtitles.{}", file_safe_title(title), extension)
}
