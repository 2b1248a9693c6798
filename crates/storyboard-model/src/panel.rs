//! Storyboard panel types.

use serde::{Deserialize, Serialize};

/// Camera framing tag. Presentational only; it never changes compositing
/// geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CameraAngle {
    CloseUp,
    #[default]
    Medium,
    Wide,
    BirdsEye,
    LowAngle,
}

impl CameraAngle {
    pub const ALL: [CameraAngle; 5] = [
        CameraAngle::CloseUp,
        CameraAngle::Medium,
        CameraAngle::Wide,
        CameraAngle::BirdsEye,
        CameraAngle::LowAngle,
    ];

    /// Identifier as stored in storyboard files.
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraAngle::CloseUp => "close-up",
            CameraAngle::Medium => "medium",
            CameraAngle::Wide => "wide",
            CameraAngle::BirdsEye => "birds-eye",
            CameraAngle::LowAngle => "low-angle",
        }
    }

    /// Human-readable label used in HTML export.
    pub fn label(&self) -> &'static str {
        match self {
            CameraAngle::CloseUp => "Close-up",
            CameraAngle::Medium => "Medium shot",
            CameraAngle::Wide => "Wide shot",
            CameraAngle::BirdsEye => "Bird's-eye view",
            CameraAngle::LowAngle => "Low angle",
        }
    }
}

impl std::str::FromStr for CameraAngle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CameraAngle::ALL
            .into_iter()
            .find(|angle| angle.as_str() == s)
            .ok_or_else(|| format!("unknown camera angle: {s}"))
    }
}

/// Where a panel's artwork lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource<'a> {
    /// Inline `data:` URI.
    DataUri(&'a str),
    /// `http(s)://` URL.
    Remote(&'a str),
    /// Anything else is treated as a filesystem path.
    LocalPath(&'a str),
}

impl<'a> ImageSource<'a> {
    /// Classify a stored image reference.
    pub fn classify(reference: &'a str) -> Self {
        let trimmed = reference.trim();
        if trimmed.starts_with("data:") {
            ImageSource::DataUri(trimmed)
        } else if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            ImageSource::Remote(trimmed)
        } else {
            ImageSource::LocalPath(trimmed)
        }
    }

    /// The raw reference string.
    pub fn as_str(&self) -> &'a str {
        match self {
            ImageSource::DataUri(s) | ImageSource::Remote(s) | ImageSource::LocalPath(s) => s,
        }
    }
}

/// One storyboard unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryboardPanel {
    /// Stable identifier.
    pub id: String,

    /// Scene this panel was seeded from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_id: Option<String>,

    /// Zero-based position within the storyboard.
    pub order: usize,

    /// Free-text visual description.
    #[serde(default)]
    pub description: String,

    /// Optional dialogue overlay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialogue: Option<String>,

    /// Camera framing tag.
    #[serde(default)]
    pub camera_angle: CameraAngle,

    /// Artwork reference (data URI, remote URL, or local path).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    /// Generated image prompt, if one was built for this panel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

/// Fields supplied when creating a panel.
#[derive(Debug, Clone, Default)]
pub struct PanelDraft {
    pub scene_id: Option<String>,
    pub description: String,
    pub dialogue: Option<String>,
    pub camera_angle: CameraAngle,
    pub image_url: Option<String>,
}

impl StoryboardPanel {
    /// Create a panel from a draft at the given position.
    pub fn from_draft(draft: PanelDraft, order: usize) -> Self {
        Self {
            id: crate::storyboard::new_id(),
            scene_id: draft.scene_id,
            order,
            description: draft.description,
            dialogue: draft.dialogue.filter(|d| !d.trim().is_empty()),
            camera_angle: draft.camera_angle,
            image_url: draft.image_url.filter(|u| !u.trim().is_empty()),
            prompt: None,
        }
    }

    /// Whether the panel carries artwork.
    pub fn has_image(&self) -> bool {
        self.image_source().is_some()
    }

    /// Classified artwork reference, ignoring blank values.
    pub fn image_source(&self) -> Option<ImageSource<'_>> {
        self.image_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .map(ImageSource::classify)
    }

    /// Dialogue text, ignoring blank values.
    pub fn dialogue_text(&self) -> Option<&str> {
        self.dialogue.as_deref().filter(|d| !d.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_angle_serializes_kebab_case() {
        let json = serde_json::to_string(&CameraAngle::BirdsEye).unwrap();
        assert_eq!(json, "\"birds-eye\"");
        let parsed: CameraAngle = serde_json::from_str("\"low-angle\"").unwrap();
        assert_eq!(parsed, CameraAngle::LowAngle);
        assert_eq!("close-up".parse::<CameraAngle>(), Ok(CameraAngle::CloseUp));
        assert!("dutch".parse::<CameraAngle>().is_err());
    }

    #[test]
    fn test_image_source_classification() {
        assert!(matches!(
            ImageSource::classify("data:image/png;base64,AAAA"),
            ImageSource::DataUri(_)
        ));
        assert!(matches!(
            ImageSource::classify("https://cdn.example.com/a.png"),
            ImageSource::Remote(_)
        ));
        assert!(matches!(
            ImageSource::classify("art/panel-1.png"),
            ImageSource::LocalPath("art/panel-1.png")
        ));
    }

    #[test]
    fn test_blank_image_url_is_not_an_image() {
        let mut panel = StoryboardPanel::from_draft(PanelDraft::default(), 0);
        assert!(!panel.has_image());
        panel.image_url = Some("  ".to_string());
        assert!(!panel.has_image());
        panel.image_url = Some("a.png".to_string());
        assert!(panel.has_image());
    }

    #[test]
    fn test_panel_reads_web_editor_json() {
        let json = r#"{
            "id": "p1",
            "sceneId": "s1",
            "order": 0,
            "description": "Rooftop at dusk",
            "dialogue": "We made it.",
            "cameraAngle": "wide",
            "imageUrl": "https://example.com/1.png",
            "isGenerating": false
        }"#;
        let panel: StoryboardPanel = serde_json::from_str(json).unwrap();
        assert_eq!(panel.camera_angle, CameraAngle::Wide);
        assert_eq!(panel.dialogue_text(), Some("We made it."));
        assert_eq!(panel.scene_id.as_deref(), Some("s1"));
    }
}
