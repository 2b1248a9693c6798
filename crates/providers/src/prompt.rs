//! Image prompt construction.

use serde::{Deserialize, Serialize};
use storyreel_storyboard::{CameraAngle, CharacterDraft, StoryboardPanel};

/// Rendering style for generated artwork.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageStyle {
    #[default]
    Manga,
    Anime,
    Realistic,
    Watercolor,
    Comic,
    Sketch,
    Gouache,
    Lineart,
    Colorized,
}

impl ImageStyle {
    pub fn description(&self) -> &'static str {
        match self {
            ImageStyle::Manga => "Japanese manga style, black and white with screentones, dynamic lines, expressive characters",
            ImageStyle::Anime => "Anime style, vibrant colors, clean lines, cel-shaded, Studio Ghibli inspired",
            ImageStyle::Realistic => "Photorealistic style, detailed textures, natural lighting, cinematic quality",
            ImageStyle::Watercolor => "Watercolor painting style, soft edges, blended colors, artistic, dreamy atmosphere",
            ImageStyle::Comic => "American comic book style, bold outlines, vibrant colors, dynamic action",
            ImageStyle::Sketch => "Pencil sketch style, detailed shading, artistic, hand-drawn look",
            ImageStyle::Gouache => "Gouache painting style, thick brushstrokes, vibrant opaque colors, matte finish",
            ImageStyle::Lineart => "Clean line art, black and white, detailed outlines, no shading",
            ImageStyle::Colorized => "Fully colored manga, professional coloring, vibrant, detailed",
        }
    }
}

impl std::str::FromStr for ImageStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.trim().to_ascii_lowercase()))
            .map_err(|_| format!("unknown image style: {s}"))
    }
}

/// Camera shot for prompting. Extends [`CameraAngle`] with shots that only
/// matter to image generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ShotAngle {
    CloseUp,
    #[default]
    Medium,
    Wide,
    BirdsEye,
    LowAngle,
    OverShoulder,
    Pov,
}

impl ShotAngle {
    pub fn description(&self) -> &'static str {
        match self {
            ShotAngle::CloseUp => "close-up shot, focused on face and emotions",
            ShotAngle::Medium => "medium shot, showing upper body and expressions",
            ShotAngle::Wide => "wide shot, showing full environment and context",
            ShotAngle::BirdsEye => "bird's eye view, looking down from above",
            ShotAngle::LowAngle => "low angle shot, dramatic perspective from below",
            ShotAngle::OverShoulder => "over-the-shoulder shot, showing two characters",
            ShotAngle::Pov => "first person perspective, POV shot",
        }
    }
}

impl From<CameraAngle> for ShotAngle {
    fn from(angle: CameraAngle) -> Self {
        match angle {
            CameraAngle::CloseUp => ShotAngle::CloseUp,
            CameraAngle::Medium => ShotAngle::Medium,
            CameraAngle::Wide => ShotAngle::Wide,
            CameraAngle::BirdsEye => ShotAngle::BirdsEye,
            CameraAngle::LowAngle => ShotAngle::LowAngle,
        }
    }
}

impl std::str::FromStr for ShotAngle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.trim().to_ascii_lowercase()))
            .map_err(|_| format!("unknown camera angle: {s}"))
    }
}

/// Optional lighting and mood modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtStyle {
    Cinematic,
    Dramatic,
    Soft,
    Vibrant,
    Moody,
    Dreamy,
}

impl ArtStyle {
    pub fn description(&self) -> &'static str {
        match self {
            ArtStyle::Cinematic => "cinematic lighting, film grain, movie-quality",
            ArtStyle::Dramatic => "dramatic lighting, high contrast, intense mood",
            ArtStyle::Soft => "soft lighting, gentle, pastel colors, ethereal",
            ArtStyle::Vibrant => "vibrant colors, high saturation, energetic",
            ArtStyle::Moody => "moody atmosphere, dark tones, mysterious",
            ArtStyle::Dreamy => "dreamy, soft focus, surreal, magical",
        }
    }
}

impl std::str::FromStr for ArtStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.trim().to_ascii_lowercase()))
            .map_err(|_| format!("unknown art style: {s}"))
    }
}

/// Inputs for one image prompt.
#[derive(Debug, Clone, Default)]
pub struct PromptSpec {
    pub base: String,
    /// `name: appearance` lines for the characters in frame.
    pub characters: Vec<String>,
    pub style: ImageStyle,
    pub angle: ShotAngle,
    pub art_style: Option<ArtStyle>,
    /// Whether a character reference image accompanies the request.
    pub has_reference: bool,
}

impl PromptSpec {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            ..Self::default()
        }
    }

    /// Add characters as `name: appearance` descriptions.
    pub fn with_characters<'a>(mut self, characters: impl IntoIterator<Item = &'a CharacterDraft>) -> Self {
        self.characters
            .extend(characters.into_iter().map(|c| format!("{}: {}", c.name, c.appearance)));
        self
    }
}

/// Assemble the final prompt text.
pub fn build_image_prompt(spec: &PromptSpec) -> String {
    let mut prompt = spec.base.trim().to_string();

    if !spec.characters.is_empty() {
        prompt.push_str(&format!(". Characters: {}", spec.characters.join("; ")));
    }
    if spec.has_reference {
        prompt.push_str(". Same character appearance as reference image");
    }

    prompt.push_str(&format!(". Style: {}", spec.style.description()));
    prompt.push_str(&format!(". Camera: {}", spec.angle.description()));

    if let Some(art) = spec.art_style {
        prompt.push_str(&format!(". {}", art.description()));
    }

    prompt
}

/// Prompt for a storyboard panel: its stored prompt if set, otherwise one
/// built from its description and camera angle.
pub fn panel_prompt(panel: &StoryboardPanel, style: ImageStyle, characters: &[CharacterDraft]) -> String {
    if let Some(prompt) = panel.prompt.as_deref().filter(|p| !p.trim().is_empty()) {
        return prompt.to_string();
    }
    let spec = PromptSpec {
        style,
        angle: panel.camera_angle.into(),
        ..PromptSpec::new(panel.description.clone())
    }
    .with_characters(characters);
    build_image_prompt(&spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyreel_storyboard::PanelDraft;

    #[test]
    fn test_full_prompt_order() {
        let spec = PromptSpec {
            base: "A girl on a rooftop".to_string(),
            characters: vec!["Mei: short hair, red scarf".to_string()],
            style: ImageStyle::Watercolor,
            angle: ShotAngle::OverShoulder,
            art_style: Some(ArtStyle::Moody),
            has_reference: true,
        };
        let prompt = build_image_prompt(&spec);
        assert_eq!(
            prompt,
            "A girl on a rooftop. Characters: Mei: short hair, red scarf. \
             Same character appearance as reference image. \
             Style: Watercolor painting style, soft edges, blended colors, artistic, dreamy atmosphere. \
             Camera: over-the-shoulder shot, showing two characters. \
             moody atmosphere, dark tones, mysterious"
        );
    }

    #[test]
    fn test_minimal_prompt_uses_defaults() {
        let prompt = build_image_prompt(&PromptSpec::new("Empty street"));
        assert!(prompt.starts_with("Empty street. Style: Japanese manga style"));
        assert!(prompt.ends_with("Camera: medium shot, showing upper body and expressions"));
    }

    #[test]
    fn test_parse_style_names() {
        assert_eq!("Gouache".parse::<ImageStyle>(), Ok(ImageStyle::Gouache));
        assert_eq!("pov".parse::<ShotAngle>(), Ok(ShotAngle::Pov));
        assert_eq!("over-shoulder".parse::<ShotAngle>(), Ok(ShotAngle::OverShoulder));
        assert_eq!("dreamy".parse::<ArtStyle>(), Ok(ArtStyle::Dreamy));
        assert!("none".parse::<ArtStyle>().is_err());
    }

    #[test]
    fn test_panel_prompt_prefers_stored_prompt() {
        let mut panel = StoryboardPanel::from_draft(
            PanelDraft {
                description: "Harbor at dawn".to_string(),
                camera_angle: CameraAngle::Wide,
                ..PanelDraft::default()
            },
            0,
        );
        let built = panel_prompt(&panel, ImageStyle::Anime, &[]);
        assert!(built.contains("Camera: wide shot"));
        assert!(built.contains("Anime style"));

        panel.prompt = Some("custom prompt".to_string());
        assert_eq!(panel_prompt(&panel, ImageStyle::Anime, &[]), "custom prompt");
    }
}
