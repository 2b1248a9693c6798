//! Speech synthesis.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::backends::siliconflow::SPEECH_MODEL;
use crate::error::ProviderError;
use crate::provider::{GenerationProvider, SpeechRequest};

/// Preset voices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    #[default]
    Belle,
    Alex,
    Jesse,
    Elena,
    Jenny,
}

impl Voice {
    pub const ALL: [Voice; 5] = [Voice::Belle, Voice::Alex, Voice::Jesse, Voice::Elena, Voice::Jenny];

    pub fn as_str(&self) -> &'static str {
        match self {
            Voice::Belle => "belle",
            Voice::Alex => "alex",
            Voice::Jesse => "jesse",
            Voice::Elena => "elena",
            Voice::Jenny => "jenny",
        }
    }

    /// Voice id in SiliconFlow's `model:voice` form.
    pub fn siliconflow_id(&self) -> String {
        format!("{SPEECH_MODEL}:{}", self.as_str())
    }

    /// Parse a voice name, falling back to the default voice.
    pub fn parse_or_default(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl std::str::FromStr for Voice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Voice::ALL
            .into_iter()
            .find(|v| v.as_str() == needle)
            .ok_or_else(|| format!("unknown voice: {s}"))
    }
}

/// Synthesize `text` and write it next to `output_stem`.
///
/// The extension follows the returned audio type. Returns the written path.
pub async fn synthesize_to_file(
    provider: &dyn GenerationProvider,
    text: &str,
    voice: Voice,
    output_stem: &Path,
) -> Result<PathBuf, ProviderError> {
    if text.trim().is_empty() {
        return Err(ProviderError::format("nothing to synthesize"));
    }

    let audio = provider
        .speech(SpeechRequest {
            text: text.to_string(),
            voice,
        })
        .await?;

    let path = output_stem.with_extension(audio.extension());
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, &audio.data).await?;
    tracing::info!(path = %path.display(), bytes = audio.data.len(), voice = voice.as_str(), "Speech saved");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_ids() {
        assert_eq!(Voice::Belle.siliconflow_id(), "FunAudioLLM/CosyVoice2-0.5B:belle");
        assert_eq!("Elena".parse::<Voice>(), Ok(Voice::Elena));
        assert_eq!(Voice::parse_or_default("robot"), Voice::Belle);
    }
}
