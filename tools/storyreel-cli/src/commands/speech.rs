//! Synthesize narration audio.

use std::path::PathBuf;

use storyreel_common::config::AppConfig;
use storyreel_providers::{synthesize_to_file, ProviderRegistry, Voice};

pub async fn run(config: &AppConfig, text: String, voice: String, output: PathBuf) -> anyhow::Result<()> {
    let voice = match voice.parse::<Voice>() {
        Ok(voice) => voice,
        Err(e) => {
            tracing::warn!("{e}; using {}", Voice::default().as_str());
            Voice::default()
        }
    };

    let registry = ProviderRegistry::from_config(&config.providers)?;
    let provider = registry.speech_provider();
    println!("Synthesizing {} characters with voice {}...", text.chars().count(), voice.as_str());

    match synthesize_to_file(provider.as_ref(), &text, voice, &output).await {
        Ok(path) => {
            println!("Speech saved: {}", path.display());
            Ok(())
        }
        Err(e) => {
            println!("Speech failed: {}", e.user_message());
            Err(e.into())
        }
    }
}
