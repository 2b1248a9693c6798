//! Split narration into timed captions and save them.

use std::path::PathBuf;

use storyreel_captions::{generate_captions, save_subtitles, SegmentationMode};
use storyreel_common::config::AppConfig;
use storyreel_providers::ProviderRegistry;
use storyreel_storyboard::subtitle_file_name;

pub async fn run(
    config: &AppConfig,
    text: String,
    title: Option<String>,
    output_dir: Option<PathBuf>,
    vtt: bool,
    offline: bool,
) -> anyhow::Result<()> {
    if text.trim().is_empty() {
        anyhow::bail!("No text to caption");
    }

    let provider = if offline {
        None
    } else {
        Some(ProviderRegistry::from_config(&config.providers)?.subtitle_provider())
    };
    let captions = generate_captions(provider.as_deref(), &text).await;

    let title = title.unwrap_or_default();
    let extension = if vtt { "vtt" } else { "srt" };
    let path = output_dir
        .unwrap_or_else(|| config.export.output_dir.clone())
        .join(subtitle_file_name(&title, extension));
    save_subtitles(&captions.segments, &path)?;

    let source = match captions.mode {
        SegmentationMode::Provider => "provider timings",
        SegmentationMode::Simple => "simple split (provider answer unusable)",
        SegmentationMode::Fallback => "local split",
    };
    println!("Subtitles: {} entries ({source})", captions.segments.len());
    println!("Saved: {}", path.display());
    Ok(())
}
