//! Check tools and provider credentials.

use storyreel_common::config::{config_file_path, AppConfig};
use storyreel_providers::ProviderRegistry;
use storyreel_render_engine::recorder::{
    audio_encoder_available, command_exists, negotiate_codec, AUDIO_ENCODER,
};
use storyreel_render_engine::default_painter;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Storyreel System Check");
    println!("{}", "=".repeat(50));

    let path = config_file_path();
    if path.exists() {
        println!("[OK] Config: {}", path.display());
    } else {
        println!("[--] Config: {} (not found, using defaults)", path.display());
    }

    let ffmpeg = command_exists("ffmpeg");
    if ffmpeg {
        println!("[OK] ffmpeg found");
        match negotiate_codec() {
            Some(codec) => println!("[OK] Video codec: {codec} ({})", codec.encoder()),
            None => println!("[WARN] ffmpeg has neither libvpx-vp9 nor libvpx; video export unavailable"),
        }
        if audio_encoder_available() {
            println!("[OK] Audio codec: {AUDIO_ENCODER}");
        } else {
            println!("[WARN] ffmpeg lacks {AUDIO_ENCODER}; videos will be exported without music");
        }
    } else {
        println!("[WARN] ffmpeg not found; install it to export video and background music");
    }

    let painter = default_painter();
    println!("[OK] Text renderer: {}", painter.name());

    println!();
    println!("Providers (text: {}, image: {}):", config.providers.text_provider, config.providers.image_provider);
    let registry = ProviderRegistry::from_config(&config.providers)?;
    for status in registry.status() {
        let marker = if status.ready { "OK" } else { "--" };
        let note = match (status.has_key, status.kind.requires_key()) {
            (true, _) => "API key configured",
            (false, false) => "no key needed",
            (false, true) => "no API key",
        };
        println!("  [{marker}] {:<14} {note}", status.kind.display_name());
    }

    println!();
    if ffmpeg {
        println!("Storyreel is ready.");
    } else {
        println!("Image and HTML export work; video export needs ffmpeg.");
    }

    Ok(())
}
