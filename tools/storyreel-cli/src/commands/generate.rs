//! Run generation providers: artwork, scripts, dialogue, and video.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Subcommand;
use storyreel_common::config::AppConfig;
use storyreel_common::RealtimePacer;
use storyreel_providers::{
    build_image_prompt, generate_missing_artwork, generate_video, video_prompt, ArtStyle,
    ArtworkOptions, Capability, GeneratedImage, GenerationProvider, ImageRequest, ImageStyle,
    PromptSpec, ProviderRegistry, RetryPolicy, ScriptWriter, ShotAngle, VideoPolling,
    VideoPromptPlan, VideoRequest,
};
use storyreel_render_engine::{load_as_data_uri, DefaultImageLoader, ImageLoader};
use storyreel_storyboard::{CharacterDraft, ScriptDraft, Storyboard};

#[derive(Debug, Clone, Subcommand)]
pub enum GenerateAction {
    /// Generate one image from a description
    Image {
        /// What the picture shows
        prompt: String,

        /// manga, anime, realistic, watercolor, comic, sketch, gouache, lineart, colorized
        #[arg(long, default_value = "manga")]
        style: ImageStyle,

        /// close-up, medium, wide, birds-eye, low-angle, over-shoulder, pov
        #[arg(long, default_value = "medium")]
        angle: ShotAngle,

        /// cinematic, dramatic, soft, vibrant, moody, dreamy
        #[arg(long)]
        art_style: Option<ArtStyle>,

        /// Script JSON whose characters are described in the prompt
        #[arg(long)]
        script: Option<PathBuf>,

        /// Character reference image (URL or data URI)
        #[arg(long)]
        reference: Option<String>,

        /// Provider id (defaults to the configured image provider)
        #[arg(long)]
        provider: Option<String>,

        /// Save the image here instead of printing its reference
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a script from a premise
    Script {
        prompt: String,

        #[arg(long, default_value = "drama")]
        genre: String,

        /// Script JSON output (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert a prose story file into a script
    Import {
        /// Story text file (first 5000 characters are used)
        file: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write dialogue for the characters of a script
    Dialogue {
        /// Situation the characters are in
        context: String,

        /// Script JSON providing the characters
        #[arg(long)]
        script: PathBuf,
    },

    /// Describe a scene visually
    Scene {
        /// What happens in the scene
        context: String,
    },

    /// Animate the first panel with artwork into a short AI video (SiliconFlow)
    Video {
        /// Storyboard JSON file
        storyboard: PathBuf,

        /// Motion prompt (defaults to the panel description)
        #[arg(long)]
        prompt: Option<String>,

        /// Download the finished video here instead of printing its URL
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Rewrite a shot description into prompts for AI video tools
    VideoPrompt {
        /// Rough description of the shot
        prompt: String,
    },

    /// Generate artwork for every panel that has a description but no image
    Artwork {
        /// Storyboard JSON file, updated in place
        storyboard: PathBuf,

        #[arg(long, default_value = "manga")]
        style: ImageStyle,

        /// Script JSON whose characters are described in each prompt
        #[arg(long)]
        script: Option<PathBuf>,

        #[arg(long)]
        provider: Option<String>,
    },
}

pub async fn run(config: &AppConfig, action: GenerateAction) -> anyhow::Result<()> {
    let registry = ProviderRegistry::from_config(&config.providers)?;

    match action {
        GenerateAction::Image {
            prompt,
            style,
            angle,
            art_style,
            script,
            reference,
            provider,
            output,
        } => {
            let provider = image_provider(&registry, provider.as_deref())?;
            let characters = characters_from(script.as_deref())?;
            let spec = PromptSpec {
                style,
                angle,
                art_style,
                has_reference: reference.is_some(),
                ..PromptSpec::new(prompt)
            }
            .with_characters(&characters);
            let prompt = build_image_prompt(&spec);
            println!("Generating image with {}...", provider.kind());
            tracing::debug!(prompt = %prompt, "Image prompt");

            let image = provider
                .image(ImageRequest {
                    prompt,
                    reference_image: reference,
                    size: None,
                })
                .await?;

            match output {
                Some(path) => {
                    save_image(image, &path).await?;
                    println!("Image saved: {}", path.display());
                }
                None => println!("{}", abbreviate_reference(&image.into_reference())),
            }
            Ok(())
        }
        GenerateAction::Script {
            prompt,
            genre,
            output,
        } => {
            let writer = script_writer(config, &registry)?;
            println!("Writing {genre} script...");
            let draft = writer.generate_script(&prompt, &genre).await?;
            emit_script(&draft, output.as_deref())
        }
        GenerateAction::Import { file, output } => {
            let text = std::fs::read_to_string(&file)
                .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", file.display()))?;
            let writer = script_writer(config, &registry)?;
            println!("Importing {}...", file.display());
            let draft = writer.import_text(&text).await?;
            emit_script(&draft, output.as_deref())
        }
        GenerateAction::Dialogue { context, script } => {
            let characters = characters_from(Some(&script))?;
            if characters.is_empty() {
                anyhow::bail!("{} defines no characters", script.display());
            }
            let writer = script_writer(config, &registry)?;
            let lines = writer.generate_dialogue(&context, &characters).await?;
            for line in &lines {
                match &line.emotion {
                    Some(emotion) => println!("{} ({emotion}): {}", line.character_id, line.content),
                    None => println!("{}: {}", line.character_id, line.content),
                }
            }
            Ok(())
        }
        GenerateAction::Scene { context } => {
            let writer = script_writer(config, &registry)?;
            let scene = writer.describe_scene(&context).await?;
            println!("Location: {}", scene.location);
            println!("{}", scene.description);
            Ok(())
        }
        GenerateAction::Video {
            storyboard: path,
            prompt,
            output,
        } => {
            let storyboard = Storyboard::load(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load storyboard: {e}"))?;
            let Some(panel) = storyboard.panels_with_images().into_iter().next() else {
                anyhow::bail!("No panel has artwork; attach or generate an image first");
            };
            let reference = panel.image_url.clone().unwrap_or_default();
            let loader = DefaultImageLoader::new()?;
            let image = load_as_data_uri(&loader, &reference).await?;
            let prompt = prompt.unwrap_or_else(|| video_prompt(&panel.description));

            let provider = registry.video_provider();
            println!("Submitting panel {} to {}...", panel.order + 1, provider.kind());
            let url = generate_video(
                provider.as_ref(),
                &RealtimePacer,
                VideoRequest { prompt, image },
                VideoPolling::default(),
                |percent| {
                    print!("\r  Waiting for video: {percent}%  ");
                    std::io::stdout().flush().ok();
                },
            )
            .await?;
            println!();

            match output {
                Some(path) => {
                    let bytes = loader.fetch(&url).await?;
                    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                    tokio::fs::write(&path, bytes).await?;
                    println!("Video saved: {}", path.display());
                }
                None => println!("Video ready: {url}"),
            }
            Ok(())
        }
        GenerateAction::VideoPrompt { prompt } => {
            let writer = script_writer(config, &registry)?;
            let plan = writer.optimize_video_prompt(&prompt).await?;
            print_video_plan(&plan);
            Ok(())
        }
        GenerateAction::Artwork {
            storyboard: path,
            style,
            script,
            provider,
        } => {
            let mut storyboard = Storyboard::load(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load storyboard: {e}"))?;
            let provider = image_provider(&registry, provider.as_deref())?;
            let options = ArtworkOptions {
                style,
                characters: characters_from(script.as_deref())?,
            };

            let pending = storyboard.panels_missing_artwork().len();
            if pending == 0 {
                println!("Every described panel already has artwork.");
                return Ok(());
            }
            println!("Generating artwork for {pending} panel(s) with {}...", provider.kind());

            let report =
                generate_missing_artwork(&mut storyboard, provider.as_ref(), &RealtimePacer, &options)
                    .await;
            storyboard
                .save(&path)
                .map_err(|e| anyhow::anyhow!("Failed to save storyboard: {e}"))?;

            for (panel, reason) in &report.failed {
                println!("  Panel {panel} failed: {reason}");
            }
            println!(
                "Artwork generated for {}/{} panel(s)",
                report.generated.len(),
                report.attempted()
            );
            Ok(())
        }
    }
}

fn image_provider(
    registry: &ProviderRegistry,
    name: Option<&str>,
) -> anyhow::Result<Arc<dyn GenerationProvider>> {
    let provider = match name {
        Some(name) => registry.for_capability(name, Capability::Image)?,
        None => registry.image_provider()?,
    };
    Ok(provider)
}

fn script_writer(config: &AppConfig, registry: &ProviderRegistry) -> anyhow::Result<ScriptWriter> {
    Ok(ScriptWriter::new(
        registry.text_provider()?,
        RetryPolicy::from(&config.retry),
        Arc::new(RealtimePacer),
    ))
}

fn characters_from(script: Option<&Path>) -> anyhow::Result<Vec<CharacterDraft>> {
    let Some(path) = script else {
        return Ok(Vec::new());
    };
    let json = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read script {}: {e}", path.display()))?;
    let draft: ScriptDraft = serde_json::from_str(&json)
        .map_err(|e| anyhow::anyhow!("Failed to parse script {}: {e}", path.display()))?;
    Ok(draft.characters)
}

fn emit_script(draft: &ScriptDraft, output: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(draft)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            println!(
                "Script saved: {} ({} scene(s), {} line(s))",
                path.display(),
                draft.scenes.len(),
                draft.dialogue_count()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

async fn save_image(image: GeneratedImage, path: &Path) -> anyhow::Result<()> {
    let bytes = match image {
        GeneratedImage::Bytes { data, .. } => data,
        other => {
            let loader = DefaultImageLoader::new()?;
            loader.fetch(&other.into_reference()).await?
        }
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

fn print_video_plan(plan: &VideoPromptPlan) {
    println!("Prompt: {}", plan.optimized_prompt);
    if !plan.negative_prompt.is_empty() {
        println!("Negative: {}", plan.negative_prompt);
    }
    for (model, prompt) in &plan.model_prompts {
        println!("  {model}: {prompt}");
    }
    for tip in &plan.tips {
        println!("  - {tip}");
    }
}

/// Data URIs are shortened for the terminal.
fn abbreviate_reference(reference: &str) -> String {
    if reference.starts_with("data:") && reference.len() > 80 {
        format!("{}... ({} bytes)", &reference[..64], reference.len())
    } else {
        reference.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbreviate_reference() {
        let uri = format!("data:image/png;base64,{}", "A".repeat(200));
        let short = abbreviate_reference(&uri);
        assert!(short.starts_with("data:image/png;base64,AAA"));
        assert!(short.ends_with("(222 bytes)"));
        assert_eq!(abbreviate_reference("https://x.test/a.png"), "https://x.test/a.png");
    }

    #[test]
    fn test_characters_from_missing_script_is_empty() {
        assert!(characters_from(None).unwrap().is_empty());
        assert!(characters_from(Some(Path::new("/no/such/script.json"))).is_err());
    }
}
