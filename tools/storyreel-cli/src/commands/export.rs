//! Export a storyboard to video, a PNG sequence, or an HTML page.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, ValueEnum};
use storyreel_common::config::{AppConfig, ExportDefaults};
use storyreel_common::RealtimePacer;
use storyreel_render_engine::{
    default_painter, export_html, export_images, DefaultImageLoader, ExportJob, ExportProgress,
    ExportStage, FfmpegRecorder, ProgressCallback, RecordingPipeline,
};
use storyreel_storyboard::{DialogueStyle, ExportConfig, Storyboard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// WebM video, one still per panel
    Video,
    /// Numbered PNG files
    Images,
    /// One self-contained HTML page
    Html,
}

#[derive(Debug, Clone, Args)]
pub struct ExportArgs {
    /// Title used in output file names (defaults to the storyboard file name)
    #[arg(short, long)]
    pub title: Option<String>,

    /// Output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Seconds each panel stays on screen
    #[arg(long)]
    pub duration: Option<u32>,

    /// Recording frame rate
    #[arg(long)]
    pub fps: Option<u32>,

    /// Output width
    #[arg(long)]
    pub width: Option<u32>,

    /// Output height
    #[arg(long)]
    pub height: Option<u32>,

    /// Do not draw dialogue
    #[arg(long)]
    pub no_dialogue: bool,

    /// Dialogue style: bubble or subtitle
    #[arg(long)]
    pub style: Option<DialogueStyle>,

    /// Background music, looped for the whole video
    #[arg(long)]
    pub music: Option<PathBuf>,

    /// Background music volume [0.0, 1.0]
    #[arg(long)]
    pub volume: Option<f32>,
}

impl ExportArgs {
    fn export_config(&self, defaults: &ExportDefaults, title: String) -> ExportConfig {
        ExportConfig {
            title,
            panel_duration_secs: self.duration.unwrap_or(defaults.panel_duration_secs),
            show_dialogue: defaults.show_dialogue && !self.no_dialogue,
            dialogue_style: self
                .style
                .unwrap_or_else(|| defaults.dialogue_style.parse().unwrap_or_default()),
            background_audio: self.music.clone(),
            audio_volume: self.volume.unwrap_or(defaults.audio_volume),
            width: self.width.unwrap_or(defaults.width),
            height: self.height.unwrap_or(defaults.height),
            fps: self.fps.unwrap_or(defaults.fps),
        }
        .sanitized()
    }
}

fn default_title(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}

pub async fn run(
    config: &AppConfig,
    format: ExportFormat,
    path: PathBuf,
    args: ExportArgs,
) -> anyhow::Result<()> {
    let storyboard = Storyboard::load(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load storyboard: {e}"))?;

    let title = args.title.clone().unwrap_or_else(|| default_title(&path));
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| config.export.output_dir.clone());

    println!("Exporting storyboard: {}", path.display());
    println!("  Panels: {} ({} with artwork)", storyboard.len(), storyboard.panels_with_images().len());
    println!("  Output: {}", output_dir.display());

    match format {
        ExportFormat::Video => {
            let export_config = args.export_config(&config.export, title);
            export_video(config, &storyboard, export_config, output_dir).await
        }
        ExportFormat::Images => {
            let loader = DefaultImageLoader::new()?;
            let delay = Duration::from_millis(config.export.image_download_delay_ms);
            let progress = progress_printer();
            let report = export_images(
                &storyboard,
                &title,
                &output_dir,
                &loader,
                &RealtimePacer,
                delay,
                Some(&progress),
            )
            .await?;

            println!();
            for written in &report.written {
                println!("  Wrote {}", written.display());
            }
            for (panel, reason) in &report.failed {
                println!("  Skipped panel {panel}: {reason}");
            }
            println!("Image export complete: {} file(s)", report.written.len());
            Ok(())
        }
        ExportFormat::Html => {
            let written = export_html(&storyboard, &title, &output_dir)?;
            println!("HTML export complete: {}", written.display());
            Ok(())
        }
    }
}

async fn export_video(
    config: &AppConfig,
    storyboard: &Storyboard,
    export_config: ExportConfig,
    output_dir: PathBuf,
) -> anyhow::Result<()> {
    println!(
        "  Resolution: {}x{} @ {}fps, {}s per panel",
        export_config.width, export_config.height, export_config.fps, export_config.panel_duration_secs
    );
    if export_config.show_dialogue {
        println!("  Dialogue: {}", export_config.dialogue_style);
    }
    if let Some(music) = &export_config.background_audio {
        println!("  Music: {} (volume {:.2})", music.display(), export_config.audio_volume);
    }

    let mut job = ExportJob::new(export_config, output_dir);
    job.bitrate_kbps = config.export.video_bitrate_kbps;

    let pipeline = RecordingPipeline::new(
        Arc::new(DefaultImageLoader::new()?),
        default_painter(),
        Arc::new(RealtimePacer),
    );

    let cancel = pipeline.cancel_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling export");
            cancel.cancel();
        }
    });

    let mut recorder = FfmpegRecorder::new();
    let result = pipeline
        .export(storyboard, &job, &mut recorder, Some(progress_printer()))
        .await;
    interrupt.abort();

    match result {
        Ok(path) => {
            println!("\nExport complete: {}", path.display());
            Ok(())
        }
        Err(e) => {
            println!("\nExport failed: {e}");
            Err(e.into())
        }
    }
}

fn progress_printer() -> ProgressCallback {
    Box::new(|p: ExportProgress| {
        if p.stage == ExportStage::Preparing {
            print!("\r  Preparing: {}%  ", p.percent);
        } else {
            print!(
                "\r  Progress: {}% ({}/{} frames, ETA: {:.0}s)  ",
                p.percent, p.frames_rendered, p.total_frames, p.eta_secs,
            );
        }
        std::io::stdout().flush().ok();
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ExportArgs {
        ExportArgs {
            title: None,
            output_dir: None,
            duration: None,
            fps: None,
            width: None,
            height: None,
            no_dialogue: false,
            style: None,
            music: None,
            volume: None,
        }
    }

    #[test]
    fn test_flags_override_config_defaults() {
        let defaults = ExportDefaults::default();
        let config = ExportArgs {
            duration: Some(5),
            no_dialogue: true,
            style: Some(DialogueStyle::Subtitle),
            volume: Some(3.0),
            ..args()
        }
        .export_config(&defaults, "Reel".into());

        assert_eq!(config.panel_duration_secs, 5);
        assert_eq!(config.fps, defaults.fps);
        assert!(!config.show_dialogue);
        assert_eq!(config.dialogue_style, DialogueStyle::Subtitle);
        assert_eq!(config.audio_volume, 1.0);
    }

    #[test]
    fn test_config_style_falls_back_to_bubble() {
        let defaults = ExportDefaults {
            dialogue_style: "speech-balloon".into(),
            ..ExportDefaults::default()
        };
        let config = args().export_config(&defaults, String::new());
        assert_eq!(config.dialogue_style, DialogueStyle::Bubble);
    }

    #[test]
    fn test_default_title_is_file_stem() {
        assert_eq!(default_title(Path::new("boards/night-market.json")), "night-market");
    }
}
