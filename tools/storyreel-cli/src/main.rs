//! Storyreel CLI: storyboard editing, generation, and export.
//!
//! Usage:
//!   storyreel export <FORMAT> <STORYBOARD>   Export as video, images, or HTML
//!   storyreel panels <STORYBOARD> <ACTION>   List or rearrange panels
//!   storyreel generate <WHAT>                Run a generation provider
//!   storyreel speech <TEXT>                  Synthesize narration audio
//!   storyreel subtitles <TEXT>               Write timed captions
//!   storyreel check                          Check tools and providers

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use storyreel_common::config::AppConfig;

mod commands;

use commands::export::{ExportArgs, ExportFormat};
use commands::generate::GenerateAction;
use commands::panels::PanelAction;

#[derive(Parser)]
#[command(
    name = "storyreel",
    about = "Turn storyboards into video reels, image sequences, and pages",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/storyreel/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a storyboard
    Export {
        /// Output kind
        #[arg(value_enum)]
        format: ExportFormat,

        /// Storyboard JSON file
        storyboard: PathBuf,

        #[command(flatten)]
        args: ExportArgs,
    },

    /// Inspect or edit the panels of a storyboard
    Panels {
        /// Storyboard JSON file
        storyboard: PathBuf,

        #[command(subcommand)]
        action: PanelAction,
    },

    /// Generate artwork, scripts, or dialogue
    Generate {
        #[command(subcommand)]
        action: GenerateAction,
    },

    /// Synthesize speech to an audio file
    Speech {
        /// Text to speak (at most 1000 characters are sent)
        text: String,

        /// Voice: belle, alex, jesse, elena, jenny
        #[arg(long, default_value = "belle")]
        voice: String,

        /// Output path without extension
        #[arg(short, long, default_value = "speech")]
        output: PathBuf,
    },

    /// Split text into timed subtitles
    Subtitles {
        /// Narration text
        text: String,

        /// Title used in the file name
        #[arg(long)]
        title: Option<String>,

        /// Output directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Write WebVTT instead of SRT
        #[arg(long)]
        vtt: bool,

        /// Skip the provider and split locally
        #[arg(long)]
        offline: bool,
    },

    /// Check ffmpeg, codecs, fonts, and provider credentials
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            let mut config = AppConfig::load_from(path);
            config
                .providers
                .apply_env_overrides(|name| std::env::var(name).ok());
            config
        }
        None => AppConfig::load(),
    };

    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    storyreel_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Export {
            format,
            storyboard,
            args,
        } => commands::export::run(&config, format, storyboard, args).await,
        Commands::Panels { storyboard, action } => commands::panels::run(storyboard, action),
        Commands::Generate { action } => commands::generate::run(&config, action).await,
        Commands::Speech {
            text,
            voice,
            output,
        } => commands::speech::run(&config, text, voice, output).await,
        Commands::Subtitles {
            text,
            title,
            output_dir,
            vtt,
            offline,
        } => commands::subtitles::run(&config, text, title, output_dir, vtt, offline).await,
        Commands::Check => commands::check::run(&config),
    }
}
