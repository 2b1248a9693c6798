//! Streaming recorders.
//!
//! A [`Recorder`] accepts composited frames and mixed audio as they are
//! produced and assembles them into one output file when finished. The
//! ffmpeg backend pipes raw RGBA frames into an encoder process, spools
//! audio to a side file, and muxes both at the end.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use anyhow::Context as _;
use serde::Serialize;
use storyreel_common::error::{StoryreelError, StoryreelResult};

use crate::audio::{CHANNELS, SAMPLE_RATE};
use crate::compositor::Frame;

/// WebM video codecs in order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    Vp9,
    Vp8,
}

impl VideoCodec {
    /// ffmpeg encoder name.
    pub fn encoder(&self) -> &'static str {
        match self {
            VideoCodec::Vp9 => "libvpx-vp9",
            VideoCodec::Vp8 => "libvpx",
        }
    }

}

impl std::fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VideoCodec::Vp9 => write!(f, "vp9"),
            VideoCodec::Vp8 => write!(f, "vp8"),
        }
    }
}

/// Audio encoder used when muxing background music.
pub const AUDIO_ENCODER: &str = "libopus";

/// Whether `ffmpeg -encoders` output lists `encoder`.
pub fn has_encoder(encoder_list: &str, encoder: &str) -> bool {
    encoder_list
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .any(|name| name == encoder)
}

/// Pick the preferred codec from `ffmpeg -encoders` output.
pub fn pick_codec(encoder_list: &str) -> Option<VideoCodec> {
    [VideoCodec::Vp9, VideoCodec::Vp8]
        .into_iter()
        .find(|codec| has_encoder(encoder_list, codec.encoder()))
}

fn list_encoders() -> Option<String> {
    let output = Command::new("ffmpeg")
        .args(["-hide_banner", "-encoders"])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Ask the local ffmpeg which WebM encoder it offers.
pub fn negotiate_codec() -> Option<VideoCodec> {
    pick_codec(&list_encoders()?)
}

/// Whether the local ffmpeg can encode the audio track.
pub fn audio_encoder_available() -> bool {
    list_encoders().is_some_and(|list| has_encoder(&list, AUDIO_ENCODER))
}

/// How a finished recording reached its output path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finalized {
    /// Video and audio were muxed together.
    Muxed,
    /// The encoded video was kept as-is.
    VideoOnly,
}

/// Place the encoded video at `output_path`, muxing audio first when a
/// mux step is given. A failed mux falls back to the silent video.
pub fn finalize_output<F>(
    video_path: &Path,
    output_path: &Path,
    mux: Option<F>,
) -> StoryreelResult<Finalized>
where
    F: FnOnce() -> StoryreelResult<()>,
{
    if let Some(mux) = mux {
        match mux() {
            Ok(()) => return Ok(Finalized::Muxed),
            Err(err) => {
                tracing::warn!(error = %err, "Audio mux failed, keeping video without audio");
                remove_if_exists(output_path);
            }
        }
    }
    std::fs::rename(video_path, output_path)?;
    Ok(Finalized::VideoOnly)
}

/// Whether `binary` is on `PATH`.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Settings for one recording.
#[derive(Debug, Clone, PartialEq)]
pub struct RecorderConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub bitrate_kbps: u32,
    pub output_path: PathBuf,

    /// Codec to use; `None` lets the backend negotiate.
    pub codec: Option<VideoCodec>,

    /// Whether audio samples will be pushed.
    pub with_audio: bool,
}

/// A sink for frames and audio that produces one file.
pub trait Recorder: Send {
    /// Begin a recording. Must fail without leaving a file behind.
    fn start(&mut self, config: &RecorderConfig) -> StoryreelResult<()>;

    fn push_frame(&mut self, frame: &Frame) -> StoryreelResult<()>;

    /// Interleaved stereo samples at [`SAMPLE_RATE`].
    fn push_audio(&mut self, samples: &[f32]) -> StoryreelResult<()>;

    /// Stop and assemble the output; returns its path.
    fn finish(&mut self) -> StoryreelResult<PathBuf>;

    /// Stop and discard everything written so far. Safe to call at any time.
    fn abort(&mut self);

    /// Backend name.
    fn name(&self) -> &str;
}

struct ActiveRecording {
    config: RecorderConfig,
    codec: VideoCodec,
    child: Child,
    stdin: Option<ChildStdin>,
    video_path: PathBuf,
    audio_path: PathBuf,
    audio: Option<BufWriter<File>>,
    audio_samples: u64,
    frames: u64,
}

/// Recorder backed by the `ffmpeg` binary.
#[derive(Default)]
pub struct FfmpegRecorder {
    active: Option<ActiveRecording>,
}

impl FfmpegRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_available(&self) -> bool {
        command_exists("ffmpeg")
    }

    /// Codec of the recording in progress.
    pub fn codec(&self) -> Option<VideoCodec> {
        self.active.as_ref().map(|a| a.codec)
    }

    fn active(&mut self) -> StoryreelResult<&mut ActiveRecording> {
        self.active
            .as_mut()
            .ok_or_else(|| StoryreelError::export("recorder is not running"))
    }
}

/// Arguments for the video-only encode that reads frames from stdin.
pub fn encoder_args(config: &RecorderConfig, codec: VideoCodec, video_path: &Path) -> Vec<String> {
    let mut args: Vec<String> = [
        "-y",
        "-loglevel",
        "error",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgba",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.extend([
        "-s".to_string(),
        format!("{}x{}", config.width, config.height),
        "-r".to_string(),
        config.fps.to_string(),
        "-i".to_string(),
        "pipe:0".to_string(),
        "-an".to_string(),
        "-c:v".to_string(),
        codec.encoder().to_string(),
        "-b:v".to_string(),
        format!("{}k", config.bitrate_kbps),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
    ]);
    if codec == VideoCodec::Vp9 {
        args.extend(["-row-mt".to_string(), "1".to_string()]);
    }
    args.push(video_path.display().to_string());
    args
}

/// Arguments that mux the encoded video with the spooled PCM track.
pub fn mux_args(video_path: &Path, audio_path: &Path, output_path: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-i".to_string(),
        video_path.display().to_string(),
        "-f".to_string(),
        "f32le".to_string(),
        "-ar".to_string(),
        SAMPLE_RATE.to_string(),
        "-ac".to_string(),
        CHANNELS.to_string(),
        "-i".to_string(),
        audio_path.display().to_string(),
        "-c:v".to_string(),
        "copy".to_string(),
        "-c:a".to_string(),
        AUDIO_ENCODER.to_string(),
        "-b:a".to_string(),
        "128k".to_string(),
        "-shortest".to_string(),
        output_path.display().to_string(),
    ]
}

fn side_path(output: &Path, suffix: &str) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    output.with_file_name(name)
}

fn remove_if_exists(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %err, "Failed to remove temporary file");
        }
    }
}

impl Recorder for FfmpegRecorder {
    fn start(&mut self, config: &RecorderConfig) -> StoryreelResult<()> {
        if self.active.is_some() {
            return Err(StoryreelError::Busy);
        }
        if !self.is_available() {
            return Err(StoryreelError::unsupported(
                "ffmpeg was not found in PATH; it is required for video export",
            ));
        }

        let codec = match config.codec {
            Some(codec) => codec,
            None => negotiate_codec().ok_or_else(|| {
                StoryreelError::unsupported("ffmpeg offers neither a VP9 nor a VP8 encoder")
            })?,
        };

        if let Some(parent) = config.output_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
        }

        let video_path = side_path(&config.output_path, ".video.webm");
        let audio_path = side_path(&config.output_path, ".audio.f32");
        let audio = if config.with_audio {
            Some(BufWriter::new(File::create(&audio_path)?))
        } else {
            None
        };

        let args = encoder_args(config, codec, &video_path);
        tracing::debug!(args = ?args, "Starting ffmpeg recorder");
        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                remove_if_exists(&audio_path);
                StoryreelError::export(format!("failed to start ffmpeg: {e}"))
            })?;

        let stdin = match child.stdin.take() {
            Some(stdin) => stdin,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                remove_if_exists(&audio_path);
                return Err(StoryreelError::export("failed to open ffmpeg stdin"));
            }
        };

        tracing::info!(
            pid = child.id(),
            codec = %codec,
            width = config.width,
            height = config.height,
            fps = config.fps,
            "ffmpeg recorder started"
        );

        self.active = Some(ActiveRecording {
            config: config.clone(),
            codec,
            child,
            stdin: Some(stdin),
            video_path,
            audio_path,
            audio,
            audio_samples: 0,
            frames: 0,
        });
        Ok(())
    }

    fn push_frame(&mut self, frame: &Frame) -> StoryreelResult<()> {
        let active = self.active()?;
        if frame.width() != active.config.width || frame.height() != active.config.height {
            return Err(StoryreelError::export(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width(),
                frame.height(),
                active.config.width,
                active.config.height
            )));
        }
        let stdin = active
            .stdin
            .as_mut()
            .ok_or_else(|| StoryreelError::export("ffmpeg recorder is already finalized"))?;
        stdin
            .write_all(frame.rgba())
            .map_err(|e| StoryreelError::export(format!("failed to write frame to ffmpeg: {e}")))?;
        active.frames += 1;
        Ok(())
    }

    fn push_audio(&mut self, samples: &[f32]) -> StoryreelResult<()> {
        let active = self.active()?;
        let Some(writer) = active.audio.as_mut() else {
            return Ok(());
        };
        for sample in samples {
            writer.write_all(&sample.to_le_bytes())?;
        }
        active.audio_samples += samples.len() as u64;
        Ok(())
    }

    fn finish(&mut self) -> StoryreelResult<PathBuf> {
        let mut active = self
            .active
            .take()
            .ok_or_else(|| StoryreelError::export("recorder is not running"))?;

        drop(active.stdin.take());
        let encoded = active
            .child
            .wait_with_output()
            .map_err(|e| StoryreelError::export(format!("failed to wait for ffmpeg: {e}")));

        let result = encoded.and_then(|output| {
            if !output.status.success() {
                return Err(StoryreelError::export(format!(
                    "ffmpeg exited with status {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                )));
            }
            if let Some(mut writer) = active.audio.take() {
                writer.flush()?;
            }
            let output_path = &active.config.output_path;
            let (video_path, audio_path) = (&active.video_path, &active.audio_path);
            let mux = (active.audio_samples > 0).then_some(|| -> StoryreelResult<()> {
                let status = Command::new("ffmpeg")
                    .args(mux_args(video_path, audio_path, output_path))
                    .stdin(Stdio::null())
                    .output()
                    .map_err(|e| StoryreelError::export(format!("failed to run ffmpeg mux: {e}")))?;
                if !status.status.success() {
                    return Err(StoryreelError::export(format!(
                        "ffmpeg mux failed: {}",
                        String::from_utf8_lossy(&status.stderr).trim()
                    )));
                }
                Ok(())
            });
            let finalized = finalize_output(video_path, output_path, mux)?;
            tracing::debug!(?finalized, "Output placed");
            Ok(output_path.clone())
        });

        remove_if_exists(&active.video_path);
        remove_if_exists(&active.audio_path);
        match &result {
            Ok(path) => tracing::info!(
                path = %path.display(),
                frames = active.frames,
                audio_samples = active.audio_samples,
                "Recording finalized"
            ),
            Err(_) => remove_if_exists(&active.config.output_path),
        }
        result
    }

    fn abort(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        drop(active.stdin.take());
        drop(active.audio.take());
        if let Err(err) = active.child.kill() {
            tracing::debug!(error = %err, "ffmpeg already exited");
        }
        let _ = active.child.wait();
        remove_if_exists(&active.video_path);
        remove_if_exists(&active.audio_path);
        remove_if_exists(&active.config.output_path);
        tracing::info!(frames = active.frames, "Recording aborted");
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

impl Drop for FfmpegRecorder {
    fn drop(&mut self) {
        self.abort();
    }
}
