//! Background audio mixing.
//!
//! The background track is decoded once per recording run to interleaved
//! stereo `f32` PCM at [`SAMPLE_RATE`], then played back as an endless loop
//! with a gain that can be changed while the run is in progress.

use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use storyreel_common::error::{StoryreelError, StoryreelResult};

/// Output sample rate in Hz.
pub const SAMPLE_RATE: u32 = 48_000;

/// Interleaved output channels.
pub const CHANNELS: u32 = 2;

/// Shared, adjustable gain in [0.0, 1.0].
#[derive(Debug, Clone)]
pub struct VolumeHandle(Arc<AtomicU32>);

impl VolumeHandle {
    pub fn new(volume: f32) -> Self {
        Self(Arc::new(AtomicU32::new(clamp_volume(volume).to_bits())))
    }

    pub fn set(&self, volume: f32) {
        self.0.store(clamp_volume(volume).to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

/// Looping background track.
pub struct AudioMixer {
    samples: Vec<f32>,
    cursor: usize,
    volume: VolumeHandle,
}

impl std::fmt::Debug for AudioMixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioMixer")
            .field("samples", &self.samples.len())
            .field("cursor", &self.cursor)
            .field("volume", &self.volume.get())
            .finish()
    }
}

impl AudioMixer {
    /// Build from interleaved stereo samples. An odd trailing sample is dropped.
    pub fn from_samples(mut samples: Vec<f32>, volume: f32) -> StoryreelResult<Self> {
        samples.truncate(samples.len() - samples.len() % CHANNELS as usize);
        if samples.is_empty() {
            return Err(StoryreelError::audio("background track contains no audio"));
        }
        Ok(Self {
            samples,
            cursor: 0,
            volume: VolumeHandle::new(volume),
        })
    }

    /// Decode at most `max_secs` of `path` through `decoder`.
    pub async fn load(
        decoder: &dyn AudioDecoder,
        path: &Path,
        volume: f32,
        max_secs: f64,
    ) -> StoryreelResult<Self> {
        let samples = decoder.decode(path, max_secs).await?;
        Self::from_samples(samples, volume)
    }

    /// Load the configured track, or fall back to silence on any failure.
    pub async fn load_or_silent(
        decoder: &dyn AudioDecoder,
        path: Option<&Path>,
        volume: f32,
        max_secs: f64,
    ) -> Option<Self> {
        let path = path?;
        match Self::load(decoder, path, volume, max_secs).await {
            Ok(mixer) => {
                tracing::info!(
                    path = %path.display(),
                    secs = mixer.duration_secs(),
                    "Background audio ready"
                );
                Some(mixer)
            }
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "Background audio unavailable, exporting without sound"
                );
                None
            }
        }
    }

    pub fn volume_handle(&self) -> VolumeHandle {
        self.volume.clone()
    }

    /// Length of one loop in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / (SAMPLE_RATE * CHANNELS) as f64
    }

    /// Next `frames` stereo frames (2 × `frames` samples), wrapping around
    /// the end of the track and scaled by the current volume.
    pub fn next_chunk(&mut self, frames: usize) -> Vec<f32> {
        let gain = self.volume.get();
        let wanted = frames * CHANNELS as usize;
        let mut out = Vec::with_capacity(wanted);

        while out.len() < wanted {
            let take = (wanted - out.len()).min(self.samples.len() - self.cursor);
            out.extend(
                self.samples[self.cursor..self.cursor + take]
                    .iter()
                    .map(|s| s * gain),
            );
            self.cursor = (self.cursor + take) % self.samples.len();
        }
        out
    }
}

/// Stereo frames that belong to video frame `index` at `fps`.
///
/// Counts are derived from cumulative totals so rates that do not divide
/// the sample rate do not drift.
pub fn audio_frames_for_video_frame(index: u64, fps: u32) -> usize {
    let fps = fps.max(1) as u64;
    let rate = SAMPLE_RATE as u64;
    let end = (index + 1) * rate / fps;
    let start = index * rate / fps;
    (end - start) as usize
}

/// Source of decoded background tracks.
#[async_trait::async_trait]
pub trait AudioDecoder: Send + Sync {
    /// Decode up to `max_secs` of `path` to interleaved stereo f32 at [`SAMPLE_RATE`].
    async fn decode(&self, path: &Path, max_secs: f64) -> StoryreelResult<Vec<f32>>;
}

/// Decodes with an `ffmpeg` child process on the blocking pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegDecoder;

#[async_trait::async_trait]
impl AudioDecoder for FfmpegDecoder {
    async fn decode(&self, path: &Path, max_secs: f64) -> StoryreelResult<Vec<f32>> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || decode_audio_file(&path, Some(max_secs)))
            .await
            .map_err(|e| StoryreelError::audio(format!("audio decode task failed: {e}")))?
    }
}

/// Output options for the PCM decode; `-t` stops reading after `max_secs`.
fn decode_output_args(max_secs: Option<f64>) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(secs) = max_secs.filter(|s| s.is_finite() && *s > 0.0) {
        args.push("-t".to_string());
        args.push(format!("{secs:.3}"));
    }
    for arg in ["-vn", "-f", "f32le", "-acodec", "pcm_f32le", "-ac"] {
        args.push(arg.to_string());
    }
    args.push(CHANNELS.to_string());
    args.push("-ar".to_string());
    args.push(SAMPLE_RATE.to_string());
    args.push("pipe:1".to_string());
    args
}

/// Decode any ffmpeg-readable audio to interleaved stereo f32 at [`SAMPLE_RATE`].
///
/// Blocks until ffmpeg exits. Longer tracks are cut at `max_secs`.
fn decode_audio_file(path: &Path, max_secs: Option<f64>) -> StoryreelResult<Vec<f32>> {
    if !path.exists() {
        return Err(StoryreelError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let output = Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(path)
        .args(decode_output_args(max_secs))
        .stdin(Stdio::null())
        .output()
        .map_err(|e| StoryreelError::audio(format!("failed to run ffmpeg for audio decode: {e}")))?;

    if !output.status.success() {
        return Err(StoryreelError::audio(format!(
            "ffmpeg audio decode failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(pcm_from_le_bytes(&output.stdout))
}

fn pcm_from_le_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_loops_and_applies_gain() {
        let mut mixer = AudioMixer::from_samples(vec![1.0, -1.0, 0.5, -0.5], 0.5).unwrap();
        let chunk = mixer.next_chunk(3);
        assert_eq!(chunk, vec![0.5, -0.5, 0.25, -0.25, 0.5, -0.5]);

        let next = mixer.next_chunk(1);
        assert_eq!(next, vec![0.25, -0.25]);
    }

    #[test]
    fn test_volume_changes_mid_run() {
        let mut mixer = AudioMixer::from_samples(vec![1.0, 1.0], 1.0).unwrap();
        let handle = mixer.volume_handle();
        assert_eq!(mixer.next_chunk(1), vec![1.0, 1.0]);

        handle.set(0.25);
        assert_eq!(mixer.next_chunk(1), vec![0.25, 0.25]);

        handle.set(7.0);
        assert_eq!(handle.get(), 1.0);
        handle.set(f32::NAN);
        assert_eq!(handle.get(), 0.0);
    }

    #[test]
    fn test_empty_track_is_rejected() {
        assert!(matches!(
            AudioMixer::from_samples(vec![0.3], 1.0),
            Err(StoryreelError::Audio { .. })
        ));
    }

    #[test]
    fn test_audio_frames_sum_to_rate() {
        let total: usize = (0..7).map(|i| audio_frames_for_video_frame(i, 7)).sum();
        assert_eq!(total, SAMPLE_RATE as usize);
        assert_eq!(audio_frames_for_video_frame(0, 10), 4_800);
    }

    #[tokio::test]
    async fn test_missing_file_degrades_to_silence() {
        let decoder = FfmpegDecoder;
        let mixer =
            AudioMixer::load_or_silent(&decoder, Some(Path::new("/no/such/track.mp3")), 0.5, 6.0)
                .await;
        assert!(mixer.is_none());
        assert!(AudioMixer::load_or_silent(&decoder, None, 0.5, 6.0).await.is_none());
    }

    #[test]
    fn test_decode_stops_at_export_length() {
        let args = decode_output_args(Some(12.0)).join(" ");
        assert!(args.starts_with("-t 12.000 -vn -f f32le"));
        assert!(args.ends_with("-ac 2 -ar 48000 pipe:1"));
        assert!(!decode_output_args(None).contains(&"-t".to_string()));
        assert!(!decode_output_args(Some(0.0)).contains(&"-t".to_string()));
    }

    #[test]
    fn test_pcm_parse() {
        let bytes: Vec<u8> = [0.5f32, -1.0].iter().flat_map(|s| s.to_le_bytes()).collect();
        assert_eq!(pcm_from_le_bytes(&bytes), vec![0.5, -1.0]);
    }
}
