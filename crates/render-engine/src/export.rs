//! Video export: the recording pipeline.
//!
//! One export run moves through these states:
//!
//! ```text
//! Idle -> Preparing -> Recording -> Finalizing -> Idle
//!             \-> Aborted -> Idle
//! ```
//!
//! Preparing validates the storyboard, allocates the drawing surface,
//! preloads every image concurrently, and opens the background track.
//! Recording composites `K x duration x fps` frames, one per pacer tick.
//! Finalizing stops the recorder and assembles the output file. Whatever
//! happens, the run ends back in Idle with progress reset and every
//! transient resource released.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use storyreel_common::clock::{eta_secs, ExportClock, FrameRate, Pacer};
use storyreel_common::error::{StoryreelError, StoryreelResult};
use storyreel_storyboard::{video_file_name, ExportConfig, Storyboard, StoryboardPanel};

use crate::audio::{
    audio_frames_for_video_frame, AudioDecoder, AudioMixer, FfmpegDecoder, VolumeHandle,
};
use crate::compositor::{Compositor, Frame, FrameRequest};
use crate::image_loader::{preload_all, ImageLoader, LoadedImage};
use crate::recorder::{Recorder, RecorderConfig, VideoCodec};
use crate::text::GlyphPainter;

/// Share of the progress bar consumed by image preloading.
pub const PRELOAD_PERCENT: u8 = 20;

/// Progress callback for export rendering.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send + Sync>;

/// Export progress report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExportProgress {
    /// Overall progress in whole percent [0, 100].
    pub percent: u8,

    /// Frames rendered so far.
    pub frames_rendered: u64,

    /// Total frames to render.
    pub total_frames: u64,

    /// Estimated time remaining in seconds.
    pub eta_secs: f64,

    /// Current stage.
    pub stage: ExportStage,
}

/// Stages reported to progress callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStage {
    Preparing,
    Rendering,
    Finalizing,
    Complete,
    Failed,
}

/// Pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Preparing,
    Recording,
    Finalizing,
    Aborted,
}

/// An export request.
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub config: ExportConfig,

    /// Directory receiving `<title>_<unix-ms>.webm`.
    pub output_dir: PathBuf,

    /// Target video bitrate.
    pub bitrate_kbps: u32,

    /// Force a codec instead of negotiating one.
    pub codec: Option<VideoCodec>,
}

impl ExportJob {
    pub fn new(config: ExportConfig, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            output_dir: output_dir.into(),
            bitrate_kbps: 3000,
            codec: None,
        }
    }
}

/// Percent reached once `settled` of `total` preloads have finished.
pub fn preload_percent(settled: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let ratio = settled.min(total) as f64 / total as f64;
    (ratio * PRELOAD_PERCENT as f64).round() as u8
}

/// Percent reached after `frames` of `total` frames.
pub fn frame_percent(frames: u64, total: u64) -> u8 {
    if total == 0 {
        return PRELOAD_PERCENT;
    }
    let ratio = frames.min(total) as f64 / total as f64;
    PRELOAD_PERCENT + (ratio * (100 - PRELOAD_PERCENT) as f64).round() as u8
}

/// Requests that a running export stop early.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct Shared {
    busy: AtomicBool,
    progress: AtomicU8,
    state: Mutex<Option<PipelineState>>,
    volume: Mutex<Option<VolumeHandle>>,
}

impl Shared {
    fn set_state(&self, state: PipelineState) {
        if let Ok(mut slot) = self.state.lock() {
            tracing::debug!(state = ?state, "Pipeline state");
            *slot = Some(state);
        }
    }

    fn state(&self) -> PipelineState {
        self.state
            .lock()
            .ok()
            .and_then(|slot| *slot)
            .unwrap_or(PipelineState::Idle)
    }
}

/// Held for the duration of one run; dropping it performs the release step.
struct RunGuard {
    shared: Arc<Shared>,
}

impl RunGuard {
    fn acquire(shared: &Arc<Shared>) -> StoryreelResult<Self> {
        shared
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| StoryreelError::Busy)?;
        Ok(Self {
            shared: shared.clone(),
        })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if let Ok(mut volume) = self.shared.volume.lock() {
            *volume = None;
        }
        self.shared.progress.store(0, Ordering::SeqCst);
        self.shared.set_state(PipelineState::Idle);
        self.shared.busy.store(false, Ordering::SeqCst);
    }
}

/// Transient per-run data. Dropped when the run ends.
struct RunResources<'a> {
    panels: Vec<&'a StoryboardPanel>,
    images: Vec<Option<LoadedImage>>,
    compositor: Compositor,
    mixer: Option<AudioMixer>,
}

/// Drives exports one at a time.
pub struct RecordingPipeline {
    loader: Arc<dyn ImageLoader>,
    painter: Arc<dyn GlyphPainter>,
    pacer: Arc<dyn Pacer>,
    audio: Arc<dyn AudioDecoder>,
    cancel: CancelHandle,
    shared: Arc<Shared>,
}

impl RecordingPipeline {
    pub fn new(
        loader: Arc<dyn ImageLoader>,
        painter: Arc<dyn GlyphPainter>,
        pacer: Arc<dyn Pacer>,
    ) -> Self {
        Self {
            loader,
            painter,
            pacer,
            audio: Arc::new(FfmpegDecoder),
            cancel: CancelHandle::default(),
            shared: Arc::new(Shared::default()),
        }
    }

    /// Replace the ffmpeg decoder used for background tracks.
    pub fn with_audio_decoder(mut self, decoder: Arc<dyn AudioDecoder>) -> Self {
        self.audio = decoder;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.shared.state()
    }

    /// Progress of the current run; zero when idle.
    pub fn progress_percent(&self) -> u8 {
        self.shared.progress.load(Ordering::SeqCst)
    }

    pub fn is_busy(&self) -> bool {
        self.shared.busy.load(Ordering::SeqCst)
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Change the background volume of the running export.
    ///
    /// Returns false when no background track is playing.
    pub fn set_volume(&self, volume: f32) -> bool {
        match self.shared.volume.lock() {
            Ok(slot) => match slot.as_ref() {
                Some(handle) => {
                    handle.set(volume);
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    /// Record the storyboard's image-bearing panels into one video file.
    pub async fn export(
        &self,
        storyboard: &Storyboard,
        job: &ExportJob,
        recorder: &mut dyn Recorder,
        progress: Option<ProgressCallback>,
    ) -> StoryreelResult<PathBuf> {
        let _guard = RunGuard::acquire(&self.shared)?;
        self.cancel.reset();
        self.shared.set_state(PipelineState::Preparing);

        let clock = ExportClock::start();
        let reporter = Reporter {
            shared: &self.shared,
            callback: progress.as_ref(),
            clock: &clock,
        };

        let result = self.run(storyboard, job, recorder, &reporter).await;
        match &result {
            Ok(path) => {
                reporter.emit(100, 0, 0, ExportStage::Complete);
                tracing::info!(
                    path = %path.display(),
                    elapsed_secs = clock.elapsed_secs(),
                    "Export finished"
                );
            }
            Err(err) => {
                let percent = self.progress_percent();
                reporter.emit(percent, 0, 0, ExportStage::Failed);
                tracing::warn!(error = %err, "Export aborted");
            }
        }
        result
    }

    async fn run(
        &self,
        storyboard: &Storyboard,
        job: &ExportJob,
        recorder: &mut dyn Recorder,
        reporter: &Reporter<'_>,
    ) -> StoryreelResult<PathBuf> {
        let config = job.config.sanitized();

        let mut resources = match self.prepare(storyboard, &config, reporter).await {
            Ok(resources) => resources,
            Err(err) => {
                self.shared.set_state(PipelineState::Aborted);
                return Err(err);
            }
        };

        let output_path = job
            .output_dir
            .join(video_file_name(&config.title, reporter.clock.unix_ms(), "webm"));
        let recorder_config = RecorderConfig {
            width: config.width,
            height: config.height,
            fps: config.fps,
            bitrate_kbps: job.bitrate_kbps,
            output_path,
            codec: job.codec,
            with_audio: resources.mixer.is_some(),
        };

        if let Err(err) = recorder.start(&recorder_config) {
            self.shared.set_state(PipelineState::Aborted);
            return Err(err);
        }
        tracing::info!(
            recorder = recorder.name(),
            panels = resources.panels.len(),
            fps = config.fps,
            "Recording started"
        );
        self.shared.set_state(PipelineState::Recording);

        if let Err(err) = self.record(&mut resources, &config, recorder, reporter).await {
            recorder.abort();
            self.shared.set_state(PipelineState::Aborted);
            return Err(err);
        }

        self.shared.set_state(PipelineState::Finalizing);
        drop(resources);
        match recorder.finish() {
            Ok(path) => Ok(path),
            Err(err) => {
                recorder.abort();
                self.shared.set_state(PipelineState::Aborted);
                Err(err)
            }
        }
    }

    async fn prepare<'a>(
        &self,
        storyboard: &'a Storyboard,
        config: &ExportConfig,
        reporter: &Reporter<'_>,
    ) -> StoryreelResult<RunResources<'a>> {
        let mut panels = storyboard.panels_with_images();
        panels.sort_by_key(|p| p.order);
        if panels.is_empty() {
            return Err(StoryreelError::export(
                "No panels with artwork to export; generate or attach images first",
            ));
        }

        let compositor = Compositor::new(config.width, config.height, self.painter.clone())?;
        let total_frames = panels.len() as u64 * config.frames_per_panel();
        tracing::info!(
            panels = panels.len(),
            total_frames,
            width = config.width,
            height = config.height,
            "Preparing export"
        );
        reporter.emit(0, 0, total_frames, ExportStage::Preparing);

        let references: Vec<String> = panels
            .iter()
            .map(|p| p.image_url.clone().unwrap_or_default())
            .collect();
        let count = references.len();
        let images = preload_all(self.loader.clone(), &references, |settled| {
            reporter.emit(
                preload_percent(settled, count),
                0,
                total_frames,
                ExportStage::Preparing,
            );
        })
        .await;

        if self.cancel.is_cancelled() {
            return Err(StoryreelError::Cancelled);
        }

        // Looping covers anything shorter than the video.
        let video_secs = panels.len() as f64 * config.panel_duration_secs as f64;
        let mixer = AudioMixer::load_or_silent(
            self.audio.as_ref(),
            config.background_audio.as_deref(),
            config.audio_volume,
            video_secs,
        )
        .await;
        if let (Some(mixer), Ok(mut slot)) = (mixer.as_ref(), self.shared.volume.lock()) {
            *slot = Some(mixer.volume_handle());
        }

        Ok(RunResources {
            panels,
            images,
            compositor,
            mixer,
        })
    }

    async fn record(
        &self,
        resources: &mut RunResources<'_>,
        config: &ExportConfig,
        recorder: &mut dyn Recorder,
        reporter: &Reporter<'_>,
    ) -> StoryreelResult<()> {
        let frame_rate = FrameRate::new(config.fps);
        let frames_per_panel = frame_rate.frames_for_secs(config.panel_duration_secs);
        let total_frames = resources.panels.len() as u64 * frames_per_panel;
        let dialogue = config.show_dialogue.then_some(config.dialogue_style);

        let mut current: Option<(usize, Frame)> = None;
        for frame_index in 0..total_frames {
            if self.cancel.is_cancelled() {
                tracing::info!(frame = frame_index, "Export cancelled");
                return Err(StoryreelError::Cancelled);
            }

            let slot = (frame_index / frames_per_panel) as usize;
            if current.as_ref().map(|(s, _)| *s) != Some(slot) {
                let frame = resources.compositor.compose(&FrameRequest {
                    panel: resources.panels[slot],
                    image: resources.images[slot].as_ref(),
                    index: slot,
                    total: resources.panels.len(),
                    dialogue,
                });
                current = Some((slot, frame));
            }
            if let Some((_, frame)) = current.as_ref() {
                recorder.push_frame(frame)?;
            }

            if let Some(mixer) = resources.mixer.as_mut() {
                let chunk = mixer.next_chunk(audio_frames_for_video_frame(frame_index, config.fps));
                recorder.push_audio(&chunk)?;
            }

            let rendered = frame_index + 1;
            reporter.emit(
                frame_percent(rendered, total_frames),
                rendered,
                total_frames,
                ExportStage::Rendering,
            );
            self.pacer.pause(frame_rate.frame_interval()).await;
        }
        Ok(())
    }
}

struct Reporter<'a> {
    shared: &'a Shared,
    callback: Option<&'a ProgressCallback>,
    clock: &'a ExportClock,
}

impl Reporter<'_> {
    fn emit(&self, percent: u8, frames_rendered: u64, total_frames: u64, stage: ExportStage) {
        if matches!(stage, ExportStage::Preparing | ExportStage::Rendering) {
            self.shared.progress.store(percent, Ordering::SeqCst);
        }
        if let Some(cb) = self.callback {
            cb(ExportProgress {
                percent,
                frames_rendered,
                total_frames,
                eta_secs: eta_secs(self.clock.elapsed_secs(), percent as f64 / 100.0),
                stage,
            });
        }
    }
}
