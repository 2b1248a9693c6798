//! Recording pipeline runs against an in-memory recorder, loader, and pacer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use storyreel_common::error::{StoryreelError, StoryreelResult};
use storyreel_common::LogicalPacer;
use storyreel_render_engine::{
    AudioDecoder, CancelHandle, ExportJob, ExportProgress, ExportStage, Frame, ImageLoader, MonospaceMetrics,
    PipelineState, ProgressCallback, Recorder, RecorderConfig, RecordingPipeline,
};
use storyreel_storyboard::{ExportConfig, PanelDraft, Storyboard};

const RED: [u8; 4] = [255, 0, 0, 255];
const GREEN: [u8; 4] = [0, 255, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];
const PLACEHOLDER: [u8; 4] = [0x1a, 0x1a, 0x2e, 0xff];

fn png(rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(16, 9, image::Rgba(rgba));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Serves PNGs by reference; unknown references fail.
struct FakeLoader(HashMap<String, Vec<u8>>);

impl FakeLoader {
    fn with(entries: &[(&str, [u8; 4])]) -> Arc<Self> {
        Arc::new(Self(
            entries
                .iter()
                .map(|(name, rgba)| (name.to_string(), png(*rgba)))
                .collect(),
        ))
    }
}

#[async_trait::async_trait]
impl ImageLoader for FakeLoader {
    async fn fetch(&self, reference: &str) -> StoryreelResult<Vec<u8>> {
        self.0
            .get(reference)
            .cloned()
            .ok_or_else(|| StoryreelError::render(format!("no such image: {reference}")))
    }
}

/// Records the center pixel of every frame instead of encoding.
#[derive(Default)]
struct FakeRecorder {
    config: Option<RecorderConfig>,
    centers: Vec<[u8; 4]>,
    corners: Vec<[u8; 4]>,
    audio_samples: usize,
    audio: Vec<f32>,
    finished: bool,
    aborted: bool,
    fail_start: bool,
    cancel_after: Option<(usize, CancelHandle)>,
}

impl Recorder for FakeRecorder {
    fn start(&mut self, config: &RecorderConfig) -> StoryreelResult<()> {
        if self.fail_start {
            return Err(StoryreelError::unsupported("no encoder"));
        }
        self.config = Some(config.clone());
        Ok(())
    }

    fn push_frame(&mut self, frame: &Frame) -> StoryreelResult<()> {
        let center = frame.pixel(frame.width() / 2, frame.height() / 2).unwrap();
        self.centers.push(center);
        self.corners.push(frame.pixel(1, 1).unwrap());
        if let Some((limit, handle)) = &self.cancel_after {
            if self.centers.len() == *limit {
                handle.cancel();
            }
        }
        Ok(())
    }

    fn push_audio(&mut self, samples: &[f32]) -> StoryreelResult<()> {
        self.audio_samples += samples.len();
        self.audio.extend_from_slice(samples);
        Ok(())
    }

    fn finish(&mut self) -> StoryreelResult<PathBuf> {
        self.finished = true;
        Ok(self.config.as_ref().unwrap().output_path.clone())
    }

    fn abort(&mut self) {
        self.aborted = true;
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Serves a fixed track for any path and remembers the requested length.
struct FakeDecoder {
    samples: Vec<f32>,
    max_secs: Mutex<Option<f64>>,
}

#[async_trait::async_trait]
impl AudioDecoder for FakeDecoder {
    async fn decode(&self, _path: &Path, max_secs: f64) -> StoryreelResult<Vec<f32>> {
        *self.max_secs.lock().unwrap() = Some(max_secs);
        Ok(self.samples.clone())
    }
}

fn board(images: &[Option<&str>]) -> Storyboard {
    let mut board = Storyboard::new("script-1");
    for (i, image) in images.iter().enumerate() {
        board.add_panel(PanelDraft {
            description: format!("Panel {i}"),
            image_url: image.map(str::to_string),
            ..PanelDraft::default()
        });
    }
    board
}

fn pipeline(loader: Arc<FakeLoader>, pacer: &LogicalPacer) -> RecordingPipeline {
    RecordingPipeline::new(
        loader,
        Arc::new(MonospaceMetrics::default()),
        Arc::new(pacer.clone()),
    )
}

fn job(duration: u32, fps: u32) -> ExportJob {
    let config = ExportConfig {
        title: "Night Market".to_string(),
        panel_duration_secs: duration,
        fps,
        width: 64,
        height: 36,
        show_dialogue: false,
        ..ExportConfig::default()
    };
    ExportJob::new(config, std::env::temp_dir().join("storyreel_pipeline_test"))
}

fn collect_progress() -> (Arc<Mutex<Vec<ExportProgress>>>, ProgressCallback) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    (log, Box::new(move |p| sink.lock().unwrap().push(p)))
}

#[tokio::test]
async fn test_frame_count_and_panel_order() {
    let loader = FakeLoader::with(&[("red", RED), ("green", GREEN), ("blue", BLUE)]);
    let pacer = LogicalPacer::new();
    let pipeline = pipeline(loader, &pacer);

    // Five panels, three with images; the middle image-less ones are skipped.
    let mut board = board(&[Some("red"), None, Some("green"), None, Some("blue")]);
    board.move_panel(4, 0).unwrap();

    let mut recorder = FakeRecorder::default();
    let path = pipeline
        .export(&board, &job(2, 3), &mut recorder, None)
        .await
        .unwrap();

    assert_eq!(recorder.centers.len(), 3 * 2 * 3);
    let mut expected = vec![BLUE; 6];
    expected.extend([RED; 6]);
    expected.extend([GREEN; 6]);
    assert_eq!(recorder.centers, expected);

    assert!(recorder.finished);
    assert!(!recorder.aborted);
    let name = path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("Night Market_") && name.ends_with(".webm"));

    assert_eq!(pacer.pauses().len(), 18);
    assert!(pacer
        .pauses()
        .iter()
        .all(|d| *d == Duration::from_nanos(1_000_000_000 / 3)));
}

#[tokio::test]
async fn test_no_images_aborts_before_recorder_starts() {
    let loader = FakeLoader::with(&[]);
    let pacer = LogicalPacer::new();
    let pipeline = pipeline(loader, &pacer);
    let board = board(&[None, None]);
    let export_job = job(3, 10);

    let mut recorder = FakeRecorder::default();
    let err = pipeline
        .export(&board, &export_job, &mut recorder, None)
        .await
        .unwrap_err();

    assert!(matches!(err, StoryreelError::Export { .. }));
    assert!(recorder.config.is_none());
    assert!(recorder.centers.is_empty());
    assert!(pacer.pauses().is_empty());
    assert_eq!(pipeline.state(), PipelineState::Idle);
    assert!(!pipeline.is_busy());
}

#[tokio::test]
async fn test_failed_image_renders_placeholder() {
    let loader = FakeLoader::with(&[("red", RED)]);
    let pacer = LogicalPacer::new();
    let pipeline = pipeline(loader, &pacer);
    let board = board(&[Some("missing.png"), Some("red")]);

    let mut recorder = FakeRecorder::default();
    pipeline
        .export(&board, &job(1, 2), &mut recorder, None)
        .await
        .unwrap();

    assert_eq!(recorder.corners.len(), 4);
    assert_eq!(recorder.corners[0], PLACEHOLDER);
    assert_eq!(recorder.corners[1], PLACEHOLDER);
    assert_eq!(recorder.corners[2], RED);
    assert_eq!(recorder.corners[3], RED);
}

#[tokio::test]
async fn test_progress_is_monotonic_and_resets() {
    let loader = FakeLoader::with(&[("red", RED), ("green", GREEN)]);
    let pacer = LogicalPacer::new();
    let pipeline = pipeline(loader, &pacer);
    let board = board(&[Some("red"), Some("green")]);
    let (log, callback) = collect_progress();

    let mut recorder = FakeRecorder::default();
    pipeline
        .export(&board, &job(1, 5), &mut recorder, Some(callback))
        .await
        .unwrap();

    let reports = log.lock().unwrap();
    let percents: Vec<u8> = reports.iter().map(|p| p.percent).collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");
    assert_eq!(percents.first(), Some(&0));

    let first_frame = reports
        .iter()
        .find(|p| p.stage == ExportStage::Rendering)
        .unwrap();
    assert_eq!(first_frame.percent, 28);
    assert!(reports
        .iter()
        .filter(|p| p.stage == ExportStage::Preparing)
        .all(|p| p.percent <= 20));

    let last = reports.last().unwrap();
    assert_eq!((last.percent, last.stage), (100, ExportStage::Complete));

    assert_eq!(pipeline.progress_percent(), 0);
    assert_eq!(pipeline.state(), PipelineState::Idle);
}

#[tokio::test]
async fn test_cancel_stops_loop_and_releases() {
    let loader = FakeLoader::with(&[("red", RED)]);
    let pacer = LogicalPacer::new();
    let pipeline = pipeline(loader, &pacer);
    let board = board(&[Some("red")]);

    let mut recorder = FakeRecorder {
        cancel_after: Some((4, pipeline.cancel_handle())),
        ..FakeRecorder::default()
    };
    let err = pipeline
        .export(&board, &job(3, 10), &mut recorder, None)
        .await
        .unwrap_err();

    assert!(matches!(err, StoryreelError::Cancelled));
    assert_eq!(recorder.centers.len(), 4);
    assert!(recorder.aborted);
    assert!(!recorder.finished);
    assert_eq!(pipeline.state(), PipelineState::Idle);
    assert_eq!(pipeline.progress_percent(), 0);

    // A later run starts from a clean cancel flag.
    let mut again = FakeRecorder::default();
    pipeline
        .export(&board, &job(1, 2), &mut again, None)
        .await
        .unwrap();
    assert_eq!(again.centers.len(), 2);
}

#[tokio::test]
async fn test_recorder_start_failure_aborts_cleanly() {
    let loader = FakeLoader::with(&[("red", RED)]);
    let pacer = LogicalPacer::new();
    let pipeline = pipeline(loader, &pacer);
    let board = board(&[Some("red")]);

    let mut recorder = FakeRecorder {
        fail_start: true,
        ..FakeRecorder::default()
    };
    let err = pipeline
        .export(&board, &job(1, 10), &mut recorder, None)
        .await
        .unwrap_err();

    assert!(matches!(err, StoryreelError::Unsupported { .. }));
    assert!(recorder.centers.is_empty());
    assert_eq!(pipeline.state(), PipelineState::Idle);
    assert!(!pipeline.is_busy());
}

#[tokio::test]
async fn test_second_concurrent_export_is_busy() {
    let loader = FakeLoader::with(&[("red", RED)]);
    let pacer = LogicalPacer::new();
    let pipeline = pipeline(loader, &pacer);
    let board = board(&[Some("red")]);
    let export_job = job(1, 4);

    let mut first = FakeRecorder::default();
    let mut second = FakeRecorder::default();
    let (a, b) = tokio::join!(
        pipeline.export(&board, &export_job, &mut first, None),
        pipeline.export(&board, &export_job, &mut second, None),
    );

    assert!(a.is_ok());
    assert!(matches!(b, Err(StoryreelError::Busy)));
    assert!(second.config.is_none());
}

#[tokio::test]
async fn test_missing_background_audio_records_silently() {
    let loader = FakeLoader::with(&[("red", RED)]);
    let pacer = LogicalPacer::new();
    let pipeline = pipeline(loader, &pacer);
    let board = board(&[Some("red")]);

    let mut export_job = job(1, 2);
    export_job.config.background_audio = Some(PathBuf::from("/no/such/theme.mp3"));

    let mut recorder = FakeRecorder::default();
    pipeline
        .export(&board, &export_job, &mut recorder, None)
        .await
        .unwrap();

    assert_eq!(recorder.audio_samples, 0);
    assert!(!recorder.config.as_ref().unwrap().with_audio);
    assert!(!pipeline.set_volume(0.2));
}

#[tokio::test]
async fn test_background_audio_follows_video_and_volume() {
    let loader = FakeLoader::with(&[("red", RED), ("green", GREEN)]);
    let pacer = LogicalPacer::new();
    // Half a second of stereo audio, looped across the whole video.
    let decoder = Arc::new(FakeDecoder {
        samples: vec![1.0; 48_000],
        max_secs: Mutex::new(None),
    });
    let pipeline = Arc::new(pipeline(loader, &pacer).with_audio_decoder(decoder.clone()));
    let board = board(&[Some("red"), Some("green")]);

    let mut export_job = job(2, 5);
    export_job.config.background_audio = Some(PathBuf::from("theme.ogg"));
    export_job.config.audio_volume = 1.0;

    let applied = Arc::new(AtomicBool::new(false));
    let callback: ProgressCallback = {
        let pipeline = pipeline.clone();
        let applied = applied.clone();
        Box::new(move |p| {
            if p.stage == ExportStage::Rendering && p.frames_rendered == 10 {
                applied.store(pipeline.set_volume(0.25), Ordering::SeqCst);
            }
        })
    };

    let mut recorder = FakeRecorder::default();
    pipeline
        .export(&board, &export_job, &mut recorder, Some(callback))
        .await
        .unwrap();

    assert!(recorder.config.as_ref().unwrap().with_audio);
    assert_eq!(*decoder.max_secs.lock().unwrap(), Some(4.0));
    assert!(applied.load(Ordering::SeqCst));

    // K panels x D seconds x 48 kHz x 2 channels.
    assert_eq!(recorder.audio_samples, 2 * 2 * 48_000 * 2);
    let per_frame = 48_000 / 5 * 2;
    let (before, after) = recorder.audio.split_at(10 * per_frame);
    assert!(before.iter().all(|s| *s == 1.0));
    assert!(after.iter().all(|s| *s == 0.25));

    assert!(!pipeline.set_volume(0.5));
}
