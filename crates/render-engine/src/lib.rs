//! Storyreel Render Engine
//!
//! Turns a storyboard into output files.
//!
//! ```text
//! Storyboard ──> image_loader (preload, all-settled)
//!                     │
//!                     v
//!               compositor ──> dialogue overlay ──> badge
//!                     │
//!                     v
//!   audio ──────> recorder (ffmpeg) ──> <title>_<unix-ms>.webm
//!
//! Storyboard ──> static_export ──> <title>_NNN.png | <title>.html
//! ```
//!
//! The [`export::RecordingPipeline`] owns the state machine that ties these
//! together. Its collaborators (image loader, glyph painter, frame pacer,
//! recorder) are traits so the whole pipeline runs in tests without a
//! network, a font, ffmpeg, or wall-clock waits.

pub mod audio;
pub mod compositor;
pub mod dialogue;
pub mod export;
pub mod image_loader;
pub mod recorder;
pub mod static_export;
pub mod text;

pub use audio::{AudioDecoder, FfmpegDecoder};
pub use compositor::{fit_rect, Compositor, FitRect, Frame, FrameRequest};
pub use export::{
    CancelHandle, ExportJob, ExportProgress, ExportStage, PipelineState, ProgressCallback,
    RecordingPipeline,
};
pub use image_loader::{load_as_data_uri, DefaultImageLoader, ImageLoader, LoadedImage};
pub use recorder::{FfmpegRecorder, Recorder, RecorderConfig, VideoCodec};
pub use static_export::{export_html, export_images, render_html, ImageExportReport};
pub use text::{default_painter, wrap_text, GlyphPainter, MonospaceMetrics, TextMeasurer};
