//! Storyreel Captions
//!
//! Timed captions for narration text:
//! - **Segmentation:** provider-assisted sentence timing with a local fallback that never fails
//! - **Subtitle Output:** SRT/VTT formatting and file export

pub mod segmentation;
pub mod subtitles;

pub use segmentation::*;
pub use subtitles::*;
