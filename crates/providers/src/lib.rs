//! Storyreel Generation Providers
//!
//! Every third-party generative service sits behind one interface,
//! [`GenerationProvider`], selected from configuration by
//! [`ProviderRegistry`]:
//! - **Image:** SiliconFlow, Pollinations, Hugging Face, Stability, OpenRouter, OpenAI
//! - **Text:** OpenAI, OpenRouter, Anthropic, SiliconFlow, Local (OpenAI-compatible)
//! - **Speech:** SiliconFlow
//! - **Video:** SiliconFlow (image-to-video jobs)
//!
//! Higher-level flows built on top: script and dialogue generation with
//! rate-limit retry, speech synthesis, batch panel artwork, and polled
//! image-to-video jobs.

pub mod artwork;
pub mod backends;
pub mod error;
pub mod http;
pub mod json_extract;
pub mod prompt;
pub mod provider;
pub mod registry;
pub mod retry;
pub mod script;
pub mod speech;
pub mod video;

pub use artwork::*;
pub use error::*;
pub use json_extract::{extract_json_span, parse_json_span, JsonShape};
pub use prompt::*;
pub use provider::*;
pub use registry::*;
pub use retry::*;
pub use script::*;
pub use speech::*;
pub use video::*;
