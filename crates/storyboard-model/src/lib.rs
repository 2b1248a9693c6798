//! Storyreel Storyboard Model
//!
//! Defines the core data contracts for Storyreel:
//! - **Panels:** one storyboard unit (description, dialogue, camera angle, artwork)
//! - **Storyboard:** the ordered panel store with contiguous `order` numbering
//! - **Export:** per-run export configuration
//! - **Script:** script drafts returned by text-generation providers
//!
//! Serialized field names follow camelCase so storyboards exported by the
//! web editor load unchanged.

pub mod export;
pub mod panel;
pub mod script;
pub mod storyboard;

pub use export::*;
pub use panel::*;
pub use script::*;
pub use storyboard::*;
