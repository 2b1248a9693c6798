//! Script drafts produced by text-generation providers.
//!
//! Drafts are deserialized leniently: every field has a default so partial
//! model output still loads, and [`ScriptDraft::validate`] decides whether
//! the result is usable.

use serde::{Deserialize, Serialize};

use crate::storyboard::StoryboardError;

/// Time of day for a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    #[default]
    Morning,
    Afternoon,
    Evening,
    Night,
}

/// One line of dialogue.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DialogueDraft {
    /// Speaking character (name or id).
    #[serde(alias = "character")]
    pub character_id: String,

    pub content: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl DialogueDraft {
    pub fn new(character: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            character_id: character.into(),
            content: content.into(),
            ..Self::default()
        }
    }
}

/// One scene of a script.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SceneDraft {
    pub name: String,
    pub description: String,
    pub location: String,
    pub time_of_day: TimeOfDay,
    pub dialogues: Vec<DialogueDraft>,
}

/// A character sketch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CharacterDraft {
    pub name: String,
    pub description: String,
    pub appearance: String,
    pub personality: String,
    pub traits: Vec<String>,
}

impl CharacterDraft {
    /// `name: personality`, the form used when prompting for dialogue.
    pub fn summary(&self) -> String {
        format!("{}: {}", self.name, self.personality)
    }
}

/// A generated or imported script.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScriptDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub description: String,
    pub genre: String,
    pub scenes: Vec<SceneDraft>,
    pub characters: Vec<CharacterDraft>,
}

impl ScriptDraft {
    /// Reject drafts with neither a title nor any scene.
    pub fn validate(&self) -> Result<(), StoryboardError> {
        let has_title = self
            .title
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty());
        if !has_title && self.scenes.is_empty() {
            return Err(StoryboardError::ValidationError {
                message: "script draft has neither a title nor scenes".to_string(),
            });
        }
        Ok(())
    }

    /// Total dialogue lines across scenes.
    pub fn dialogue_count(&self) -> usize {
        self.scenes.iter().map(|s| s.dialogues.len()).sum()
    }
}
