//! Script, dialogue, scene, and video-prompt generation on top of a text
//! provider.
//!
//! Every call goes through [`retry_on_rate_limit`] and expects JSON
//! somewhere in the completion. Anything that fails to parse is an error;
//! no partial script is ever returned.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use storyreel_common::Pacer;
use storyreel_storyboard::{CharacterDraft, DialogueDraft, ScriptDraft};

use crate::error::ProviderError;
use crate::json_extract::{parse_json_span, JsonShape};
use crate::provider::{GenerationProvider, TextRequest};
use crate::retry::{retry_on_rate_limit, RetryPolicy};

/// Imported story text is cut to this many characters.
pub const MAX_IMPORT_CHARS: usize = 5000;

const SCRIPT_SCHEMA: &str = "\
- title: script title
- description: short synopsis
- genre: genre
- scenes: array of scenes, each with:
  - name: scene name
  - description: visual description of the scene
  - location: where it happens
  - timeOfDay: one of morning/afternoon/evening/night
  - dialogues: array of lines, each with:
    - characterId: speaking character (name or empty string)
    - content: the line
    - emotion: optional emotion
    - action: optional action description
- characters: array of characters, each with:
  - name
  - description
  - appearance: visual appearance
  - personality
  - traits: array of short tags";

/// A generated scene description.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSketch {
    pub description: String,
    pub location: String,
}

/// Video tools the optimised prompts are tailored for.
pub const VIDEO_PROMPT_MODELS: &str =
    "Seedance, Runway, Pika, Kling, Sora, Luma Dream Machine, Google Veo";

/// A prompt rewritten for AI video tools.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoPromptPlan {
    pub optimized_prompt: String,
    pub negative_prompt: String,
    pub tips: Vec<String>,

    /// Per-tool variants keyed by tool name.
    pub model_prompts: BTreeMap<String, String>,
}

/// Text-generation flows used while authoring a script.
pub struct ScriptWriter {
    provider: Arc<dyn GenerationProvider>,
    retry: RetryPolicy,
    pacer: Arc<dyn Pacer>,
}

impl ScriptWriter {
    pub fn new(provider: Arc<dyn GenerationProvider>, retry: RetryPolicy, pacer: Arc<dyn Pacer>) -> Self {
        Self {
            provider,
            retry,
            pacer,
        }
    }

    /// Write a full script from a premise.
    pub async fn generate_script(&self, prompt: &str, genre: &str) -> Result<ScriptDraft, ProviderError> {
        let system = format!(
            "You are a professional comic script writer. Write a complete comic script \
             from the user's premise. Return plain JSON (no markdown fences) with these fields:\n\
             {SCRIPT_SCHEMA}\nThe genre is {genre}."
        );
        let content = self.complete(system, prompt.to_string()).await?;
        let draft: ScriptDraft = parse_json_span(&content, JsonShape::Object)?;
        validated(draft)
    }

    /// Convert a prose story into a structured script.
    pub async fn import_text(&self, text: &str) -> Result<ScriptDraft, ProviderError> {
        let story = crate::provider::truncate_chars(text, MAX_IMPORT_CHARS);
        let system = "You are a professional comic script writer. \
                      Analyse the user's story and convert it into a structured script."
            .to_string();
        let user = format!(
            "Convert the following story into a structured script. Return plain JSON \
             (no markdown fences) with these fields:\n{SCRIPT_SCHEMA}\n\
             Return only the JSON.\n\nStory:\n{story}"
        );
        let content = self.complete(system, user).await?;
        let draft: ScriptDraft = parse_json_span(&content, JsonShape::Object)?;
        validated(draft)
    }

    /// Write dialogue lines for the given characters.
    pub async fn generate_dialogue(
        &self,
        context: &str,
        characters: &[CharacterDraft],
    ) -> Result<Vec<DialogueDraft>, ProviderError> {
        let roster = characters
            .iter()
            .map(CharacterDraft::summary)
            .collect::<Vec<_>>()
            .join("\n");
        let system = format!(
            "You are a dialogue writer. Write natural dialogue from the context and characters.\n\
             Characters:\n{roster}\n\n\
             Return a plain JSON array (no markdown fences); each item has:\n\
             - characterId: speaking character\n- content: the line\n\
             - emotion: optional emotion\n- action: optional action description"
        );
        let content = self.complete(system, context.to_string()).await?;
        parse_json_span(&content, JsonShape::Array)
    }

    /// Describe a scene visually.
    pub async fn describe_scene(&self, context: &str) -> Result<SceneSketch, ProviderError> {
        let system = "You are a scene designer. Write a detailed scene description from the context. \
                      Return a plain JSON object (no markdown fences) with:\n\
                      - description: detailed visual description\n- location: name of the place"
            .to_string();
        let content = self.complete(system, context.to_string()).await?;
        parse_json_span(&content, JsonShape::Object)
    }

    /// Rewrite a rough shot description into prompts for video tools.
    pub async fn optimize_video_prompt(&self, prompt: &str) -> Result<VideoPromptPlan, ProviderError> {
        let system = format!(
            "You are an expert at writing prompts for AI video generators. Optimise the user's \
             description for these tools: {VIDEO_PROMPT_MODELS}.\n\
             Return a plain JSON object (no markdown fences) with:\n\
             - optimized_prompt: English prompt covering subject, action, setting, camera \
             movement, lighting and mood, and style modifiers\n\
             - negative_prompt: things to avoid\n\
             - tips: array of usage tips\n\
             - model_prompts: object mapping each tool name to a prompt tuned for it\n\
             Be specific about the subject, keep actions achievable, name the camera movement, \
             and add quality modifiers such as cinematic, high quality, 4k."
        );
        let content = self.complete(system, prompt.to_string()).await?;
        let plan: VideoPromptPlan = parse_json_span(&content, JsonShape::Object)?;
        if plan.optimized_prompt.trim().is_empty() {
            return Err(ProviderError::format("no optimized_prompt in the reply"));
        }
        Ok(plan)
    }

    async fn complete(&self, system: String, user: String) -> Result<String, ProviderError> {
        let request = TextRequest { system, user };
        let provider = self.provider.as_ref();
        tracing::info!(provider = provider.kind().as_str(), "Requesting script completion");
        retry_on_rate_limit(self.retry, self.pacer.as_ref(), || provider.complete(request.clone())).await
    }
}

fn validated(draft: ScriptDraft) -> Result<ScriptDraft, ProviderError> {
    draft
        .validate()
        .map_err(|e| ProviderError::format(e.to_string()))?;
    tracing::info!(
        scenes = draft.scenes.len(),
        characters = draft.characters.len(),
        "Script draft parsed"
    );
    Ok(draft)
}
