//! Batch artwork generation for storyboard panels.

use std::time::Duration;

use storyreel_common::Pacer;
use storyreel_storyboard::{CharacterDraft, Storyboard};

use crate::prompt::{panel_prompt, ImageStyle};
use crate::provider::{GenerationProvider, ImageRequest};

/// Pause between consecutive image requests.
pub const BATCH_PAUSE: Duration = Duration::from_secs(1);

/// Outcome of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtworkReport {
    /// Panel ids that received artwork.
    pub generated: Vec<String>,
    /// Panel ids whose request failed, with the user-facing message.
    pub failed: Vec<(String, String)>,
}

impl ArtworkReport {
    pub fn attempted(&self) -> usize {
        self.generated.len() + self.failed.len()
    }
}

/// Options for [`generate_missing_artwork`].
#[derive(Debug, Clone, Default)]
pub struct ArtworkOptions {
    pub style: ImageStyle,
    pub characters: Vec<CharacterDraft>,
}

/// Generate artwork for every panel with a description and no image.
///
/// Requests run one at a time with [`BATCH_PAUSE`] between them. A failed
/// panel is logged and skipped; the batch always runs to the end.
pub async fn generate_missing_artwork(
    storyboard: &mut Storyboard,
    provider: &dyn GenerationProvider,
    pacer: &dyn Pacer,
    options: &ArtworkOptions,
) -> ArtworkReport {
    let targets: Vec<(String, String)> = storyboard
        .panels_missing_artwork()
        .into_iter()
        .map(|panel| {
            (
                panel.id.clone(),
                panel_prompt(panel, options.style, &options.characters),
            )
        })
        .collect();

    let mut report = ArtworkReport::default();
    tracing::info!(panels = targets.len(), provider = provider.kind().as_str(), "Generating missing artwork");

    for (index, (panel_id, prompt)) in targets.into_iter().enumerate() {
        if index > 0 {
            pacer.pause(BATCH_PAUSE).await;
        }

        let request = ImageRequest {
            prompt: prompt.clone(),
            ..ImageRequest::default()
        };
        match provider.image(request).await {
            Ok(image) => {
                let reference = image.into_reference();
                let stored = storyboard.update_panel(&panel_id, |panel| {
                    panel.image_url = Some(reference);
                    panel.prompt = Some(prompt);
                });
                match stored {
                    Ok(()) => report.generated.push(panel_id),
                    Err(err) => report.failed.push((panel_id, err.to_string())),
                }
            }
            Err(err) => {
                tracing::warn!(panel = %panel_id, error = %err, "Artwork generation failed");
                report.failed.push((panel_id, err.user_message()));
            }
        }
    }

    report
}
