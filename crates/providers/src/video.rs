//! Image-to-video generation.
//!
//! A job is queued with one still and then polled until the provider
//! reports success, failure, or the poll budget runs out. Waiting between
//! polls goes through a [`Pacer`].

use std::time::Duration;

use storyreel_common::Pacer;

use crate::error::ProviderError;
use crate::provider::{GenerationProvider, VideoJobStatus, VideoRequest};

/// Prompt used when the source panel has no description.
pub const DEFAULT_VIDEO_PROMPT: &str = "A beautiful anime scene";

/// How often and how long to poll a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoPolling {
    pub interval: Duration,
    pub max_polls: u32,
}

impl Default for VideoPolling {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_polls: 60,
        }
    }
}

/// The panel description, or [`DEFAULT_VIDEO_PROMPT`] when it is blank.
pub fn video_prompt(description: &str) -> String {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        DEFAULT_VIDEO_PROMPT.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Queue `request` and wait for the finished video URL.
///
/// Each poll waits `polling.interval` first. `on_poll` receives the share
/// of the poll budget used so far, in percent. Status checks that fail in
/// transit are logged and retried on the next poll; credential problems end
/// the job immediately.
pub async fn generate_video(
    provider: &dyn GenerationProvider,
    pacer: &dyn Pacer,
    request: VideoRequest,
    polling: VideoPolling,
    mut on_poll: impl FnMut(u8),
) -> Result<String, ProviderError> {
    let request_id = provider.submit_video(request).await?;
    tracing::info!(provider = provider.kind().as_str(), request_id = %request_id, "Video job queued");

    let max_polls = polling.max_polls.max(1);
    for poll in 1..=max_polls {
        pacer.pause(polling.interval).await;

        match provider.video_status(&request_id).await {
            Ok(VideoJobStatus::Succeeded { url }) => {
                tracing::info!(request_id = %request_id, polls = poll, "Video job finished");
                return Ok(url);
            }
            Ok(VideoJobStatus::Failed { reason }) => {
                return Err(ProviderError::VideoFailed { reason });
            }
            Ok(VideoJobStatus::Pending) => {}
            Err(err) if ends_polling(&err) => return Err(err),
            Err(err) => {
                tracing::warn!(request_id = %request_id, poll, error = %err, "Video status check failed");
            }
        }

        on_poll((poll as u64 * 100 / max_polls as u64) as u8);
    }

    Err(ProviderError::VideoTimedOut { polls: max_polls })
}

fn ends_polling(err: &ProviderError) -> bool {
    err.is_configuration()
        || matches!(
            err,
            ProviderError::InvalidCredential { .. } | ProviderError::QuotaExceeded { .. }
        )
}
