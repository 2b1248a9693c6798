//! Errors at the provider boundary.
//!
//! The `Display` text of every variant is the user-facing message.

use crate::provider::{Capability, ProviderKind};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("No API key configured for {provider}; set it in the config file or STORYREEL_{}_API_KEY", .provider.as_str().to_ascii_uppercase())]
    MissingCredential { provider: ProviderKind },

    #[error("Unsupported provider: {name}")]
    UnknownProvider { name: String },

    #[error("{provider} does not support {capability}")]
    Unsupported {
        provider: ProviderKind,
        capability: Capability,
    },

    #[error("{provider} rejected the API key; check that it is valid and not expired")]
    InvalidCredential { provider: ProviderKind },

    #[error("{provider} quota exhausted; top up the account or switch accounts")]
    QuotaExceeded { provider: ProviderKind },

    #[error("{provider} is rate limiting requests; retry later")]
    RateLimited { provider: ProviderKind },

    #[error("Still rate limited after {attempts} attempts; wait 30 seconds or switch to a different provider")]
    RateLimitExhausted { attempts: u32 },

    #[error("{provider} server error ({status}); retry later")]
    ServerError { provider: ProviderKind, status: u16 },

    #[error("{provider} request failed ({status}): {message}")]
    Api {
        provider: ProviderKind,
        status: u16,
        message: String,
    },

    #[error("Network request to {provider} failed: {message}")]
    Transport {
        provider: ProviderKind,
        message: String,
    },

    #[error("Video generation failed: {reason}")]
    VideoFailed { reason: String },

    #[error("Video generation timed out after {polls} status checks; try again later")]
    VideoTimedOut { polls: u32 },

    #[error("Response format unexpected: {detail}")]
    FormatUnexpected { detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    pub fn format(detail: impl Into<String>) -> Self {
        Self::FormatUnexpected {
            detail: detail.into(),
        }
    }

    pub fn transport(provider: ProviderKind, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            provider,
            message: err.to_string(),
        }
    }

    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    /// Whether this failure signals rate limiting.
    ///
    /// Besides HTTP 429, some providers report throttling only in the
    /// error message body.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            ProviderError::RateLimited { .. } => true,
            ProviderError::Api {
                status, message, ..
            } => *status == 429 || message.to_ascii_lowercase().contains("rate limit"),
            _ => false,
        }
    }

    /// Whether the failure happened before any network traffic.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ProviderError::MissingCredential { .. }
                | ProviderError::UnknownProvider { .. }
                | ProviderError::Unsupported { .. }
        )
    }
}

impl From<ProviderError> for storyreel_common::StoryreelError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Io(io) => storyreel_common::StoryreelError::Io(io),
            err if err.is_configuration() => storyreel_common::StoryreelError::config(err.to_string()),
            err => storyreel_common::StoryreelError::provider(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credential_names_env_var() {
        let err = ProviderError::MissingCredential {
            provider: ProviderKind::OpenRouter,
        };
        assert!(err.user_message().contains("STORYREEL_OPENROUTER_API_KEY"));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_rate_limit_detection() {
        assert!(ProviderError::RateLimited {
            provider: ProviderKind::OpenAi
        }
        .is_rate_limited());
        assert!(ProviderError::Api {
            provider: ProviderKind::OpenRouter,
            status: 400,
            message: "Rate limit exceeded for free tier".to_string(),
        }
        .is_rate_limited());
        assert!(!ProviderError::ServerError {
            provider: ProviderKind::OpenAi,
            status: 503
        }
        .is_rate_limited());
    }

    #[test]
    fn test_exhausted_message_recommends_alternatives() {
        let err = ProviderError::RateLimitExhausted { attempts: 3 };
        assert!(err.to_string().contains("wait 30 seconds"));
        assert!(err.to_string().contains("different provider"));
    }

    #[test]
    fn test_converts_into_common_error() {
        let err: storyreel_common::StoryreelError = ProviderError::UnknownProvider {
            name: "x".to_string(),
        }
        .into();
        assert!(matches!(err, storyreel_common::StoryreelError::Config { .. }));
    }
}
