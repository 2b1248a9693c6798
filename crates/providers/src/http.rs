//! Shared HTTP plumbing for provider backends.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;

use crate::error::ProviderError;
use crate::provider::ProviderKind;

/// Generation requests can take minutes on busy providers.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Build the shared client.
pub fn build_client() -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("storyreel/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ProviderError::Transport {
            provider: ProviderKind::Local,
            message: format!("failed to create HTTP client: {e}"),
        })
}

/// Send a request, mapping transport failures and non-2xx statuses.
pub async fn send(provider: ProviderKind, request: RequestBuilder) -> Result<Response, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::transport(provider, e))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response.text().await.unwrap_or_default();
    tracing::debug!(
        provider = provider.as_str(),
        status = status.as_u16(),
        body = %error_text,
        "Provider returned an error status"
    );
    Err(map_error_response(provider, status.as_u16(), &error_text))
}

/// Send a request and decode the JSON body.
pub async fn send_json(provider: ProviderKind, request: RequestBuilder) -> Result<Value, ProviderError> {
    let response = send(provider, request).await?;
    response
        .json::<Value>()
        .await
        .map_err(|e| ProviderError::format(format!("{provider} returned invalid JSON: {e}")))
}

/// Translate a non-2xx response into a user-facing error.
///
/// Structured error types win over status codes; 401, 429 and 5xx then
/// map to fixed messages; anything else surfaces the provider's own
/// message when one can be found.
pub fn map_error_response(provider: ProviderKind, status: u16, body: &str) -> ProviderError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    if let Some(value) = &parsed {
        match value["error"]["type"].as_str() {
            Some("invalid_api_key") => return ProviderError::InvalidCredential { provider },
            Some("insufficient_quota") => return ProviderError::QuotaExceeded { provider },
            _ => {}
        }
    }

    match status {
        401 => return ProviderError::InvalidCredential { provider },
        429 => return ProviderError::RateLimited { provider },
        s if s >= 500 => return ProviderError::ServerError { provider, status },
        _ => {}
    }

    let message = parsed
        .as_ref()
        .and_then(provider_message)
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty() && parsed.is_none()).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| "check the provider configuration".to_string());

    ProviderError::Api {
        provider,
        status,
        message,
    }
}

/// Pull a human-readable message out of the common error body shapes:
/// `{"error": {"message": ..}}`, `{"error": ".."}`, `{"message": ..}`.
fn provider_message(value: &Value) -> Option<String> {
    value["error"]["message"]
        .as_str()
        .or_else(|| value["error"].as_str())
        .or_else(|| value["message"].as_str())
        .map(str::to_string)
}
