//! OpenAI-compatible chat completions, shared by OpenAI, OpenRouter,
//! SiliconFlow and local servers.

use reqwest::Client;
use serde_json::{json, Value};

use crate::error::ProviderError;
use crate::http;
use crate::provider::{ProviderKind, TextRequest};

/// Sampling temperature for every chat-style request.
pub const CHAT_TEMPERATURE: f64 = 0.8;

/// One chat completions endpoint.
pub struct ChatEndpoint<'a> {
    pub provider: ProviderKind,
    pub url: &'a str,
    pub api_key: Option<&'a str>,
    pub model: &'a str,
    pub headers: &'a [(&'static str, &'static str)],
}

/// Request body. The system message is omitted when empty.
pub fn chat_body(model: &str, request: &TextRequest) -> Value {
    let mut messages = Vec::with_capacity(2);
    if !request.system.trim().is_empty() {
        messages.push(json!({ "role": "system", "content": request.system }));
    }
    messages.push(json!({ "role": "user", "content": request.user }));

    json!({
        "model": model,
        "messages": messages,
        "temperature": CHAT_TEMPERATURE,
    })
}

/// Extract `choices[0].message.content`.
pub fn parse_chat_response(value: &Value) -> Result<String, ProviderError> {
    value["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ProviderError::format("completion has no choices"))
}

/// Run one completion.
pub async fn complete(
    client: &Client,
    endpoint: ChatEndpoint<'_>,
    request: &TextRequest,
) -> Result<String, ProviderError> {
    let mut builder = client
        .post(endpoint.url)
        .header("Content-Type", "application/json")
        .json(&chat_body(endpoint.model, request));
    if let Some(key) = endpoint.api_key {
        builder = builder.bearer_auth(key);
    }
    for (name, value) in endpoint.headers {
        builder = builder.header(*name, *value);
    }

    tracing::debug!(
        provider = endpoint.provider.as_str(),
        model = endpoint.model,
        "Requesting chat completion"
    );
    let value = http::send_json(endpoint.provider, builder).await?;
    parse_chat_response(&value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_includes_system_and_temperature() {
        let body = chat_body(
            "gpt-4",
            &TextRequest {
                system: "You write scripts.".to_string(),
                user: "A heist".to_string(),
            },
        );
        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "A heist");
        assert_eq!(body["temperature"], 0.8);
    }

    #[test]
    fn test_body_skips_empty_system() {
        let body = chat_body(
            "deepseek-ai/DeepSeek-R1",
            &TextRequest {
                system: String::new(),
                user: "split this".to_string(),
            },
        );
        assert_eq!(body["messages"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn test_missing_choices_is_format_error() {
        let ok = serde_json::json!({"choices": [{"message": {"content": "{}"}}]});
        assert_eq!(parse_chat_response(&ok).unwrap(), "{}");

        let err = parse_chat_response(&serde_json::json!({"choices": []})).unwrap_err();
        assert!(matches!(err, ProviderError::FormatUnexpected { .. }));
    }
}
