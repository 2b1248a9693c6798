//! Locate JSON inside free-form model output.
//!
//! Models wrap JSON in prose or markdown fences. This module finds the
//! first balanced `{...}` or `[...]` span and nothing more: it does not
//! repair malformed JSON. A missing or unparsable span is reported as
//! [`ProviderError::FormatUnexpected`].

use serde::de::DeserializeOwned;

use crate::error::ProviderError;

/// The kind of top-level JSON value expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonShape {
    Object,
    Array,
}

impl JsonShape {
    fn delimiters(self) -> (char, char) {
        match self {
            JsonShape::Object => ('{', '}'),
            JsonShape::Array => ('[', ']'),
        }
    }

    fn noun(self) -> &'static str {
        match self {
            JsonShape::Object => "object",
            JsonShape::Array => "array",
        }
    }
}

/// Return the first balanced span of the given shape.
///
/// Delimiters inside JSON string literals are ignored. Returns `None` when
/// the first opening delimiter is never closed.
pub fn extract_json_span(text: &str, shape: JsonShape) -> Option<&str> {
    let (open, close) = shape.delimiters();
    let start = text.find(open)?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + c.len_utf8();
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Extract the first span of `shape` and deserialize it.
pub fn parse_json_span<T: DeserializeOwned>(text: &str, shape: JsonShape) -> Result<T, ProviderError> {
    let span = extract_json_span(text, shape).ok_or_else(|| {
        ProviderError::format(format!("no JSON {} found in the response", shape.noun()))
    })?;
    serde_json::from_str(span).map_err(|e| ProviderError::format(format!("invalid JSON {}: {e}", shape.noun())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fenced_object() {
        let text = "Here you go:\n```json\n{\"title\": \"Rain\", \"scenes\": []}\n```\nEnjoy!";
        assert_eq!(
            extract_json_span(text, JsonShape::Object),
            Some("{\"title\": \"Rain\", \"scenes\": []}")
        );
    }

    #[test]
    fn test_first_span_wins() {
        let text = "{\"a\": 1} and also {\"b\": 2}";
        assert_eq!(extract_json_span(text, JsonShape::Object), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_braces_inside_strings_are_ignored() {
        let text = r#"prefix {"content": "she said \"}{\" and left", "n": [1]} suffix"#;
        let span = extract_json_span(text, JsonShape::Object).unwrap();
        let value: serde_json::Value = serde_json::from_str(span).unwrap();
        assert_eq!(value["n"][0], 1);
    }

    #[test]
    fn test_array_shape() {
        let text = "Subtitles:\n[{\"start\": 0, \"end\": 3, \"text\": \"A\"}]";
        let parsed: Vec<serde_json::Value> = parse_json_span(text, JsonShape::Array).unwrap();
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn test_unbalanced_is_not_guessed() {
        assert_eq!(extract_json_span("{\"title\": \"cut off", JsonShape::Object), None);
        let err = parse_json_span::<serde_json::Value>("no json here", JsonShape::Object).unwrap_err();
        assert!(matches!(err, ProviderError::FormatUnexpected { .. }));
    }

    #[test]
    fn test_malformed_span_is_format_error() {
        let err = parse_json_span::<serde_json::Value>("{title: nope}", JsonShape::Object).unwrap_err();
        assert!(err.to_string().starts_with("Response format unexpected"));
    }

    proptest! {
        #[test]
        fn test_extracts_embedded_object(
            prefix in "[a-zA-Z ,.:\n]{0,40}",
            suffix in "[a-zA-Z ,.:\n]{0,40}",
            keys in prop::collection::vec("[a-z{}\\[\\]\"]{1,8}", 0..5),
        ) {
            let object: serde_json::Map<String, serde_json::Value> = keys
                .iter()
                .map(|k| (k.clone(), serde_json::Value::String(k.clone())))
                .collect();
            let json = serde_json::Value::Object(object).to_string();
            let text = format!("{prefix}{json}{suffix}");
            prop_assert_eq!(extract_json_span(&text, JsonShape::Object), Some(json.as_str()));
        }
    }
}
