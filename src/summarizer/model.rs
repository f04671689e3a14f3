//! Request/response shapes for the supported model families.
//!
//! Each family is a variant; adding a family means adding a variant and its
//! two match arms below.

use serde_json::{Value, json};

use crate::errors::BackendError;

const TEMPERATURE: f64 = 0.1;
const TOP_P: f64 = 0.9;

/// Headroom added on top of the requested target length.
const TOKEN_HEADROOM: usize = 100;

/// Known model catalog: short name to model identifier.
pub const AVAILABLE_MODELS: &[(&str, &str)] = &[
    ("claude-3-haiku", "anthropic.claude-3-haiku-20240307-v1:0"),
    ("claude-3-sonnet", "anthropic.claude-3-sonnet-20240229-v1:0"),
    ("claude-3-opus", "anthropic.claude-3-opus-20240229-v1:0"),
    ("llama2-13b", "meta.llama2-13b-chat-v1"),
    ("llama2-70b", "meta.llama2-70b-chat-v1"),
    ("titan-text", "amazon.titan-text-express-v1"),
];

pub const DEFAULT_MODEL_ID: &str = "anthropic.claude-3-haiku-20240307-v1:0";

/// Resolve a catalog short name to its identifier. Anything else is taken
/// as an identifier already.
pub fn resolve_model_id(name: &str) -> String {
    AVAILABLE_MODELS
        .iter()
        .find(|(short, _)| *short == name)
        .map(|(_, id)| (*id).to_string())
        .unwrap_or_else(|| name.to_string())
}

/// Model family, resolved from a substring of the model identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    /// Structured message list in, content array out.
    Anthropic,
    /// Flat prompt in, generation string out.
    Llama,
    /// `inputText` plus generation config in, results array out.
    Titan,
}

impl ModelFamily {
    pub fn from_model_id(model_id: &str) -> Result<Self, BackendError> {
        if model_id.contains("anthropic.claude") {
            Ok(ModelFamily::Anthropic)
        } else if model_id.contains("meta.llama") {
            Ok(ModelFamily::Llama)
        } else if model_id.contains("amazon.titan") {
            Ok(ModelFamily::Titan)
        } else {
            Err(BackendError::UnsupportedModel(model_id.to_string()))
        }
    }

    /// Upper bound on generated tokens the family accepts.
    pub fn token_cap(self) -> usize {
        match self {
            ModelFamily::Anthropic | ModelFamily::Titan => 4096,
            ModelFamily::Llama => 2048,
        }
    }

    /// Output budget for a target length: `min(target + headroom, cap)`.
    pub fn max_tokens_for(self, target_tokens: usize) -> usize {
        (target_tokens + TOKEN_HEADROOM).min(self.token_cap())
    }

    pub fn build_request(self, prompt: &str, max_tokens: usize) -> Value {
        match self {
            ModelFamily::Anthropic => json!({
                "anthropic_version": "bedrock-2023-05-31",
                "max_tokens": max_tokens,
                "temperature": TEMPERATURE,
                "top_p": TOP_P,
                "messages": [{"role": "user", "content": prompt}],
            }),
            ModelFamily::Llama => json!({
                "prompt": prompt,
                "max_gen_len": max_tokens,
                "temperature": TEMPERATURE,
                "top_p": TOP_P,
            }),
            ModelFamily::Titan => json!({
                "inputText": prompt,
                "textGenerationConfig": {
                    "maxTokenCount": max_tokens,
                    "temperature": TEMPERATURE,
                    "topP": TOP_P,
                    "stopSequences": [],
                },
            }),
        }
    }

    pub fn parse_response(self, body: &Value) -> Result<String, BackendError> {
        let text = match self {
            ModelFamily::Anthropic => body.pointer("/content/0/text"),
            ModelFamily::Llama => body.get("generation"),
            ModelFamily::Titan => body.pointer("/results/0/outputText"),
        };
        text.and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .ok_or_else(|| {
                BackendError::MalformedResponse(format!("{:?} response missing text: {}", self, body))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_model_id() {
        assert_eq!(resolve_model_id("llama2-70b"), "meta.llama2-70b-chat-v1");
        assert_eq!(resolve_model_id(DEFAULT_MODEL_ID), DEFAULT_MODEL_ID);
        assert_eq!(resolve_model_id("custom.model"), "custom.model");
    }

    #[test]
    fn test_family_dispatch_on_substring() {
        assert_eq!(
            ModelFamily::from_model_id(DEFAULT_MODEL_ID).unwrap(),
            ModelFamily::Anthropic
        );
        assert_eq!(
            ModelFamily::from_model_id("meta.llama2-70b-chat-v1").unwrap(),
            ModelFamily::Llama
        );
        assert_eq!(
            ModelFamily::from_model_id("amazon.titan-text-express-v1").unwrap(),
            ModelFamily::Titan
        );
    }

    #[test]
    fn test_unknown_family_is_unsupported() {
        assert_eq!(
            ModelFamily::from_model_id("cohere.command-r").unwrap_err(),
            BackendError::UnsupportedModel("cohere.command-r".into())
        );
    }

    #[test]
    fn test_catalog_resolves_to_known_families() {
        for (_, id) in AVAILABLE_MODELS {
            assert!(ModelFamily::from_model_id(id).is_ok(), "{id}");
        }
    }

    #[test]
    fn test_max_tokens_capped_per_family() {
        assert_eq!(ModelFamily::Anthropic.max_tokens_for(50), 150);
        assert_eq!(ModelFamily::Anthropic.max_tokens_for(10_000), 4096);
        assert_eq!(ModelFamily::Llama.max_tokens_for(10_000), 2048);
        assert_eq!(ModelFamily::Titan.max_tokens_for(10_000), 4096);
    }

    #[test]
    fn test_request_shapes() {
        let body = ModelFamily::Anthropic.build_request("hi", 42);
        assert_eq!(body["messages"][0]["content"], "hi");
        assert_eq!(body["max_tokens"], 42);

        let body = ModelFamily::Llama.build_request("hi", 42);
        assert_eq!(body["prompt"], "hi");
        assert_eq!(body["max_gen_len"], 42);

        let body = ModelFamily::Titan.build_request("hi", 42);
        assert_eq!(body["inputText"], "hi");
        assert_eq!(body["textGenerationConfig"]["maxTokenCount"], 42);
    }

    #[test]
    fn test_response_extraction() {
        let claude = json!({"content": [{"text": "  compressed  "}]});
        assert_eq!(ModelFamily::Anthropic.parse_response(&claude).unwrap(), "compressed");

        let llama = json!({"generation": "llama text\n"});
        assert_eq!(ModelFamily::Llama.parse_response(&llama).unwrap(), "llama text");

        let titan = json!({"results": [{"outputText": "titan text"}]});
        assert_eq!(ModelFamily::Titan.parse_response(&titan).unwrap(), "titan text");
    }

    #[test]
    fn test_response_shape_mismatch_is_malformed() {
        let wrong = json!({"generation": "llama text"});
        assert!(matches!(
            ModelFamily::Anthropic.parse_response(&wrong),
            Err(BackendError::MalformedResponse(_))
        ));
    }
}
