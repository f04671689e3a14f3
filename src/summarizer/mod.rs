//! Summarizer adapter: the single path to the external generation capability.
//!
//! ## Features
//!
//! - **Model families**: request/response shapes dispatched on the model identifier
//! - **Retry with backoff**: transient (rate-limit) failures retried up to 3 times, 1s base delay doubling
//! - **Local fallback**: deterministic extractive compression when the backend fails for good
//!
//! ## Usage
//!
//! ```ignore
//! use takc::summarizer::{SummarizerAdapter, Summarize, SummarizeRequest, UnavailableBackend};
//!
//! let adapter = SummarizerAdapter::new(Arc::new(UnavailableBackend), RetryPolicy::default());
//! let compressed = adapter.summarize(SummarizeRequest { .. }).await;
//! ```

mod backend;
mod fallback;
mod model;
mod retry;

pub use backend::{GenerationBackend, HttpGenerationBackend, UnavailableBackend};
pub use fallback::{extractive_compress, split_sentences};
pub use model::{AVAILABLE_MODELS, DEFAULT_MODEL_ID, ModelFamily, resolve_model_id};
pub use retry::{AttemptState, RetryPolicy};

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::chunker::word_count;
use crate::errors::BackendError;
use crate::prompt::compression_request;

/// Tokens requested from the model when probing access.
const PROBE_MAX_TOKENS: usize = 10;
const PROBE_PROMPT: &str = "Hello, this is a test. Please respond with 'Test successful'.";

/// One compression call.
#[derive(Debug, Clone, Copy)]
pub struct SummarizeRequest<'a> {
    /// Task-aware preamble.
    pub task_prompt: &'a str,
    /// Text to compress.
    pub text: &'a str,
    /// Desired output length in words.
    pub target_tokens: usize,
    /// Ratio the extractive fallback should honour.
    pub compression_ratio: u32,
    /// Hard cap on generated tokens, applied after the family cap.
    pub max_output_tokens: usize,
    pub model_id: &'a str,
}

/// Anything that can compress text. Never fails: implementations fall back
/// locally instead of surfacing backend errors.
#[async_trait]
pub trait Summarize: Send + Sync {
    async fn summarize(&self, request: SummarizeRequest<'_>) -> String;
}

/// Wraps a `GenerationBackend` with retry/backoff and local fallback.
#[derive(Clone)]
pub struct SummarizerAdapter {
    backend: Arc<dyn GenerationBackend>,
    policy: RetryPolicy,
}

impl SummarizerAdapter {
    pub fn new(backend: Arc<dyn GenerationBackend>, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Generate text for `prompt`, retrying transient failures.
    ///
    /// Returns the last error once the policy reaches its fallback state;
    /// the caller decides what falling back means.
    pub async fn generate(
        &self,
        prompt: &str,
        max_tokens: usize,
        model_id: &str,
    ) -> Result<String, BackendError> {
        let family = ModelFamily::from_model_id(model_id)?;
        let mut state = self.policy.initial();

        loop {
            state = match state {
                AttemptState::Attempting { attempt } => {
                    let body = family.build_request(prompt, max_tokens);
                    match self.backend.invoke(model_id, body).await {
                        Ok(response) => match family.parse_response(&response) {
                            Ok(text) => return Ok(text),
                            Err(e) => self.policy.after_failure(attempt, e),
                        },
                        Err(e) => self.policy.after_failure(attempt, e),
                    }
                }
                AttemptState::BackingOff {
                    next_attempt,
                    delay,
                } => {
                    warn!(
                        model_id,
                        delay_ms = delay.as_millis() as u64,
                        attempt = next_attempt + 1,
                        max_attempts = self.policy.max_attempts(),
                        "Rate limiting detected, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    AttemptState::Attempting {
                        attempt: next_attempt,
                    }
                }
                AttemptState::Fallback { attempts, error } => {
                    error!(model_id, attempts, error = %error, "Generation failed");
                    return Err(error);
                }
            };
        }
    }

    /// Probe whether `model_id` is reachable with a tiny request.
    ///
    /// Unlike compression, failures are surfaced, not masked.
    pub async fn test_model_access(&self, model_id: &str) -> Result<(), BackendError> {
        let family = ModelFamily::from_model_id(model_id)?;
        let body = family.build_request(PROBE_PROMPT, PROBE_MAX_TOKENS);
        self.backend.invoke(model_id, body).await?;
        debug!(model_id, "Model access verified");
        Ok(())
    }
}

#[async_trait]
impl Summarize for SummarizerAdapter {
    async fn summarize(&self, request: SummarizeRequest<'_>) -> String {
        let input_words = word_count(request.text);
        let prompt = compression_request(request.task_prompt, request.text, request.target_tokens);
        let max_tokens = ModelFamily::from_model_id(request.model_id)
            .map(|f| f.max_tokens_for(request.target_tokens))
            .unwrap_or(request.target_tokens)
            .min(request.max_output_tokens);

        match self.generate(&prompt, max_tokens, request.model_id).await {
            Ok(text) => {
                debug!(
                    input_words,
                    output_words = word_count(&text),
                    "Compressed via generation backend"
                );
                text
            }
            Err(e) => {
                warn!(error = %e, input_words, "Using fallback compression method");
                extractive_compress(request.text, request.compression_ratio)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Backend that replays scripted results and records every call.
    struct ScriptedBackend {
        script: Mutex<VecDeque<Result<Value, BackendError>>>,
        calls: Mutex<Vec<(String, Value)>>,
    }

    impl ScriptedBackend {
        fn new(script: Vec<Result<Value, BackendError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        async fn invoke(&self, model_id: &str, body: Value) -> Result<Value, BackendError> {
            self.calls
                .lock()
                .unwrap()
                .push((model_id.to_string(), body));
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(BackendError::Permanent("script exhausted".into())))
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    const CLAUDE: &str = "anthropic.claude-3-haiku-20240307-v1:0";
    const TEXT: &str = "First sentence is here. Second sentence follows it. Third one closes.";

    fn request(model_id: &str) -> SummarizeRequest<'_> {
        SummarizeRequest {
            task_prompt: "PREAMBLE",
            text: TEXT,
            target_tokens: 10,
            compression_ratio: 3,
            max_output_tokens: 4096,
            model_id,
        }
    }

    fn throttled() -> Result<Value, BackendError> {
        Err(BackendError::classify("ThrottlingException: Rate exceeded"))
    }

    #[tokio::test]
    async fn test_successful_claude_call() {
        let backend = ScriptedBackend::new(vec![Ok(json!({"content": [{"text": "Revenue $2.5B."}]}))]);
        let adapter = SummarizerAdapter::new(backend.clone(), fast_policy());

        let out = adapter.summarize(request(CLAUDE)).await;

        assert_eq!(out, "Revenue $2.5B.");
        assert_eq!(backend.call_count(), 1);
        let calls = backend.calls.lock().unwrap();
        let (model, body) = &calls[0];
        assert_eq!(model, CLAUDE);
        assert_eq!(body["max_tokens"], 110);
        let content = body["messages"][0]["content"].as_str().unwrap();
        assert!(content.contains("PREAMBLE"));
        assert!(content.contains(TEXT));
    }

    #[tokio::test]
    async fn test_max_output_tokens_caps_request() {
        let backend = ScriptedBackend::new(vec![Ok(json!({"content": [{"text": "short"}]}))]);
        let adapter = SummarizerAdapter::new(backend.clone(), fast_policy());
        let req = SummarizeRequest {
            max_output_tokens: 64,
            ..request(CLAUDE)
        };

        adapter.summarize(req).await;

        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls[0].1["max_tokens"], 64);
    }

    #[tokio::test]
    async fn test_successful_llama_call() {
        let backend = ScriptedBackend::new(vec![Ok(json!({"generation": "Q3 revenue $2.5B."}))]);
        let adapter = SummarizerAdapter::new(backend.clone(), fast_policy());
        let out = adapter.summarize(request("meta.llama2-13b-chat-v1")).await;
        assert_eq!(out, "Q3 revenue $2.5B.");
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let backend = ScriptedBackend::new(vec![
            throttled(),
            throttled(),
            Ok(json!({"results": [{"outputText": "titan summary"}]})),
        ]);
        let adapter = SummarizerAdapter::new(backend.clone(), fast_policy());

        let out = adapter.summarize(request("amazon.titan-text-express-v1")).await;

        assert_eq!(out, "titan summary");
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_use_fallback() {
        let backend = ScriptedBackend::new(vec![throttled(), throttled(), throttled(), throttled(), throttled()]);
        let adapter = SummarizerAdapter::new(backend.clone(), fast_policy());

        let out = adapter.summarize(request(CLAUDE)).await;

        assert_eq!(backend.call_count(), 4);
        assert_eq!(out, extractive_compress(TEXT, 3));
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let backend = ScriptedBackend::new(vec![Err(BackendError::classify("AccessDeniedException"))]);
        let adapter = SummarizerAdapter::new(backend.clone(), fast_policy());

        let out = adapter.summarize(request(CLAUDE)).await;

        assert_eq!(backend.call_count(), 1);
        assert_eq!(out, extractive_compress(TEXT, 3));
    }

    #[tokio::test]
    async fn test_unsupported_model_falls_back_without_calling_backend() {
        let backend = ScriptedBackend::new(vec![]);
        let adapter = SummarizerAdapter::new(backend.clone(), fast_policy());

        let out = adapter.summarize(request("cohere.command-r")).await;

        assert_eq!(backend.call_count(), 0);
        assert_eq!(out, extractive_compress(TEXT, 3));
    }

    #[tokio::test]
    async fn test_malformed_response_falls_back() {
        let backend = ScriptedBackend::new(vec![Ok(json!({"unexpected": true}))]);
        let adapter = SummarizerAdapter::new(backend.clone(), fast_policy());
        let out = adapter.summarize(request(CLAUDE)).await;
        assert_eq!(backend.call_count(), 1);
        assert_eq!(out, extractive_compress(TEXT, 3));
    }

    #[tokio::test]
    async fn test_generate_surfaces_error() {
        let adapter = SummarizerAdapter::new(Arc::new(UnavailableBackend), fast_policy());
        let err = adapter.generate("prompt", 50, CLAUDE).await.unwrap_err();
        assert!(matches!(err, BackendError::Permanent(_)));
    }

    #[tokio::test]
    async fn test_model_access_probe() {
        let backend = ScriptedBackend::new(vec![Ok(json!({"generation": "Test successful"}))]);
        let adapter = SummarizerAdapter::new(backend.clone(), fast_policy());
        adapter
            .test_model_access("meta.llama2-70b-chat-v1")
            .await
            .unwrap();
        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls[0].1["max_gen_len"], 10);
    }

    #[tokio::test]
    async fn test_model_access_failure_is_surfaced() {
        let adapter = SummarizerAdapter::new(Arc::new(UnavailableBackend), fast_policy());
        assert!(adapter.test_model_access(CLAUDE).await.is_err());
        assert!(matches!(
            adapter.test_model_access("unknown.model").await,
            Err(BackendError::UnsupportedModel(_))
        ));
    }
}
