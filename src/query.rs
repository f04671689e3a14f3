//! Answering queries from cached compressed knowledge.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::{CacheMetadata, CacheStore};
use crate::errors::{CacheError, ConfigError};
use crate::prompt::answer_request;
use crate::rate::{CompressionRate, classify_query, select_rate};
use crate::summarizer::{DEFAULT_MODEL_ID, SummarizerAdapter};

pub const DEFAULT_PREVIEW_CHARS: usize = 300;
pub const DEFAULT_MAX_ANSWER_TOKENS: usize = 1024;

/// `error` value carried by a cache-miss response.
pub const CACHE_NOT_FOUND: &str = "cache_not_found";

/// Incoming query. Absent fields deserialize as empty and fail validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub task_type: String,
    #[serde(default, alias = "compression_rate", skip_serializing_if = "Option::is_none")]
    pub rate: Option<String>,
}

impl QueryRequest {
    /// Check required fields and parse the optional rate.
    pub fn validate(&self) -> Result<Option<CompressionRate>, ConfigError> {
        if self.query.trim().is_empty() {
            return Err(ConfigError::MissingField("query"));
        }
        if self.task_type.trim().is_empty() {
            return Err(ConfigError::MissingField("task_type"));
        }
        self.rate
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .map(str::parse::<CompressionRate>)
            .transpose()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub query: String,
    pub response: String,
    pub rate_used: CompressionRate,
    pub task_type: String,
    pub cache_hit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_info: Option<CacheMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Settings for `QueryResponder`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponderSettings {
    pub model_id: String,
    /// Characters of compressed text quoted when generation is unavailable.
    pub preview_chars: usize,
    pub max_answer_tokens: usize,
}

impl Default for ResponderSettings {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            preview_chars: DEFAULT_PREVIEW_CHARS,
            max_answer_tokens: DEFAULT_MAX_ANSWER_TOKENS,
        }
    }
}

pub fn cache_miss_message(task_type: &str, rate: CompressionRate) -> String {
    format!(
        "No compressed cache found for task_type: {}, rate: {}. Please run compression service first.",
        task_type, rate
    )
}

/// Verbatim answer used when the generation capability is unavailable.
pub fn preview_answer(rate: CompressionRate, task_type: &str, compressed: &str, preview_chars: usize) -> String {
    let prefix: String = compressed.chars().take(preview_chars).collect();
    format!(
        "[Using {} compression] Based on the compressed knowledge for {}: {}...",
        rate, task_type, prefix
    )
}

/// Retrieves the cached artifact for a query and answers from it.
#[derive(Clone)]
pub struct QueryResponder {
    cache: CacheStore,
    summarizer: SummarizerAdapter,
    settings: ResponderSettings,
}

impl QueryResponder {
    pub fn new(cache: CacheStore, summarizer: SummarizerAdapter, settings: ResponderSettings) -> Self {
        Self {
            cache,
            summarizer,
            settings,
        }
    }

    /// Answer `query` from the `(task_type, rate)` cache entry.
    ///
    /// Without an explicit rate, the query-driven selector picks one. A miss
    /// is a normal response carrying the sentinel message; only an
    /// unreadable cache is an error.
    pub async fn answer(
        &self,
        query: &str,
        task_type: &str,
        rate: Option<CompressionRate>,
    ) -> Result<QueryResponse, CacheError> {
        let rate = match rate {
            Some(rate) => rate,
            None => {
                let complexity = classify_query(query);
                let rate = select_rate(complexity);
                info!(%complexity, %rate, "Auto-selected compression rate");
                rate
            }
        };

        let Some(entry) = self.cache.retrieve(task_type, rate).await? else {
            warn!(task_type, %rate, "Cache not found");
            return Ok(QueryResponse {
                query: query.to_string(),
                response: cache_miss_message(task_type, rate),
                rate_used: rate,
                task_type: task_type.to_string(),
                cache_hit: false,
                cache_info: None,
                error: Some(CACHE_NOT_FOUND.to_string()),
            });
        };

        let prompt = answer_request(query, &entry.compressed_text, task_type);
        let response = match self
            .summarizer
            .generate(&prompt, self.settings.max_answer_tokens, &self.settings.model_id)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Generation unavailable, answering with compressed preview");
                preview_answer(rate, task_type, &entry.compressed_text, self.settings.preview_chars)
            }
        };

        info!(task_type, %rate, tier = %entry.tier, "Query answered from cache");
        Ok(QueryResponse {
            query: query.to_string(),
            response,
            rate_used: rate,
            task_type: task_type.to_string(),
            cache_hit: true,
            cache_info: Some(entry.metadata),
            error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheSettings, MemoryObjectStore};
    use crate::compressor::{CompressionConfig, CompressionResult};
    use crate::errors::BackendError;
    use crate::summarizer::{GenerationBackend, RetryPolicy, UnavailableBackend};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};

    /// Answers every call with a fixed Claude-shaped response and keeps the prompts.
    #[derive(Default)]
    struct EchoBackend {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GenerationBackend for EchoBackend {
        async fn invoke(&self, _model_id: &str, body: Value) -> Result<Value, BackendError> {
            let prompt = body["messages"][0]["content"].as_str().unwrap_or_default();
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(json!({"content": [{"text": "Revenue was $2.5B."}]}))
        }
    }

    async fn cache_with(task_type: &str, rate: CompressionRate, text: &str) -> CacheStore {
        let cache = CacheStore::new(
            CacheSettings::new("bucket"),
            None,
            Some(Arc::new(MemoryObjectStore::new())),
        );
        let config = CompressionConfig::for_rate(rate, "t");
        let result = CompressionResult::new(text.to_string(), &config, 1000, 1);
        cache.store(task_type, rate, &result).await;
        cache
    }

    fn responder(cache: CacheStore, backend: Arc<dyn GenerationBackend>) -> QueryResponder {
        QueryResponder::new(
            cache,
            SummarizerAdapter::new(backend, RetryPolicy::default()),
            ResponderSettings::default(),
        )
    }

    #[test]
    fn test_validate_missing_fields() {
        let req = QueryRequest {
            task_type: "t".into(),
            ..Default::default()
        };
        assert_eq!(req.validate(), Err(ConfigError::MissingField("query")));

        let req = QueryRequest {
            query: "What?".into(),
            task_type: "  ".into(),
            rate: None,
        };
        assert_eq!(req.validate(), Err(ConfigError::MissingField("task_type")));
    }

    #[test]
    fn test_validate_rate() {
        let mut req = QueryRequest {
            query: "q".into(),
            task_type: "t".into(),
            rate: Some("medium".into()),
        };
        assert_eq!(req.validate(), Ok(Some(CompressionRate::Medium)));
        req.rate = Some("".into());
        assert_eq!(req.validate(), Ok(None));
        req.rate = Some("extreme".into());
        assert_eq!(req.validate(), Err(ConfigError::InvalidRate("extreme".into())));
    }

    #[test]
    fn test_request_accepts_compression_rate_alias() {
        let req: QueryRequest =
            serde_json::from_str(r#"{"query":"q","task_type":"t","compression_rate":"light"}"#).unwrap();
        assert_eq!(req.rate.as_deref(), Some("light"));
        let req: QueryRequest = serde_json::from_str(r#"{"task_type":"t"}"#).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_preview_answer_truncates_by_chars() {
        let text = "é".repeat(400);
        let answer = preview_answer(CompressionRate::High, "finance", &text, 300);
        assert!(answer.starts_with("[Using high compression] Based on the compressed knowledge for finance: "));
        assert!(answer.ends_with("..."));
        assert_eq!(answer.matches('é').count(), 300);
    }

    #[tokio::test]
    async fn test_miss_returns_sentinel() {
        let cache = CacheStore::new(CacheSettings::new("bucket"), None, Some(Arc::new(MemoryObjectStore::new())));
        let responder = responder(cache, Arc::new(EchoBackend::default()));

        let resp = responder
            .answer("What was the revenue?", "finance", None)
            .await
            .unwrap();

        assert!(!resp.cache_hit);
        assert_eq!(resp.rate_used, CompressionRate::Ultra);
        assert_eq!(resp.error.as_deref(), Some(CACHE_NOT_FOUND));
        assert_eq!(
            resp.response,
            "No compressed cache found for task_type: finance, rate: ultra. Please run compression service first."
        );
    }

    #[tokio::test]
    async fn test_hit_generates_from_compressed_knowledge() {
        let cache = cache_with("finance", CompressionRate::Medium, "Revenue $2.5B. Margin 22%.").await;
        let backend = Arc::new(EchoBackend::default());
        let responder = responder(cache, backend.clone());

        let resp = responder
            .answer("Explain the margin trend", "finance", None)
            .await
            .unwrap();

        assert!(resp.cache_hit);
        assert_eq!(resp.rate_used, CompressionRate::Medium);
        assert_eq!(resp.response, "Revenue was $2.5B.");
        assert_eq!(resp.cache_info.unwrap().compression_rate, CompressionRate::Medium);
        let prompts = backend.prompts.lock().unwrap();
        assert!(prompts[0].contains("Revenue $2.5B. Margin 22%."));
        assert!(prompts[0].contains("QUESTION: Explain the margin trend"));
    }

    #[tokio::test]
    async fn test_hit_without_generation_returns_preview() {
        let cache = cache_with("legal", CompressionRate::Light, "Clause 4 limits liability.").await;
        let responder = responder(cache, Arc::new(UnavailableBackend));

        let resp = responder
            .answer("List clauses", "legal", Some(CompressionRate::Light))
            .await
            .unwrap();

        assert!(resp.cache_hit);
        assert_eq!(
            resp.response,
            "[Using light compression] Based on the compressed knowledge for legal: Clause 4 limits liability...."
        );
        assert!(resp.error.is_none());
    }

    #[test]
    fn test_response_json_shape() {
        let resp = QueryResponse {
            query: "q".into(),
            response: "r".into(),
            rate_used: CompressionRate::High,
            task_type: "t".into(),
            cache_hit: false,
            cache_info: None,
            error: Some(CACHE_NOT_FOUND.into()),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["rate_used"], "high");
        assert_eq!(json["error"], "cache_not_found");
        assert!(json.get("cache_info").is_none());
    }
}
