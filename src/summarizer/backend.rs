//! Generation capability clients.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use crate::errors::BackendError;

/// External text-generation capability: `invoke(model_id, body) -> body`.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn invoke(&self, model_id: &str, body: Value) -> Result<Value, BackendError>;
}

/// Invokes models over HTTP at `{endpoint}/model/{model_id}/invoke`.
pub struct HttpGenerationBackend {
    client: reqwest::Client,
    endpoint: reqwest::Url,
    api_key: Option<String>,
}

impl HttpGenerationBackend {
    pub fn new(endpoint: &str, api_key: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let endpoint = reqwest::Url::parse(endpoint)
            .map_err(|e| anyhow::anyhow!("Invalid model endpoint '{}': {}", endpoint, e))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    fn invoke_url(&self, model_id: &str) -> Result<reqwest::Url, BackendError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::Permanent(format!("Endpoint {} cannot be a base", self.endpoint)))?
            .pop_if_empty()
            .push("model")
            .push(model_id)
            .push("invoke");
        Ok(url)
    }
}

#[async_trait]
impl GenerationBackend for HttpGenerationBackend {
    async fn invoke(&self, model_id: &str, body: Value) -> Result<Value, BackendError> {
        let url = self.invoke_url(model_id)?;
        let mut request = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BackendError::classify(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = format!("HTTP {}: {}", status, text);
            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(BackendError::Transient(message));
            }
            return Err(BackendError::classify(message));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| BackendError::MalformedResponse(e.to_string()))
    }
}

/// Backend used when no generation endpoint is configured.
///
/// Every call fails permanently, which routes compression to the local
/// extractive fallback and query answering to the verbatim preview.
pub struct UnavailableBackend;

#[async_trait]
impl GenerationBackend for UnavailableBackend {
    async fn invoke(&self, model_id: &str, _body: Value) -> Result<Value, BackendError> {
        Err(BackendError::Permanent(format!(
            "No generation endpoint configured for model {}",
            model_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoke_url_appends_model_path() {
        let backend =
            HttpGenerationBackend::new("https://bedrock.example.com/", None, Duration::from_secs(5))
                .unwrap();
        let url = backend
            .invoke_url("anthropic.claude-3-haiku-20240307-v1:0")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://bedrock.example.com/model/anthropic.claude-3-haiku-20240307-v1:0/invoke"
        );
    }

    #[test]
    fn test_invoke_url_keeps_endpoint_prefix() {
        let backend =
            HttpGenerationBackend::new("http://localhost:8080/v1", None, Duration::from_secs(5))
                .unwrap();
        let url = backend.invoke_url("meta.llama2-13b-chat-v1").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/v1/model/meta.llama2-13b-chat-v1/invoke"
        );
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        assert!(HttpGenerationBackend::new("not a url", None, Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_unavailable_backend_fails_permanently() {
        let err = UnavailableBackend
            .invoke("amazon.titan-text-express-v1", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Permanent(_)));
    }
}
