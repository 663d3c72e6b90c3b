//! Embedding providers.
//!
//! A provider is a stateless text → vector function backed by a remote
//! model. Retry and timeout policy belong to the provider client; callers
//! treat any error it returns as final.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Get the model this provider embeds with.
    fn model(&self) -> &str;

    /// Generate an embedding for the given text.
    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// Generate embeddings for multiple texts.
    ///
    /// The returned vectors are in the same order as `texts`.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        // Default implementation: process sequentially
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }
}

#[async_trait]
impl<P> EmbeddingProvider for Arc<P>
where
    P: EmbeddingProvider + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    fn model(&self) -> &str {
        (**self).model()
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        (**self).embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        (**self).embed_batch(texts).await
    }
}

/// OpenAI embedding provider.
pub struct OpenAIProvider {
    /// API key.
    api_key: Option<String>,

    /// API base URL.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Model used for every request.
    model: String,

    /// Retries after the first attempt for transient failures.
    max_retries: u32,

    /// Per-request timeout.
    timeout: Duration,

    /// Delay before the first retry; doubled on each further retry.
    retry_base_delay: Duration,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider, reading the key from `OPENAI_API_KEY`.
    pub fn new() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            base_url: "https://api.openai.com/v1".to_string(),
            client: reqwest::Client::new(),
            model: "text-embedding-ada-002".to_string(),
            max_retries: 3,
            timeout: Duration::from_secs(30),
            retry_base_delay: Duration::from_millis(500),
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set how many times a transient failure is retried.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the delay before the first retry.
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Whether an API key is available.
    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    /// Post `texts` to the embeddings endpoint, retrying transient failures.
    async fn request_embeddings(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(EmbeddingError::ProviderNotConfigured)?;

        let body = serde_json::json!({
            "input": texts,
            "model": self.model,
        });

        let mut attempt: u32 = 0;
        loop {
            match self.send_once(api_key, &body).await {
                Ok(response) => return into_ordered_embeddings(response, texts.len()),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.retry_delay(attempt, &e);
                    attempt += 1;
                    warn!(
                        "Embedding request failed ({e}), retry {attempt}/{} in {delay:?}",
                        self.max_retries
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(
        &self,
        api_key: &str,
        body: &serde_json::Value,
    ) -> Result<OpenAIEmbeddingResponse> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

            return Err(EmbeddingError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if status.is_server_error() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Server {
                status: status.as_u16(),
                message,
            });
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiRequest(format!(
                "API error ({status}): {error_text}"
            )));
        }

        response.json().await.map_err(map_send_error)
    }

    fn retry_delay(&self, attempt: u32, error: &EmbeddingError) -> Duration {
        let backoff = self.retry_base_delay.saturating_mul(2u32.saturating_pow(attempt));
        match error {
            EmbeddingError::RateLimited { retry_after_secs } => {
                backoff.max(Duration::from_secs(*retry_after_secs))
            }
            _ => backoff,
        }
    }
}

impl Default for OpenAIProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        debug!("Generating embedding with model: {}", self.model);

        let mut embeddings = self.request_embeddings(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| EmbeddingError::InvalidResponse("No embedding in response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Generating batch embeddings for {} texts with model: {}",
            texts.len(),
            self.model
        );

        let embeddings = self.request_embeddings(texts).await?;
        info!("Generated {} batch embeddings", embeddings.len());
        Ok(embeddings)
    }
}

fn map_send_error(error: reqwest::Error) -> EmbeddingError {
    if error.is_timeout() {
        EmbeddingError::Timeout
    } else {
        EmbeddingError::Http(error)
    }
}

/// Sort response items by their input index and check the count.
fn into_ordered_embeddings(
    response: OpenAIEmbeddingResponse,
    expected: usize,
) -> Result<Vec<Embedding>> {
    let mut data = response.data;
    if data.len() != expected {
        return Err(EmbeddingError::InvalidResponse(format!(
            "expected {expected} embeddings, got {}",
            data.len()
        )));
    }

    data.sort_by_key(|item| item.index);
    Ok(data.into_iter().map(|item| item.embedding).collect())
}

/// OpenAI API response format.
#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> OpenAIProvider {
        OpenAIProvider::new()
            .with_api_key("test-key")
            .with_base_url(server.uri())
            .with_retry_base_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_embed_batch_restores_input_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "text-embedding-ada-002",
                "input": ["first", "second"],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    { "embedding": [0.0, 1.0], "index": 1 },
                    { "embedding": [1.0, 0.0], "index": 0 },
                ],
                "model": "text-embedding-ada-002",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let embeddings = provider
            .embed_batch(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();

        assert_eq!(embeddings, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_embed_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{ "embedding": [0.5, 0.5], "index": 0 }],
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let embedding = provider.embed("hello").await.unwrap();
        assert_eq!(embedding, vec![0.5, 0.5]);
    }

    #[tokio::test]
    async fn test_rate_limit_surfaces_after_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
            .expect(2)
            .mount(&server)
            .await;

        let provider = provider_for(&server).with_max_retries(1);
        let err = provider.embed("hello").await.unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::RateLimited {
                retry_after_secs: 0
            }
        ));
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad input"))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let err = provider.embed("hello").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::ApiRequest(_)));
    }

    #[tokio::test]
    async fn test_count_mismatch_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{ "embedding": [1.0], "index": 0 }],
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let err = provider
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let provider = OpenAIProvider {
            api_key: None,
            ..OpenAIProvider::new()
        };
        let err = provider.embed("hello").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::ProviderNotConfigured));
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_request() {
        let provider = OpenAIProvider::new()
            .with_api_key("test-key")
            .with_base_url("http://127.0.0.1:9");
        let embeddings = provider.embed_batch(&[]).await.unwrap();
        assert!(embeddings.is_empty());
    }
}
