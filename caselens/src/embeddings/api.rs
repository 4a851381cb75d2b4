use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, StatusCode,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{CaseLensError, Result};

/// Provider-specific default base URLs
pub fn default_base_url(provider: &str) -> &'static str {
    match provider.to_lowercase().as_str() {
        "openrouter" => "https://openrouter.ai/api/v1",
        "ollama" => "http://localhost:11434/v1",
        "lmstudio" => "http://localhost:1234/v1",
        _ => "https://api.openai.com/v1",
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

/// Outcome of a single HTTP attempt.
enum Attempt {
    Done(Vec<Vec<f32>>),
    Retry(CaseLensError),
}

/// Client for OpenAI-compatible `/embeddings` endpoints.
#[derive(Clone)]
pub struct EmbeddingApiClient {
    client: Client,
    headers: HeaderMap,
    config: ApiConfig,
}

impl EmbeddingApiClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CaseLensError::Embedding(format!("Failed to create HTTP client: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(api_key) = &config.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|e| CaseLensError::Embedding(format!("Invalid API key header: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        Ok(Self {
            client,
            headers,
            config,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Embeds `texts` in one request, retrying rate limits, server errors and
    /// transport failures with exponential delay. Output order follows input
    /// order even when the server reorders `data`.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(100 * 2_u64.pow(attempt - 1));
                debug!(attempt, delay_ms = delay.as_millis() as u64, "Retrying embedding request");
                tokio::time::sleep(delay).await;
            }

            match self.attempt(texts).await? {
                Attempt::Done(vectors) => return Ok(vectors),
                Attempt::Retry(e) => {
                    warn!(attempt, error = %e, "Embedding request failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| CaseLensError::Embedding("Unknown error".to_string())))
    }

    async fn attempt(&self, texts: &[String]) -> Result<Attempt> {
        let request = EmbeddingRequest {
            model: &self.config.model,
            input: texts,
        };
        let url = format!("{}/embeddings", self.config.base_url.trim_end_matches('/'));

        let resp = match self
            .client
            .post(&url)
            .headers(self.headers.clone())
            .json(&request)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                return Ok(Attempt::Retry(CaseLensError::Embedding(format!(
                    "Request failed: {e}"
                ))))
            }
        };

        let status = resp.status();
        if status.is_success() {
            let body: EmbeddingResponse = resp
                .json()
                .await
                .map_err(|e| CaseLensError::Embedding(format!("Failed to parse response: {e}")))?;
            return Self::ordered(body, texts.len()).map(Attempt::Done);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok());
            return Ok(Attempt::Retry(CaseLensError::ApiRateLimit { retry_after }));
        }

        let body = resp.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(CaseLensError::ApiAuth(body));
        }
        if status.is_server_error() {
            return Ok(Attempt::Retry(CaseLensError::Embedding(format!(
                "Server error {status}: {body}"
            ))));
        }
        Err(CaseLensError::Embedding(format!("API error {status}: {body}")))
    }

    fn ordered(body: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
        if body.data.len() != expected {
            return Err(CaseLensError::Embedding(format!(
                "Expected {expected} embeddings, got {}",
                body.data.len()
            )));
        }
        let mut data = body.data;
        if data.iter().all(|d| d.index.is_some()) {
            data.sort_by_key(|d| d.index);
        }
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    pub async fn detect_dimensions(&self) -> Result<usize> {
        let embeddings = self.embed(&["dimension probe".to_string()]).await?;
        embeddings
            .first()
            .map(|e| e.len())
            .ok_or_else(|| CaseLensError::Embedding("No embedding returned".to_string()))
    }
}
