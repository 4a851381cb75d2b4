use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::{Arc, Mutex};
use tracing::info;

use super::api::{default_base_url, ApiConfig, EmbeddingApiClient};
use super::{l2_normalize, Embedder};
use crate::config::{parse_provider_model, EmbeddingsConfig};
use crate::error::{CaseLensError, Result};

#[derive(Clone)]
enum EmbeddingBackend {
    Local {
        model: Arc<Mutex<TextEmbedding>>,
        batch_size: usize,
    },
    Api {
        client: EmbeddingApiClient,
        batch_size: usize,
    },
}

/// Sentence embedder backed by a local ONNX model or an OpenAI-compatible
/// API. Vectors are L2-normalized so cosine distance is well defined.
#[derive(Clone)]
pub struct EmbeddingProvider {
    backend: EmbeddingBackend,
    dimensions: usize,
}

impl EmbeddingProvider {
    /// Builds the backend named by `config.model`: a bare model name or a
    /// `local/` prefix loads it locally, any other known provider prefix goes
    /// through the HTTP API.
    pub fn new(config: &EmbeddingsConfig) -> Result<Self> {
        let (provider, model_name) = parse_provider_model(&config.model);
        let batch_size = config.batch_size.max(1);

        let backend = if provider.eq_ignore_ascii_case("local") {
            info!(model = model_name, "Loading local embedding model");
            let model = build_model(resolve_embedding_model(model_name))?;
            EmbeddingBackend::Local {
                model: Arc::new(Mutex::new(model)),
                batch_size,
            }
        } else {
            let base_url = config
                .base_url
                .clone()
                .unwrap_or_else(|| default_base_url(provider).to_string());
            info!(provider, model = model_name, base_url = %base_url, "Using embedding API");
            let client = EmbeddingApiClient::new(ApiConfig {
                base_url,
                api_key: config.api_key.clone(),
                model: model_name.to_string(),
                timeout_secs: config.timeout_secs,
                max_retries: config.max_retries,
            })?;
            EmbeddingBackend::Api { client, batch_size }
        };

        Ok(Self {
            backend,
            dimensions: config.dimensions,
        })
    }

    pub fn from_api_client(client: EmbeddingApiClient, dimensions: usize, batch_size: usize) -> Self {
        Self {
            backend: EmbeddingBackend::Api {
                client,
                batch_size: batch_size.max(1),
            },
            dimensions,
        }
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        match &self.backend {
            EmbeddingBackend::Local { model, batch_size } => {
                let model = Arc::clone(model);
                let batch_size = *batch_size;
                tokio::task::spawn_blocking(move || {
                    let mut model = model.lock().map_err(|e| {
                        CaseLensError::Embedding(format!("Embedding model lock poisoned: {e}"))
                    })?;
                    model
                        .embed(texts, Some(batch_size))
                        .map_err(|e| CaseLensError::Embedding(e.to_string()))
                })
                .await
                .map_err(|e| CaseLensError::Embedding(format!("Embedding worker failed: {e}")))?
            }
            EmbeddingBackend::Api { client, .. } => client.embed(&texts).await,
        }
    }

    fn batch_size(&self) -> usize {
        match &self.backend {
            EmbeddingBackend::Local { batch_size, .. } | EmbeddingBackend::Api { batch_size, .. } => {
                *batch_size
            }
        }
    }
}

#[async_trait]
impl Embedder for EmbeddingProvider {
    async fn embed_documents(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut all = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size()) {
            let mut embedded = self.embed_batch(batch.to_vec()).await?;
            for vector in &mut embedded {
                if vector.len() != self.dimensions {
                    return Err(CaseLensError::Embedding(format!(
                        "Model returned {} dimensions, expected {}",
                        vector.len(),
                        self.dimensions
                    )));
                }
                l2_normalize(vector);
            }
            all.append(&mut embedded);
            tokio::task::yield_now().await;
        }
        Ok(all)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

fn resolve_embedding_model(model_name: &str) -> EmbeddingModel {
    match model_name {
        "BAAI/bge-small-en-v1.5" | "bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
        "BAAI/bge-base-en-v1.5" | "bge-base-en-v1.5" => EmbeddingModel::BGEBaseENV15,
        "all-MiniLM-L12-v2" | "sentence-transformers/all-MiniLM-L12-v2" => {
            EmbeddingModel::AllMiniLML12V2
        }
        "nomic-embed-text-v1.5" | "nomic-ai/nomic-embed-text-v1.5" => {
            EmbeddingModel::NomicEmbedTextV15
        }
        _ => EmbeddingModel::AllMiniLML6V2,
    }
}

fn build_model(embedding_model: EmbeddingModel) -> Result<TextEmbedding> {
    TextEmbedding::try_new(InitOptions::new(embedding_model).with_show_download_progress(true))
        .map_err(|e| CaseLensError::Embedding(e.to_string()))
}
