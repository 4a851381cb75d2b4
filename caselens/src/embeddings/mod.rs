mod api;
mod provider;


pub use api::{default_base_url, ApiConfig, EmbeddingApiClient};
pub use provider::EmbeddingProvider;

use async_trait::async_trait;

use crate::error::{CaseLensError, Result};

/// Text to vector. Implementations must be deterministic: the same text
/// always maps to the same vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds corpus documents, preserving input order.
    async fn embed_documents(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Embeds a single query.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_documents(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CaseLensError::Embedding("No embedding generated".to_string()))
    }

    fn dimensions(&self) -> usize;
}

/// Scales `vector` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        vector.iter_mut().for_each(|v| *v /= norm);
    }
}
