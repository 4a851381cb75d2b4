use std::sync::Arc;

use crate::db::{CollectionRegistry, VectorStore};
use crate::embeddings::Embedder;
use crate::error::Result;
use crate::models::{CollectionHits, CollectionKind, RetrievalHit, RetrievalOutcome};

/// Nearest-neighbour search over the `cases` and `guidelines` collections.
#[derive(Clone)]
pub struct RetrievalService {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    registry: Arc<CollectionRegistry>,
}

impl RetrievalService {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        registry: Arc<CollectionRegistry>,
    ) -> Self {
        Self {
            store,
            embedder,
            registry,
        }
    }

    /// Embeds `query` once and searches both collections with it.
    ///
    /// A collection that cannot be searched comes back as
    /// [`CollectionHits::Unavailable`]; only an embedding failure is an error.
    pub async fn retrieve(
        &self,
        query: &str,
        k_cases: usize,
        k_guidelines: usize,
    ) -> Result<RetrievalOutcome> {
        let vector = self.embedder.embed_query(query).await?;

        let (cases, guidelines) = futures::join!(
            self.search(CollectionKind::Cases, &vector, k_cases),
            self.search(CollectionKind::Guidelines, &vector, k_guidelines),
        );

        tracing::debug!(
            cases = cases.hits().len(),
            guidelines = guidelines.hits().len(),
            cases_unavailable = cases.is_unavailable(),
            guidelines_unavailable = guidelines.is_unavailable(),
            "Retrieval complete"
        );

        Ok(RetrievalOutcome { cases, guidelines })
    }

    /// Searches only the `cases` collection.
    pub async fn retrieve_cases(&self, query: &str, k: usize) -> Result<CollectionHits> {
        let vector = self.embedder.embed_query(query).await?;
        Ok(self.search(CollectionKind::Cases, &vector, k).await)
    }

    /// Searches one collection with an already embedded query.
    pub async fn search(&self, kind: CollectionKind, vector: &[f32], k: usize) -> CollectionHits {
        if k == 0 {
            return CollectionHits::Hits(Vec::new());
        }

        let _shared = self.registry.gate(kind).read().await;

        match self.store.search(kind.name(), vector, k).await {
            Ok(points) => CollectionHits::Hits(
                points
                    .into_iter()
                    .map(|point| {
                        RetrievalHit::from_document(point.document, point.distance, point.id.to_string())
                    })
                    .collect(),
            ),
            Err(error) => {
                tracing::warn!(collection = %kind, error = %error, "Collection search failed");
                CollectionHits::Unavailable {
                    reason: error.to_string(),
                }
            }
        }
    }
}
