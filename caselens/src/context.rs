use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::dataset::{read_documents, read_labels};
use crate::db::{CollectionRegistry, Database, LibSqlVectorStore, MemoryVectorStore, VectorStore};
use crate::embeddings::{Embedder, EmbeddingProvider};
use crate::error::Result;
use crate::llm::{LlmProvider, Reasoner};
use crate::services::{
    evaluate_retrieval, AnalysisService, AnalysisSettings, EvaluationReport, IndexerService,
    RetrievalService,
};

/// Shared collaborators for one process: configuration, embedder, vector
/// store, reasoning model and the per-collection state machine.
///
/// Build it once with [`CaseLensContext::init`] (or [`CaseLensContext::from_parts`]
/// in tests), hand out services from it, and call [`CaseLensContext::shutdown`]
/// before exit.
#[derive(Clone)]
pub struct CaseLensContext {
    pub config: Arc<Config>,
    pub embedder: Arc<dyn Embedder>,
    pub store: Arc<dyn VectorStore>,
    pub reasoner: Arc<dyn Reasoner>,
    pub registry: Arc<CollectionRegistry>,
}

impl CaseLensContext {
    pub async fn init(config: Config) -> Result<Self> {
        config.validate()?;

        info!("Loading embedding model: {}...", config.embeddings.model);
        let embedder: Arc<dyn Embedder> = Arc::new(EmbeddingProvider::new(&config.embeddings)?);

        let store: Arc<dyn VectorStore> = if config.store.is_in_memory() {
            info!("Using in-process vector store");
            Arc::new(MemoryVectorStore::new())
        } else {
            info!(url = %config.store.url, "Opening vector store");
            let db = Database::new(&config.store).await?;
            Arc::new(LibSqlVectorStore::new(db).await?)
        };

        if let Some(reasoning) = &config.reasoning {
            info!("Initializing reasoning provider: {}...", reasoning.model);
        }
        let reasoner = LlmProvider::new(config.reasoning.as_ref());
        if !reasoner.is_available() {
            warn!("Reasoning model unavailable - analysis will return failure results");
        }

        Ok(Self::from_parts(config, embedder, store, Arc::new(reasoner)))
    }

    pub fn from_parts(
        config: Config,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        reasoner: Arc<dyn Reasoner>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            embedder,
            store,
            reasoner,
            registry: Arc::new(CollectionRegistry::new()),
        }
    }

    pub fn retrieval(&self) -> RetrievalService {
        RetrievalService::new(
            self.store.clone(),
            self.embedder.clone(),
            self.registry.clone(),
        )
    }

    pub fn indexer(&self) -> IndexerService {
        IndexerService::new(
            self.store.clone(),
            self.embedder.clone(),
            self.registry.clone(),
            self.config.data.clone(),
            self.config.indexing.clone(),
        )
    }

    pub fn analysis(&self) -> AnalysisService {
        AnalysisService::new(
            self.retrieval(),
            self.reasoner.clone(),
            self.config.data.images_dir(),
            AnalysisSettings::from_config(&self.config),
        )
    }

    /// Scores case retrieval against the label side table.
    pub async fn evaluate(&self, ks: &[usize]) -> Result<EvaluationReport> {
        let documents = read_documents(&self.config.data.documents_path())?;
        let labels = read_labels(&self.config.data.labels_path())?;
        evaluate_retrieval(
            &self.retrieval(),
            &documents,
            &labels,
            ks,
            self.config.indexing.frames_per_case,
        )
        .await
    }

    pub async fn shutdown(self) -> Result<()> {
        info!("Flushing vector store...");
        self.store.flush().await
    }
}
