use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::anonymize::document_violations;
use crate::config::{DataConfig, IndexingConfig};
use crate::dataset::read_documents;
use crate::db::{CollectionRegistry, CollectionState, VectorPoint, VectorStore};
use crate::embeddings::Embedder;
use crate::error::Result;
use crate::models::{CollectionKind, Document, DocumentType};
use crate::processing::{load_guideline_documents, WindowChunker};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionReport {
    pub collection: String,
    /// Points written by this run.
    pub indexed: usize,
    /// Points in the collection after the run.
    pub total: usize,
    /// The collection was already ready and left untouched.
    pub skipped: bool,
    /// Cases withheld because a document failed the anonymization check.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocked_cases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexReport {
    pub cases: CollectionReport,
    pub guidelines: CollectionReport,
}

/// Documents and vectors ready to be written to one collection.
struct Prepared {
    points: Vec<VectorPoint>,
    blocked_cases: Vec<String>,
}

/// Loads the built dataset and guideline texts into the vector store.
#[derive(Clone)]
pub struct IndexerService {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    registry: Arc<CollectionRegistry>,
    data: DataConfig,
    indexing: IndexingConfig,
}

impl IndexerService {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        registry: Arc<CollectionRegistry>,
        data: DataConfig,
        indexing: IndexingConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            registry,
            data,
            indexing,
        }
    }

    /// Populates every collection that is not ready yet.
    pub async fn index_all(&self) -> Result<IndexReport> {
        Ok(IndexReport {
            cases: self.index_collection(CollectionKind::Cases).await?,
            guidelines: self.index_collection(CollectionKind::Guidelines).await?,
        })
    }

    /// Drops and rebuilds every collection.
    pub async fn reset(&self) -> Result<IndexReport> {
        Ok(IndexReport {
            cases: self.reset_collection(CollectionKind::Cases).await?,
            guidelines: self.reset_collection(CollectionKind::Guidelines).await?,
        })
    }

    /// Single-writer indexing of one collection. A collection that is already
    /// ready, in the registry or in a persistent store, is left alone.
    pub async fn index_collection(&self, kind: CollectionKind) -> Result<CollectionReport> {
        let gate = self.registry.gate(kind);
        let permit = gate.index_permit().await;

        if let CollectionState::Ready { count } = permit.state() {
            info!(collection = %kind, count, "Collection already indexed");
            return Ok(skipped_report(kind, count));
        }

        if self.store.collection_exists(kind.name()).await? {
            let count = self.store.count(kind.name()).await?;
            if count > 0 {
                permit.adopt(count);
                info!(collection = %kind, count, "Adopted existing collection");
                return Ok(skipped_report(kind, count));
            }
        }

        permit.begin();
        let result = self.write_fresh(kind).await;
        match result {
            Ok(report) => {
                permit.finish(report.total);
                Ok(report)
            }
            Err(e) => {
                permit.fail();
                error!(collection = %kind, error = %e, "Indexing failed");
                Err(e)
            }
        }
    }

    /// Rebuilds one collection under an exclusive permit. Documents are
    /// loaded and embedded before the old collection is dropped, so a
    /// failure while preparing leaves the previous contents in place.
    pub async fn reset_collection(&self, kind: CollectionKind) -> Result<CollectionReport> {
        let gate = self.registry.gate(kind);
        let permit = gate.reset_permit().await;
        let previous = permit.state();
        permit.begin();

        let prepared = match self.prepare(kind).await {
            Ok(prepared) => prepared,
            Err(e) => {
                permit.restore(previous);
                error!(collection = %kind, error = %e, "Reset aborted before dropping collection");
                return Err(e);
            }
        };

        let committed = async {
            self.store.delete_collection(kind.name()).await?;
            self.commit(kind, prepared).await
        }
        .await;

        match committed {
            Ok(report) => {
                permit.finish(report.total);
                info!(collection = %kind, total = report.total, "Collection reset");
                Ok(report)
            }
            Err(e) => {
                permit.fail();
                error!(collection = %kind, error = %e, "Reset failed after dropping collection");
                Err(e)
            }
        }
    }

    async fn write_fresh(&self, kind: CollectionKind) -> Result<CollectionReport> {
        let prepared = self.prepare(kind).await?;
        self.commit(kind, prepared).await
    }

    async fn commit(&self, kind: CollectionKind, prepared: Prepared) -> Result<CollectionReport> {
        let name = kind.name();
        let indexed = prepared.points.len();

        self.store
            .create_collection(name, self.embedder.dimensions())
            .await?;
        if !prepared.points.is_empty() {
            self.store.upsert(name, prepared.points).await?;
        }
        let total = self.store.count(name).await?;

        info!(collection = %kind, indexed, total, "Collection indexed");
        Ok(CollectionReport {
            collection: name.to_string(),
            indexed,
            total,
            skipped: false,
            blocked_cases: prepared.blocked_cases,
        })
    }

    async fn prepare(&self, kind: CollectionKind) -> Result<Prepared> {
        let (documents, blocked_cases) = match kind {
            CollectionKind::Cases => self.load_case_documents()?,
            CollectionKind::Guidelines => {
                let chunker = WindowChunker::new(&self.indexing);
                (load_guideline_documents(&self.data.guidelines_dir, &chunker)?, Vec::new())
            }
        };

        if documents.is_empty() {
            return Ok(Prepared {
                points: Vec::new(),
                blocked_cases,
            });
        }

        let texts = documents.iter().map(|d| d.content.clone()).collect();
        let vectors = self.embedder.embed_documents(texts).await?;

        let points = documents
            .into_iter()
            .zip(vectors)
            .map(|(document, vector)| VectorPoint::new(document, vector))
            .collect();

        Ok(Prepared {
            points,
            blocked_cases,
        })
    }

    /// Case cards and frame captions from the JSONL store. A case with any
    /// document that fails the anonymization check is withheld entirely.
    fn load_case_documents(&self) -> Result<(Vec<Document>, Vec<String>)> {
        let path = self.data.documents_path();
        if !path.exists() {
            warn!(path = %path.display(), "Document store not found, nothing to index");
            return Ok((Vec::new(), Vec::new()));
        }

        let documents: Vec<Document> = read_documents(&path)?
            .into_iter()
            .filter(|d| {
                matches!(
                    d.document_type(),
                    Some(DocumentType::CaseCard) | Some(DocumentType::Frame)
                )
            })
            .collect();

        let mut issues: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for document in &documents {
            let found = document_violations(document);
            if !found.is_empty() {
                let case_id = document.case_id().unwrap_or("<missing case_id>").to_string();
                issues.entry(case_id).or_default().extend(found);
            }
        }

        for (case_id, problems) in &issues {
            error!(case_id = %case_id, issues = ?problems, "Anonymization violation, case not indexed");
        }

        let blocked: BTreeSet<&str> = issues.keys().map(String::as_str).collect();
        let kept = documents
            .iter()
            .filter(|d| !blocked.contains(d.case_id().unwrap_or("<missing case_id>")))
            .cloned()
            .collect();

        Ok((kept, issues.into_keys().collect()))
    }
}

fn skipped_report(kind: CollectionKind, count: usize) -> CollectionReport {
    CollectionReport {
        collection: kind.name().to_string(),
        indexed: 0,
        total: count,
        skipped: true,
        blocked_cases: Vec::new(),
    }
}
