use serde::{Deserialize, Serialize};

use super::{Document, Metadata};

/// One ranked result. `distance` is cosine distance: lower is closer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub id: String,
    pub distance: f32,
    pub text: String,
    pub metadata: Metadata,
}

impl RetrievalHit {
    pub fn from_document(document: Document, distance: f32, fallback_id: String) -> Self {
        let id = document.evidence_id().unwrap_or(fallback_id);
        Self {
            id,
            distance,
            text: document.content,
            metadata: document.metadata,
        }
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    pub fn case_id(&self) -> Option<&str> {
        self.str_field("case_id")
    }

    /// Raw diagnosis label, `"unknown"` when the document carries none.
    pub fn label(&self) -> &str {
        self.str_field("diagnosis_label_raw").unwrap_or("unknown")
    }
}

/// Per-collection retrieval outcome. A collection that cannot be queried is
/// reported, not silently turned into an empty list.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionHits {
    Hits(Vec<RetrievalHit>),
    Unavailable { reason: String },
}

impl CollectionHits {
    pub fn hits(&self) -> &[RetrievalHit] {
        match self {
            CollectionHits::Hits(hits) => hits,
            CollectionHits::Unavailable { .. } => &[],
        }
    }

    pub fn into_hits(self) -> Vec<RetrievalHit> {
        match self {
            CollectionHits::Hits(hits) => hits,
            CollectionHits::Unavailable { .. } => Vec::new(),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, CollectionHits::Unavailable { .. })
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        match self {
            CollectionHits::Unavailable { reason } => Some(reason),
            CollectionHits::Hits(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalOutcome {
    pub cases: CollectionHits,
    pub guidelines: CollectionHits,
}

/// Aggregated similarity weight for one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelVote {
    pub label: String,
    pub weight: f64,
}
