use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::Document;

/// A document and its embedding, addressed by a deterministic id.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub document: Document,
}

impl VectorPoint {
    /// Builds a point whose id is derived from the document's logical key.
    /// Documents without a type fall back to their content.
    pub fn new(document: Document, vector: Vec<f32>) -> Self {
        let key = document
            .logical_key()
            .unwrap_or_else(|| format!("content:{}", document.content));
        Self {
            id: point_id(&key),
            vector,
            document,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub id: Uuid,
    /// Cosine distance, `1 - cos(a, b)`. Lower is closer.
    pub distance: f32,
    pub document: Document,
}

/// UUIDv5 of a logical key such as `case:<id>` or `guideline:<source>#<n>`.
pub fn point_id(logical_key: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, logical_key.as_bytes())
}

/// Cosine distance in `[0, 2]`. A zero vector is at distance 1 from everything.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f32::EPSILON {
        return 1.0;
    }
    1.0 - (dot / denom).clamp(-1.0, 1.0)
}

/// Named vector collections with nearest-neighbour search.
///
/// `search` orders by ascending distance; equal distances keep the order in
/// which points were first inserted. Searching a collection that does not
/// exist is a `CollectionUnavailable` error.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Creates the collection if missing. Existing data is kept.
    async fn create_collection(&self, collection: &str, dimensions: usize) -> Result<()>;

    async fn collection_exists(&self, collection: &str) -> Result<bool>;

    /// Inserts points, replacing any point with the same id.
    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<()>;

    async fn search(&self, collection: &str, vector: &[f32], k: usize) -> Result<Vec<ScoredPoint>>;

    async fn count(&self, collection: &str) -> Result<usize>;

    /// Drops the collection. Returns whether it existed.
    async fn delete_collection(&self, collection: &str) -> Result<bool>;

    /// Persists buffered writes. In-process stores have nothing to do.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_id_is_deterministic() {
        assert_eq!(point_id("case:abc"), point_id("case:abc"));
        assert_ne!(point_id("case:abc"), point_id("case:abd"));
        assert_eq!(point_id("case:abc").get_version_num(), 5);
    }

    #[test]
    fn test_cosine_distance() {
        assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }
}
