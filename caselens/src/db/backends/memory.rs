use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::traits::{cosine_distance, ScoredPoint, VectorPoint, VectorStore};
use crate::error::{CaseLensError, Result};

struct MemoryCollection {
    dimensions: usize,
    points: Vec<VectorPoint>,
    positions: HashMap<Uuid, usize>,
}

/// Brute-force in-process store. Points are kept in insertion order, which
/// doubles as the tie-break for equal distances.
#[derive(Default)]
pub struct MemoryVectorStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_dimensions(collection: &str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(CaseLensError::Validation(format!(
            "Collection '{collection}' holds {expected}-dimensional vectors, got {actual}"
        )));
    }
    Ok(())
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn create_collection(&self, collection: &str, dimensions: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        if let Some(existing) = collections.get(collection) {
            return check_dimensions(collection, existing.dimensions, dimensions);
        }
        collections.insert(
            collection.to_string(),
            MemoryCollection {
                dimensions,
                points: Vec::new(),
                positions: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        Ok(self.collections.read().await.contains_key(collection))
    }

    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<()> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| CaseLensError::collection_unavailable(collection, "collection does not exist"))?;

        for point in &points {
            check_dimensions(collection, target.dimensions, point.vector.len())?;
        }
        for point in points {
            match target.positions.get(&point.id) {
                Some(&position) => target.points[position] = point,
                None => {
                    target.positions.insert(point.id, target.points.len());
                    target.points.push(point);
                }
            }
        }
        Ok(())
    }

    async fn search(&self, collection: &str, vector: &[f32], k: usize) -> Result<Vec<ScoredPoint>> {
        let collections = self.collections.read().await;
        let target = collections
            .get(collection)
            .ok_or_else(|| CaseLensError::collection_unavailable(collection, "collection does not exist"))?;
        check_dimensions(collection, target.dimensions, vector.len())?;

        let mut scored: Vec<ScoredPoint> = target
            .points
            .iter()
            .map(|p| ScoredPoint {
                id: p.id,
                distance: cosine_distance(&p.vector, vector),
                document: p.document.clone(),
            })
            .collect();
        // Stable sort keeps insertion order among equal distances.
        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        scored.truncate(k);
        Ok(scored)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .map(|c| c.points.len())
            .ok_or_else(|| CaseLensError::collection_unavailable(collection, "collection does not exist"))
    }

    async fn delete_collection(&self, collection: &str) -> Result<bool> {
        Ok(self.collections.write().await.remove(collection).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Document;

    fn guideline(chunk: usize, vector: Vec<f32>) -> VectorPoint {
        VectorPoint::new(Document::guideline("g.txt", chunk, format!("chunk {chunk}")), vector)
    }

    #[tokio::test]
    async fn test_search_orders_by_distance_then_insertion() {
        let store = MemoryVectorStore::new();
        store.create_collection("guidelines", 2).await.unwrap();
        store
            .upsert(
                "guidelines",
                vec![
                    guideline(0, vec![0.0, 1.0]),
                    guideline(1, vec![1.0, 0.0]),
                    guideline(2, vec![2.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let hits = store.search("guidelines", &[1.0, 0.0], 3).await.unwrap();
        let contents: Vec<&str> = hits.iter().map(|h| h.document.content.as_str()).collect();
        assert_eq!(contents, vec!["chunk 1", "chunk 2", "chunk 0"]);
        assert!(hits[0].distance.abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_id() {
        let store = MemoryVectorStore::new();
        store.create_collection("guidelines", 2).await.unwrap();
        store.upsert("guidelines", vec![guideline(0, vec![1.0, 0.0])]).await.unwrap();
        store.upsert("guidelines", vec![guideline(0, vec![0.0, 1.0])]).await.unwrap();
        assert_eq!(store.count("guidelines").await.unwrap(), 1);

        let hits = store.search("guidelines", &[0.0, 1.0], 1).await.unwrap();
        assert!(hits[0].distance.abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_missing_collection_is_unavailable() {
        let store = MemoryVectorStore::new();
        let err = store.search("cases", &[1.0], 3).await.unwrap_err();
        assert!(matches!(err, CaseLensError::CollectionUnavailable { .. }));
        assert!(!store.delete_collection("cases").await.unwrap());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_rejected() {
        let store = MemoryVectorStore::new();
        store.create_collection("cases", 3).await.unwrap();
        assert!(store.create_collection("cases", 4).await.is_err());
        let err = store.upsert("cases", vec![guideline(0, vec![1.0])]).await.unwrap_err();
        assert!(matches!(err, CaseLensError::Validation(_)));
    }
}
