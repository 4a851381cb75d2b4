use async_trait::async_trait;
use libsql::params;
use uuid::Uuid;

use crate::db::connection::Database;
use crate::db::traits::{ScoredPoint, VectorPoint, VectorStore};
use crate::error::{CaseLensError, Result};
use crate::models::{Document, Metadata};

const CATALOG_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS vector_collections (
    name TEXT PRIMARY KEY,
    dimensions INTEGER NOT NULL,
    created_at TEXT NOT NULL
)
"#;

/// Collections stored as libsql tables with an `F32_BLOB` column, searched
/// with `vector_distance_cos`.
pub struct LibSqlVectorStore {
    db: Database,
}

impl LibSqlVectorStore {
    pub async fn new(db: Database) -> Result<Self> {
        db.connection().execute(CATALOG_SQL, ()).await?;
        Ok(Self { db })
    }

    async fn dimensions_of(&self, collection: &str) -> Result<Option<usize>> {
        let mut rows = self
            .db
            .connection()
            .query(
                "SELECT dimensions FROM vector_collections WHERE name = ?1",
                params![collection],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row.get::<i64>(0)? as usize)),
            None => Ok(None),
        }
    }

    async fn require_dimensions(&self, collection: &str) -> Result<usize> {
        self.dimensions_of(collection)
            .await?
            .ok_or_else(|| CaseLensError::collection_unavailable(collection, "collection does not exist"))
    }
}

/// Table backing a collection. Names are restricted to `[a-z0-9_]`.
fn table_name(collection: &str) -> Result<String> {
    let valid = !collection.is_empty()
        && collection
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !valid {
        return Err(CaseLensError::Validation(format!(
            "Invalid collection name: '{collection}'"
        )));
    }
    Ok(format!("points_{collection}"))
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
impl VectorStore for LibSqlVectorStore {
    async fn create_collection(&self, collection: &str, dimensions: usize) -> Result<()> {
        let table = table_name(collection)?;
        if let Some(existing) = self.dimensions_of(collection).await? {
            return check_dimensions(collection, existing, dimensions);
        }

        let conn = self.db.connection();
        let tx = conn.transaction().await?;
        tx.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id TEXT PRIMARY KEY,
                    content TEXT NOT NULL,
                    metadata TEXT NOT NULL DEFAULT '{{}}',
                    embedding F32_BLOB({dimensions})
                )"
            ),
            (),
        )
        .await?;
        tx.execute(
            "INSERT INTO vector_collections (name, dimensions, created_at) VALUES (?1, ?2, ?3)",
            params![collection, dimensions as i64, chrono::Utc::now().to_rfc3339()],
        )
        .await?;
        tx.commit().await?;
        tracing::debug!(collection, dimensions, "Created vector collection");
        Ok(())
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        Ok(self.dimensions_of(collection).await?.is_some())
    }

    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<()> {
        let table = table_name(collection)?;
        let dimensions = self.require_dimensions(collection).await?;
        for point in &points {
            check_dimensions(collection, dimensions, point.vector.len())?;
        }

        let sql = format!(
            "INSERT INTO {table} (id, content, metadata, embedding)
             VALUES (?1, ?2, ?3, vector32(?4))
             ON CONFLICT(id) DO UPDATE SET
                content = excluded.content,
                metadata = excluded.metadata,
                embedding = excluded.embedding"
        );

        let tx = self.db.connection().transaction().await?;
        for point in &points {
            let metadata = serde_json::to_string(&point.document.metadata)?;
            let embedding = serde_json::to_string(&point.vector)?;
            tx.execute(
                &sql,
                params![
                    point.id.to_string(),
                    point.document.content.as_str(),
                    metadata,
                    embedding
                ],
            )
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn search(&self, collection: &str, vector: &[f32], k: usize) -> Result<Vec<ScoredPoint>> {
        let table = table_name(collection)?;
        let dimensions = self.require_dimensions(collection).await?;
        check_dimensions(collection, dimensions, vector.len())?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let embedding = serde_json::to_string(vector)?;
        let sql = format!(
            "SELECT id, content, metadata, vector_distance_cos(embedding, vector32(?1)) AS distance
             FROM {table}
             WHERE embedding IS NOT NULL
             ORDER BY distance ASC, rowid ASC
             LIMIT ?2"
        );
        let mut rows = self
            .db
            .connection()
            .query(&sql, params![embedding, k as i64])
            .await?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            let id: String = row.get(0)?;
            let metadata: Metadata = serde_json::from_str(&row.get::<String>(2)?)?;
            results.push(ScoredPoint {
                id: Uuid::parse_str(&id)
                    .map_err(|e| CaseLensError::Internal(format!("Invalid point id '{id}': {e}")))?,
                distance: row.get::<f64>(3)? as f32,
                document: Document {
                    content: row.get(1)?,
                    metadata,
                },
            });
        }
        Ok(results)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let table = table_name(collection)?;
        self.require_dimensions(collection).await?;
        let mut rows = self
            .db
            .connection()
            .query(&format!("SELECT COUNT(*) FROM {table}"), ())
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)? as usize),
            None => Ok(0),
        }
    }

    async fn delete_collection(&self, collection: &str) -> Result<bool> {
        let table = table_name(collection)?;
        let existed = self.collection_exists(collection).await?;
        let tx = self.db.connection().transaction().await?;
        tx.execute(&format!("DROP TABLE IF EXISTS {table}"), ()).await?;
        tx.execute(
            "DELETE FROM vector_collections WHERE name = ?1",
            params![collection],
        )
        .await?;
        tx.commit().await?;
        Ok(existed)
    }

    async fn flush(&self) -> Result<()> {
        self.db.checkpoint().await
    }
}
