//! Per-node embedding storage.
//!
//! One vector per node, partitioned by `(brand_id, node_type)` — the
//! partition the dedup similarity scan iterates. Cosine similarity itself is
//! computed by the dedup service over the returned vectors, so the storage
//! layer stays a dumb vector shelf.

use async_trait::async_trait;
use chrono::Utc;
use pgvector::Vector;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use brandgraph_core::{Error, NodeEmbeddingRepository, NodeType, Result};

/// PostgreSQL + pgvector implementation of NodeEmbeddingRepository.
pub struct PgNodeEmbeddingRepository {
    pool: Pool<Postgres>,
}

impl PgNodeEmbeddingRepository {
    /// Create a new PgNodeEmbeddingRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NodeEmbeddingRepository for PgNodeEmbeddingRepository {
    async fn store(
        &self,
        node_id: Uuid,
        brand_id: i64,
        node_type: NodeType,
        vector: &Vector,
        model: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO node_embedding (node_id, brand_id, node_type, vector, model, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (node_id) DO UPDATE \
             SET vector = EXCLUDED.vector, model = EXCLUDED.model, created_at = EXCLUDED.created_at",
        )
        .bind(node_id)
        .bind(brand_id)
        .bind(node_type.as_str())
        .bind(vector)
        .bind(model)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }

    async fn for_brand_type(
        &self,
        brand_id: i64,
        node_type: NodeType,
    ) -> Result<Vec<(Uuid, Vector)>> {
        let rows = sqlx::query(
            "SELECT node_id, vector FROM node_embedding \
             WHERE brand_id = $1 AND node_type = $2 \
             ORDER BY node_id ASC",
        )
        .bind(brand_id)
        .bind(node_type.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get("node_id"), row.get("vector")))
            .collect())
    }

    async fn delete_for_node(&self, node_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM node_embedding WHERE node_id = $1")
            .bind(node_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}
