//! Knowledge node repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use brandgraph_core::{
    derive_summary, new_v7, CreateNodeRequest, Error, KnowledgeNode, ListNodesRequest, NodeType,
    NodeRepository, Result, SourceRef,
};

use crate::hash_text;

/// PostgreSQL implementation of NodeRepository.
pub struct PgNodeRepository {
    pool: Pool<Postgres>,
}

impl PgNodeRepository {
    /// Create a new PgNodeRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

const NODE_COLUMNS: &str = "id, brand_id, node_type, text, summary, segment, journey_stage, \
                            sources, confidence, verified_by_user, created_at";

/// Map a database row to a KnowledgeNode.
fn map_row_to_node(row: sqlx::postgres::PgRow) -> Result<KnowledgeNode> {
    let id: Uuid = row.get("id");
    let node_type: String = row.get("node_type");
    let node_type = node_type
        .parse::<NodeType>()
        .map_err(|_| Error::Internal(format!("corrupt node_type on node {}", id)))?;
    let sources: Json<Vec<SourceRef>> = row.get("sources");

    Ok(KnowledgeNode {
        id,
        brand_id: row.get("brand_id"),
        node_type,
        text: row.get("text"),
        summary: row.get("summary"),
        segment: row.get("segment"),
        journey_stage: row.get("journey_stage"),
        sources: sources.0,
        confidence: row.get("confidence"),
        verified_by_user: row.get("verified_by_user"),
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl NodeRepository for PgNodeRepository {
    async fn create(&self, req: CreateNodeRequest) -> Result<KnowledgeNode> {
        req.validate()?;

        let node = KnowledgeNode {
            id: new_v7(),
            brand_id: req.brand_id,
            node_type: req.node_type,
            summary: req
                .summary
                .clone()
                .or_else(|| Some(derive_summary(&req.text))),
            text: req.text,
            segment: req.segment,
            journey_stage: req.journey_stage,
            sources: vec![req.source],
            confidence: req.confidence,
            verified_by_user: false,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO knowledge_node \
             (id, brand_id, node_type, text, summary, segment, journey_stage, sources, \
              text_hash, confidence, verified_by_user, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(node.id)
        .bind(node.brand_id)
        .bind(node.node_type.as_str())
        .bind(&node.text)
        .bind(&node.summary)
        .bind(&node.segment)
        .bind(&node.journey_stage)
        .bind(Json(&node.sources))
        .bind(hash_text(&node.text))
        .bind(node.confidence)
        .bind(node.verified_by_user)
        .bind(node.created_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(node)
    }

    async fn get(&self, id: Uuid) -> Result<KnowledgeNode> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM knowledge_node WHERE id = $1",
            NODE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match row {
            Some(row) => map_row_to_node(row),
            None => Err(Error::NodeNotFound(id)),
        }
    }

    async fn list(&self, req: ListNodesRequest) -> Result<Vec<KnowledgeNode>> {
        let mut sql = format!(
            "SELECT {} FROM knowledge_node WHERE brand_id = $1 ",
            NODE_COLUMNS
        );
        let mut param_idx = 2;
        if req.node_type.is_some() {
            sql.push_str(&format!("AND node_type = ${} ", param_idx));
            param_idx += 1;
        }
        if req.segment.is_some() {
            sql.push_str(&format!("AND segment = ${} ", param_idx));
        }
        sql.push_str("ORDER BY created_at ASC, id ASC");

        let mut query = sqlx::query(&sql).bind(req.brand_id);
        if let Some(node_type) = req.node_type {
            query = query.bind(node_type.as_str());
        }
        if let Some(segment) = &req.segment {
            query = query.bind(segment);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(Error::Database)?;
        rows.into_iter().map(map_row_to_node).collect()
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        // Relations and the stored embedding cascade via foreign keys.
        let result = sqlx::query("DELETE FROM knowledge_node WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NodeNotFound(id));
        }
        Ok(())
    }

    async fn append_source(&self, id: Uuid, source: SourceRef) -> Result<()> {
        let result = sqlx::query(
            "UPDATE knowledge_node SET sources = sources || $2::jsonb WHERE id = $1",
        )
        .bind(id)
        .bind(Json(vec![source]))
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NodeNotFound(id));
        }
        Ok(())
    }

    async fn merge_confidence(&self, id: Uuid, candidate: f32) -> Result<()> {
        if !candidate.is_finite() || !(0.0..=1.0).contains(&candidate) {
            return Err(Error::Validation(format!(
                "confidence must be within [0, 1], got {} (node {})",
                candidate, id
            )));
        }

        let result =
            sqlx::query("UPDATE knowledge_node SET confidence = GREATEST(confidence, $2) WHERE id = $1")
                .bind(id)
                .bind(candidate)
                .execute(&self.pool)
                .await
                .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NodeNotFound(id));
        }
        Ok(())
    }

    async fn set_verified(&self, id: Uuid, verified: bool) -> Result<()> {
        let result = sqlx::query("UPDATE knowledge_node SET verified_by_user = $2 WHERE id = $1")
            .bind(id)
            .bind(verified)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NodeNotFound(id));
        }
        Ok(())
    }

    async fn find_by_text_hash(
        &self,
        brand_id: i64,
        node_type: NodeType,
        text_hash: &str,
    ) -> Result<Option<KnowledgeNode>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM knowledge_node \
             WHERE brand_id = $1 AND node_type = $2 AND text_hash = $3 \
             ORDER BY created_at ASC, id ASC LIMIT 1",
            NODE_COLUMNS
        ))
        .bind(brand_id)
        .bind(node_type.as_str())
        .bind(text_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(map_row_to_node).transpose()
    }

    async fn count_by_type(&self, brand_id: i64) -> Result<Vec<(NodeType, i64)>> {
        let rows = sqlx::query(
            "SELECT node_type, COUNT(*) as count FROM knowledge_node \
             WHERE brand_id = $1 GROUP BY node_type ORDER BY node_type",
        )
        .bind(brand_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter()
            .map(|row| {
                let node_type: String = row.get("node_type");
                let node_type = node_type
                    .parse::<NodeType>()
                    .map_err(|_| Error::Internal(format!("corrupt node_type: {}", node_type)))?;
                Ok((node_type, row.get::<i64, _>("count")))
            })
            .collect()
    }
}
