//! Knowledge relation repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use brandgraph_core::{
    new_v7, CreateRelationRequest, Error, KnowledgeRelation, ListRelationsRequest, Provenance,
    RelationRepository, RelationType, Result,
};

/// PostgreSQL implementation of RelationRepository.
pub struct PgRelationRepository {
    pool: Pool<Postgres>,
}

impl PgRelationRepository {
    /// Create a new PgRelationRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

const RELATION_COLUMNS: &str = "id, brand_id, from_node_id, to_node_id, relation_type, \
                                strength, context, inferred_by, created_at";

/// Map a database row to a KnowledgeRelation.
fn map_row_to_relation(row: sqlx::postgres::PgRow) -> Result<KnowledgeRelation> {
    let id: Uuid = row.get("id");
    let relation_type: String = row.get("relation_type");
    let relation_type = relation_type
        .parse::<RelationType>()
        .map_err(|_| Error::Internal(format!("corrupt relation_type on relation {}", id)))?;
    let inferred_by: String = row.get("inferred_by");
    let inferred_by = inferred_by
        .parse::<Provenance>()
        .map_err(|_| Error::Internal(format!("corrupt inferred_by on relation {}", id)))?;

    Ok(KnowledgeRelation {
        id,
        brand_id: row.get("brand_id"),
        from_node_id: row.get("from_node_id"),
        to_node_id: row.get("to_node_id"),
        relation_type,
        strength: row.get("strength"),
        context: row.get("context"),
        inferred_by,
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl RelationRepository for PgRelationRepository {
    async fn create(&self, req: CreateRelationRequest) -> Result<KnowledgeRelation> {
        req.validate()?;

        // Brand isolation: the relation and both endpoints must share brand_id.
        let rows = sqlx::query("SELECT id, brand_id FROM knowledge_node WHERE id = ANY($1)")
            .bind(vec![req.from_node_id, req.to_node_id])
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        for endpoint in [req.from_node_id, req.to_node_id] {
            let brand = rows
                .iter()
                .find(|r| r.get::<Uuid, _>("id") == endpoint)
                .map(|r| r.get::<i64, _>("brand_id"))
                .ok_or(Error::NodeNotFound(endpoint))?;
            if brand != req.brand_id {
                return Err(Error::Validation(format!(
                    "cross-brand relation rejected: node {} belongs to brand {}, relation to brand {}",
                    endpoint, brand, req.brand_id
                )));
            }
        }

        let relation = KnowledgeRelation {
            id: new_v7(),
            brand_id: req.brand_id,
            from_node_id: req.from_node_id,
            to_node_id: req.to_node_id,
            relation_type: req.relation_type,
            strength: req.strength,
            context: req.context,
            inferred_by: req.inferred_by,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO knowledge_relation \
             (id, brand_id, from_node_id, to_node_id, relation_type, strength, context, \
              inferred_by, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(relation.id)
        .bind(relation.brand_id)
        .bind(relation.from_node_id)
        .bind(relation.to_node_id)
        .bind(relation.relation_type.as_str())
        .bind(relation.strength)
        .bind(&relation.context)
        .bind(relation.inferred_by.as_str())
        .bind(relation.created_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(relation)
    }

    async fn get(&self, id: Uuid) -> Result<KnowledgeRelation> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM knowledge_relation WHERE id = $1",
            RELATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match row {
            Some(row) => map_row_to_relation(row),
            None => Err(Error::RelationNotFound(id)),
        }
    }

    async fn list(&self, req: ListRelationsRequest) -> Result<Vec<KnowledgeRelation>> {
        let mut sql = format!(
            "SELECT {} FROM knowledge_relation WHERE brand_id = $1 ",
            RELATION_COLUMNS
        );
        if req.relation_type.is_some() {
            sql.push_str("AND relation_type = $2 ");
        }
        sql.push_str("ORDER BY created_at ASC, id ASC");

        let mut query = sqlx::query(&sql).bind(req.brand_id);
        if let Some(relation_type) = req.relation_type {
            query = query.bind(relation_type.as_str());
        }

        let rows = query.fetch_all(&self.pool).await.map_err(Error::Database)?;
        rows.into_iter().map(map_row_to_relation).collect()
    }

    async fn for_node(&self, node_id: Uuid) -> Result<Vec<KnowledgeRelation>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM knowledge_relation \
             WHERE from_node_id = $1 OR to_node_id = $1 \
             ORDER BY created_at ASC, id ASC",
            RELATION_COLUMNS
        ))
        .bind(node_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter().map(map_row_to_relation).collect()
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM knowledge_relation WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::RelationNotFound(id));
        }
        Ok(())
    }
}
