//! # brandgraph-db
//!
//! Storage layer for brandgraph.
//!
//! This crate provides:
//! - Connection pool management
//! - PostgreSQL + pgvector repository implementations for nodes, relations,
//!   and per-node embeddings
//! - An in-memory store with the same contract, for embedded use and tests
//!
//! ## Example
//!
//! ```rust,ignore
//! use brandgraph_db::Database;
//! use brandgraph_core::{CreateNodeRequest, NodeType, SourceRef};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/brandgraph").await?;
//!
//!     let node = db.nodes.create(CreateNodeRequest {
//!         brand_id: 5,
//!         node_type: NodeType::UnmetNeed,
//!         text: "Low health literacy leads to medication misuse".to_string(),
//!         summary: None,
//!         segment: None,
//!         journey_stage: None,
//!         source: SourceRef { document_id: uuid::Uuid::new_v4(), quote: None },
//!         confidence: 0.87,
//!     }).await?;
//!
//!     println!("Created node: {}", node.id);
//!     Ok(())
//! }
//! ```

pub mod embeddings;
pub mod memory;
pub mod nodes;
pub mod pool;
pub mod relations;

use std::sync::Arc;

use sha2::{Digest, Sha256};
use sqlx::PgPool;

// Re-export core types
pub use brandgraph_core::*;

// Re-export repository implementations
pub use embeddings::PgNodeEmbeddingRepository;
pub use memory::{
    InMemoryEmbeddingRepository, InMemoryNodeRepository, InMemoryRelationRepository, InMemoryStore,
};
pub use nodes::PgNodeRepository;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use relations::PgRelationRepository;

/// Compute the SHA256 content hash used for exact-duplicate lookups.
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

/// Aggregated handle over the PostgreSQL repositories.
#[derive(Clone)]
pub struct Database {
    pub pool: PgPool,
    pub nodes: Arc<PgNodeRepository>,
    pub relations: Arc<PgRelationRepository>,
    pub embeddings: Arc<PgNodeEmbeddingRepository>,
}

impl Database {
    /// Connect with default pool configuration.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = create_pool(database_url).await?;
        Ok(Self::from_pool(pool))
    }

    /// Build repositories over an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            nodes: Arc::new(PgNodeRepository::new(pool.clone())),
            relations: Arc::new(PgRelationRepository::new(pool.clone())),
            embeddings: Arc::new(PgNodeEmbeddingRepository::new(pool.clone())),
            pool,
        }
    }

    /// Apply embedded migrations (schema bootstrap).
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Internal(format!("migration failed: {}", e)))?;
        Ok(())
    }
}
