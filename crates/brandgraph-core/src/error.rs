//! Error types for brandgraph.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using brandgraph's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for brandgraph operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Input rejected before any write was applied
    #[error("Validation error: {0}")]
    Validation(String),

    /// Knowledge node not found
    #[error("Node not found: {0}")]
    NodeNotFound(Uuid),

    /// Knowledge relation not found
    #[error("Relation not found: {0}")]
    RelationNotFound(Uuid),

    /// Source document not found
    #[error("Document not found: {0}")]
    DocumentNotFound(Uuid),

    /// Ingestion batch rolled back because its source document was deleted
    #[error("Batch cancelled: document {0} was deleted while the batch was in flight")]
    BatchCancelled(Uuid),

    /// Embedding gateway failed (transient upstream error)
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Inference collaborator failed (transient upstream error)
    #[error("Inference error: {0}")]
    Inference(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for failures the caller may retry with the same input.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Database(_) | Error::Embedding(_) | Error::Inference(_) | Error::Request(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_display_validation() {
        let err = Error::Validation("confidence out of range".to_string());
        assert_eq!(err.to_string(), "Validation error: confidence out of range");
    }

    #[test]
    fn test_error_display_node_not_found() {
        let id = Uuid::nil();
        let err = Error::NodeNotFound(id);
        assert_eq!(err.to_string(), format!("Node not found: {}", id));
    }

    #[test]
    fn test_error_display_relation_not_found() {
        let id = Uuid::new_v4();
        let err = Error::RelationNotFound(id);
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_error_display_batch_cancelled() {
        let id = Uuid::new_v4();
        let err = Error::BatchCancelled(id);
        assert!(err.to_string().contains("Batch cancelled"));
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_error_display_embedding() {
        let err = Error::Embedding("gateway timeout".to_string());
        assert_eq!(err.to_string(), "Embedding error: gateway timeout");
    }

    #[test]
    fn test_error_display_inference() {
        let err = Error::Inference("model unavailable".to_string());
        assert_eq!(err.to_string(), "Inference error: model unavailable");
    }

    #[test]
    fn test_transient_errors() {
        assert!(Error::Embedding("x".into()).is_transient());
        assert!(Error::Inference("x".into()).is_transient());
        assert!(Error::Request("x".into()).is_transient());
        assert!(!Error::Validation("x".into()).is_transient());
        assert!(!Error::NodeNotFound(Uuid::nil()).is_transient());
        assert!(!Error::BatchCancelled(Uuid::nil()).is_transient());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn test_result_type() {
        fn get_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(get_result().unwrap(), 42);
    }
}
