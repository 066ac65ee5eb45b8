//! Error types and result types for document store operations.
//!
//! Every fallible operation in the workspace returns [`DocumentStoreResult<T>`].
//! Malformed filters, updates, expressions and pipeline stages are rejected
//! before any document is touched, so an error never comes with partial results.

use bson::error::Error as BsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a document store.
///
/// A query that matches nothing is not an error: reads return empty results and
/// `update_one` / `delete_one` return a zero count.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization, such as invalid seed documents.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A document with the given ID already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// A stored value is not a BSON document.
    #[error("Invalid document {0}: expected a BSON document")]
    InvalidDocument(String),
    /// The requested collection does not exist in the store.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    /// The requested index does not exist on the collection.
    /// The first argument is the index name, the second is the collection name.
    #[error("Index {0} not found on collection {1}")]
    IndexNotFound(String, String),
    /// A filter, sort or projection specification is malformed.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    /// An update specification is malformed or cannot be applied to the matched document.
    #[error("Invalid update: {0}")]
    InvalidUpdate(String),
    /// An aggregation expression is malformed or failed to evaluate.
    #[error("Invalid expression: {0}")]
    InvalidExpression(String),
    /// An aggregation pipeline stage is malformed or failed while running.
    #[error("Pipeline stage {index} failed: {reason}")]
    Pipeline {
        /// Zero-based position of the offending stage.
        index: usize,
        /// Description of what went wrong.
        reason: String,
    },
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl DocumentStoreError {
    /// Wraps this error as the failure of the pipeline stage at `index`.
    ///
    /// Errors that already carry a stage index are returned unchanged.
    pub fn at_stage(self, index: usize) -> Self {
        match self {
            DocumentStoreError::Pipeline { .. } => self,
            DocumentStoreError::InvalidQuery(reason)
            | DocumentStoreError::InvalidExpression(reason) => {
                DocumentStoreError::Pipeline { index, reason }
            }
            other => DocumentStoreError::Pipeline { index, reason: other.to_string() },
        }
    }
}

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_stage_keeps_reason_and_index() {
        let err = DocumentStoreError::InvalidExpression("$concat only supports strings".to_string())
            .at_stage(2);

        match &err {
            DocumentStoreError::Pipeline { index, reason } => {
                assert_eq!(*index, 2);
                assert_eq!(reason, "$concat only supports strings");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.to_string(), "Pipeline stage 2 failed: $concat only supports strings");
    }

    #[test]
    fn at_stage_does_not_rewrap() {
        let err = DocumentStoreError::Pipeline { index: 0, reason: "bad".to_string() }.at_stage(3);

        assert!(matches!(err, DocumentStoreError::Pipeline { index: 0, .. }));
    }
}
