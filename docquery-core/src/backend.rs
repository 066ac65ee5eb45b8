//! Storage backend abstraction for the document store.
//!
//! The [`StoreBackend`] trait provides a unified async interface for document
//! insertion, retrieval, filtered queries, single-document updates and deletes,
//! aggregation pipelines and index bookkeeping. Each call runs to completion
//! before its result is returned; a backend never exposes a half-applied
//! mutation to a concurrent read.
//!
//! # Examples
//!
//! ```ignore
//! use docquery::backend::StoreBackend;
//! use docquery::query::{Query, Filter};
//! use bson::{Uuid, Bson, doc};
//!
//! let backend = InMemoryStore::new();
//!
//! let doc = Bson::Document(doc! { "title": "1984", "author": "George Orwell" });
//! backend.insert_documents(vec![(Uuid::new(), doc)], "books").await?;
//!
//! let orwell = backend
//!     .find_documents(Query::builder().filter(Filter::eq("author", "George Orwell")).build(), "books")
//!     .await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::{Bson, Uuid};
use std::fmt::Debug;

use crate::{
    error::DocumentStoreResult,
    index::{Explain, IndexModel},
    pipeline::Pipeline,
    query::{Expr, Query},
    update::Update,
};

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from multiple
/// async tasks.
///
/// # Ordering
///
/// Documents of a collection are kept in *store order* (insertion order). Unsorted
/// reads return documents in store order, and "first match" in
/// [`update_one`](StoreBackend::update_one) and [`delete_one`](StoreBackend::delete_one)
/// means first in store order.
///
/// # Missing Collections
///
/// Reads against a collection that does not exist behave as reads against an empty
/// collection. Writes that create documents or indexes create the collection.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts new documents into a collection, creating it if needed.
    ///
    /// # Errors
    ///
    /// Fails with [`DocumentAlreadyExists`](crate::error::DocumentStoreError::DocumentAlreadyExists)
    /// if any ID is already present in the collection or repeated in the batch; in
    /// that case nothing from the batch is inserted.
    async fn insert_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<()>;

    /// Retrieves documents by their IDs.
    ///
    /// IDs that don't exist are omitted from the results.
    async fn get_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocumentStoreResult<Vec<Bson>>;

    /// Runs a `find` query: filter, sort, skip, limit, then projection.
    async fn find_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Bson>>;

    /// Counts the documents matching `filter` (all documents when `None`).
    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<usize>;

    /// Applies `update` to the first document matching `filter`.
    ///
    /// Returns the number of documents modified (0 or 1). No match is not an error.
    ///
    /// # Errors
    ///
    /// Fails with [`InvalidUpdate`](crate::error::DocumentStoreError::InvalidUpdate) if the
    /// update is malformed or cannot be applied to the matched document, leaving it unchanged.
    async fn update_one(&self, filter: Expr, update: Update, collection: &str) -> DocumentStoreResult<u64>;

    /// Removes the first document matching `filter`.
    ///
    /// Returns the number of documents removed (0 or 1).
    async fn delete_one(&self, filter: Expr, collection: &str) -> DocumentStoreResult<u64>;

    /// Runs an aggregation pipeline over the documents of a collection in store order.
    ///
    /// # Errors
    ///
    /// Fails with [`Pipeline`](crate::error::DocumentStoreError::Pipeline) naming the
    /// offending stage. Partial results are never returned.
    async fn aggregate(&self, pipeline: Pipeline, collection: &str) -> DocumentStoreResult<Vec<Bson>>;

    /// Creates a new empty collection. Creating an existing collection is a no-op.
    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Drops a collection with all its documents and indexes.
    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Lists the names of all collections.
    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;

    /// Records an index on a collection and returns its name.
    ///
    /// Indexes never change the results or ordering of any query. Creating an index
    /// with the same keys as an existing one returns the existing name.
    async fn create_index(&self, collection: &str, index: IndexModel) -> DocumentStoreResult<String>;

    /// Lists the indexes recorded on a collection.
    async fn list_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<IndexModel>>;

    /// Removes an index by name.
    async fn drop_index(&self, collection: &str, name: &str) -> DocumentStoreResult<()>;

    /// Runs a `find` query and reports how it was executed.
    async fn explain(&self, query: Query, collection: &str) -> DocumentStoreResult<Explain>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Factory trait for creating configured backend instances.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
