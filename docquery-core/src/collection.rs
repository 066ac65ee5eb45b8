//! Collection handles for document store operations.
//!
//! - [`Collection`] works with raw BSON documents.
//! - [`TypedCollection`] serializes and deserializes a specific [`Document`] type.
//!
//! # Example
//!
//! ```ignore
//! use bson::doc;
//! use docquery::{query::Expr, update::Update};
//!
//! let books = store.typed_collection::<Book>();
//! let modified = books
//!     .update_one(
//!         Expr::parse(&doc! { "title": "The Great Gatsby" })?,
//!         Update::parse(&doc! { "$set": { "price": 13.99 } })?,
//!     )
//!     .await?;
//! ```

use bson::{Bson, Uuid};
use std::marker::PhantomData;

use crate::{
    backend::StoreBackend,
    document::{Document, DocumentExt},
    error::DocumentStoreResult,
    index::{Explain, IndexModel},
    page::{Page, PaginationParams},
    pipeline::Pipeline,
    query::{Expr, Query},
    update::Update,
};

/// An untyped collection with a reference to a storage backend.
///
/// All documents are represented as BSON values. Use this for projected results
/// and aggregation output, which don't have the shape of a stored document type.
#[derive(Debug)]
pub struct Collection<'a, B: StoreBackend> {
    name: String,
    backend: &'a B,
}

impl<'a, B: StoreBackend> Collection<'a, B> {
    pub(crate) fn new(name: String, backend: &'a B) -> Self {
        Self { name, backend }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inserts new documents into the collection.
    ///
    /// # Errors
    ///
    /// Fails if any ID already exists; nothing from the batch is inserted in that case.
    pub async fn insert(&self, documents: Vec<(Uuid, Bson)>) -> DocumentStoreResult<()> {
        self.backend
            .insert_documents(documents, self.name())
            .await
    }

    /// Retrieves documents by their IDs. Missing IDs are omitted.
    pub async fn get<U>(&self, ids: Vec<U>) -> DocumentStoreResult<Vec<Bson>>
    where
        U: Into<Uuid> + Send + Sync + 'static,
    {
        self.backend
            .get_documents(
                ids.into_iter()
                    .map(Into::into)
                    .collect(),
                self.name(),
            )
            .await
    }

    /// Runs a `find` query.
    pub async fn find(&self, query: Query) -> DocumentStoreResult<Vec<Bson>> {
        self.backend
            .find_documents(query, self.name())
            .await
    }

    /// Runs a `find` query for a single page, counting all matches for the page metadata.
    pub async fn find_page(&self, query: Query, params: PaginationParams) -> DocumentStoreResult<Page<Bson>> {
        let count = self
            .backend
            .count_documents(query.filter.clone(), self.name())
            .await?;
        if params.per_page == 0 {
            return Ok(params.page(Vec::new(), count));
        }

        let items = self
            .backend
            .find_documents(params.apply(query), self.name())
            .await?;

        Ok(params.page(items, count))
    }

    /// Counts the documents matching `filter`.
    pub async fn count(&self, filter: Option<Expr>) -> DocumentStoreResult<usize> {
        self.backend
            .count_documents(filter, self.name())
            .await
    }

    /// Applies `update` to the first matching document and returns the modified count (0 or 1).
    pub async fn update_one(&self, filter: Expr, update: Update) -> DocumentStoreResult<u64> {
        self.backend
            .update_one(filter, update, self.name())
            .await
    }

    /// Removes the first matching document and returns the removed count (0 or 1).
    pub async fn delete_one(&self, filter: Expr) -> DocumentStoreResult<u64> {
        self.backend
            .delete_one(filter, self.name())
            .await
    }

    /// Runs an aggregation pipeline over this collection.
    pub async fn aggregate(&self, pipeline: Pipeline) -> DocumentStoreResult<Vec<Bson>> {
        self.backend
            .aggregate(pipeline, self.name())
            .await
    }

    /// Records an index and returns its name.
    pub async fn create_index(&self, index: IndexModel) -> DocumentStoreResult<String> {
        self.backend
            .create_index(self.name(), index)
            .await
    }

    /// Lists the recorded indexes.
    pub async fn list_indexes(&self) -> DocumentStoreResult<Vec<IndexModel>> {
        self.backend.list_indexes(self.name()).await
    }

    /// Removes an index by name.
    pub async fn drop_index(&self, name: &str) -> DocumentStoreResult<()> {
        self.backend.drop_index(self.name(), name).await
    }

    /// Reports how a `find` query is executed.
    pub async fn explain(&self, query: Query) -> DocumentStoreResult<Explain> {
        self.backend
            .explain(query, self.name())
            .await
    }
}

/// A collection bound to a [`Document`] type.
#[derive(Debug)]
pub struct TypedCollection<'a, B: StoreBackend, D: Document> {
    inner: Collection<'a, B>,
    _marker: PhantomData<D>,
}

impl<'a, B: StoreBackend, D: Document> TypedCollection<'a, B, D> {
    pub(crate) fn new(name: String, backend: &'a B) -> Self {
        Self { inner: Collection::new(name, backend), _marker: PhantomData }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Returns the untyped view of this collection.
    pub fn untyped(&self) -> &Collection<'a, B> {
        &self.inner
    }

    /// Inserts new documents into the collection.
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentStoreError`](crate::error::DocumentStoreError) if serialization or insertion fails.
    pub async fn insert(&self, documents: Vec<D>) -> DocumentStoreResult<()> {
        self.inner
            .insert(
                documents
                    .into_iter()
                    .map(|d| {
                        d.to_bson()
                            .map(move |b| (d.id().clone(), b))
                    })
                    .collect::<Result<Vec<(Uuid, Bson)>, _>>()?,
            )
            .await
    }

    /// Retrieves documents by their IDs. Missing IDs are omitted.
    pub async fn get<U>(&self, ids: Vec<U>) -> DocumentStoreResult<Vec<D>>
    where
        U: Into<Uuid> + Send + Sync + 'static,
    {
        self.inner
            .get(ids)
            .await?
            .into_iter()
            .map(D::from_bson)
            .collect()
    }

    /// Runs a `find` query and deserializes the results.
    ///
    /// Projections must keep every non-optional field of `D`; use [`untyped`](Self::untyped)
    /// for projections that reshape documents.
    pub async fn find(&self, query: Query) -> DocumentStoreResult<Vec<D>> {
        self.inner
            .find(query)
            .await?
            .into_iter()
            .map(D::from_bson)
            .collect()
    }

    /// Runs a `find` query for a single page.
    pub async fn find_page(&self, query: Query, params: PaginationParams) -> DocumentStoreResult<Page<D>> {
        self.inner
            .find_page(query, params)
            .await?
            .try_map(D::from_bson)
    }

    /// Counts the documents matching `filter`.
    pub async fn count(&self, filter: Option<Expr>) -> DocumentStoreResult<usize> {
        self.inner.count(filter).await
    }

    /// Applies `update` to the first matching document and returns the modified count (0 or 1).
    pub async fn update_one(&self, filter: Expr, update: Update) -> DocumentStoreResult<u64> {
        self.inner.update_one(filter, update).await
    }

    /// Removes the first matching document and returns the removed count (0 or 1).
    pub async fn delete_one(&self, filter: Expr) -> DocumentStoreResult<u64> {
        self.inner.delete_one(filter).await
    }

    /// Runs an aggregation pipeline. Results are raw BSON since stages reshape documents.
    pub async fn aggregate(&self, pipeline: Pipeline) -> DocumentStoreResult<Vec<Bson>> {
        self.inner.aggregate(pipeline).await
    }

    /// Records an index and returns its name.
    pub async fn create_index(&self, index: IndexModel) -> DocumentStoreResult<String> {
        self.inner.create_index(index).await
    }

    /// Reports how a `find` query is executed.
    pub async fn explain(&self, query: Query) -> DocumentStoreResult<Explain> {
        self.inner.explain(query).await
    }
}
