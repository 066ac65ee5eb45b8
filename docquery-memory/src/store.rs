//! In-memory storage implementation for document stores.
//!
//! Documents are kept per collection in insertion order behind an async-aware
//! read-write lock. Every operation holds the lock for its whole duration, so
//! readers never observe a half-applied update.

use std::{collections::HashMap, sync::Arc};
use async_trait::async_trait;
use mea::rwlock::RwLock;
use bson::{Uuid, Bson, Document};
use tracing::{debug, warn};

use docquery_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{DocumentStoreError, DocumentStoreResult},
    index::{Explain, IndexModel, QueryPlan},
    pipeline::Pipeline,
    query::{Expr, Query, QueryVisitor},
    update::Update,
};

use crate::{
    evaluator::{DocumentEvaluator, IndexableFields},
    expression::project,
    runner::{PipelineRunner, sort_documents},
    update::apply_update,
};

/// Documents and recorded indexes of one collection.
#[derive(Debug, Default, Clone)]
struct CollectionState {
    /// Documents in store order
    documents: Vec<(Uuid, Document)>,
    indexes: Vec<IndexModel>,
}

impl CollectionState {
    fn matching<'a>(&'a self, filter: Option<&'a Expr>) -> impl Iterator<Item = &'a Document> + 'a {
        self.documents
            .iter()
            .map(|(_, document)| document)
            .filter(move |document| match filter {
                Some(filter) => DocumentEvaluator::new(document).matches(filter),
                None => true,
            })
    }

    /// Filter, sort, skip, limit, then projection.
    fn find(&self, query: &Query) -> DocumentStoreResult<Vec<Document>> {
        if let Some(projection) = &query.projection {
            projection.validate()?;
        }

        let mut matched = DocumentEvaluator::filter_documents(
            self.documents.iter().map(|(_, document)| document),
            query.filter.as_ref(),
        );

        if !query.sort.is_empty() {
            sort_documents(&mut matched, &query.sort);
        }

        let window = matched
            .into_iter()
            .skip(query.skip.unwrap_or(0))
            .take(match query.limit {
                Some(0) | None => usize::MAX,
                Some(limit) => limit,
            });

        match &query.projection {
            Some(projection) => window
                .map(|document| project(&document, projection))
                .collect(),
            None => Ok(window.collect()),
        }
    }
}

type StoreMap = HashMap<String, CollectionState>;


/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data.
///
/// Queries scan every document of a collection. Indexes are recorded and reported
/// by [`explain`](StoreBackend::explain) but never change results.
///
/// # Example
///
/// ```ignore
/// use docquery_memory::InMemoryStore;
/// use docquery::backend::StoreBackend;
/// use bson::{Uuid, Bson, doc};
///
/// let store = InMemoryStore::new();
///
/// let id = Uuid::new();
/// let doc = Bson::Document(doc! { "title": "1984", "author": "George Orwell" });
/// store.insert_documents(vec![(id, doc)], "books").await?;
///
/// let docs = store.get_documents(vec![id], "books").await?;
/// assert_eq!(docs.len(), 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> documents and indexes
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for an `InMemoryStore` seeded with collections and documents.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }
}


#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_documents(&self, documents: Vec<(Uuid, Bson)>, collection: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let state = store
            .entry(collection.to_string())
            .or_default();

        let mut batch: Vec<(Uuid, Document)> = Vec::with_capacity(documents.len());

        for (id, doc) in documents {
            let key = id.to_string();

            let Bson::Document(doc) = doc else {
                return Err(DocumentStoreError::InvalidDocument(key));
            };
            if state.documents.iter().chain(batch.iter()).any(|(existing, _)| *existing == id) {
                return Err(DocumentStoreError::DocumentAlreadyExists(key, collection.to_string()));
            }

            batch.push((id, doc));
        }

        debug!(collection, inserted = batch.len(), "inserted documents");
        state.documents.extend(batch);

        Ok(())
    }

    async fn get_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        let store = self.store.read().await;
        let state = match store.get(collection) {
            Some(col) => col,
            None => return Ok(vec![]),
        };

        let mut documents = Vec::with_capacity(ids.len());

        for id in ids {
            if let Some((_, doc)) = state.documents.iter().find(|(existing, _)| *existing == id) {
                documents.push(Bson::Document(doc.clone()));
            }
        }

        Ok(documents)
    }

    async fn find_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        let store = self.store.read().await;
        let state = match store.get(collection) {
            Some(col) => col,
            None => return Ok(vec![]),
        };

        let found = state.find(&query)?;
        debug!(collection, returned = found.len(), "find");

        Ok(found.into_iter().map(Bson::Document).collect())
    }

    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<usize> {
        let store = self.store.read().await;

        Ok(store
            .get(collection)
            .map(|state| state.matching(filter.as_ref()).count())
            .unwrap_or(0))
    }

    async fn update_one(&self, filter: Expr, update: Update, collection: &str) -> DocumentStoreResult<u64> {
        update.validate()?;

        let mut store = self.store.write().await;
        let Some(state) = store.get_mut(collection) else {
            return Ok(0);
        };
        let Some((id, document)) = state
            .documents
            .iter_mut()
            .find(|(_, document)| DocumentEvaluator::new(document).matches(&filter))
        else {
            debug!(collection, "update matched no document");
            return Ok(0);
        };

        *document = apply_update(document, &update)?;
        debug!(collection, %id, "updated document");

        Ok(1)
    }

    async fn delete_one(&self, filter: Expr, collection: &str) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(state) = store.get_mut(collection) else {
            return Ok(0);
        };

        match state
            .documents
            .iter()
            .position(|(_, document)| DocumentEvaluator::new(document).matches(&filter))
        {
            Some(position) => {
                let (id, _) = state.documents.remove(position);
                debug!(collection, %id, "deleted document");
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn aggregate(&self, pipeline: Pipeline, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        let documents = {
            let store = self.store.read().await;
            store
                .get(collection)
                .map(|state| {
                    state
                        .documents
                        .iter()
                        .map(|(_, document)| document.clone())
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        };

        match PipelineRunner::new(&pipeline).run(documents) {
            Ok(output) => {
                debug!(collection, stages = pipeline.len(), returned = output.len(), "aggregate");
                Ok(output.into_iter().map(Bson::Document).collect())
            }
            Err(err) => {
                warn!(collection, error = %err, "aggregation failed");
                Err(err)
            }
        }
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.store
            .write()
            .await
            .entry(name.to_string())
            .or_default();

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;

        if store.remove(name).is_none() {
            return Err(DocumentStoreError::CollectionNotFound(name.to_string()));
        }

        Ok(())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        let mut names = self.store
            .read()
            .await
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        names.sort();

        Ok(names)
    }

    async fn create_index(&self, collection: &str, index: IndexModel) -> DocumentStoreResult<String> {
        let mut store = self.store.write().await;
        let state = store
            .entry(collection.to_string())
            .or_default();

        if let Some(existing) = state.indexes.iter().find(|existing| existing.keys() == index.keys()) {
            return Ok(existing.name());
        }

        let name = index.name();
        if state.indexes.iter().any(|existing| existing.name() == name) {
            return Err(DocumentStoreError::InvalidQuery(format!(
                "index {name} already exists with different keys"
            )));
        }

        debug!(collection, index = %name, "created index");
        state.indexes.push(index);

        Ok(name)
    }

    async fn list_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<IndexModel>> {
        Ok(self.store
            .read()
            .await
            .get(collection)
            .map(|state| state.indexes.clone())
            .unwrap_or_default())
    }

    async fn drop_index(&self, collection: &str, name: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let state = match store.get_mut(collection) {
            Some(col) => col,
            None => return Err(DocumentStoreError::CollectionNotFound(collection.to_string())),
        };

        let before = state.indexes.len();
        state.indexes.retain(|index| index.name() != name);

        if state.indexes.len() == before {
            return Err(DocumentStoreError::IndexNotFound(name.to_string(), collection.to_string()));
        }

        Ok(())
    }

    async fn explain(&self, query: Query, collection: &str) -> DocumentStoreResult<Explain> {
        let store = self.store.read().await;
        let Some(state) = store.get(collection) else {
            return Ok(Explain {
                plan: QueryPlan::CollectionScan,
                index_name: None,
                documents_examined: 0,
                documents_returned: 0,
            });
        };

        let constrained = match &query.filter {
            Some(filter) => IndexableFields.visit_expr(filter)?,
            None => Vec::new(),
        };
        let index_name = state
            .indexes
            .iter()
            .find(|index| {
                index
                    .leading_field()
                    .is_some_and(|field| constrained.iter().any(|c| c == field))
            })
            .map(IndexModel::name);

        Ok(Explain {
            plan: if index_name.is_some() { QueryPlan::IndexScan } else { QueryPlan::CollectionScan },
            index_name,
            documents_examined: state.documents.len(),
            documents_returned: state.find(&query)?.len(),
        })
    }
}


/// Builder for constructing [`InMemoryStore`] instances.
///
/// Collections and seed documents are applied in the order they were added.
/// Seeding fails if any document ID repeats within a collection.
///
/// # Example
///
/// ```ignore
/// use docquery_memory::InMemoryStore;
/// use docquery::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder()
///     .with_collection("authors")
///     .with_documents("books", seed)
///     .build()
///     .await?;
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder {
    collections: Vec<(String, Vec<(Uuid, Bson)>)>,
}

impl InMemoryStoreBuilder {
    /// Creates an empty collection.
    pub fn with_collection(mut self, name: impl Into<String>) -> Self {
        self.collections.push((name.into(), Vec::new()));
        self
    }

    /// Seeds a collection with documents.
    pub fn with_documents(mut self, name: impl Into<String>, documents: Vec<(Uuid, Bson)>) -> Self {
        self.collections.push((name.into(), documents));
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let store = InMemoryStore::new();

        for (name, documents) in self.collections {
            store.create_collection(&name).await?;

            if !documents.is_empty() {
                store
                    .insert_documents(documents, &name)
                    .await
                    .map_err(|err| DocumentStoreError::Initialization(err.to_string()))?;
            }
        }

        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docquery_core::{
        index::IndexModel,
        projection::Projection,
        query::{Filter, SortDirection},
    };

    fn seed() -> Vec<(Uuid, Bson)> {
        [
            doc! { "title": "1984", "author": "George Orwell", "genre": "Dystopian", "published_year": 1949, "price": 9.99 },
            doc! { "title": "Animal Farm", "author": "George Orwell", "genre": "Satire", "published_year": 1945, "price": 7.5 },
            doc! { "title": "Brave New World", "author": "Aldous Huxley", "genre": "Dystopian", "published_year": 1932, "price": 11.0 },
        ]
        .into_iter()
        .map(|mut doc| {
            let id = Uuid::new();
            doc.insert("_id", id);
            (id, Bson::Document(doc))
        })
        .collect()
    }

    async fn store() -> InMemoryStore {
        InMemoryStore::builder()
            .with_documents("books", seed())
            .build()
            .await
            .unwrap()
    }

    fn titles(documents: &[Bson]) -> Vec<String> {
        documents
            .iter()
            .map(|d| d.as_document().unwrap().get_str("title").unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_ids_atomically() {
        let store = store().await;
        let id = Uuid::new();
        let batch = vec![
            (id, Bson::Document(doc! { "title": "Emma" })),
            (id, Bson::Document(doc! { "title": "Emma again" })),
        ];

        let err = store.insert_documents(batch, "books").await.unwrap_err();
        assert!(matches!(err, DocumentStoreError::DocumentAlreadyExists(_, _)));
        assert_eq!(store.count_documents(None, "books").await.unwrap(), 3);

        let err = store
            .insert_documents(vec![(Uuid::new(), Bson::String("x".into()))], "books")
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentStoreError::InvalidDocument(_)));
    }

    #[tokio::test]
    async fn builder_rejects_duplicate_seed_ids() {
        let id = Uuid::new();
        let result = InMemoryStore::builder()
            .with_documents("books", vec![
                (id, Bson::Document(doc! { "title": "a" })),
                (id, Bson::Document(doc! { "title": "b" })),
            ])
            .build()
            .await;

        assert!(matches!(result, Err(DocumentStoreError::Initialization(_))));
    }

    #[tokio::test]
    async fn find_applies_sort_skip_limit_and_projection() {
        let store = store().await;
        let query = Query::builder()
            .filter(Filter::gt("published_year", 1940))
            .sort("published_year", SortDirection::Asc)
            .projection(Projection::new().exclude("_id").exclude("genre"))
            .build();

        let found = store.find_documents(query, "books").await.unwrap();
        assert_eq!(titles(&found), vec!["Animal Farm", "1984"]);
        assert!(found[0].as_document().unwrap().get("_id").is_none());

        let page = Query::builder()
            .sort("price", SortDirection::Desc)
            .skip(1)
            .limit(1)
            .build();
        assert_eq!(titles(&store.find_documents(page, "books").await.unwrap()), vec!["1984"]);

        let unlimited = Query::builder().limit(0).build();
        assert_eq!(store.find_documents(unlimited, "books").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn missing_collections_read_as_empty() {
        let store = InMemoryStore::new();

        assert!(store.find_documents(Query::new(), "books").await.unwrap().is_empty());
        assert_eq!(store.count_documents(None, "books").await.unwrap(), 0);
        assert_eq!(store.delete_one(Expr::all(), "books").await.unwrap(), 0);
        assert!(matches!(
            store.drop_collection("books").await,
            Err(DocumentStoreError::CollectionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_one_touches_first_match_only() {
        let store = store().await;
        let modified = store
            .update_one(Filter::eq("author", "George Orwell"), Update::new().set("price", 5.0), "books")
            .await
            .unwrap();
        assert_eq!(modified, 1);

        let cheap = store
            .find_documents(Query::builder().filter(Filter::eq("price", 5.0)).build(), "books")
            .await
            .unwrap();
        assert_eq!(titles(&cheap), vec!["1984"]);

        let none = store
            .update_one(Filter::eq("author", "Jane Austen"), Update::new().set("price", 5.0), "books")
            .await
            .unwrap();
        assert_eq!(none, 0);
    }

    #[tokio::test]
    async fn failed_update_is_not_committed() {
        let store = store().await;
        let update = Update::new().set("price", 1.0).inc("title", 1);

        let err = store
            .update_one(Filter::eq("title", "1984"), update, "books")
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentStoreError::InvalidUpdate(_)));
        assert_eq!(store.count_documents(Some(Filter::eq("price", 9.99)), "books").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_one_keeps_store_order() {
        let store = store().await;

        assert_eq!(store.delete_one(Filter::eq("genre", "Dystopian"), "books").await.unwrap(), 1);
        let remaining = store.find_documents(Query::new(), "books").await.unwrap();
        assert_eq!(titles(&remaining), vec!["Animal Farm", "Brave New World"]);
    }

    #[tokio::test]
    async fn aggregate_on_missing_collection_still_validates() {
        let store = InMemoryStore::new();

        assert!(store.aggregate(Pipeline::default(), "books").await.unwrap().is_empty());
        let invalid = Pipeline::default().stage(docquery_core::pipeline::Stage::Limit(0));
        assert!(matches!(
            store.aggregate(invalid, "books").await,
            Err(DocumentStoreError::Pipeline { index: 0, .. })
        ));
    }

    #[tokio::test]
    async fn indexes_are_recorded_and_explained() {
        let store = store().await;

        let name = store
            .create_index("books", IndexModel::on("title", SortDirection::Asc))
            .await
            .unwrap();
        assert_eq!(name, "title_1");
        assert_eq!(
            store.create_index("books", IndexModel::on("title", SortDirection::Asc)).await.unwrap(),
            "title_1"
        );
        assert_eq!(store.list_indexes("books").await.unwrap().len(), 1);

        let by_title = Query::builder().filter(Filter::eq("title", "1984")).build();
        let explain = store.explain(by_title, "books").await.unwrap();
        assert_eq!(explain.plan, QueryPlan::IndexScan);
        assert_eq!(explain.index_name.as_deref(), Some("title_1"));
        assert_eq!(explain.documents_examined, 3);
        assert_eq!(explain.documents_returned, 1);

        let by_genre = Query::builder().filter(Filter::eq("genre", "Dystopian")).build();
        let explain = store.explain(by_genre, "books").await.unwrap();
        assert_eq!(explain.plan, QueryPlan::CollectionScan);
        assert_eq!(explain.documents_returned, 2);

        store.drop_index("books", "title_1").await.unwrap();
        assert!(matches!(
            store.drop_index("books", "title_1").await,
            Err(DocumentStoreError::IndexNotFound(_, _))
        ));
    }

    #[tokio::test]
    async fn collections_are_listed_sorted() {
        let store = store().await;
        store.create_collection("authors").await.unwrap();
        store.create_collection("books").await.unwrap();

        assert_eq!(store.list_collections().await.unwrap(), vec!["authors", "books"]);
        store.drop_collection("authors").await.unwrap();
        assert_eq!(store.list_collections().await.unwrap(), vec!["books"]);
    }
}
