//! Main docquery crate providing a unified interface for querying document collections.
//!
//! This crate is the primary entry point for users of docquery. It re-exports the
//! core types from `docquery-core`, the in-memory backend, the [`Book`](books::Book)
//! document type and the [`catalog`] of reference queries over the `books` collection.
//!
//! # Features
//!
//! - **Type-safe document storage** - Define your data structures with Serde and store them safely
//! - **Query-language parsing** - Filters, projections, updates and pipelines parsed from BSON
//! - **Aggregation** - Grouping with `$sum`, `$avg`, `$min`, `$max`, `$first` and `$last`
//! - **Index bookkeeping** - Recorded indexes and `explain` reports
//!
//! # Quick Start
//!
//! ```ignore
//! use docquery::{prelude::*, books::Book, catalog, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!     let books = store.typed_collection::<Book>();
//!
//!     books
//!         .insert(vec![
//!             Book::new("The Great Gatsby").by("F. Scott Fitzgerald").genre("Fiction").priced(10.99),
//!             Book::new("1984").by("George Orwell").genre("Dystopian").priced(9.99),
//!         ])
//!         .await?;
//!
//!     let fiction = books.find(catalog::fiction_books()?).await?;
//!
//!     let (filter, update) = catalog::gatsby_price_update()?;
//!     assert_eq!(books.update_one(filter, update).await?, 1);
//!
//!     let by_genre = books.aggregate(catalog::average_price_by_genre()?).await?;
//!
//!     store.shutdown().await
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage scanning documents in insertion order

pub mod books;
pub mod catalog;
pub mod prelude;

pub use docquery_core::{
    backend, collection, document, error, expression, index, page, pipeline, projection, query,
    store, update,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docquery_memory::{InMemoryStore, InMemoryStoreBuilder};
}
