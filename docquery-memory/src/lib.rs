//! In-memory document storage backend for docquery.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and evaluates every query
//! by scanning the documents of a collection in insertion order.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Filters and projections** - Comparison, membership, existence and logical operators
//! - **Aggregation pipelines** - `$match`, `$group`, `$sort`, `$skip`, `$limit` and `$project`
//! - **Atomic updates** - `$set`, `$unset` and `$inc` on the first matching document
//! - **Index bookkeeping** - Recorded indexes reported through `explain`
//!
//! # Quick Start
//!
//! ```ignore
//! use docquery::{DocumentStore, memory::InMemoryStore, backend::StoreBackendBuilder};
//!
//! let backend = InMemoryStore::builder()
//!     .with_documents("books", seed)
//!     .build()
//!     .await?;
//! let store = DocumentStore::new(backend);
//! let books = store.typed_collection::<Book>();
//! ```

#[allow(unused_extern_crates)]
extern crate self as docquery_memory;

pub mod store;

mod evaluator;
mod expression;
mod runner;
mod update;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
