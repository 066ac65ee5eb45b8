//! Convenient re-exports of commonly used types from docquery.
//!
//! Import this prelude module to quickly access the most frequently used types
//! and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use docquery::prelude::*;
//! ```
//!
//! This provides access to:
//! - Document traits
//! - Store backends and builders
//! - Filters, queries, projections and updates
//! - Aggregation pipelines and indexes
//! - Collection interfaces, pagination and error types

pub use docquery_core::{
    collection::{Collection, TypedCollection},
    store::DocumentStore,
    document::{Document, DocumentExt},
    backend::{StoreBackend, StoreBackendBuilder},
    query::{Query, QueryVisitor, Expr, Sort, SortDirection, FieldOp, QueryBuilder, Filter},
    projection::{Projection, ProjectField},
    expression::Expression,
    update::{Update, UpdateOp},
    pipeline::{Pipeline, Stage, GroupStage, Accumulator, AccumulatorOp},
    index::{IndexModel, Explain, QueryPlan},
    page::{Page, PaginationParams},
    error::{DocumentStoreError, DocumentStoreResult},
};
