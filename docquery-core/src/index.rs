//! Index definitions and query explanations.
//!
//! Indexes are recorded per collection but never change query results or their
//! order. [`Explain`] reports which recorded index could serve a filter.

use bson::Document;
use serde::{Deserialize, Serialize};

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    query::SortDirection,
};

/// An index key specification such as `{ author: 1, published_year: 1 }`.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexModel {
    keys: Vec<(String, SortDirection)>,
    name: Option<String>,
}

impl IndexModel {
    /// Creates a single-field index.
    pub fn on(field: impl Into<String>, direction: SortDirection) -> Self {
        IndexModel { keys: vec![(field.into(), direction)], name: None }
    }

    /// Appends a key, turning this into a compound index.
    pub fn then(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.keys.push((field.into(), direction));
        self
    }

    /// Overrides the generated name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Parses a key specification document.
    pub fn parse(spec: &Document) -> DocumentStoreResult<Self> {
        if spec.is_empty() {
            return Err(DocumentStoreError::InvalidQuery(
                "index specification must name at least one field".to_string(),
            ));
        }

        let keys = spec
            .iter()
            .map(|(field, direction)| -> DocumentStoreResult<(String, SortDirection)> {
                Ok((field.clone(), SortDirection::parse(direction)?))
            })
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        Ok(IndexModel { keys, name: None })
    }

    pub fn keys(&self) -> &[(String, SortDirection)] {
        &self.keys
    }

    /// The explicit name, or `field_direction` pairs joined by `_` (`author_1_published_year_1`).
    pub fn name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self
                .keys
                .iter()
                .map(|(field, direction)| format!("{field}_{}", direction.as_i32()))
                .collect::<Vec<_>>()
                .join("_"),
        }
    }

    /// The first key field, which decides whether the index can serve a filter.
    pub fn leading_field(&self) -> Option<&str> {
        self.keys.first().map(|(field, _)| field.as_str())
    }
}

/// How a query would be executed.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPlan {
    /// Every document is examined.
    CollectionScan,
    /// A recorded index covers a constrained field.
    IndexScan,
}

/// Execution report for a `find` query.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Explain {
    /// The plan the query would use.
    pub plan: QueryPlan,
    /// Name of the index backing an [`QueryPlan::IndexScan`].
    pub index_name: Option<String>,
    /// Number of documents the evaluator examined.
    pub documents_examined: usize,
    /// Number of documents the query returned.
    pub documents_returned: usize,
}
