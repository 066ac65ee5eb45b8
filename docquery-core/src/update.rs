//! Field-level update operators.
//!
//! ```ignore
//! use bson::doc;
//! use docquery::update::Update;
//!
//! let update = Update::parse(&doc! { "$set": { "price": 13.99 } })?;
//! assert_eq!(update, Update::new().set("price", 13.99));
//! ```

use bson::{Bson, Document};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// A single update operation.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    /// Set a field to a value, creating it if absent (`$set`).
    Set(String, Bson),
    /// Remove a field (`$unset`).
    Unset(String),
    /// Add a number to a numeric field, creating it if absent (`$inc`).
    Inc(String, Bson),
}

impl UpdateOp {
    /// The field path this operation writes.
    pub fn field(&self) -> &str {
        match self {
            UpdateOp::Set(field, _) | UpdateOp::Unset(field) | UpdateOp::Inc(field, _) => field,
        }
    }
}

/// An ordered list of update operations applied to one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    ops: Vec<UpdateOp>,
}

impl Update {
    pub fn new() -> Self {
        Update::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.ops.push(UpdateOp::Set(field.into(), value.into()));
        self
    }

    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.ops.push(UpdateOp::Unset(field.into()));
        self
    }

    pub fn inc(mut self, field: impl Into<String>, amount: impl Into<Bson>) -> Self {
        self.ops.push(UpdateOp::Inc(field.into(), amount.into()));
        self
    }

    /// Parses an update document such as `{ $set: { price: 13.99 }, $inc: { copies: 1 } }`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidUpdate`] for unknown operators, replacement
    /// documents, non-numeric `$inc` amounts and updates of `_id`.
    pub fn parse(spec: &Document) -> DocumentStoreResult<Self> {
        let mut update = Update::new();

        for (op, fields) in spec {
            let fields = match fields {
                Bson::Document(fields) => fields,
                _ => {
                    return Err(DocumentStoreError::InvalidUpdate(format!(
                        "{op} requires a document of fields"
                    )));
                }
            };

            for (field, value) in fields {
                let operation = match op.as_str() {
                    "$set" => UpdateOp::Set(field.clone(), value.clone()),
                    "$unset" => UpdateOp::Unset(field.clone()),
                    "$inc" => UpdateOp::Inc(field.clone(), value.clone()),
                    other if other.starts_with('$') => {
                        return Err(DocumentStoreError::InvalidUpdate(format!(
                            "unknown update operator {other}"
                        )));
                    }
                    other => {
                        return Err(DocumentStoreError::InvalidUpdate(format!(
                            "replacement documents are not supported (found field {other})"
                        )));
                    }
                };
                update.ops.push(operation);
            }
        }

        update.validate()?;

        Ok(update)
    }

    /// Checks the operations without applying them.
    pub fn validate(&self) -> DocumentStoreResult<()> {
        if self.ops.is_empty() {
            return Err(DocumentStoreError::InvalidUpdate(
                "update must contain at least one operation".to_string(),
            ));
        }

        for (position, op) in self.ops.iter().enumerate() {
            let field = op.field();

            if field.is_empty() || field.split('.').any(str::is_empty) {
                return Err(DocumentStoreError::InvalidUpdate(format!(
                    "invalid field path {field:?}"
                )));
            }
            if field == "_id" || field.starts_with("_id.") {
                return Err(DocumentStoreError::InvalidUpdate(
                    "the _id field is immutable".to_string(),
                ));
            }
            if self.ops[..position].iter().any(|other| other.field() == field) {
                return Err(DocumentStoreError::InvalidUpdate(format!(
                    "conflicting operations on {field}"
                )));
            }
            if let UpdateOp::Inc(_, amount) = op {
                if !matches!(amount, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) {
                    return Err(DocumentStoreError::InvalidUpdate(format!(
                        "$inc on {field} needs a numeric amount, got {amount}"
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn ops(&self) -> &[UpdateOp] {
        &self.ops
    }
}
