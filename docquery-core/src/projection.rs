//! Field projections for `find` queries and `$project` pipeline stages.

use bson::{Bson, Document};

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    expression::Expression,
    query::is_truthy,
};

/// How a single output field is produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectField {
    /// Keep the field from the input document (`1` or `true`).
    Include,
    /// Drop the field (`0` or `false`).
    Exclude,
    /// Compute the field from an expression.
    Computed(Expression),
}

/// An ordered set of projected fields.
///
/// A projection is in *inclusion mode* when any field is included or computed:
/// unlisted fields are dropped and `_id` is kept unless explicitly excluded.
/// Otherwise it is in *exclusion mode* and only the excluded fields are removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    fields: Vec<(String, ProjectField)>,
}

impl Projection {
    /// Creates an empty projection, which leaves documents unchanged.
    pub fn new() -> Self {
        Projection::default()
    }

    /// Includes a field.
    pub fn include(mut self, field: impl Into<String>) -> Self {
        self.fields.push((field.into(), ProjectField::Include));
        self
    }

    /// Excludes a field.
    pub fn exclude(mut self, field: impl Into<String>) -> Self {
        self.fields.push((field.into(), ProjectField::Exclude));
        self
    }

    /// Adds a computed field.
    pub fn computed(mut self, field: impl Into<String>, expression: Expression) -> Self {
        self.fields.push((field.into(), ProjectField::Computed(expression)));
        self
    }

    /// Parses a projection document such as `{ _id: 0, title: 1, author: 1 }`.
    ///
    /// Numbers and booleans include or exclude; any other value is parsed as an
    /// [`Expression`] computing the field.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidQuery`] when inclusions and exclusions of
    /// fields other than `_id` are mixed, or when a computed expression is malformed.
    pub fn parse(spec: &Document) -> DocumentStoreResult<Self> {
        let fields = spec
            .iter()
            .map(|(field, value)| -> DocumentStoreResult<(String, ProjectField)> {
                let kind = match value {
                    Bson::Boolean(_) | Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => {
                        if is_truthy(value) { ProjectField::Include } else { ProjectField::Exclude }
                    }
                    other => ProjectField::Computed(
                        Expression::parse(other)
                            .map_err(|err| DocumentStoreError::InvalidQuery(format!("{field}: {err}")))?,
                    ),
                };
                Ok((field.clone(), kind))
            })
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        let projection = Projection { fields };
        projection.validate()?;

        Ok(projection)
    }

    /// Checks that inclusion and exclusion are not mixed and that every
    /// field path is well formed.
    pub fn validate(&self) -> DocumentStoreResult<()> {
        let excludes_other_than_id = self
            .fields
            .iter()
            .any(|(field, kind)| field != "_id" && *kind == ProjectField::Exclude);

        if excludes_other_than_id && self.is_inclusion() {
            return Err(DocumentStoreError::InvalidQuery(
                "cannot mix inclusion and exclusion in a projection".to_string(),
            ));
        }

        if let Some((field, _)) = self
            .fields
            .iter()
            .find(|(field, _)| field.split('.').any(str::is_empty))
        {
            return Err(DocumentStoreError::InvalidQuery(format!(
                "projected field path '{field}' has an empty segment"
            )));
        }

        Ok(())
    }

    /// Returns `true` when any field is included or computed.
    pub fn is_inclusion(&self) -> bool {
        self.fields
            .iter()
            .any(|(_, kind)| !matches!(kind, ProjectField::Exclude))
    }

    /// Returns `true` when the projection names no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the projection entry for a field, if listed.
    pub fn get(&self, field: &str) -> Option<&ProjectField> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, kind)| kind)
    }

    /// Iterates over the listed fields in specification order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &ProjectField)> {
        self.fields.iter().map(|(name, kind)| (name.as_str(), kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn parses_inclusion_with_id_excluded() {
        let projection = Projection::parse(&doc! { "_id": 0, "title": 1, "author": 1, "price": true }).unwrap();

        assert!(projection.is_inclusion());
        assert_eq!(projection.get("_id"), Some(&ProjectField::Exclude));
        assert_eq!(projection.get("price"), Some(&ProjectField::Include));
        assert_eq!(projection.get("genre"), None);
        assert_eq!(
            projection,
            Projection::new().exclude("_id").include("title").include("author").include("price")
        );
    }

    #[test]
    fn parses_computed_fields() {
        let projection = Projection::parse(&doc! { "label": { "$concat": ["$title", "!"] } }).unwrap();

        assert!(projection.is_inclusion());
        assert!(matches!(projection.get("label"), Some(ProjectField::Computed(Expression::Concat(_)))));
    }

    #[test]
    fn exclusion_only_projection() {
        let projection = Projection::parse(&doc! { "price": 0, "in_stock": false }).unwrap();

        assert!(!projection.is_inclusion());
    }

    #[test]
    fn rejects_mixed_modes() {
        assert!(Projection::parse(&doc! { "title": 1, "price": 0 }).is_err());
        assert!(Projection::parse(&doc! { "title": { "$nope": 1 } }).is_err());
    }

    #[test]
    fn validates_dotted_paths() {
        assert!(Projection::parse(&doc! { "details.pages": 1, "title": 1 }).is_ok());
        assert!(matches!(
            Projection::parse(&doc! { "details..pages": 1 }),
            Err(DocumentStoreError::InvalidQuery(_))
        ));
        assert!(Projection::parse(&doc! { "details.": 0 }).is_err());
        assert!(Projection::new().include("").validate().is_err());
    }
}
