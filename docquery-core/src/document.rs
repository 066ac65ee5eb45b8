//! Core traits for document representation and serialization.
//!
//! Stores keep every document as a BSON value. Typed documents implement
//! [`Document`] and get conversions to and from BSON through [`DocumentExt`].

use bson::{Bson, Uuid, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Deserialize, Serialize};

use crate::error::DocumentStoreResult;

/// Core trait that all typed documents stored in a document store must implement.
///
/// Every document has a unique identifier (UUID) and names the collection it belongs to.
/// Fields that are `None` should be skipped during serialization so that filters see
/// them as absent rather than null.
///
/// # Example
///
/// ```ignore
/// use docquery::document::Document;
/// use bson::Uuid;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct Book {
///     #[serde(rename = "_id")]
///     pub id: Uuid,
///     pub title: String,
/// }
///
/// impl Document for Book {
///     fn id(&self) -> &Uuid {
///         &self.id
///     }
///
///     fn collection_name() -> &'static str {
///         "books"
///     }
/// }
/// ```
pub trait Document: Serialize + for<'de> Deserialize<'de> + Send + Sync + Clone + 'static {
    /// Returns a reference to this document's unique identifier.
    fn id(&self) -> &Uuid;

    /// Returns the name of the collection this document belongs to.
    fn collection_name() -> &'static str;
}

/// Extension trait providing serialization/deserialization utilities for documents.
///
/// Implemented for every [`Document`].
pub trait DocumentExt: Document {
    /// Converts this document to a BSON value for storage.
    fn to_bson(&self) -> DocumentStoreResult<Bson>;

    /// Creates a document from a BSON value.
    fn from_bson(bson: Bson) -> DocumentStoreResult<Self>;
}

impl<D: Document> DocumentExt for D {
    fn to_bson(&self) -> DocumentStoreResult<Bson> {
        Ok(serialize_to_bson(self)?)
    }

    fn from_bson(bson: Bson) -> DocumentStoreResult<Self> {
        Ok(deserialize_from_bson(bson)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DocumentStoreError;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        #[serde(rename = "_id")]
        id: Uuid,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        body: Option<String>,
    }

    impl Document for Note {
        fn id(&self) -> &Uuid {
            &self.id
        }

        fn collection_name() -> &'static str {
            "notes"
        }
    }

    #[test]
    fn absent_fields_are_not_serialized() {
        let note = Note { id: Uuid::new(), body: None };
        let bson = note.to_bson().unwrap();
        let doc = bson.as_document().unwrap();

        assert!(doc.contains_key("_id"));
        assert!(!doc.contains_key("body"));
        assert_eq!(Note::from_bson(bson).unwrap(), note);
    }

    #[test]
    fn malformed_bson_is_a_serialization_error() {
        let err = Note::from_bson(Bson::String("not a note".to_string())).unwrap_err();

        assert!(matches!(err, DocumentStoreError::Serialization(_)));
    }
}
