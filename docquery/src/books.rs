//! The `books` document type used by the query catalog.

use bson::Uuid;
use serde::{Deserialize, Serialize};

use docquery_core::document::Document;

/// A book in the `books` collection.
///
/// Every field except the ID is optional; unset fields are left out of the stored
/// document, so filters treat them as absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_stock: Option<bool>,
}

impl Book {
    /// Creates a book with a fresh ID and the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Book {
            id: Uuid::new(),
            title: Some(title.into()),
            author: None,
            genre: None,
            published_year: None,
            price: None,
            in_stock: None,
        }
    }

    pub fn by(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn published(mut self, year: i32) -> Self {
        self.published_year = Some(year);
        self
    }

    pub fn priced(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn in_stock(mut self, in_stock: bool) -> Self {
        self.in_stock = Some(in_stock);
        self
    }
}

impl Document for Book {
    fn id(&self) -> &Uuid {
        &self.id
    }

    fn collection_name() -> &'static str {
        "books"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::Bson;
    use docquery_core::document::DocumentExt;

    #[test]
    fn unset_fields_are_omitted() {
        let book = Book::new("Moby Dick").by("Herman Melville").published(1851);
        let bson = book.to_bson().unwrap();
        let doc = bson.as_document().unwrap();

        assert_eq!(doc.get_str("title").unwrap(), "Moby Dick");
        assert_eq!(doc.get("published_year"), Some(&Bson::Int32(1851)));
        assert!(doc.get("price").is_none());
        assert!(doc.get("in_stock").is_none());
        assert_eq!(Book::from_bson(bson).unwrap(), book);
    }
}
