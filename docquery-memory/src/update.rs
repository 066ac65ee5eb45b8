//! Application of update operators to in-memory documents.

use bson::{Bson, Document};

use docquery_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    update::{Update, UpdateOp},
};

use crate::evaluator::{as_f64, lookup};

/// Returns `document` with every operation of `update` applied.
///
/// The input is never modified; callers commit the returned document only on success.
pub(crate) fn apply_update(document: &Document, update: &Update) -> DocumentStoreResult<Document> {
    let mut updated = document.clone();

    for op in update.ops() {
        match op {
            UpdateOp::Set(path, value) => set_path(&mut updated, path, value.clone())?,
            UpdateOp::Unset(path) => remove_path(&mut updated, path),
            UpdateOp::Inc(path, amount) => {
                let next = match lookup(&updated, path) {
                    None => amount.clone(),
                    Some(current) => add_numbers(current, amount).ok_or_else(|| {
                        DocumentStoreError::InvalidUpdate(format!(
                            "cannot apply $inc to non-numeric field {path}"
                        ))
                    })?,
                };
                set_path(&mut updated, path, next)?;
            }
        }
    }

    Ok(updated)
}

fn set_path(document: &mut Document, path: &str, value: Bson) -> DocumentStoreResult<()> {
    let Some((head, rest)) = path.split_once('.') else {
        document.insert(path, value);
        return Ok(());
    };

    if !document.contains_key(head) {
        document.insert(head, Document::new());
    }

    match document.get_mut(head) {
        Some(Bson::Document(child)) => set_path(child, rest, value),
        _ => Err(DocumentStoreError::InvalidUpdate(format!(
            "cannot create field {rest} inside non-document field {head}"
        ))),
    }
}

/// Removes a field or dotted path; missing segments are ignored.
pub(crate) fn remove_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(child)) = document.get_mut(head) {
                remove_path(child, rest);
            }
        }
    }
}

fn add_numbers(current: &Bson, amount: &Bson) -> Option<Bson> {
    match (current, amount) {
        (Bson::Int32(a), Bson::Int32(b)) => Some(match a.checked_add(*b) {
            Some(sum) => Bson::Int32(sum),
            None => Bson::Int64(i64::from(*a) + i64::from(*b)),
        }),
        (Bson::Int32(_) | Bson::Int64(_), Bson::Int32(_) | Bson::Int64(_)) => {
            let (a, b) = (as_i64(current)?, as_i64(amount)?);
            Some(match a.checked_add(b) {
                Some(sum) => Bson::Int64(sum),
                None => Bson::Double(a as f64 + b as f64),
            })
        }
        _ => Some(Bson::Double(as_f64(current)? + as_f64(amount)?)),
    }
}

fn as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(n) => Some(i64::from(*n)),
        Bson::Int64(n) => Some(*n),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn book() -> Document {
        doc! { "_id": 1, "title": "The Great Gatsby", "price": 10.99, "copies": 3 }
    }

    #[test]
    fn set_replaces_and_adds_fields() {
        let updated = apply_update(
            &book(),
            &Update::parse(&doc! { "$set": { "price": 13.99, "genre": "Classic" } }).unwrap(),
        )
        .unwrap();

        assert_eq!(
            updated,
            doc! { "_id": 1, "title": "The Great Gatsby", "price": 13.99, "copies": 3, "genre": "Classic" }
        );
    }

    #[test]
    fn dotted_paths_create_intermediate_documents() {
        let updated = apply_update(&book(), &Update::new().set("details.pages", 180)).unwrap();
        assert_eq!(updated.get_document("details").unwrap(), &doc! { "pages": 180 });

        let removed = apply_update(&updated, &Update::new().unset("details.pages")).unwrap();
        assert_eq!(removed.get_document("details").unwrap(), &doc! {});

        let err = apply_update(&book(), &Update::new().set("title.short", "Gatsby")).unwrap_err();
        assert!(matches!(err, DocumentStoreError::InvalidUpdate(_)));
    }

    #[test]
    fn inc_keeps_integer_kinds() {
        let updated = apply_update(&book(), &Update::new().inc("copies", 2)).unwrap();
        assert_eq!(updated.get("copies"), Some(&Bson::Int32(5)));

        let widened = apply_update(&doc! { "n": i32::MAX }, &Update::new().inc("n", 1)).unwrap();
        assert_eq!(widened.get("n"), Some(&Bson::Int64(i64::from(i32::MAX) + 1)));

        let mixed = apply_update(&book(), &Update::new().inc("copies", 0.5)).unwrap();
        assert_eq!(mixed.get("copies"), Some(&Bson::Double(3.5)));

        let created = apply_update(&book(), &Update::new().inc("sold", 4)).unwrap();
        assert_eq!(created.get("sold"), Some(&Bson::Int32(4)));
    }

    #[test]
    fn failed_update_leaves_input_untouched() {
        let original = book();
        let update = Update::new().set("price", 5.0).inc("title", 1);

        assert!(apply_update(&original, &update).is_err());
        assert_eq!(original, book());
    }
}
