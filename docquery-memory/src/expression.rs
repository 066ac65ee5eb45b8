//! Expression evaluation and projection of in-memory documents.

use bson::{Bson, Document};

use docquery_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    expression::Expression,
    projection::{ProjectField, Projection},
};

use crate::{evaluator::lookup, update::remove_path};

/// Evaluates aggregation expressions against one document.
///
/// `Ok(None)` means the expression referenced an absent field.
pub(crate) struct ExpressionEvaluator<'a> {
    document: &'a Document,
}

impl<'a> ExpressionEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&self, expression: &Expression) -> DocumentStoreResult<Option<Bson>> {
        match expression {
            Expression::Field(path) => Ok(lookup(self.document, path).cloned()),
            Expression::Literal(value) => Ok(Some(value.clone())),
            Expression::Concat(operands) => {
                let mut output = String::new();

                for operand in operands {
                    match self.evaluate(operand)? {
                        None | Some(Bson::Null) | Some(Bson::Undefined) => return Ok(Some(Bson::Null)),
                        Some(Bson::String(part)) => output.push_str(&part),
                        Some(other) => {
                            return Err(DocumentStoreError::InvalidExpression(format!(
                                "$concat only supports strings, got {:?}",
                                other.element_type()
                            )));
                        }
                    }
                }

                Ok(Some(Bson::String(output)))
            }
            Expression::Substr { input, start, length } => {
                let text = match self.evaluate(input)? {
                    None | Some(Bson::Null) | Some(Bson::Undefined) => String::new(),
                    Some(value) => stringify(&value)?,
                };

                if *start < 0 {
                    return Ok(Some(Bson::String(String::new())));
                }
                let take = usize::try_from(*length).unwrap_or(usize::MAX);

                Ok(Some(Bson::String(
                    text.chars()
                        .skip(*start as usize)
                        .take(take)
                        .collect(),
                )))
            }
            Expression::ToString(input) => match self.evaluate(input)? {
                None => Ok(None),
                Some(Bson::Null) | Some(Bson::Undefined) => Ok(Some(Bson::Null)),
                Some(value) => Ok(Some(Bson::String(stringify(&value)?))),
            },
        }
    }
}

/// String form of a scalar, as used by `$substr` and `$toString`.
///
/// Integral doubles print without a fractional part, so `1925.0` becomes `"1925"`.
fn stringify(value: &Bson) -> DocumentStoreResult<String> {
    match value {
        Bson::String(text) => Ok(text.clone()),
        Bson::Int32(n) => Ok(n.to_string()),
        Bson::Int64(n) => Ok(n.to_string()),
        Bson::Double(n) if n.fract() == 0.0 && n.abs() < 1e15 => Ok(format!("{}", *n as i64)),
        Bson::Double(n) => Ok(n.to_string()),
        Bson::Boolean(b) => Ok(b.to_string()),
        Bson::DateTime(dt) => Ok(dt.to_string()),
        Bson::Binary(_) | Bson::ObjectId(_) => Ok(value.to_string()),
        other => Err(DocumentStoreError::InvalidExpression(format!(
            "cannot convert {:?} to a string",
            other.element_type()
        ))),
    }
}

/// Reshapes a document according to a projection.
///
/// Inclusion mode copies listed fields in input order, keeps `_id` unless
/// excluded and appends computed fields in projection order. Dotted paths
/// select or remove fields of embedded documents. Computed fields that
/// evaluate to an absent value are omitted.
pub(crate) fn project(document: &Document, projection: &Projection) -> DocumentStoreResult<Document> {
    if projection.is_empty() {
        return Ok(document.clone());
    }

    if !projection.is_inclusion() {
        let mut output = document.clone();
        for (field, _) in projection.fields() {
            remove_path(&mut output, field);
        }
        return Ok(output);
    }

    let mut output = Document::new();

    for (field, value) in document {
        match projection.get(field) {
            Some(ProjectField::Include) => {
                output.insert(field.clone(), value.clone());
            }
            Some(_) => {}
            None if field == "_id" => {
                output.insert(field.clone(), value.clone());
            }
            None => {
                let nested = included_below(projection, field);
                if nested.is_empty() {
                    continue;
                }
                if let Bson::Document(embedded) = value {
                    let mut selected = Document::new();
                    for path in nested {
                        include_path(&mut selected, embedded, path);
                    }
                    output.insert(field.clone(), selected);
                }
            }
        }
    }

    let evaluator = ExpressionEvaluator::new(document);
    for (field, kind) in projection.fields() {
        if let ProjectField::Computed(expression) = kind {
            if let Some(value) = evaluator.evaluate(expression)? {
                output.insert(field, value);
            }
        }
    }

    Ok(output)
}

/// Included paths below `field`, relative to it.
fn included_below<'p>(projection: &'p Projection, field: &str) -> Vec<&'p str> {
    projection
        .fields()
        .filter(|(_, kind)| matches!(kind, ProjectField::Include))
        .filter_map(|(path, _)| path.strip_prefix(field)?.strip_prefix('.'))
        .collect()
}

fn include_path(output: &mut Document, source: &Document, path: &str) {
    let Some((head, rest)) = path.split_once('.') else {
        if let Some(value) = source.get(path) {
            output.insert(path, value.clone());
        }
        return;
    };

    let Some(Bson::Document(embedded)) = source.get(head) else {
        return;
    };
    if !matches!(output.get(head), Some(Bson::Document(_))) {
        output.insert(head, Document::new());
    }
    if let Some(Bson::Document(selected)) = output.get_mut(head) {
        include_path(selected, embedded, rest);
    }
}
