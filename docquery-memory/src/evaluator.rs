//! Filter evaluation for in-memory document filtering.
//!
//! This module decides whether a document matches a filter expression and
//! provides the value ordering shared by filters, sorts and group keys.

use std::cmp::Ordering;
use bson::{Bson, Document, datetime::DateTime};

use docquery_core::{
    query::{QueryVisitor, Expr, FieldOp},
    error::DocumentStoreError,
};


/// Type-erased, comparable representation of BSON values.
///
/// Integers and doubles compare by numeric value, so `2000`, `2000i64` and
/// `2000.0` are equal, while integers compare exactly among themselves.
/// Values of different kinds are never equal and have no partial order;
/// [`Comparable::total_cmp`] orders them by kind for sorting.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    /// Null, undefined and absent values
    Null,
    /// Boolean value
    Bool(bool),
    /// Int32 or Int64 value
    Integer(i64),
    /// Double value
    Number(f64),
    /// Decimal128 value, ordered by its encoding
    Decimal([u8; 16]),
    /// DateTime value
    DateTime(DateTime),
    /// String value
    String(&'a str),
    /// Binary payload, including UUIDs
    Binary(&'a [u8]),
    /// ObjectId value
    ObjectId([u8; 12]),
    /// Array of comparable values
    Array(Vec<Comparable<'a>>),
    /// Embedded document, in field order
    Map(Vec<(&'a str, Comparable<'a>)>),
    /// Timestamps, regular expressions, code, symbols and min/max keys
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Integer(i64::from(*value)),
            Bson::Int64(value) => Comparable::Integer(*value),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::Decimal128(value) => Comparable::Decimal(value.bytes()),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Binary(binary) => Comparable::Binary(&binary.bytes),
            Bson::ObjectId(oid) => Comparable::ObjectId(oid.bytes()),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<Vec<_>>()
            ),
            other => Comparable::Other(other),
        }
    }
}

/// Compares an integer with a non-NaN double without rounding the integer.
fn cmp_integer_double(integer: i64, double: f64) -> Ordering {
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;

    if double >= TWO_POW_63 {
        return Ordering::Less;
    }
    if double < -TWO_POW_63 {
        return Ordering::Greater;
    }

    integer
        .cmp(&(double.trunc() as i64))
        .then_with(|| 0.0f64.partial_cmp(&double.fract()).unwrap_or(Ordering::Equal))
}

impl<'a> Comparable<'a> {
    /// Position of this value's kind in the cross-kind sort order.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 1,
            Comparable::Integer(_) | Comparable::Number(_) => 2,
            Comparable::Decimal(_) => 3,
            Comparable::String(_) => 4,
            Comparable::Map(_) => 5,
            Comparable::Array(_) => 6,
            Comparable::Binary(_) => 7,
            Comparable::ObjectId(_) => 8,
            Comparable::Bool(_) => 9,
            Comparable::DateTime(_) => 10,
            Comparable::Other(_) => 11,
        }
    }

    /// Total order used by sorts, `$min` and `$max`.
    ///
    /// Values of the same kind compare by value (NaN sorts below every other
    /// number); different kinds compare by [`rank`](Self::rank).
    pub(crate) fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Ordering::Equal,
            (Comparable::Integer(a), Comparable::Integer(b)) => a.cmp(b),
            (Comparable::Integer(a), Comparable::Number(b)) => match b.is_nan() {
                true => Ordering::Greater,
                false => cmp_integer_double(*a, *b),
            },
            (Comparable::Number(_), Comparable::Integer(_)) => other.total_cmp(self).reverse(),
            (Comparable::Number(a), Comparable::Number(b)) => match (a.is_nan(), b.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            },
            (Comparable::Decimal(a), Comparable::Decimal(b)) => a.cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.cmp(b),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => {
                a.timestamp_millis().cmp(&b.timestamp_millis())
            }
            (Comparable::Binary(a), Comparable::Binary(b)) => a.cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.cmp(b),
            (Comparable::Array(a), Comparable::Array(b)) => a
                .iter()
                .zip(b.iter())
                .map(|(left, right)| left.total_cmp(right))
                .find(|ordering| ordering.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            (Comparable::Map(a), Comparable::Map(b)) => a
                .iter()
                .zip(b.iter())
                .map(|((left_key, left), (right_key, right))| {
                    left_key.cmp(right_key).then_with(|| left.total_cmp(right))
                })
                .find(|ordering| ordering.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            (Comparable::Other(a), Comparable::Other(b)) => (a.element_type() as u8)
                .cmp(&(b.element_type() as u8))
                .then_with(|| match a == b {
                    true => Ordering::Equal,
                    false => format!("{a:?}").cmp(&format!("{b:?}")),
                }),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Integer(a), Comparable::Integer(b)) => a == b,
            (Comparable::Integer(a), Comparable::Number(b))
            | (Comparable::Number(b), Comparable::Integer(a)) => {
                !b.is_nan() && cmp_integer_double(*a, *b).is_eq()
            }
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::Decimal(a), Comparable::Decimal(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Binary(a), Comparable::Binary(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Integer(a), Comparable::Integer(b)) => a.partial_cmp(b),
            (Comparable::Integer(a), Comparable::Number(b)) => {
                (!b.is_nan()).then(|| cmp_integer_double(*a, *b))
            }
            (Comparable::Number(a), Comparable::Integer(b)) => {
                (!a.is_nan()).then(|| cmp_integer_double(*b, *a).reverse())
            }
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Resolves a field name or dotted path inside a document.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}

/// Reads any numeric BSON value as `f64`.
pub(crate) fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}


/// Evaluates filter expressions against one document.
///
/// Absent fields fail every field predicate; only `Exists(field, false)` can
/// match them. Evaluation never fails.
pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn matches(&mut self, expr: &Expr) -> bool {
        self.visit_expr(expr).unwrap_or(false)
    }

    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        expr: Option<&Expr>,
    ) -> Vec<Document> {
        documents
            .into_iter()
            .filter(|doc| match expr {
                Some(expr) => DocumentEvaluator::new(doc).matches(expr),
                None => true,
            })
            .cloned()
            .collect::<Vec<_>>()
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(lookup(self.document, field).is_some() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let Some(field_value) = lookup(self.document, field) else {
            return Ok(false);
        };
        let left = Comparable::from(field_value);

        Ok(match op {
            FieldOp::Eq => left == Comparable::from(value),
            FieldOp::Ne => left != Comparable::from(value),
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => {
                match left.partial_cmp(&Comparable::from(value)) {
                    Some(ordering) => match op {
                        FieldOp::Gt => ordering == Ordering::Greater,
                        FieldOp::Gte => ordering != Ordering::Less,
                        FieldOp::Lt => ordering == Ordering::Less,
                        _ => ordering != Ordering::Greater,
                    },
                    None => false,
                }
            }
            FieldOp::AnyOf => candidates(value).any(|candidate| left == candidate),
            FieldOp::NoneOf => !candidates(value).any(|candidate| left == candidate),
        })
    }
}

fn candidates(value: &Bson) -> impl Iterator<Item = Comparable<'_>> {
    value
        .as_array()
        .map(|values| values.as_slice())
        .unwrap_or(std::slice::from_ref(value))
        .iter()
        .map(Comparable::from)
}


/// Collects the fields a filter constrains in a way an index on them could serve.
///
/// Only equality, range and `$in` predicates reachable through conjunctions count;
/// negations and disjunctions contribute nothing.
pub(crate) struct IndexableFields;

impl QueryVisitor for IndexableFields {
    type Output = Vec<String>;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        let mut fields = Vec::new();
        for expr in exprs {
            fields.extend(self.visit_expr(expr)?);
        }

        Ok(fields)
    }

    fn visit_or(&mut self, _exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(Vec::new())
    }

    fn visit_not(&mut self, _expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(Vec::new())
    }

    fn visit_exists(&mut self, _field: &str, _should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(Vec::new())
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, _value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok(match op {
            FieldOp::Ne | FieldOp::NoneOf => Vec::new(),
            _ => vec![field.to_string()],
        })
    }
}
