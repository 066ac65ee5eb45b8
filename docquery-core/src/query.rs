//! Query construction and filtering API for document stores.
//!
//! This module provides type-safe query construction with filtering, projection,
//! sorting and skip/limit pagination, plus a visitor trait for evaluating filter
//! expressions in different backends.
//!
//! # Query Building
//!
//! Queries can be constructed using the fluent builder API:
//!
//! ```ignore
//! use docquery::query::{Query, Filter, SortDirection};
//!
//! let query = Query::builder()
//!     .filter(Filter::eq("genre", "Fiction"))
//!     .sort("price", SortDirection::Asc)
//!     .skip(5)
//!     .limit(5)
//!     .build();
//! ```
//!
//! # Query Documents
//!
//! Filters and sort specifications can also be parsed from the query-language form:
//!
//! ```ignore
//! use bson::doc;
//! use docquery::query::{Expr, Sort};
//!
//! let filter = Expr::parse(&doc! { "in_stock": true, "published_year": { "$gt": 2010 } })?;
//! let sort = Sort::parse(&doc! { "price": -1 })?;
//! ```
//!
//! Supported field operators are `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$in`,
//! `$nin`, `$exists` and `$not`; top-level logical operators are `$and`, `$or` and `$nor`.

use bson::{Bson, Document};

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    projection::Projection,
};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (`1`).
    Asc,
    /// Descending order (`-1`).
    Desc,
}

impl SortDirection {
    /// Parses a `1` / `-1` direction value.
    pub fn parse(value: &Bson) -> DocumentStoreResult<Self> {
        match as_integer(value) {
            Some(1) => Ok(SortDirection::Asc),
            Some(-1) => Ok(SortDirection::Desc),
            _ => Err(DocumentStoreError::InvalidQuery(format!(
                "sort direction must be 1 or -1, got {value}"
            ))),
        }
    }

    /// Returns the numeric form of this direction.
    pub fn as_i32(&self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

/// Sort key for query results.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// The field name (or dotted path) to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl Sort {
    /// Creates a sort key.
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Sort { field: field.into(), direction }
    }

    /// Parses a sort specification such as `{ price: -1, title: 1 }`.
    ///
    /// Keys are returned in specification order; earlier keys take precedence.
    pub fn parse(spec: &Document) -> DocumentStoreResult<Vec<Sort>> {
        if spec.is_empty() {
            return Err(DocumentStoreError::InvalidQuery(
                "sort specification must name at least one field".to_string(),
            ));
        }

        spec.iter()
            .map(|(field, direction)| -> DocumentStoreResult<Sort> {
                Ok(Sort::new(field.as_str(), SortDirection::parse(direction)?))
            })
            .collect()
    }
}

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    /// Equal to (`$eq`).
    Eq,
    /// Not equal to (`$ne`).
    Ne,
    /// Greater than (`$gt`).
    Gt,
    /// Greater than or equal to (`$gte`).
    Gte,
    /// Less than (`$lt`).
    Lt,
    /// Less than or equal to (`$lte`).
    Lte,
    /// Field value is one of the given values (`$in`).
    AnyOf,
    /// Field value is none of the given values (`$nin`).
    NoneOf,
}

/// A filter expression for querying documents.
///
/// Expressions can be combined using logical operators (`And`, `Or`, `Not`)
/// to build complex filter predicates. An empty `And` matches every document.
///
/// # Example
///
/// ```ignore
/// use docquery::query::Filter;
///
/// let expr = Filter::and(vec![
///     Filter::eq("in_stock", true),
///     Filter::gt("published_year", 2010),
/// ]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match).
    And(Vec<Expr>),
    /// Logical OR of multiple expressions (any must match).
    Or(Vec<Expr>),
    /// Logical NOT of an expression (inverts the result).
    Not(Box<Expr>),
    /// Checks if a field exists or doesn't exist.
    Exists(String, bool),
    /// Field comparison expression.
    Field {
        /// The field name to compare.
        field: String,
        /// The comparison operator.
        op: FieldOp,
        /// The value to compare against.
        value: Bson,
    },
}

impl Expr {
    /// Creates a field comparison expression.
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Returns an expression that matches every document.
    pub fn all() -> Self {
        Expr::And(Vec::new())
    }

    /// Combines this expression with another using logical AND.
    ///
    /// If this expression is already an AND, the other expression is appended
    /// to the list. Otherwise, a new AND expression is created.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this expression with another using logical OR.
    ///
    /// If this expression is already an OR, the other expression is appended
    /// to the list. Otherwise, a new OR expression is created.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    /// Negates this expression (logical NOT).
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// Parses a filter document such as `{ genre: "Fiction", price: { $lt: 20 } }`.
    ///
    /// Several fields in one document are combined with logical AND. The empty
    /// document parses to [`Expr::all`].
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidQuery`] for unknown operators and
    /// operators whose arguments have the wrong shape.
    pub fn parse(filter: &Document) -> DocumentStoreResult<Expr> {
        let mut clauses = filter
            .iter()
            .map(|(key, value)| parse_clause(key, value))
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        Ok(match clauses.len() {
            1 => clauses.remove(0),
            _ => Expr::And(clauses),
        })
    }
}

fn parse_clause(key: &str, value: &Bson) -> DocumentStoreResult<Expr> {
    match key {
        "$and" => Ok(Expr::And(parse_branches(key, value)?)),
        "$or" => Ok(Expr::Or(parse_branches(key, value)?)),
        "$nor" => Ok(Expr::Or(parse_branches(key, value)?).not()),
        op if op.starts_with('$') => Err(DocumentStoreError::InvalidQuery(format!(
            "unknown top-level operator {op}"
        ))),
        "" => Err(DocumentStoreError::InvalidQuery(
            "field names must not be empty".to_string(),
        )),
        field => match value {
            Bson::Document(spec) if is_operator_document(spec) => parse_field_ops(field, spec),
            _ => Ok(Filter::eq(field, value.clone())),
        },
    }
}

fn parse_branches(op: &str, value: &Bson) -> DocumentStoreResult<Vec<Expr>> {
    let items = match value {
        Bson::Array(items) if !items.is_empty() => items,
        _ => {
            return Err(DocumentStoreError::InvalidQuery(format!(
                "{op} must be a non-empty array"
            )));
        }
    };

    items
        .iter()
        .map(|item| match item {
            Bson::Document(filter) => Expr::parse(filter),
            _ => Err(DocumentStoreError::InvalidQuery(format!(
                "{op} entries must be documents"
            ))),
        })
        .collect()
}

fn is_operator_document(spec: &Document) -> bool {
    spec.keys().next().is_some_and(|key| key.starts_with('$'))
}

fn parse_field_ops(field: &str, spec: &Document) -> DocumentStoreResult<Expr> {
    let mut clauses = spec
        .iter()
        .map(|(op, arg)| -> DocumentStoreResult<Expr> {
            let field_op = match op.as_str() {
                "$eq" => FieldOp::Eq,
                "$ne" => FieldOp::Ne,
                "$gt" => FieldOp::Gt,
                "$gte" => FieldOp::Gte,
                "$lt" => FieldOp::Lt,
                "$lte" => FieldOp::Lte,
                "$in" | "$nin" => {
                    if !matches!(arg, Bson::Array(_)) {
                        return Err(DocumentStoreError::InvalidQuery(format!(
                            "{op} on {field} needs an array"
                        )));
                    }
                    if op == "$in" { FieldOp::AnyOf } else { FieldOp::NoneOf }
                }
                "$exists" => return Ok(Expr::Exists(field.to_string(), is_truthy(arg))),
                "$not" => {
                    return match arg {
                        Bson::Document(inner) if is_operator_document(inner) => {
                            Ok(parse_field_ops(field, inner)?.not())
                        }
                        _ => Err(DocumentStoreError::InvalidQuery(format!(
                            "$not on {field} needs an operator document"
                        ))),
                    };
                }
                other if other.starts_with('$') => {
                    return Err(DocumentStoreError::InvalidQuery(format!(
                        "unknown operator {other} on {field}"
                    )));
                }
                other => {
                    return Err(DocumentStoreError::InvalidQuery(format!(
                        "cannot mix operators with field {other} in the filter on {field}"
                    )));
                }
            };

            Ok(Expr::field(field.to_string(), field_op, arg.clone()))
        })
        .collect::<DocumentStoreResult<Vec<_>>>()?;

    Ok(match clauses.len() {
        1 => clauses.remove(0),
        _ => Expr::And(clauses),
    })
}

/// A structured query for retrieving and filtering documents.
///
/// Stages are applied in the order filter, sort, skip, limit, projection.
/// Use [`QueryBuilder`] for ergonomic construction.
#[derive(Debug, Clone, Default)]
pub struct Query {
    /// Optional filter expression to match documents.
    pub filter: Option<Expr>,
    /// Optional projection reshaping each returned document.
    pub projection: Option<Projection>,
    /// Sort keys, most significant first. Empty keeps store order.
    pub sort: Vec<Sort>,
    /// Number of documents to skip (for pagination).
    pub skip: Option<usize>,
    /// Maximum number of documents to return. Zero means no limit.
    pub limit: Option<usize>,
}

impl Query {
    /// Creates a new empty query that matches every document.
    pub fn new() -> Self {
        Query::default()
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }
}

/// Helper struct for constructing filter expressions.
///
/// All methods accept field names and values as `Into<String>` and `Into<Bson>` for ergonomics.
pub struct Filter;

impl Filter {
    /// Matches documents where the field equals the value.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Eq, value.into())
    }

    /// Matches documents where the field is present and differs from the value.
    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Ne, value.into())
    }

    /// Matches documents where the field is greater than the value.
    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gt, value.into())
    }

    /// Matches documents where the field is greater than or equal to the value.
    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gte, value.into())
    }

    /// Matches documents where the field is less than the value.
    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lt, value.into())
    }

    /// Matches documents where the field is less than or equal to the value.
    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lte, value.into())
    }

    /// Matches documents where the field exists.
    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), true)
    }

    /// Matches documents where the field does not exist.
    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), false)
    }

    /// Combines expressions such that all must match.
    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    /// Combines expressions such that any can match.
    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }

    /// Matches documents where the field equals one of the values.
    pub fn any_of(field: impl Into<String>, values: impl IntoIterator<Item = impl Into<Bson>>) -> Expr {
        Expr::field(
            field.into(),
            FieldOp::AnyOf,
            Bson::Array(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Matches documents where the field is present and equals none of the values.
    pub fn none_of(field: impl Into<String>, values: impl IntoIterator<Item = impl Into<Bson>>) -> Expr {
        Expr::field(
            field.into(),
            FieldOp::NoneOf,
            Bson::Array(values.into_iter().map(Into::into).collect()),
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    /// Creates a new query builder.
    pub fn new() -> Self {
        QueryBuilder { query: Query::default() }
    }

    /// Sets the filter expression for this query.
    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(filter);
        self
    }

    /// Sets the projection applied to every returned document.
    pub fn projection(mut self, projection: Projection) -> Self {
        self.query.projection = Some(projection);
        self
    }

    /// Appends a sort key. Keys added first take precedence.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort.push(Sort::new(field, direction));
        self
    }

    /// Appends several sort keys, typically from [`Sort::parse`].
    pub fn sort_by(mut self, keys: impl IntoIterator<Item = Sort>) -> Self {
        self.query.sort.extend(keys);
        self
    }

    /// Sets the number of documents to skip.
    pub fn skip(mut self, skip: usize) -> Self {
        self.query.skip = Some(skip);
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Builds and returns the final query.
    pub fn build(self) -> Query {
        self.query
    }
}

/// Walks a filter expression tree.
///
/// Backends implement this to evaluate or translate filters; `visit_expr`
/// dispatches to the node-specific methods.
pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}

/// Reads an integral number, accepting doubles without a fractional part.
pub fn as_integer(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(v) => Some(i64::from(*v)),
        Bson::Int64(v) => Some(*v),
        Bson::Double(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
        _ => None,
    }
}

/// Interprets a flag value the way `$exists` and projections do: `false`, `0` and null are false.
pub fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(flag) => *flag,
        Bson::Int32(v) => *v != 0,
        Bson::Int64(v) => *v != 0,
        Bson::Double(v) => *v != 0.0,
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}
