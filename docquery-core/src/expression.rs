//! Aggregation expressions used by computed projections and group stages.
//!
//! An [`Expression`] is parsed from its query-language form: a string beginning
//! with `$` references a field, a single-key document whose key starts with `$`
//! applies an operator, and anything else is a literal.
//!
//! ```ignore
//! use bson::doc;
//! use docquery::expression::Expression;
//!
//! // "1925" -> "192" -> "1920s"
//! let decade = Expression::parse(&bson::bson!({
//!     "$concat": [ { "$substr": [ "$published_year", 0, 3 ] }, "0s" ]
//! }))?;
//! ```

use bson::Bson;

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    query::as_integer,
};

/// An aggregation expression evaluated against a single document.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Value of a field (or dotted path) in the current document.
    Field(String),
    /// A constant value.
    Literal(Bson),
    /// String concatenation of all operands.
    Concat(Vec<Expression>),
    /// Substring of the stringified operand, counted in characters.
    ///
    /// A negative `length` takes everything up to the end.
    Substr {
        input: Box<Expression>,
        start: i64,
        length: i64,
    },
    /// String form of the operand.
    ToString(Box<Expression>),
}

impl Expression {
    /// References a field by name.
    pub fn field(name: impl Into<String>) -> Self {
        Expression::Field(name.into())
    }

    /// Wraps a constant.
    pub fn literal(value: impl Into<Bson>) -> Self {
        Expression::Literal(value.into())
    }

    /// Parses the query-language form of an expression.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidExpression`] for unknown operators,
    /// operators with the wrong number of arguments and unsupported variables.
    pub fn parse(value: &Bson) -> DocumentStoreResult<Self> {
        match value {
            Bson::String(path) if path.starts_with("$$") => Err(DocumentStoreError::InvalidExpression(
                format!("variables are not supported: {path}"),
            )),
            Bson::String(path) if path.starts_with('$') => {
                let field = &path[1..];
                if field.is_empty() {
                    return Err(DocumentStoreError::InvalidExpression(
                        "field reference must name a field".to_string(),
                    ));
                }
                Ok(Expression::Field(field.to_string()))
            }
            Bson::Document(spec) => {
                let mut entries = spec.iter();
                let (op, arg) = match (entries.next(), entries.next()) {
                    (Some((op, arg)), None) if op.starts_with('$') => (op.as_str(), arg),
                    _ => {
                        return Err(DocumentStoreError::InvalidExpression(format!(
                            "expected a single operator, got {spec}"
                        )));
                    }
                };
                Self::parse_operator(op, arg)
            }
            literal => Ok(Expression::Literal(literal.clone())),
        }
    }

    fn parse_operator(op: &str, arg: &Bson) -> DocumentStoreResult<Self> {
        match op {
            "$literal" => Ok(Expression::Literal(arg.clone())),
            "$concat" => Ok(Expression::Concat(
                arguments(arg)
                    .iter()
                    .map(Expression::parse)
                    .collect::<DocumentStoreResult<Vec<_>>>()?,
            )),
            "$substr" | "$substrBytes" | "$substrCP" => {
                let args = arguments(arg);
                let [input, start, length] = args.as_slice() else {
                    return Err(DocumentStoreError::InvalidExpression(format!(
                        "{op} requires 3 arguments, got {}",
                        args.len()
                    )));
                };
                let position = |value: &Bson, name: &str| {
                    as_integer(value).ok_or_else(|| {
                        DocumentStoreError::InvalidExpression(format!(
                            "{op} {name} must be an integer, got {value}"
                        ))
                    })
                };

                Ok(Expression::Substr {
                    input: Box::new(Expression::parse(input)?),
                    start: position(start, "start")?,
                    length: position(length, "length")?,
                })
            }
            "$toString" => {
                let args = arguments(arg);
                match args.as_slice() {
                    [input] => Ok(Expression::ToString(Box::new(Expression::parse(input)?))),
                    _ => Err(DocumentStoreError::InvalidExpression(format!(
                        "$toString requires 1 argument, got {}",
                        args.len()
                    ))),
                }
            }
            other => Err(DocumentStoreError::InvalidExpression(format!(
                "unknown expression operator {other}"
            ))),
        }
    }
}

// Operators accept either an argument array or a single bare argument.
fn arguments(arg: &Bson) -> Vec<Bson> {
    match arg {
        Bson::Array(items) => items.clone(),
        single => vec![single.clone()],
    }
}
