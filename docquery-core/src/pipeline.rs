//! Aggregation pipelines.
//!
//! A [`Pipeline`] is an ordered list of [`Stage`]s. Backends run it as a strict
//! left-to-right fold: the output sequence of stage *i* is the exact input of
//! stage *i + 1*, and no stage is reordered or skipped.
//!
//! # Example
//!
//! ```ignore
//! use bson::doc;
//! use docquery::pipeline::Pipeline;
//!
//! let top_author = Pipeline::parse(&[
//!     doc! { "$group": { "_id": "$author", "bookCount": { "$sum": 1 } } },
//!     doc! { "$sort": { "bookCount": -1 } },
//!     doc! { "$limit": 1 },
//! ])?;
//! ```

use bson::{Bson, Document};

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    expression::Expression,
    projection::Projection,
    query::{Expr, Sort, as_integer},
};

/// Per-group aggregate computations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorOp {
    /// Arithmetic total of numeric values (`$sum: 1` counts documents).
    Sum,
    /// Arithmetic mean of numeric values.
    Avg,
    /// Smallest value.
    Min,
    /// Largest value.
    Max,
    /// Value from the first document of the group.
    First,
    /// Value from the last document of the group.
    Last,
}

impl AccumulatorOp {
    fn parse(op: &str) -> Option<Self> {
        match op {
            "$sum" => Some(AccumulatorOp::Sum),
            "$avg" => Some(AccumulatorOp::Avg),
            "$min" => Some(AccumulatorOp::Min),
            "$max" => Some(AccumulatorOp::Max),
            "$first" => Some(AccumulatorOp::First),
            "$last" => Some(AccumulatorOp::Last),
            _ => None,
        }
    }
}

/// An accumulator applied to an expression evaluated per document.
#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    pub op: AccumulatorOp,
    pub expression: Expression,
}

impl Accumulator {
    pub fn new(op: AccumulatorOp, expression: Expression) -> Self {
        Accumulator { op, expression }
    }

    /// Counts the documents of a group (`{ $sum: 1 }`).
    pub fn count() -> Self {
        Accumulator::new(AccumulatorOp::Sum, Expression::literal(1))
    }
}

/// Specification of a `$group` stage.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStage {
    /// Expression producing the group key; stored as `_id` on each output record.
    pub key: Expression,
    /// Named accumulators, in output order.
    pub accumulators: Vec<(String, Accumulator)>,
}

impl GroupStage {
    /// Groups by the value of `key`.
    pub fn by(key: Expression) -> Self {
        GroupStage { key, accumulators: Vec::new() }
    }

    /// Adds a named accumulator.
    pub fn accumulate(mut self, name: impl Into<String>, accumulator: Accumulator) -> Self {
        self.accumulators.push((name.into(), accumulator));
        self
    }

    /// Parses `{ _id: <expr>, <name>: { <$op>: <expr> }, ... }`.
    pub fn parse(spec: &Document) -> DocumentStoreResult<Self> {
        let key = match spec.get("_id") {
            Some(key) => Expression::parse(key)?,
            None => {
                return Err(DocumentStoreError::InvalidExpression(
                    "$group requires an _id".to_string(),
                ));
            }
        };

        let accumulators = spec
            .iter()
            .filter(|(name, _)| name.as_str() != "_id")
            .map(|(name, value)| -> DocumentStoreResult<(String, Accumulator)> {
                Ok((name.clone(), parse_accumulator(name, value)?))
            })
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        Ok(GroupStage { key, accumulators })
    }

    fn validate(&self) -> DocumentStoreResult<()> {
        for (position, (name, _)) in self.accumulators.iter().enumerate() {
            if name.is_empty() || name.contains('.') || name.starts_with('$') {
                return Err(DocumentStoreError::InvalidExpression(format!(
                    "invalid accumulator name {name:?}"
                )));
            }
            if name == "_id" || self.accumulators[..position].iter().any(|(other, _)| other == name) {
                return Err(DocumentStoreError::InvalidExpression(format!(
                    "duplicate output field {name}"
                )));
            }
        }

        Ok(())
    }
}

fn parse_accumulator(name: &str, value: &Bson) -> DocumentStoreResult<Accumulator> {
    let spec = match value {
        Bson::Document(spec) if spec.len() == 1 => spec,
        _ => {
            return Err(DocumentStoreError::InvalidExpression(format!(
                "{name} must be an accumulator object with a single operator"
            )));
        }
    };

    let Some((op, arg)) = spec.iter().next() else {
        return Err(DocumentStoreError::InvalidExpression(format!(
            "{name} has no accumulator operator"
        )));
    };

    if op == "$count" {
        return match arg {
            Bson::Document(options) if options.is_empty() => Ok(Accumulator::count()),
            _ => Err(DocumentStoreError::InvalidExpression(
                "$count accumulator takes no arguments".to_string(),
            )),
        };
    }

    match AccumulatorOp::parse(op) {
        Some(op) => Ok(Accumulator::new(op, Expression::parse(arg)?)),
        None => Err(DocumentStoreError::InvalidExpression(format!(
            "unknown accumulator {op} for {name}"
        ))),
    }
}

/// A single pipeline step.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Keep documents matching the filter.
    Match(Expr),
    /// Partition documents by key and accumulate per group.
    Group(GroupStage),
    /// Stable sort by one or more keys.
    Sort(Vec<Sort>),
    /// Drop the first `n` documents.
    Skip(usize),
    /// Keep the first `n` documents.
    Limit(usize),
    /// Reshape each document.
    Project(Projection),
}

impl Stage {
    /// Returns the query-language operator for this stage.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Match(_) => "$match",
            Stage::Group(_) => "$group",
            Stage::Sort(_) => "$sort",
            Stage::Skip(_) => "$skip",
            Stage::Limit(_) => "$limit",
            Stage::Project(_) => "$project",
        }
    }

    /// Parses a single-operator stage document such as `{ $limit: 1 }`.
    pub fn parse(spec: &Document) -> DocumentStoreResult<Self> {
        if spec.len() != 1 {
            return Err(DocumentStoreError::InvalidQuery(format!(
                "a stage must have exactly one operator, got {}",
                spec.len()
            )));
        }
        let Some((op, arg)) = spec.iter().next() else {
            return Err(DocumentStoreError::InvalidQuery("empty stage".to_string()));
        };

        let stage = match op.as_str() {
            "$match" => Stage::Match(Expr::parse(stage_document(op, arg)?)?),
            "$group" => Stage::Group(GroupStage::parse(stage_document(op, arg)?)?),
            "$sort" => Stage::Sort(Sort::parse(stage_document(op, arg)?)?),
            "$project" => Stage::Project(Projection::parse(stage_document(op, arg)?)?),
            "$skip" => match as_integer(arg) {
                Some(n) if n >= 0 => Stage::Skip(n as usize),
                _ => {
                    return Err(DocumentStoreError::InvalidQuery(format!(
                        "$skip must be a non-negative integer, got {arg}"
                    )));
                }
            },
            "$limit" => match as_integer(arg) {
                Some(n) if n > 0 => Stage::Limit(n as usize),
                _ => {
                    return Err(DocumentStoreError::InvalidQuery(format!(
                        "$limit must be a positive integer, got {arg}"
                    )));
                }
            },
            other => {
                return Err(DocumentStoreError::InvalidQuery(format!(
                    "unknown pipeline stage {other}"
                )));
            }
        };

        Ok(stage)
    }

    /// Checks the stage arguments without touching any document.
    pub fn validate(&self) -> DocumentStoreResult<()> {
        match self {
            Stage::Limit(0) => Err(DocumentStoreError::InvalidQuery(
                "$limit must be positive".to_string(),
            )),
            Stage::Sort(keys) if keys.is_empty() => Err(DocumentStoreError::InvalidQuery(
                "$sort requires at least one key".to_string(),
            )),
            Stage::Project(projection) if projection.is_empty() => Err(
                DocumentStoreError::InvalidQuery("$project requires at least one field".to_string()),
            ),
            Stage::Project(projection) => projection.validate(),
            Stage::Group(group) => group.validate(),
            _ => Ok(()),
        }
    }
}

fn stage_document<'a>(op: &str, arg: &'a Bson) -> DocumentStoreResult<&'a Document> {
    arg.as_document().ok_or_else(|| {
        DocumentStoreError::InvalidQuery(format!("{op} requires a document, got {arg}"))
    })
}

/// An ordered sequence of aggregation stages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(stages: Vec<Stage>) -> Self {
        Pipeline { stages }
    }

    /// Appends a stage.
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Parses the query-language form of a pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Pipeline`] naming the first malformed stage.
    pub fn parse(stages: &[Document]) -> DocumentStoreResult<Self> {
        let pipeline = Pipeline {
            stages: stages
                .iter()
                .enumerate()
                .map(|(index, spec)| Stage::parse(spec).map_err(|err| err.at_stage(index)))
                .collect::<DocumentStoreResult<Vec<_>>>()?,
        };
        pipeline.validate()?;

        Ok(pipeline)
    }

    /// Validates every stage, reporting the index of the first invalid one.
    pub fn validate(&self) -> DocumentStoreResult<()> {
        self.stages
            .iter()
            .enumerate()
            .try_for_each(|(index, stage)| stage.validate().map_err(|err| err.at_stage(index)))
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
