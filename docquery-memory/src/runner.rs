//! Aggregation pipeline execution over in-memory documents.
//!
//! Stages run as a strict left-to-right fold. The whole pipeline is validated
//! before the first stage sees a document, and any failure discards the
//! intermediate results.

use std::cmp::Ordering;
use bson::{Bson, Document};
use tracing::trace;

use docquery_core::{
    error::DocumentStoreResult,
    pipeline::{AccumulatorOp, GroupStage, Pipeline, Stage},
    query::{Sort, SortDirection},
};

use crate::{
    evaluator::{Comparable, DocumentEvaluator, as_f64, lookup},
    expression::{ExpressionEvaluator, project},
};

/// Runs a validated [`Pipeline`] over a sequence of documents.
pub(crate) struct PipelineRunner<'p> {
    pipeline: &'p Pipeline,
}

impl<'p> PipelineRunner<'p> {
    pub fn new(pipeline: &'p Pipeline) -> Self {
        Self { pipeline }
    }

    pub fn run(&self, documents: Vec<Document>) -> DocumentStoreResult<Vec<Document>> {
        self.pipeline.validate()?;

        self.pipeline
            .stages()
            .iter()
            .enumerate()
            .try_fold(documents, |documents, (index, stage)| {
                let input = documents.len();
                let output = run_stage(stage, documents).map_err(|err| err.at_stage(index))?;

                trace!(stage = index, op = stage.name(), input, output = output.len(), "pipeline stage finished");
                Ok(output)
            })
    }
}

fn run_stage(stage: &Stage, mut documents: Vec<Document>) -> DocumentStoreResult<Vec<Document>> {
    match stage {
        Stage::Match(filter) => Ok(documents
            .into_iter()
            .filter(|document| DocumentEvaluator::new(document).matches(filter))
            .collect()),
        Stage::Group(group) => group_documents(group, &documents),
        Stage::Sort(keys) => {
            sort_documents(&mut documents, keys);
            Ok(documents)
        }
        Stage::Skip(n) => Ok(documents.into_iter().skip(*n).collect()),
        Stage::Limit(n) => {
            documents.truncate(*n);
            Ok(documents)
        }
        Stage::Project(projection) => documents
            .iter()
            .map(|document| project(document, projection))
            .collect(),
    }
}

/// Stable multi-key sort. Absent fields sort as null.
pub(crate) fn sort_documents(documents: &mut [Document], keys: &[Sort]) {
    documents.sort_by(|a, b| {
        keys.iter()
            .map(|key| {
                let left = lookup(a, &key.field).map(Comparable::from).unwrap_or(Comparable::Null);
                let right = lookup(b, &key.field).map(Comparable::from).unwrap_or(Comparable::Null);

                match key.direction {
                    SortDirection::Asc => left.total_cmp(&right),
                    SortDirection::Desc => right.total_cmp(&left),
                }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    });
}

/// Running state of one accumulator within one group.
enum AccumulatorState {
    Sum { integral: Option<i64>, total: f64, saw_double: bool },
    Avg { total: f64, count: u64 },
    Min(Option<Bson>),
    Max(Option<Bson>),
    First(Option<Bson>),
    Last(Bson),
}

impl AccumulatorState {
    fn new(op: AccumulatorOp) -> Self {
        match op {
            AccumulatorOp::Sum => AccumulatorState::Sum { integral: Some(0), total: 0.0, saw_double: false },
            AccumulatorOp::Avg => AccumulatorState::Avg { total: 0.0, count: 0 },
            AccumulatorOp::Min => AccumulatorState::Min(None),
            AccumulatorOp::Max => AccumulatorState::Max(None),
            AccumulatorOp::First => AccumulatorState::First(None),
            AccumulatorOp::Last => AccumulatorState::Last(Bson::Null),
        }
    }

    fn fold(&mut self, value: Option<Bson>) {
        match self {
            AccumulatorState::Sum { integral, total, saw_double } => match value {
                Some(Bson::Int32(n)) => {
                    *total += f64::from(n);
                    *integral = integral.and_then(|sum| sum.checked_add(i64::from(n)));
                }
                Some(Bson::Int64(n)) => {
                    *total += n as f64;
                    *integral = integral.and_then(|sum| sum.checked_add(n));
                }
                Some(Bson::Double(n)) => {
                    *total += n;
                    *saw_double = true;
                }
                _ => {}
            },
            AccumulatorState::Avg { total, count } => {
                if let Some(n) = value.as_ref().and_then(as_f64) {
                    *total += n;
                    *count += 1;
                }
            }
            AccumulatorState::Min(current) => keep_extreme(current, value, Ordering::Less),
            AccumulatorState::Max(current) => keep_extreme(current, value, Ordering::Greater),
            AccumulatorState::First(current) => {
                if current.is_none() {
                    *current = Some(value.unwrap_or(Bson::Null));
                }
            }
            AccumulatorState::Last(current) => *current = value.unwrap_or(Bson::Null),
        }
    }

    fn finish(self) -> Bson {
        match self {
            AccumulatorState::Sum { integral: Some(sum), saw_double: false, .. } => match i32::try_from(sum) {
                Ok(small) => Bson::Int32(small),
                Err(_) => Bson::Int64(sum),
            },
            AccumulatorState::Sum { total, .. } => Bson::Double(total),
            AccumulatorState::Avg { count: 0, .. } => Bson::Null,
            AccumulatorState::Avg { total, count } => Bson::Double(total / count as f64),
            AccumulatorState::Min(value)
            | AccumulatorState::Max(value)
            | AccumulatorState::First(value) => value.unwrap_or(Bson::Null),
            AccumulatorState::Last(value) => value,
        }
    }
}

// Null and absent values never win $min / $max.
fn keep_extreme(current: &mut Option<Bson>, candidate: Option<Bson>, wanted: Ordering) {
    let Some(candidate) = candidate.filter(|value| !matches!(value, Bson::Null | Bson::Undefined)) else {
        return;
    };

    let replace = match current {
        None => true,
        Some(existing) => Comparable::from(&candidate).total_cmp(&Comparable::from(&*existing)) == wanted,
    };
    if replace {
        *current = Some(candidate);
    }
}

struct Group {
    key: Bson,
    accumulators: Vec<AccumulatorState>,
}

/// Partitions documents by key; groups are emitted in order of first appearance.
fn group_documents(stage: &GroupStage, documents: &[Document]) -> DocumentStoreResult<Vec<Document>> {
    let mut groups: Vec<Group> = Vec::new();

    for document in documents {
        let evaluator = ExpressionEvaluator::new(document);
        let key = evaluator.evaluate(&stage.key)?.unwrap_or(Bson::Null);

        let position = match groups
            .iter()
            .position(|group| Comparable::from(&group.key) == Comparable::from(&key))
        {
            Some(position) => position,
            None => {
                groups.push(Group {
                    key,
                    accumulators: stage
                        .accumulators
                        .iter()
                        .map(|(_, accumulator)| AccumulatorState::new(accumulator.op))
                        .collect(),
                });
                groups.len() - 1
            }
        };

        for ((_, accumulator), state) in stage.accumulators.iter().zip(groups[position].accumulators.iter_mut()) {
            state.fold(evaluator.evaluate(&accumulator.expression)?);
        }
    }

    Ok(groups
        .into_iter()
        .map(|group| {
            let mut output = Document::new();
            output.insert("_id", group.key);
            for ((name, _), state) in stage.accumulators.iter().zip(group.accumulators) {
                output.insert(name.clone(), state.finish());
            }
            output
        })
        .collect())
}
