//! Reference range evaluation.
//!
//! An observation is judged against the first entry of its `referenceRange`
//! in this order:
//!
//! 1. no numeric value: incomplete data
//! 2. both `low` and `high`: inclusive band check
//! 3. range text: a single comparison parsed from the text
//! 4. no bounds and no text: reference range not found
//! 5. a single bound without text: incomplete data
//!
//! Unknown outcomes are reported as not normal.

use std::fmt;

use crate::linkage::PatientIndex;
use crate::model::{Observation, Patient, ResourceCollection};
use crate::range::parse_range_text;

/// Why an observation was judged the way it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvaluationReason {
    WithinReferenceRange,
    OutOfReferenceRange,
    WithinProvidedRange,
    OutOfProvidedRange,
    ReferenceRangeNotFound,
    IncompleteData,
}

impl EvaluationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationReason::WithinReferenceRange => "Observation within reference range.",
            EvaluationReason::OutOfReferenceRange => "Observation out of reference range.",
            EvaluationReason::WithinProvidedRange => "Observation within provided range",
            EvaluationReason::OutOfProvidedRange => "Observation out of range.",
            EvaluationReason::ReferenceRangeNotFound => "Reference range not found.",
            EvaluationReason::IncompleteData => "Incomplete data.",
        }
    }

    /// True when the observation could not be judged at all.
    pub fn is_unknown(&self) -> bool {
        matches!(
            self,
            EvaluationReason::ReferenceRangeNotFound | EvaluationReason::IncompleteData
        )
    }
}

impl fmt::Display for EvaluationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub normal: bool,
    pub reason: EvaluationReason,
    pub value: Option<f64>,
}

impl Evaluation {
    fn new(normal: bool, reason: EvaluationReason, value: Option<f64>) -> Self {
        Self {
            normal,
            reason,
            value,
        }
    }
}

/// Classifies a single observation.
pub fn evaluate_observation(observation: &Observation) -> Evaluation {
    let Some(value) = observation.value() else {
        return Evaluation::new(false, EvaluationReason::IncompleteData, None);
    };

    let range = observation.primary_range();
    let low = range.and_then(|r| r.low_value());
    let high = range.and_then(|r| r.high_value());
    let text = range.and_then(|r| r.text());

    match (low, high, text) {
        (Some(low), Some(high), _) => {
            if low <= value && value <= high {
                Evaluation::new(true, EvaluationReason::WithinReferenceRange, Some(value))
            } else {
                Evaluation::new(false, EvaluationReason::OutOfReferenceRange, Some(value))
            }
        }
        (_, _, Some(text)) => {
            let normal = parse_range_text(text).is_some_and(|expr| expr.matches(value));
            let reason = if normal {
                EvaluationReason::WithinProvidedRange
            } else {
                EvaluationReason::OutOfProvidedRange
            };
            Evaluation::new(normal, reason, Some(value))
        }
        (None, None, None) => {
            Evaluation::new(false, EvaluationReason::ReferenceRangeNotFound, Some(value))
        }
        _ => Evaluation::new(false, EvaluationReason::IncompleteData, Some(value)),
    }
}

/// Evaluation of one observation together with its linked patient.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    pub observation: Observation,
    pub patient: Option<Patient>,
    pub normal: bool,
    pub reason: EvaluationReason,
    pub value: Option<f64>,
}

/// Evaluates every observation of a collection, in collection order.
pub fn evaluate_collection(collection: &ResourceCollection) -> Vec<EvaluationResult> {
    let index = PatientIndex::new(&collection.patients);
    let results: Vec<_> = collection
        .observations
        .iter()
        .map(|observation| {
            let evaluation = evaluate_observation(observation);
            let patient = index.resolve(observation.subject_reference()).cloned();
            if patient.is_none() {
                tracing::debug!(
                    observation = %observation.id,
                    subject = ?observation.subject_reference(),
                    "Observation subject not found among exported patients"
                );
            }
            EvaluationResult {
                observation: observation.clone(),
                patient,
                normal: evaluation.normal,
                reason: evaluation.reason,
                value: evaluation.value,
            }
        })
        .collect();

    let abnormal = results.iter().filter(|r| !r.normal).count();
    tracing::info!(
        observations = results.len(),
        abnormal,
        "Observations evaluated"
    );
    results
}
