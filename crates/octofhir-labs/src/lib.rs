//! # octofhir-labs
//!
//! Typed laboratory records and reference range evaluation.
//!
//! - [`model`] - Patient and Observation records grouped in a [`ResourceCollection`]
//! - [`range`] - Parser for textual range expressions like `"<10"`
//! - [`linkage`] - Resolving `subject.reference` to exported patients
//! - [`evaluate`] - Normal/abnormal classification of observations

pub mod error;
pub mod evaluate;
pub mod linkage;
pub mod model;
pub mod range;

pub use error::RecordError;
pub use evaluate::{
    Evaluation, EvaluationReason, EvaluationResult, evaluate_collection, evaluate_observation,
};
pub use linkage::{PatientIndex, patient_id_from_reference};
pub use model::{
    CodeableConcept, Coding, HumanName, Observation, Patient, Quantity, Record, Reference,
    ReferenceRange, ResourceCollection, ResourceKind,
};
pub use range::{Comparator, RangeExpression, parse_range_text};
