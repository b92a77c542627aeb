//! Observation to Patient linkage via `subject.reference`.

use std::collections::HashMap;

use crate::model::Patient;

/// Extracts the patient id from a subject reference.
///
/// Accepts `Patient/{id}`, `Patient/{id}/_history/{v}` and absolute URLs
/// ending in either form. Any other reference yields `None`.
pub fn patient_id_from_reference(reference: &str) -> Option<&str> {
    let reference = reference.trim();
    let rest = if let Some(rest) = reference.strip_prefix("Patient/") {
        rest
    } else {
        let idx = reference.rfind("/Patient/")?;
        &reference[idx + "/Patient/".len()..]
    };
    let id = rest.split('/').next()?;
    (!id.is_empty()).then_some(id)
}

/// Patients of one export indexed by id.
#[derive(Debug)]
pub struct PatientIndex<'a> {
    by_id: HashMap<&'a str, &'a Patient>,
}

impl<'a> PatientIndex<'a> {
    /// Builds the index. When ids repeat, the first patient wins.
    pub fn new(patients: &'a [Patient]) -> Self {
        let mut by_id = HashMap::with_capacity(patients.len());
        for patient in patients {
            by_id.entry(patient.id.as_str()).or_insert(patient);
        }
        Self { by_id }
    }

    pub fn get(&self, id: &str) -> Option<&'a Patient> {
        self.by_id.get(id).copied()
    }

    /// Resolves a subject reference to a patient.
    pub fn resolve(&self, reference: Option<&str>) -> Option<&'a Patient> {
        reference
            .and_then(patient_id_from_reference)
            .and_then(|id| self.get(id))
    }
}
