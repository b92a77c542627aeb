//! Typed Patient and Observation records.
//!
//! Only the elements the evaluator and the report read are modelled; all
//! other elements of the FHIR resources are ignored on deserialization.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RecordError, Result};

/// Resource kinds an export may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Patient,
    Observation,
}

impl ResourceKind {
    /// All supported kinds, in export `_type` order.
    pub const ALL: [ResourceKind; 2] = [ResourceKind::Patient, ResourceKind::Observation];

    /// FHIR `resourceType` value.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Patient => "Patient",
            ResourceKind::Observation => "Observation",
        }
    }

    /// Key of the collection holding records of this kind.
    pub fn collection_key(&self) -> &'static str {
        match self {
            ResourceKind::Patient => "patients",
            ResourceKind::Observation => "observations",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Patient" => Ok(ResourceKind::Patient),
            "Observation" => Ok(ResourceKind::Observation),
            other => Err(RecordError::UnknownKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanName {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub given: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub name: Vec<HumanName>,
}

impl Patient {
    /// Display name for reports: the given names of the first name, then its
    /// text, then the family name.
    pub fn display_name(&self) -> Option<String> {
        let name = self.name.first()?;
        if !name.given.is_empty() {
            return Some(name.given.join(" "));
        }
        name.text.clone().or_else(|| name.family.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeableConcept {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coding: Vec<Coding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl CodeableConcept {
    /// `text`, falling back to the first coding display.
    pub fn label(&self) -> Option<&str> {
        self.text
            .as_deref()
            .or_else(|| self.coding.iter().find_map(|c| c.display.as_deref()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quantity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ReferenceRange {
    pub fn low_value(&self) -> Option<f64> {
        self.low.as_ref().and_then(|q| q.value)
    }

    pub fn high_value(&self) -> Option<f64> {
        self.high.as_ref().and_then(|q| q.value)
    }

    /// Range text, ignoring blank strings.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub code: CodeableConcept,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_quantity: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reference_range: Vec<ReferenceRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_date_time: Option<String>,
}

impl Observation {
    /// Numeric value of `valueQuantity`.
    pub fn value(&self) -> Option<f64> {
        self.value_quantity.as_ref().and_then(|q| q.value)
    }

    pub fn unit(&self) -> Option<&str> {
        self.value_quantity.as_ref().and_then(|q| q.unit.as_deref())
    }

    /// First reference range entry; later entries are ignored.
    pub fn primary_range(&self) -> Option<&ReferenceRange> {
        self.reference_range.first()
    }

    pub fn subject_reference(&self) -> Option<&str> {
        self.subject.as_ref().and_then(|s| s.reference.as_deref())
    }
}

/// A typed record of a supported kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Patient(Patient),
    Observation(Observation),
}

impl Record {
    /// Parses one NDJSON line as a record of the declared kind.
    ///
    /// The line's `resourceType` must equal the declared kind.
    pub fn parse(kind: ResourceKind, line: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(line)?;
        let found = value
            .get("resourceType")
            .and_then(Value::as_str)
            .ok_or(RecordError::MissingResourceType)?;
        if found != kind.as_str() {
            return Err(RecordError::KindMismatch {
                expected: kind.as_str().to_string(),
                found: found.to_string(),
            });
        }

        Ok(match kind {
            ResourceKind::Patient => Record::Patient(serde_json::from_value(value)?),
            ResourceKind::Observation => Record::Observation(serde_json::from_value(value)?),
        })
    }
}

/// Records of one export, grouped by kind in arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceCollection {
    pub patients: Vec<Patient>,
    pub observations: Vec<Observation>,
}

impl ResourceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: Record) {
        match record {
            Record::Patient(p) => self.patients.push(p),
            Record::Observation(o) => self.observations.push(o),
        }
    }

    /// Appends all records in order.
    pub fn extend(&mut self, records: impl IntoIterator<Item = Record>) {
        for record in records {
            self.push(record);
        }
    }

    /// Number of records of the given kind.
    pub fn count(&self, kind: ResourceKind) -> usize {
        match kind {
            ResourceKind::Patient => self.patients.len(),
            ResourceKind::Observation => self.observations.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patients.is_empty() && self.observations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resource_kind_round_trip() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.as_str().parse::<ResourceKind>().unwrap(), kind);
        }
        assert_eq!(ResourceKind::Patient.collection_key(), "patients");
        assert_eq!(ResourceKind::Observation.collection_key(), "observations");
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let err = "Encounter".parse::<ResourceKind>().unwrap_err();
        assert!(matches!(err, RecordError::UnknownKind(k) if k == "Encounter"));
    }

    #[test]
    fn test_parse_observation() {
        let line = json!({
            "resourceType": "Observation",
            "id": "obs-1",
            "status": "final",
            "code": {"text": "Glucose"},
            "subject": {"reference": "Patient/p1"},
            "valueQuantity": {"value": 5.4, "unit": "mmol/L"},
            "referenceRange": [{"low": {"value": 3.9}, "high": {"value": 6.1}}],
            "category": [{"text": "Laboratory"}]
        })
        .to_string();

        let Record::Observation(obs) = Record::parse(ResourceKind::Observation, &line).unwrap()
        else {
            panic!("expected observation");
        };
        assert_eq!(obs.id, "obs-1");
        assert_eq!(obs.value(), Some(5.4));
        assert_eq!(obs.unit(), Some("mmol/L"));
        assert_eq!(obs.subject_reference(), Some("Patient/p1"));
        let range = obs.primary_range().unwrap();
        assert_eq!(range.low_value(), Some(3.9));
        assert_eq!(range.high_value(), Some(6.1));
        assert_eq!(range.text(), None);
    }

    #[test]
    fn test_parse_rejects_kind_mismatch() {
        let line = r#"{"resourceType":"Patient","id":"p1"}"#;
        let err = Record::parse(ResourceKind::Observation, line).unwrap_err();
        assert!(matches!(err, RecordError::KindMismatch { .. }));
    }

    #[test]
    fn test_parse_rejects_missing_resource_type() {
        let err = Record::parse(ResourceKind::Patient, r#"{"id":"p1"}"#).unwrap_err();
        assert!(matches!(err, RecordError::MissingResourceType));
    }

    #[test]
    fn test_parse_rejects_invalid_json() {
        let err = Record::parse(ResourceKind::Patient, "{not json").unwrap_err();
        assert!(matches!(err, RecordError::Json(_)));
    }

    #[test]
    fn test_patient_display_name_fallbacks() {
        let given = Patient {
            id: "p1".into(),
            name: vec![HumanName {
                given: vec!["Ada".into(), "M".into()],
                family: Some("Lovelace".into()),
                text: None,
            }],
        };
        assert_eq!(given.display_name().as_deref(), Some("Ada M"));

        let text_only = Patient {
            id: "p2".into(),
            name: vec![HumanName {
                text: Some("Grace Hopper".into()),
                ..Default::default()
            }],
        };
        assert_eq!(text_only.display_name().as_deref(), Some("Grace Hopper"));

        let unnamed = Patient {
            id: "p3".into(),
            name: vec![],
        };
        assert_eq!(unnamed.display_name(), None);
    }

    #[test]
    fn test_code_label_falls_back_to_coding_display() {
        let code = CodeableConcept {
            coding: vec![
                Coding::default(),
                Coding {
                    display: Some("Hemoglobin".into()),
                    ..Default::default()
                },
            ],
            text: None,
        };
        assert_eq!(code.label(), Some("Hemoglobin"));
    }

    #[test]
    fn test_collection_preserves_order() {
        let mut collection = ResourceCollection::new();
        collection.extend([
            Record::Observation(Observation {
                id: "o1".into(),
                ..Default::default()
            }),
            Record::Patient(Patient {
                id: "p1".into(),
                ..Default::default()
            }),
            Record::Observation(Observation {
                id: "o2".into(),
                ..Default::default()
            }),
        ]);
        assert_eq!(collection.count(ResourceKind::Patient), 1);
        let ids: Vec<_> = collection.observations.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, ["o1", "o2"]);
    }
}
