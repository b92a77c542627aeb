//! Bulk Data export manifest.

use octofhir_labs::ResourceKind;
use serde::{Deserialize, Serialize};

use crate::error::{BulkError, BulkResult};

/// Completion manifest returned by the status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    #[serde(default)]
    pub requires_access_token: bool,
    pub output: Vec<OutputFileReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error: Vec<OutputFileReference>,
}

impl ExportManifest {
    /// Resolves the declared kind of every output entry.
    ///
    /// Fails on the first kind that is not supported.
    pub fn output_kinds(&self) -> BulkResult<Vec<ResourceKind>> {
        self.output.iter().map(OutputFileReference::kind).collect()
    }
}

/// One file listed in a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputFileReference {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

impl OutputFileReference {
    pub fn kind(&self) -> BulkResult<ResourceKind> {
        self.resource_type
            .parse()
            .map_err(|_| BulkError::UnknownResourceKind {
                kind: self.resource_type.clone(),
            })
    }
}
