//! Group export configuration.
//!
//! # Example (TOML)
//!
//! ```toml
//! [export]
//! fhir_base_url = "https://fhir.epic.com/interconnect-fhir-oauth/api/FHIR/R4"
//! group_id = "e3iabhmS8rsueyz7vaimuiaSmfGvi.QwjVXJANlPOgR83"
//! types = ["Patient", "Observation"]
//! type_filter = "Observation?category=laboratory"
//! poll_interval = "10s"
//! max_wait = "2h"
//! ```

use std::time::Duration;

use octofhir_labs::ResourceKind;
use serde::{Deserialize, Serialize};

use crate::poller::PollPolicy;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExportConfig {
    /// FHIR R4 base URL of the data platform.
    pub fhir_base_url: String,

    /// Group whose members are exported.
    pub group_id: String,

    /// Value of `_type`. Only Patient and Observation can be ingested.
    pub types: Vec<String>,

    /// Value of `_typeFilter`, if any.
    pub type_filter: Option<String>,

    /// Delay between status checks.
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Maximum number of status checks.
    pub max_poll_attempts: Option<u32>,

    /// Maximum time spent polling a single job.
    #[serde(with = "humantime_serde")]
    pub max_wait: Option<Duration>,

    /// Timeout of each kickoff, status and download request.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            fhir_base_url: "https://fhir.epic.com/interconnect-fhir-oauth/api/FHIR/R4".to_string(),
            group_id: String::new(),
            types: vec!["Patient".to_string(), "Observation".to_string()],
            type_filter: Some("Observation?category=laboratory".to_string()),
            poll_interval: Duration::from_secs(10),
            max_poll_attempts: None,
            max_wait: Some(Duration::from_secs(2 * 60 * 60)),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl ExportConfig {
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: self.poll_interval,
            max_attempts: self.max_poll_attempts,
            max_wait: self.max_wait,
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        match url::Url::parse(&self.fhir_base_url) {
            Ok(url) if url.cannot_be_a_base() => {
                return Err(format!(
                    "export.fhir_base_url cannot be used as a base URL: {}",
                    self.fhir_base_url
                ));
            }
            Ok(_) => {}
            Err(e) => {
                return Err(format!(
                    "export.fhir_base_url is not a valid URL ({e}): {}",
                    self.fhir_base_url
                ));
            }
        }
        if self.group_id.trim().is_empty() {
            return Err("export.group_id must not be empty".into());
        }
        if self.types.is_empty() {
            return Err("export.types must list at least one resource type".into());
        }
        for ty in &self.types {
            if ty.parse::<ResourceKind>().is_err() {
                return Err(format!(
                    "export.types contains unsupported resource type '{ty}' (supported: Patient, Observation)"
                ));
            }
        }
        if self.poll_interval.is_zero() {
            return Err("export.poll_interval must be > 0".into());
        }
        if self.max_poll_attempts == Some(0) {
            return Err("export.max_poll_attempts must be > 0".into());
        }
        if self.max_poll_attempts.is_none() && self.max_wait.is_none() {
            return Err("export polling needs max_poll_attempts or max_wait".into());
        }
        if self.max_wait.is_some_and(|w| w < self.poll_interval) {
            return Err("export.max_wait must be at least export.poll_interval".into());
        }
        if self.request_timeout.is_zero() {
            return Err("export.request_timeout must be > 0".into());
        }
        Ok(())
    }
}
