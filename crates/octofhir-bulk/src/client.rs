//! HTTP client for the Bulk Data endpoints.

use std::time::Duration;

use async_trait::async_trait;
use octofhir_auth::AccessToken;
use reqwest::header::{CONTENT_LOCATION, HeaderMap};
use serde_json::Value;
use url::Url;

use crate::config::ExportConfig;
use crate::error::{BulkError, BulkResult};
use crate::ingest::NdjsonSource;
use crate::manifest::ExportManifest;
use crate::poller::{PollStatus, StatusProbe};

const FHIR_JSON: &str = "application/fhir+json";
const FHIR_NDJSON: &str = "application/fhir+ndjson";
const X_PROGRESS: &str = "x-progress";

/// Parameters of a Group-level export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub group_id: String,
    pub types: Vec<String>,
    pub type_filter: Option<String>,
}

impl ExportRequest {
    pub fn new(group_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            types: Vec::new(),
            type_filter: None,
        }
    }

    #[must_use]
    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_type_filter(mut self, filter: impl Into<String>) -> Self {
        self.type_filter = Some(filter.into());
        self
    }
}

impl From<&ExportConfig> for ExportRequest {
    fn from(config: &ExportConfig) -> Self {
        Self {
            group_id: config.group_id.clone(),
            types: config.types.clone(),
            type_filter: config.type_filter.clone(),
        }
    }
}

/// A kicked-off export, identified by its status location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportJob {
    pub location: Url,
}

pub struct BulkClient {
    http: reqwest::Client,
    base_url: Url,
}

impl BulkClient {
    /// Creates a client for the given FHIR base URL.
    ///
    /// # Errors
    ///
    /// Returns `BulkError::Configuration` if the base URL is not usable.
    pub fn new(http: reqwest::Client, base_url: &str) -> BulkResult<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| BulkError::configuration(format!("Invalid FHIR base URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(BulkError::configuration(format!(
                "FHIR base URL cannot be a base: {base_url}"
            )));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { http, base_url })
    }

    /// Creates a client with the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns `BulkError::Configuration` if the base URL is not usable or the
    /// HTTP client cannot be built.
    pub fn from_config(config: &ExportConfig) -> BulkResult<Self> {
        Self::new(build_http(config.request_timeout)?, &config.fhir_base_url)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Binds the client to a token for one export cycle.
    pub fn session<'a>(&'a self, token: &'a AccessToken) -> BulkSession<'a> {
        BulkSession {
            client: self,
            token,
        }
    }

    /// Builds `{base}/Group/{id}/$export?_type=...&_typeFilter=...`.
    ///
    /// # Errors
    ///
    /// Returns `BulkError::Configuration` if the group id is empty.
    pub fn export_url(&self, request: &ExportRequest) -> BulkResult<Url> {
        if request.group_id.is_empty() {
            return Err(BulkError::configuration("Group id must not be empty"));
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| BulkError::configuration("FHIR base URL cannot be a base"))?
            .pop_if_empty()
            .extend(["Group", request.group_id.as_str(), "$export"]);
        if !request.types.is_empty() || request.type_filter.is_some() {
            let mut query = url.query_pairs_mut();
            if !request.types.is_empty() {
                query.append_pair("_type", &request.types.join(","));
            }
            if let Some(filter) = &request.type_filter {
                query.append_pair("_typeFilter", filter);
            }
        }
        Ok(url)
    }

    /// Starts an asynchronous Group export.
    ///
    /// Returns `None` when the server accepts the request without a
    /// `Content-Location` header.
    ///
    /// # Errors
    ///
    /// - `BulkError::Transport` if the request fails
    /// - `BulkError::UnexpectedStatus` on a non-success status
    /// - `BulkError::InvalidLocation` if `Content-Location` is not a URL
    pub async fn kickoff(
        &self,
        token: &AccessToken,
        request: &ExportRequest,
    ) -> BulkResult<Option<ExportJob>> {
        let url = self.export_url(request)?;
        tracing::info!(url = %url, "Starting bulk export");

        let resp = self
            .http
            .get(url.clone())
            .bearer_auth(token.secret())
            .header("Prefer", "respond-async")
            .header("Accept", FHIR_JSON)
            .send()
            .await
            .map_err(|e| BulkError::transport(url.as_str(), e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(unexpected_status(url.as_str(), resp).await);
        }

        let Some(location) = content_location(resp.headers()) else {
            tracing::warn!(status = status.as_u16(), "Export accepted without Content-Location");
            return Ok(None);
        };
        let location = self
            .base_url
            .join(&location)
            .map_err(|e| BulkError::InvalidLocation {
                location: location.clone(),
                message: e.to_string(),
            })?;

        tracing::info!(status = status.as_u16(), location = %location, "Bulk export accepted");
        Ok(Some(ExportJob { location }))
    }

    /// Performs one status check.
    ///
    /// # Errors
    ///
    /// - `BulkError::Transport` if the request fails
    /// - `BulkError::UnexpectedStatus` on a non-success status
    /// - `BulkError::InvalidManifest` if a 200 body is not a manifest
    pub async fn check_status(&self, token: &AccessToken, location: &Url) -> BulkResult<PollStatus> {
        let resp = self
            .http
            .get(location.clone())
            .bearer_auth(token.secret())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| BulkError::transport(location.as_str(), e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::OK {
            let body = resp
                .text()
                .await
                .map_err(|e| BulkError::transport(location.as_str(), e.to_string()))?;
            let manifest: ExportManifest = serde_json::from_str(&body)
                .map_err(|e| BulkError::invalid_manifest(location.as_str(), e.to_string()))?;
            return Ok(PollStatus::Complete(manifest));
        }
        if status.is_success() {
            let progress = resp
                .headers()
                .get(X_PROGRESS)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            return Ok(PollStatus::Pending { progress });
        }
        Err(unexpected_status(location.as_str(), resp).await)
    }

    /// Downloads one NDJSON output file.
    ///
    /// # Errors
    ///
    /// - `BulkError::Transport` if the request or body read fails
    /// - `BulkError::UnexpectedStatus` on a non-success status
    pub async fn download(&self, token: &AccessToken, url: &str) -> BulkResult<String> {
        let resp = self
            .http
            .get(url)
            .bearer_auth(token.secret())
            .header("Accept", FHIR_NDJSON)
            .send()
            .await
            .map_err(|e| BulkError::transport(url, e.to_string()))?;

        if !resp.status().is_success() {
            return Err(unexpected_status(url, resp).await);
        }
        let body = resp
            .text()
            .await
            .map_err(|e| BulkError::transport(url, e.to_string()))?;
        tracing::debug!(url, bytes = body.len(), "Output file downloaded");
        Ok(body)
    }
}

/// A [`BulkClient`] bound to the access token of one cycle.
#[derive(Clone, Copy)]
pub struct BulkSession<'a> {
    client: &'a BulkClient,
    token: &'a AccessToken,
}

impl BulkSession<'_> {
    pub async fn kickoff(&self, request: &ExportRequest) -> BulkResult<Option<ExportJob>> {
        self.client.kickoff(self.token, request).await
    }
}

#[async_trait]
impl StatusProbe for BulkSession<'_> {
    async fn check_status(&self, location: &Url) -> BulkResult<PollStatus> {
        self.client.check_status(self.token, location).await
    }
}

#[async_trait]
impl NdjsonSource for BulkSession<'_> {
    async fn fetch_ndjson(&self, url: &str) -> BulkResult<String> {
        self.client.download(self.token, url).await
    }
}

fn build_http(timeout: Duration) -> BulkResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| BulkError::configuration(format!("Failed to create HTTP client: {e}")))
}

/// `Content-Location`, looked up case-insensitively.
fn content_location(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CONTENT_LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

async fn unexpected_status(url: &str, resp: reqwest::Response) -> BulkError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    BulkError::UnexpectedStatus {
        url: url.to_string(),
        status,
        message: outcome_diagnostics(&body).unwrap_or(body),
    }
}

/// Joined `diagnostics` of an OperationOutcome body.
fn outcome_diagnostics(body: &str) -> Option<String> {
    let json = serde_json::from_str::<Value>(body).ok()?;
    if json.get("resourceType").and_then(|v| v.as_str()) != Some("OperationOutcome") {
        return None;
    }
    let msgs: Vec<&str> = json
        .get("issue")?
        .as_array()?
        .iter()
        .filter_map(|i| i.get("diagnostics").and_then(|d| d.as_str()))
        .collect();
    (!msgs.is_empty()).then(|| msgs.join("; "))
}
