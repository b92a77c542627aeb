//! One lab report cycle.
//!
//! token -> kickoff -> poll -> ingest -> evaluate -> compose -> send
//!
//! Every step runs strictly after the previous one; only the output file
//! downloads run concurrently. Nothing survives the cycle.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use octofhir_auth::{AuthError, KeyStore, TokenExchanger};
use octofhir_bulk::{BulkClient, BulkError, ExportPoller, ExportRequest, ResourceIngester};
use octofhir_labs::evaluate_collection;
use octofhir_notifications::{NotificationError, Notifier, ReportComposer};
use thiserror::Error;
use time::OffsetDateTime;

use crate::config::AppConfig;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Bulk(#[from] BulkError),

    #[error(transparent)]
    Notification(#[from] NotificationError),
}

/// Coarse failure classes used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    Authentication,
    Transport,
    Protocol,
    Delivery,
    Configuration,
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Authentication => "authentication",
            Self::Transport => "transport",
            Self::Protocol => "protocol",
            Self::Delivery => "delivery",
            Self::Configuration => "configuration",
        };
        f.write_str(s)
    }
}

impl WorkflowError {
    pub fn category(&self) -> FailureCategory {
        match self {
            Self::Auth(e) if e.is_authentication_error() => FailureCategory::Authentication,
            Self::Auth(AuthError::Transport { .. }) => FailureCategory::Transport,
            Self::Auth(AuthError::Configuration { .. }) => FailureCategory::Configuration,
            Self::Auth(_) => FailureCategory::Protocol,
            Self::Bulk(e) if e.is_unauthorized() => FailureCategory::Authentication,
            Self::Bulk(e) if e.is_transport() => FailureCategory::Transport,
            Self::Bulk(BulkError::Configuration { .. }) => FailureCategory::Configuration,
            Self::Bulk(_) => FailureCategory::Protocol,
            Self::Notification(
                NotificationError::InvalidConfig(_) | NotificationError::InvalidAddress(_),
            ) => FailureCategory::Configuration,
            Self::Notification(_) => FailureCategory::Delivery,
        }
    }
}

/// How a cycle ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The report went out.
    Sent {
        patients: usize,
        observations: usize,
        abnormal: usize,
    },
    /// The cycle stopped early without a report.
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The kickoff response carried no `Content-Location`.
    NoStatusLocation,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoStatusLocation => f.write_str("export kickoff returned no status location"),
        }
    }
}

/// Something that runs one report cycle.
#[async_trait]
pub trait CycleRunner: Send + Sync + 'static {
    async fn run_cycle(&self) -> Result<CycleOutcome, WorkflowError>;
}

pub struct LabReportJob {
    exchanger: TokenExchanger,
    bulk: BulkClient,
    request: ExportRequest,
    poller: ExportPoller,
    ingester: ResourceIngester,
    composer: ReportComposer,
    notifier: Arc<dyn Notifier>,
}

impl LabReportJob {
    pub fn new(
        exchanger: TokenExchanger,
        bulk: BulkClient,
        request: ExportRequest,
        poller: ExportPoller,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            exchanger,
            bulk,
            request,
            poller,
            ingester: ResourceIngester::new(),
            composer: ReportComposer::new(),
            notifier,
        }
    }

    /// Wires a job from configuration, a loaded key store and a notifier.
    pub fn from_config(
        cfg: &AppConfig,
        key_store: Arc<KeyStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, WorkflowError> {
        let exchanger = TokenExchanger::from_config(&cfg.auth, key_store)?;
        let bulk = BulkClient::from_config(&cfg.export)?;
        Ok(Self::new(
            exchanger,
            bulk,
            ExportRequest::from(&cfg.export),
            ExportPoller::new(cfg.export.poll_policy()),
            notifier,
        ))
    }

    pub async fn run_once(&self) -> Result<CycleOutcome, WorkflowError> {
        let token = self.exchanger.fetch_token().await?;
        let session = self.bulk.session(&token);
        tracing::info!(
            fhir_base = %self.bulk.base_url(),
            group_id = %self.request.group_id,
            "Starting group export"
        );

        let Some(job) = session.kickoff(&self.request).await? else {
            tracing::warn!(
                group_id = %self.request.group_id,
                "Export kickoff returned no Content-Location; skipping report"
            );
            return Ok(CycleOutcome::Skipped(SkipReason::NoStatusLocation));
        };

        let manifest = self.poller.wait_for_completion(&session, &job.location).await?;
        let collection = self.ingester.ingest(&session, &manifest).await?;
        let results = evaluate_collection(&collection);
        let abnormal = results.iter().filter(|r| !r.normal).count();

        let message = self.composer.compose(&results, OffsetDateTime::now_utc())?;
        self.notifier.send(&message).await?;

        tracing::info!(
            notifier = self.notifier.name(),
            observations = results.len(),
            abnormal,
            "Lab report sent"
        );
        Ok(CycleOutcome::Sent {
            patients: collection.patients.len(),
            observations: results.len(),
            abnormal,
        })
    }
}

#[async_trait]
impl CycleRunner for LabReportJob {
    async fn run_cycle(&self) -> Result<CycleOutcome, WorkflowError> {
        self.run_once().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_categories() {
        let auth = WorkflowError::from(AuthError::TokenRequest {
            status: 401,
            body: "invalid_client".into(),
        });
        assert_eq!(auth.category(), FailureCategory::Authentication);

        let transport = WorkflowError::from(BulkError::transport("http://x", "refused"));
        assert_eq!(transport.category(), FailureCategory::Transport);

        let forbidden = WorkflowError::from(BulkError::UnexpectedStatus {
            url: "http://x".into(),
            status: 403,
            message: "forbidden".into(),
        });
        assert_eq!(forbidden.category(), FailureCategory::Authentication);

        let exhausted = WorkflowError::from(BulkError::PollExhausted {
            attempts: 3,
            elapsed: Duration::from_secs(30),
        });
        assert_eq!(exhausted.category(), FailureCategory::Protocol);

        let mail = WorkflowError::from(NotificationError::SendFailed("421".into()));
        assert_eq!(mail.category(), FailureCategory::Delivery);
        assert_eq!(mail.category().to_string(), "delivery");
    }
}
