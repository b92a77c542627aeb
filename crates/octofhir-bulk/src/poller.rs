//! Export status polling.
//!
//! A kicked-off export is `Pending` until its status location answers 200
//! with the manifest (`Complete`) or something goes wrong (`Failed`). The
//! poller probes on a fixed interval, the first probe one interval after the
//! kickoff, and gives up once its attempt or time budget is spent.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, MissedTickBehavior};
use url::Url;

use crate::error::{BulkError, BulkResult};
use crate::manifest::ExportManifest;

/// Outcome of a single status check.
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus {
    /// Still running. `progress` carries the `X-Progress` header.
    Pending { progress: Option<String> },
    /// Finished with the given manifest.
    Complete(ExportManifest),
}

/// Performs one status check against a job's status location.
///
/// Any error is terminal for the job.
#[async_trait]
pub trait StatusProbe: Send + Sync {
    async fn check_status(&self, location: &Url) -> BulkResult<PollStatus>;
}

/// How often and how long to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: Option<u32>,
    pub max_wait: Option<Duration>,
}

impl PollPolicy {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
            max_wait: None,
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    #[must_use]
    pub fn with_max_wait(mut self, wait: Duration) -> Self {
        self.max_wait = Some(wait);
        self
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(10)).with_max_wait(Duration::from_secs(2 * 60 * 60))
    }
}

#[derive(Debug, Clone)]
pub struct ExportPoller {
    policy: PollPolicy,
}

impl ExportPoller {
    pub fn new(policy: PollPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Polls `location` until the job completes, fails or runs out of budget.
    ///
    /// # Errors
    ///
    /// - any error returned by the probe, unchanged
    /// - `BulkError::PollExhausted` when the budget is spent
    pub async fn wait_for_completion<P>(&self, probe: &P, location: &Url) -> BulkResult<ExportManifest>
    where
        P: StatusProbe + ?Sized,
    {
        let interval = self.policy.interval;
        let started = Instant::now();
        let mut ticker = tokio::time::interval_at(started + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut attempts: u32 = 0;
        loop {
            ticker.tick().await;
            attempts += 1;

            match probe.check_status(location).await {
                Ok(PollStatus::Complete(manifest)) => {
                    tracing::info!(
                        attempts,
                        outputs = manifest.output.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Export complete"
                    );
                    return Ok(manifest);
                }
                Ok(PollStatus::Pending { progress }) => {
                    tracing::info!(
                        attempts,
                        progress = progress.as_deref().unwrap_or("unknown"),
                        "Export in progress"
                    );
                }
                Err(e) => {
                    tracing::warn!(attempts, error = %e, "Export status check failed");
                    return Err(e);
                }
            }

            let elapsed = started.elapsed();
            let out_of_attempts = self.policy.max_attempts.is_some_and(|max| attempts >= max);
            let out_of_time = self
                .policy
                .max_wait
                .is_some_and(|max| elapsed + interval > max);
            if out_of_attempts || out_of_time {
                tracing::warn!(
                    attempts,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Giving up on export"
                );
                return Err(BulkError::PollExhausted { attempts, elapsed });
            }
        }
    }
}
