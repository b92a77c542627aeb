//! Cron scheduler for the lab report cycle.
//!
//! Fires the cycle on a cron expression evaluated in UTC. At most one cycle
//! runs at a time: a tick that finds a cycle still running is skipped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use croner::Cron;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::ScheduleConfig;
use crate::workflow::{CycleOutcome, CycleRunner};

/// Tracks whether a cycle is in progress.
#[derive(Debug, Clone, Default)]
pub struct RunGate {
    busy: Arc<AtomicBool>,
}

impl RunGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the gate, or returns `None` if a cycle is already running.
    pub fn try_enter(&self) -> Option<RunPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunPermit {
                busy: Arc::clone(&self.busy),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the gate when dropped, also on panic or cancellation.
#[derive(Debug)]
pub struct RunPermit {
    busy: Arc<AtomicBool>,
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

pub struct CronScheduler {
    cron: Cron,
    expression: String,
    run_on_startup: bool,
    runner: Arc<dyn CycleRunner>,
    gate: RunGate,
}

impl CronScheduler {
    /// Creates a scheduler; fails on an invalid cron expression.
    pub fn new(config: &ScheduleConfig, runner: Arc<dyn CycleRunner>) -> Result<Self, String> {
        let cron = Cron::new(&config.cron)
            .parse()
            .map_err(|e| format!("invalid cron expression '{}': {e}", config.cron))?;
        Ok(Self {
            cron,
            expression: config.cron.clone(),
            run_on_startup: config.run_on_startup,
            runner,
            gate: RunGate::new(),
        })
    }

    pub fn gate(&self) -> &RunGate {
        &self.gate
    }

    /// Next scheduled time strictly after `after`.
    pub fn next_run_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.cron.find_next_occurrence(&after, false).ok()
    }

    /// Starts a cycle in its own task unless one is already running.
    pub fn trigger(&self) -> Option<JoinHandle<()>> {
        let Some(permit) = self.gate.try_enter() else {
            warn!("Previous lab report cycle still running; skipping this tick");
            return None;
        };
        let runner = Arc::clone(&self.runner);
        Some(tokio::spawn(async move {
            let _permit = permit;
            run_and_log(runner.as_ref()).await;
        }))
    }

    /// Start the scheduler in a background task.
    ///
    /// Returns a shutdown sender that can be used to stop the scheduler, and
    /// the handle of the scheduling loop.
    pub fn start(self) -> (watch::Sender<bool>, JoinHandle<()>) {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            info!(cron = %self.expression, "Cron scheduler started");

            if self.run_on_startup {
                self.trigger();
            }

            let mut last_fire: Option<DateTime<Utc>> = None;
            loop {
                let now = Utc::now();
                let after = last_fire.map_or(now, |last| last.max(now));
                let Some(next) = self.next_run_after(after) else {
                    error!(cron = %self.expression, "Cron expression has no future occurrence");
                    break;
                };
                let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                info!(next_run = %next, "Next lab report cycle scheduled");

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {
                        last_fire = Some(next);
                        self.trigger();
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            if self.gate.is_busy() {
                                warn!("Shutting down with a lab report cycle in progress");
                            }
                            info!("Cron scheduler shutting down");
                            break;
                        }
                    }
                }
            }
        });

        (shutdown_tx, handle)
    }
}

async fn run_and_log(runner: &dyn CycleRunner) {
    let started = std::time::Instant::now();
    match runner.run_cycle().await {
        Ok(CycleOutcome::Sent {
            patients,
            observations,
            abnormal,
        }) => info!(
            patients,
            observations,
            abnormal,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Lab report cycle completed"
        ),
        Ok(CycleOutcome::Skipped(reason)) => {
            warn!(reason = %reason, "Lab report cycle skipped")
        }
        Err(e) => error!(
            category = %e.category(),
            error = %e,
            "Lab report cycle failed"
        ),
    }
}
