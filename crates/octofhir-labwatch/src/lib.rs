pub mod cli;
pub mod config;
pub mod observability;
pub mod scheduler;
pub mod server;
pub mod workflow;

pub use config::AppConfig;
pub use scheduler::{CronScheduler, RunGate};
pub use workflow::{CycleOutcome, CycleRunner, LabReportJob, SkipReason, WorkflowError};
