pub mod email;

use async_trait::async_trait;

use crate::error::NotificationError;
use crate::report::ReportMessage;

/// Result of delivering a report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResult {
    /// Transport-level identifier or server response, if any.
    pub external_id: Option<String>,
}

/// Delivers composed reports
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &ReportMessage) -> Result<SendResult, NotificationError>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

pub use email::{EmailAdapter, EmailConfig};
