pub mod adapters;
pub mod error;
pub mod report;
pub mod templates;

pub use adapters::{EmailAdapter, EmailConfig, Notifier, SendResult};
pub use error::NotificationError;
pub use report::{ReportComposer, ReportMessage, ReportRow, escape_html, format_timestamp};
pub use templates::{RenderedContent, Template, TemplateRenderer};
