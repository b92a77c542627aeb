use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
};
use serde::{Deserialize, Serialize};

use super::{Notifier, SendResult};
use crate::error::NotificationError;
use crate::report::ReportMessage;

/// SMTP settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    #[serde(skip_serializing)]
    pub smtp_password: Option<String>,
    /// Sender mailbox, e.g. `Lab Watch <labs@clinic.example>`.
    pub from: String,
    pub to: Vec<String>,
    /// Upgrade with STARTTLS instead of connecting over implicit TLS.
    pub starttls: bool,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: String::new(),
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            from: String::new(),
            to: Vec::new(),
            starttls: true,
        }
    }
}

impl EmailConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.smtp_host.trim().is_empty() {
            return Err("email.smtp_host must not be empty".into());
        }
        if self.smtp_port == 0 {
            return Err("email.smtp_port must be > 0".into());
        }
        if self.from.parse::<Mailbox>().is_err() {
            return Err(format!("email.from is not a valid mailbox: {}", self.from));
        }
        if self.to.is_empty() {
            return Err("email.to must list at least one recipient".into());
        }
        if let Some(bad) = self.to.iter().find(|to| to.parse::<Mailbox>().is_err()) {
            return Err(format!("email.to contains an invalid mailbox: {bad}"));
        }
        if self.smtp_username.is_some() != self.smtp_password.is_some() {
            return Err("email.smtp_username and email.smtp_password must be set together".into());
        }
        Ok(())
    }
}

/// Sends reports through an SMTP relay
pub struct EmailAdapter {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl EmailAdapter {
    /// Builds the adapter and its SMTP transport. No connection is opened yet.
    pub fn from_config(config: &EmailConfig) -> Result<Self, NotificationError> {
        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| NotificationError::InvalidAddress(format!("Invalid from: {e}")))?;
        let to = config
            .to
            .iter()
            .map(|addr| {
                addr.parse::<Mailbox>()
                    .map_err(|e| NotificationError::InvalidAddress(format!("Invalid to {addr}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if to.is_empty() {
            return Err(NotificationError::InvalidConfig("No recipients".into()));
        }

        let mut mailer_builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        }
        .map_err(|e| NotificationError::InvalidConfig(e.to_string()))?
        .port(config.smtp_port);

        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            mailer_builder =
                mailer_builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            mailer: mailer_builder.build(),
            from,
            to,
        })
    }

    /// Builds the MIME message: HTML with a plain-text alternative.
    pub fn build_message(&self, message: &ReportMessage) -> Result<Message, NotificationError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(message.subject.as_str());
        for to in &self.to {
            builder = builder.to(to.clone());
        }
        builder
            .multipart(MultiPart::alternative_plain_html(
                message.text.clone(),
                message.html.clone(),
            ))
            .map_err(|e| NotificationError::BuildFailed(e.to_string()))
    }
}

#[async_trait]
impl Notifier for EmailAdapter {
    async fn send(&self, message: &ReportMessage) -> Result<SendResult, NotificationError> {
        let email = self.build_message(message)?;

        let response = self
            .mailer
            .send(email)
            .await
            .map_err(|e| NotificationError::SendFailed(e.to_string()))?;

        let external_id: String = response.message().collect::<Vec<_>>().join(" ");
        tracing::info!(
            recipients = self.to.len(),
            subject = %message.subject,
            "Report email sent"
        );
        Ok(SendResult {
            external_id: (!external_id.is_empty()).then_some(external_id),
        })
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}
