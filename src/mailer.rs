//! Operator alert emails over authenticated SMTP (STARTTLS).
//!
//! No SMTP server configured means no mailer, which in turn disables the
//! inactivity monitor entirely. Send failures are logged and swallowed; the
//! mail channel is best-effort.

use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::AppSettings;

pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl Mailer {
    /// Returns `None` when `smtp_server` is empty. Bad addresses or an
    /// unusable relay are configuration errors and fatal at startup.
    pub fn from_settings(settings: &AppSettings) -> anyhow::Result<Option<Self>> {
        if settings.smtp_server.trim().is_empty() {
            return Ok(None);
        }

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_server)?
            .port(settings.smtp_port)
            .credentials(Credentials::new(
                settings.smtp_username.clone(),
                settings.smtp_password.clone(),
            ))
            .build();

        let from: Mailbox = settings
            .smtp_from
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid smtp_from '{}': {}", settings.smtp_from, e))?;
        let to: Mailbox = settings
            .smtp_to
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid smtp_to '{}': {}", settings.smtp_to, e))?;

        Ok(Some(Self {
            transport,
            from,
            to,
        }))
    }

    pub async fn send_alert(&self, inactivity_alert_seconds: u64) {
        let minutes = inactivity_alert_seconds as f64 / 60.0;
        let body = format!(
            "More than {} minutes have elapsed without a file being uploaded to S3.\r\n\r\n\
             This alarm will be disabled for the next ten minutes.",
            minutes
        );

        let message = match Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject("S3 Uploader Alert")
            .body(body)
        {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(error = %e, "error building alert email");
                return;
            }
        };

        if let Err(e) = self.transport.send(message).await {
            tracing::error!(error = %e, "error sending email");
        }
    }
}
