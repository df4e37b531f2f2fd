//! SMTP mail transport via `lettre` with TLS support.
//!
//! Sends report emails through an SMTP server. Supports STARTTLS and
//! implicit TLS connections; credentials are resolved from the
//! `SMTP_USERNAME` and `SMTP_PASSWORD` environment variables.

use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use cdrstats_core::SmtpConfig;

use crate::traits::{EmailMessage, MailTransport, NotifyError};

/// Sends report emails via SMTP.
pub struct SmtpMailTransport {
    /// Async SMTP transport for sending emails.
    transport: AsyncSmtpTransport<Tokio1Executor>,
    /// Sender mailbox.
    from: Mailbox,
}

impl SmtpMailTransport {
    /// Build a transport from SMTP configuration.
    ///
    /// Port 465 always uses implicit TLS; other ports use STARTTLS when
    /// TLS is enabled and a plain connection otherwise.
    pub fn from_config(config: &SmtpConfig) -> Result<Self, NotifyError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::Config(e.to_string()))?;

        let mut builder = if config.port == 465 || config.tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| NotifyError::Config(e.to_string()))?
                .port(config.port)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host).port(config.port)
        };

        // Attach credentials from environment if available.
        if let (Ok(username), Ok(password)) =
            (std::env::var("SMTP_USERNAME"), std::env::var("SMTP_PASSWORD"))
        {
            builder = builder.credentials(Credentials::new(username, password));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    async fn build_message(&self, message: &EmailMessage) -> Result<Message, NotifyError> {
        let mut builder = Message::builder().from(self.from.clone());

        for recipient in &message.to {
            let mailbox: Mailbox = recipient
                .parse()
                .map_err(|e: lettre::address::AddressError| NotifyError::Config(e.to_string()))?;
            builder = builder.to(mailbox);
        }

        let html = SinglePart::builder()
            .header(ContentType::TEXT_HTML)
            .body(message.html_body.clone());

        let mut multipart = MultiPart::mixed().singlepart(html);
        for path in &message.attachment_paths {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| NotifyError::Attachment(format!("{path}: {e}")))?;
            let file_name = std::path::Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.clone());
            let content_type = ContentType::parse("application/octet-stream")
                .map_err(|e| NotifyError::Attachment(e.to_string()))?;
            multipart = multipart.singlepart(Attachment::new(file_name).body(bytes, content_type));
        }

        builder
            .subject(&message.subject)
            .multipart(multipart)
            .map_err(|e| NotifyError::smtp(e.to_string()))
    }
}

#[async_trait::async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        let email = self.build_message(message).await?;

        let response = self
            .transport
            .send(email)
            .await
            .map_err(|e| NotifyError::Smtp {
                message: e.to_string(),
                code: e.status().map(|s| s.to_string()),
            })?;

        tracing::debug!(
            recipients = message.to.len(),
            subject = %message.subject,
            code = %response.code(),
            "email accepted by transport"
        );

        Ok(())
    }
}
