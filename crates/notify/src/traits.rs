//! Mail transport trait definition and shared error types.

/// Errors that can occur during email delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("SMTP delivery failed: {message}")]
    Smtp {
        message: String,
        /// Transport status code when the server supplied one.
        code: Option<String>,
    },

    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Attachment error: {0}")]
    Attachment(String),
}

impl NotifyError {
    pub fn smtp(message: impl Into<String>) -> Self {
        NotifyError::Smtp {
            message: message.into(),
            code: None,
        }
    }

    /// Transport status code, if the failure carried one.
    pub fn smtp_code(&self) -> Option<&str> {
        match self {
            NotifyError::Smtp { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// One outbound email ready for the transport.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub html_body: String,
    /// Paths of files to attach.
    pub attachment_paths: Vec<String>,
}

/// Trait for mail transport implementations.
#[async_trait::async_trait]
pub trait MailTransport: Send + Sync {
    /// Deliver one message. Succeeds or returns a transport error; partial
    /// delivery within a single message is not modeled.
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smtp_error_carries_optional_code() {
        let with_code = NotifyError::Smtp {
            message: "mailbox unavailable".to_string(),
            code: Some("550".to_string()),
        };
        assert_eq!(with_code.smtp_code(), Some("550"));

        let without = NotifyError::smtp("connection refused");
        assert_eq!(without.smtp_code(), None);
        assert!(without.to_string().contains("connection refused"));
    }

    #[test]
    fn non_smtp_errors_have_no_code() {
        assert_eq!(NotifyError::Template("bad".to_string()).smtp_code(), None);
    }
}
