//! Report email delivery.
//!
//! This crate provides:
//! - `MailTransport` trait for pluggable SMTP backends
//! - A lettre-based SMTP transport with TLS support
//! - Minijinja rendering of the report email body
//! - A delivery engine with per-recipient retry and audit rows
//! - Recipient resolution with exclusion list and configured fallback

pub mod audit;
pub mod delivery;
pub mod email;
pub mod recipients;
pub mod templating;
pub mod traits;

pub use audit::{DeliveryAuditStore, MemoryDeliveryAuditStore};
pub use delivery::{
    DeliveryEngine, DeliveryPolicy, DeliveryReport, RecipientDeliveryStatus, ReportEmail,
};
pub use email::SmtpMailTransport;
pub use recipients::{is_valid_email, resolve_recipients, RecipientSource, StaticRecipients};
pub use templating::{
    email_subject, format_file_size, format_minutes, render_report_email, EmailBreakRow,
    EmailMetrics, ReportEmailContext,
};
pub use traits::{EmailMessage, MailTransport, NotifyError};
