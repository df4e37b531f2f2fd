//! Recipient list resolution.
//!
//! The recipient list is role-derived: operators flagged as admins, with
//! invalid addresses and the configured exclusion list filtered out, merged
//! with the configured defaults and de-duplicated case-insensitively. When
//! the directory lookup fails entirely the configured defaults are used —
//! the list is never silently empty without that fallback being attempted.

use async_trait::async_trait;

use cdrstats_core::ReportingConfig;

use crate::traits::NotifyError;

/// Source of role-derived admin email addresses.
#[async_trait]
pub trait RecipientSource: Send + Sync {
    async fn admin_emails(&self) -> Result<Vec<String>, NotifyError>;
}

/// Fixed recipient source for config-only wiring and tests.
pub struct StaticRecipients(pub Vec<String>);

#[async_trait]
impl RecipientSource for StaticRecipients {
    async fn admin_emails(&self) -> Result<Vec<String>, NotifyError> {
        Ok(self.0.clone())
    }
}

/// Minimal address check: one `@` with a non-empty local part and a dotted
/// domain. Anything stricter belongs to the transport.
pub fn is_valid_email(address: &str) -> bool {
    let address = address.trim();
    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !address.contains(char::is_whitespace)
}

fn is_excluded(address: &str, settings: &ReportingConfig) -> bool {
    settings
        .excluded_recipients
        .iter()
        .any(|excluded| excluded.eq_ignore_ascii_case(address))
}

fn push_unique(list: &mut Vec<String>, address: &str) {
    if !list.iter().any(|existing| existing.eq_ignore_ascii_case(address)) {
        list.push(address.to_string());
    }
}

/// Resolve the effective recipient list for a report batch.
pub async fn resolve_recipients(
    source: &dyn RecipientSource,
    settings: &ReportingConfig,
) -> Vec<String> {
    let mut recipients = Vec::new();

    match source.admin_emails().await {
        Ok(addresses) => {
            for address in addresses {
                if is_valid_email(&address) && !is_excluded(&address, settings) {
                    push_unique(&mut recipients, &address);
                }
            }
            // Configured defaults ride along with the role-derived list.
            for address in &settings.default_recipients {
                if is_valid_email(address) && !is_excluded(address, settings) {
                    push_unique(&mut recipients, address);
                }
            }
            tracing::debug!(count = recipients.len(), "resolved report recipients");
        }
        Err(err) => {
            tracing::error!(error = %err, "recipient lookup failed; using configured defaults");
            for address in &settings.default_recipients {
                if is_valid_email(address) && !is_excluded(address, settings) {
                    push_unique(&mut recipients, address);
                }
            }
        }
    }

    recipients
}
