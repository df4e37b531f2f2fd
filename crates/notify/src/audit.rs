//! Delivery audit persistence seam.

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use cdrstats_core::DeliveryAudit;

use crate::traits::NotifyError;

#[async_trait]
pub trait DeliveryAuditStore: Send + Sync {
    /// Persist a fresh audit row.
    async fn create(&self, audit: DeliveryAudit) -> Result<(), NotifyError>;

    /// Replace an existing row (retries mutate the same row in place).
    async fn update(&self, audit: DeliveryAudit) -> Result<(), NotifyError>;

    /// All rows for one execution, oldest first.
    async fn by_execution(&self, execution_id: Uuid) -> Result<Vec<DeliveryAudit>, NotifyError>;
}

/// RwLock-backed audit store used by tests and the demo wiring.
#[derive(Default)]
pub struct MemoryDeliveryAuditStore {
    audits: RwLock<Vec<DeliveryAudit>>,
}

impl MemoryDeliveryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeliveryAuditStore for MemoryDeliveryAuditStore {
    async fn create(&self, audit: DeliveryAudit) -> Result<(), NotifyError> {
        self.audits.write().await.push(audit);
        Ok(())
    }

    async fn update(&self, audit: DeliveryAudit) -> Result<(), NotifyError> {
        let mut audits = self.audits.write().await;
        match audits.iter_mut().find(|a| a.id == audit.id) {
            Some(existing) => {
                *existing = audit;
                Ok(())
            }
            None => Err(NotifyError::Config(format!(
                "audit row {} does not exist",
                audit.id
            ))),
        }
    }

    async fn by_execution(&self, execution_id: Uuid) -> Result<Vec<DeliveryAudit>, NotifyError> {
        let mut rows: Vec<DeliveryAudit> = self
            .audits
            .read()
            .await
            .iter()
            .filter(|a| a.execution_id == execution_id)
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.created_at);
        Ok(rows)
    }
}
