//! Upstream store seams.
//!
//! The pipeline reads call records, breaks, holiday rules, and directory
//! data through these traits. Production deployments back them with the
//! telephony platform's stores; the in-memory implementations here serve
//! tests and the demo wiring in the worker binary. Results are translated
//! to typed records at this boundary — nothing downstream touches raw
//! documents.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use cdrstats_core::{
    BreakInterval, CallRecord, Department, HolidayRule, Operator,
};

use crate::error::ReportError;

// ── Traits ──────────────────────────────────────────────────────────

/// Read-only access to resolved call records.
#[async_trait]
pub trait CallRecordStore: Send + Sync {
    /// Records whose origination falls in `[start, end)`.
    async fn by_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CallRecord>, ReportError>;

    /// Records in `[start, end)` where `number` was a party
    /// (calling, originally dialed, or final).
    async fn by_party(
        &self,
        number: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CallRecord>, ReportError>;
}

/// Read-only access to agent break intervals.
#[async_trait]
pub trait BreakStore: Send + Sync {
    /// Intervals overlapping `[start, end)`: `start < end` and effective
    /// end past the window start. Intervals without an effective end are
    /// not returned.
    async fn overlapping(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BreakInterval>, ReportError>;
}

/// Read-only access to holiday calendar rules.
#[async_trait]
pub trait HolidayStore: Send + Sync {
    /// All active rules.
    async fn active_rules(&self) -> Result<Vec<HolidayRule>, ReportError>;
}

/// Read-only access to the agent/department directory.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn operators(&self) -> Result<Vec<Operator>, ReportError>;
    async fn departments(&self) -> Result<Vec<Department>, ReportError>;

    /// Email addresses of operators flagged as report admins.
    async fn admin_emails(&self) -> Result<Vec<String>, ReportError>;
}

// ── In-memory implementations ───────────────────────────────────────

/// In-memory call record store.
#[derive(Default)]
pub struct MemoryCallRecordStore {
    records: RwLock<Vec<CallRecord>>,
}

impl MemoryCallRecordStore {
    pub fn new(records: Vec<CallRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    pub async fn push(&self, record: CallRecord) {
        self.records.write().await.push(record);
    }
}

#[async_trait]
impl CallRecordStore for MemoryCallRecordStore {
    async fn by_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CallRecord>, ReportError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.origination >= start && r.origination < end)
            .cloned()
            .collect())
    }

    async fn by_party(
        &self,
        number: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CallRecord>, ReportError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.origination >= start && r.origination < end)
            .filter(|r| {
                r.calling_number == number
                    || r.original_called_number == number
                    || r.final_called_number == number
            })
            .cloned()
            .collect())
    }
}

/// In-memory break store. Enforces the one-open-interval-per-kind rule on
/// insert.
#[derive(Default)]
pub struct MemoryBreakStore {
    breaks: RwLock<Vec<BreakInterval>>,
}

impl MemoryBreakStore {
    pub fn new(breaks: Vec<BreakInterval>) -> Self {
        Self {
            breaks: RwLock::new(breaks),
        }
    }

    /// Insert a break, rejecting a second open interval of the same kind
    /// for the same agent.
    pub async fn start_break(&self, interval: BreakInterval) -> Result<(), ReportError> {
        let mut breaks = self.breaks.write().await;
        let has_open = breaks.iter().any(|b| {
            b.agent_id == interval.agent_id && b.kind == interval.kind && b.is_open()
        });
        if interval.is_open() && has_open {
            return Err(ReportError::Store(format!(
                "agent {} already has an open {} interval",
                interval.agent_id, interval.kind
            )));
        }
        breaks.push(interval);
        Ok(())
    }
}

#[async_trait]
impl BreakStore for MemoryBreakStore {
    async fn overlapping(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BreakInterval>, ReportError> {
        Ok(self
            .breaks
            .read()
            .await
            .iter()
            .filter(|b| match b.effective_end() {
                Some(effective_end) => b.start < end && effective_end > start,
                None => false,
            })
            .cloned()
            .collect())
    }
}

/// In-memory holiday store.
#[derive(Default)]
pub struct MemoryHolidayStore {
    rules: RwLock<Vec<HolidayRule>>,
}

impl MemoryHolidayStore {
    pub fn new(rules: Vec<HolidayRule>) -> Self {
        Self {
            rules: RwLock::new(rules),
        }
    }
}

#[async_trait]
impl HolidayStore for MemoryHolidayStore {
    async fn active_rules(&self) -> Result<Vec<HolidayRule>, ReportError> {
        Ok(self
            .rules
            .read()
            .await
            .iter()
            .filter(|r| r.active)
            .cloned()
            .collect())
    }
}

/// In-memory directory store.
#[derive(Default)]
pub struct MemoryDirectoryStore {
    operators: RwLock<Vec<Operator>>,
    departments: RwLock<Vec<Department>>,
}

impl MemoryDirectoryStore {
    pub fn new(operators: Vec<Operator>, departments: Vec<Department>) -> Self {
        Self {
            operators: RwLock::new(operators),
            departments: RwLock::new(departments),
        }
    }
}

#[async_trait]
impl DirectoryStore for MemoryDirectoryStore {
    async fn operators(&self) -> Result<Vec<Operator>, ReportError> {
        Ok(self.operators.read().await.clone())
    }

    async fn departments(&self) -> Result<Vec<Department>, ReportError> {
        Ok(self.departments.read().await.clone())
    }

    async fn admin_emails(&self) -> Result<Vec<String>, ReportError> {
        Ok(self
            .operators
            .read()
            .await
            .iter()
            .filter(|o| o.is_admin)
            .filter_map(|o| o.email.clone())
            .collect())
    }
}

/// Bundle of upstream stores handed to the orchestrator.
#[derive(Clone)]
pub struct Stores {
    pub calls: Arc<dyn CallRecordStore>,
    pub breaks: Arc<dyn BreakStore>,
    pub holidays: Arc<dyn HolidayStore>,
    pub directory: Arc<dyn DirectoryStore>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdrstats_core::{BreakKind, CallDirection};
    use chrono::TimeZone;

    fn t(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    fn record(origination: DateTime<Utc>) -> CallRecord {
        CallRecord {
            direction: CallDirection::Incoming,
            calling_number: "05321112233".to_string(),
            original_called_number: "1001".to_string(),
            final_called_number: "1001".to_string(),
            origination,
            connect: None,
            duration_secs: 0,
        }
    }

    #[tokio::test]
    async fn call_store_range_is_half_open() {
        let store = MemoryCallRecordStore::new(vec![
            record(t(9, 0)),
            record(t(12, 0)), // exactly at end — excluded
        ]);
        let records = store.by_range(t(9, 0), t(12, 0)).await.unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn call_store_by_party_matches_any_side() {
        let mut by_caller = record(t(9, 0));
        by_caller.calling_number = "1001".to_string();
        by_caller.original_called_number = "9000".to_string();
        by_caller.final_called_number = "9000".to_string();
        let store = MemoryCallRecordStore::new(vec![by_caller, record(t(10, 0))]);

        let records = store.by_party("1001", t(8, 0), t(12, 0)).await.unwrap();
        assert_eq!(records.len(), 2);
        let none = store.by_party("7777", t(8, 0), t(12, 0)).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn break_store_excludes_rows_without_effective_end() {
        let legacy = BreakInterval {
            agent_id: "a1".to_string(),
            start: t(9, 0),
            end: None,
            planned_end: None,
            reason: None,
            kind: BreakKind::Break,
        };
        let store = MemoryBreakStore::new(vec![legacy]);
        let rows = store.overlapping(t(8, 0), t(12, 0)).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn break_store_rejects_second_open_interval_of_same_kind() {
        let store = MemoryBreakStore::default();
        let open = |kind: BreakKind| BreakInterval {
            agent_id: "a1".to_string(),
            start: t(9, 0),
            end: None,
            planned_end: Some(t(9, 30)),
            reason: None,
            kind,
        };
        store.start_break(open(BreakKind::Break)).await.unwrap();
        // A second open Break is rejected; an open EndOfShift is fine.
        assert!(store.start_break(open(BreakKind::Break)).await.is_err());
        store.start_break(open(BreakKind::EndOfShift)).await.unwrap();
    }

    #[tokio::test]
    async fn directory_admin_emails_require_flag_and_address() {
        let operators = vec![
            Operator {
                id: "u1".to_string(),
                name: "A".to_string(),
                phone_number: "1001".to_string(),
                department_id: None,
                email: Some("a@example.com".to_string()),
                is_admin: true,
            },
            Operator {
                id: "u2".to_string(),
                name: "B".to_string(),
                phone_number: "1002".to_string(),
                department_id: None,
                email: None,
                is_admin: true,
            },
            Operator {
                id: "u3".to_string(),
                name: "C".to_string(),
                phone_number: "1003".to_string(),
                department_id: None,
                email: Some("c@example.com".to_string()),
                is_admin: false,
            },
        ];
        let store = MemoryDirectoryStore::new(operators, vec![]);
        assert_eq!(store.admin_emails().await.unwrap(), vec!["a@example.com"]);
    }
}
