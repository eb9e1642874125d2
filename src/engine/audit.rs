// Append-only audit trail

use crate::core::errors::AttendanceError;
use crate::core::models::{AuditEntry, AuditEventType};
use crate::state::{AuditFilter, AuditStore};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Records security-relevant events. Entries are immutable once appended;
/// there is no update or delete path.
///
/// `seq` is process-wide and monotonic, used as a tiebreak when two entries
/// share a timestamp.
pub struct AuditLog {
    store: Arc<dyn AuditStore>,
    seq: AtomicU64,
}

impl AuditLog {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self {
            store,
            seq: AtomicU64::new(0),
        }
    }

    pub async fn record(
        &self,
        user_id: &str,
        event_type: AuditEventType,
        details: serde_json::Value,
    ) -> Result<(), AttendanceError> {
        self.record_at(user_id, event_type, details, Utc::now()).await
    }

    pub async fn record_at(
        &self,
        user_id: &str,
        event_type: AuditEventType,
        details: serde_json::Value,
        at: DateTime<Utc>,
    ) -> Result<(), AttendanceError> {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        info!(
            target: "audit",
            seq,
            user_id = user_id,
            event = event_type.as_str(),
            "audit event"
        );
        self.store
            .append(AuditEntry {
                seq,
                user_id: user_id.to_string(),
                event_type,
                details,
                timestamp: at,
            })
            .await
    }

    pub async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditEntry>, AttendanceError> {
        self.store.query(filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::memory::MemoryAuditStore;
    use crate::state::QueryOrder;
    use serde_json::json;

    #[tokio::test]
    async fn test_seq_is_monotonic_across_records() {
        let log = AuditLog::new(Arc::new(MemoryAuditStore::new()));
        let now = Utc::now();
        // Same timestamp on purpose; seq must still disambiguate order.
        for _ in 0..4 {
            log.record_at("u1", AuditEventType::CheckIn, json!({}), now)
                .await
                .unwrap();
        }
        let entries = log.query(AuditFilter::default()).await.unwrap();
        assert_eq!(entries.len(), 4);
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(entry.seq, i as u64);
        }
    }

    #[tokio::test]
    async fn test_history_view_descending() {
        let log = AuditLog::new(Arc::new(MemoryAuditStore::new()));
        let now = Utc::now();
        log.record_at("u1", AuditEventType::CheckIn, json!({}), now)
            .await
            .unwrap();
        log.record_at(
            "u1",
            AuditEventType::CheckOut,
            json!({}),
            now + chrono::Duration::hours(8),
        )
        .await
        .unwrap();

        let history = log
            .query(AuditFilter {
                order: QueryOrder::Descending,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(history[0].event_type, AuditEventType::CheckOut);
    }
}
