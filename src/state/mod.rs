// Store abstractions behind the attendance core
//
// The engine components never touch a concrete backing store; they operate
// over these traits so the concurrency discipline (per-key locks) lives with
// the store, not in process-wide singletons.

pub mod memory;

use crate::core::errors::AttendanceError;
use crate::core::models::{
    AttendanceRecord, AuditEntry, AuditEventType, BiometricCredential, CredentialSummary,
    DayState, DeviceBindingEvent, User,
};
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

/// One user's ledger for one day. Always accessed under the per-key mutex
/// handed out by `AttendanceStore::day_ledger`, which is what serializes
/// concurrent check-in/check-out for the same user.
#[derive(Debug, Default)]
pub struct DayLedger {
    pub state: DayState,
    pub records: Vec<AttendanceRecord>,
    pub next_seq: u64,
}

/// User accounts and device-binding history.
///
/// `reassign_device` is a combined operation on purpose: the device update
/// and the binding event must land atomically, so the store owns that
/// transaction boundary.
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<User>, AttendanceError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AttendanceError>;
    async fn insert(&self, user: User) -> Result<(), AttendanceError>;
    /// All registered users, ordered by registration time.
    async fn list(&self) -> Result<Vec<User>, AttendanceError>;
    /// Atomically update the registered device and append the binding event.
    /// Returns the event as stored.
    async fn reassign_device(
        &self,
        target_user_id: &str,
        new_device_id: &str,
        changed_by: &str,
        at: DateTime<Utc>,
    ) -> Result<DeviceBindingEvent, AttendanceError>;
    /// Binding events for one user, newest first.
    async fn binding_history(
        &self,
        user_id: &str,
    ) -> Result<Vec<DeviceBindingEvent>, AttendanceError>;
}

/// Attendance records bucketed by (user, day).
#[async_trait::async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Per-(user, day) ledger cell. Callers lock the returned mutex for the
    /// whole read-check-append sequence; cells for distinct keys never
    /// contend.
    async fn day_ledger(
        &self,
        user_id: &str,
        day: NaiveDate,
    ) -> Result<Arc<Mutex<DayLedger>>, AttendanceError>;
    async fn records_for_day(
        &self,
        user_id: &str,
        day: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, AttendanceError>;
    /// All of a user's records whose day falls in the given calendar month.
    async fn records_for_month(
        &self,
        user_id: &str,
        year: i32,
        month: u32,
    ) -> Result<Vec<AttendanceRecord>, AttendanceError>;
}

/// Enrolled biometric credentials, keyed by (user, credential id).
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn insert(&self, credential: BiometricCredential) -> Result<(), AttendanceError>;
    /// Per-credential cell. The vault locks it across the whole
    /// check-verify-update sequence so attempt counters cannot race.
    async fn entry(
        &self,
        user_id: &str,
        credential_id: &str,
    ) -> Result<Option<Arc<Mutex<BiometricCredential>>>, AttendanceError>;
    /// Returns true if the credential existed and was removed.
    async fn remove(&self, user_id: &str, credential_id: &str) -> Result<bool, AttendanceError>;
    async fn list(&self, user_id: &str) -> Result<Vec<CredentialSummary>, AttendanceError>;
}

/// Ordering for audit queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryOrder {
    #[default]
    Ascending,
    Descending,
}

/// Filter for audit queries. All fields optional; `None` matches everything.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub user_id: Option<String>,
    pub event_type: Option<AuditEventType>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub order: QueryOrder,
}

/// Append-only audit trail. No update or delete operation exists.
#[async_trait::async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: AuditEntry) -> Result<(), AttendanceError>;
    async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditEntry>, AttendanceError>;
}
