// In-memory store implementations
//
// Backing maps sit behind a tokio RwLock; mutable cells (day ledgers,
// credentials) are handed out as Arc<Mutex<_>> so callers serialize per key
// while distinct keys proceed in parallel.

use crate::core::errors::AttendanceError;
use crate::core::models::{
    AttendanceRecord, AuditEntry, BiometricCredential, CredentialSummary, DeviceBindingEvent,
    User,
};
use crate::state::{
    AttendanceStore, AuditFilter, AuditStore, CredentialStore, DayLedger, QueryOrder, UserStore,
};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Users plus their device-binding history, under one lock so reassignment
/// is atomic.
#[derive(Default)]
struct UserTables {
    users: HashMap<String, User>,
    binding_events: HashMap<String, Vec<DeviceBindingEvent>>,
}

#[derive(Default)]
pub struct MemoryUserStore {
    tables: RwLock<UserTables>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl UserStore for MemoryUserStore {
    async fn get(&self, user_id: &str) -> Result<Option<User>, AttendanceError> {
        Ok(self.tables.read().await.users.get(user_id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AttendanceError> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn insert(&self, user: User) -> Result<(), AttendanceError> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(AttendanceError::InvalidInput(
                "email already registered".to_string(),
            ));
        }
        tables.users.insert(user.id.clone(), user);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<User>, AttendanceError> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables.users.values().cloned().collect();
        users.sort_by(|a, b| (a.registered_at, &a.id).cmp(&(b.registered_at, &b.id)));
        Ok(users)
    }

    async fn reassign_device(
        &self,
        target_user_id: &str,
        new_device_id: &str,
        changed_by: &str,
        at: DateTime<Utc>,
    ) -> Result<DeviceBindingEvent, AttendanceError> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(target_user_id)
            .ok_or_else(|| AttendanceError::NotFound("user".to_string()))?;

        let event = DeviceBindingEvent {
            user_id: target_user_id.to_string(),
            old_device_id: user.registered_device_id.clone(),
            new_device_id: new_device_id.to_string(),
            changed_by: changed_by.to_string(),
            timestamp: at,
        };
        user.registered_device_id = new_device_id.to_string();
        tables
            .binding_events
            .entry(target_user_id.to_string())
            .or_default()
            .push(event.clone());
        Ok(event)
    }

    async fn binding_history(
        &self,
        user_id: &str,
    ) -> Result<Vec<DeviceBindingEvent>, AttendanceError> {
        let tables = self.tables.read().await;
        let mut events = tables
            .binding_events
            .get(user_id)
            .cloned()
            .unwrap_or_default();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(events)
    }
}

#[derive(Default)]
pub struct MemoryAttendanceStore {
    days: RwLock<HashMap<(String, NaiveDate), Arc<Mutex<DayLedger>>>>,
}

impl MemoryAttendanceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl AttendanceStore for MemoryAttendanceStore {
    async fn day_ledger(
        &self,
        user_id: &str,
        day: NaiveDate,
    ) -> Result<Arc<Mutex<DayLedger>>, AttendanceError> {
        let key = (user_id.to_string(), day);
        if let Some(cell) = self.days.read().await.get(&key) {
            return Ok(Arc::clone(cell));
        }
        let mut days = self.days.write().await;
        Ok(Arc::clone(
            days.entry(key).or_insert_with(Default::default),
        ))
    }

    async fn records_for_day(
        &self,
        user_id: &str,
        day: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        let key = (user_id.to_string(), day);
        let cell = match self.days.read().await.get(&key) {
            Some(cell) => Arc::clone(cell),
            None => return Ok(Vec::new()),
        };
        let ledger = cell.lock().await;
        Ok(ledger.records.clone())
    }

    async fn records_for_month(
        &self,
        user_id: &str,
        year: i32,
        month: u32,
    ) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        let cells: Vec<Arc<Mutex<DayLedger>>> = {
            let days = self.days.read().await;
            let mut keyed: Vec<(&(String, NaiveDate), &Arc<Mutex<DayLedger>>)> = days
                .iter()
                .filter(|((uid, day), _)| {
                    uid == user_id && day.year() == year && day.month() == month
                })
                .collect();
            keyed.sort_by_key(|((_, day), _)| *day);
            keyed.into_iter().map(|(_, cell)| Arc::clone(cell)).collect()
        };

        let mut records = Vec::new();
        for cell in cells {
            let ledger = cell.lock().await;
            records.extend(ledger.records.iter().cloned());
        }
        Ok(records)
    }
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    credentials: RwLock<HashMap<(String, String), Arc<Mutex<BiometricCredential>>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn insert(&self, credential: BiometricCredential) -> Result<(), AttendanceError> {
        let key = (
            credential.user_id.clone(),
            credential.credential_id.clone(),
        );
        self.credentials
            .write()
            .await
            .insert(key, Arc::new(Mutex::new(credential)));
        Ok(())
    }

    async fn entry(
        &self,
        user_id: &str,
        credential_id: &str,
    ) -> Result<Option<Arc<Mutex<BiometricCredential>>>, AttendanceError> {
        let key = (user_id.to_string(), credential_id.to_string());
        Ok(self.credentials.read().await.get(&key).map(Arc::clone))
    }

    async fn remove(&self, user_id: &str, credential_id: &str) -> Result<bool, AttendanceError> {
        let key = (user_id.to_string(), credential_id.to_string());
        Ok(self.credentials.write().await.remove(&key).is_some())
    }

    async fn list(&self, user_id: &str) -> Result<Vec<CredentialSummary>, AttendanceError> {
        let cells: Vec<Arc<Mutex<BiometricCredential>>> = self
            .credentials
            .read()
            .await
            .iter()
            .filter(|((uid, _), _)| uid == user_id)
            .map(|(_, cell)| Arc::clone(cell))
            .collect();

        let mut summaries = Vec::with_capacity(cells.len());
        for cell in cells {
            let cred = cell.lock().await;
            summaries.push(CredentialSummary::from(&*cred));
        }
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(summaries)
    }
}

#[derive(Default)]
pub struct MemoryAuditStore {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append(&self, entry: AuditEntry) -> Result<(), AttendanceError> {
        self.entries.lock().await.push(entry);
        Ok(())
    }

    async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditEntry>, AttendanceError> {
        let entries = self.entries.lock().await;
        let mut matched: Vec<AuditEntry> = entries
            .iter()
            .filter(|e| {
                filter
                    .user_id
                    .as_ref()
                    .map_or(true, |uid| &e.user_id == uid)
                    && filter.event_type.map_or(true, |t| e.event_type == t)
                    && filter.from.map_or(true, |from| e.timestamp >= from)
                    && filter.to.map_or(true, |to| e.timestamp <= to)
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| (a.timestamp, a.seq).cmp(&(b.timestamp, b.seq)));
        if filter.order == QueryOrder::Descending {
            matched.reverse();
        }
        Ok(matched)
    }
}
