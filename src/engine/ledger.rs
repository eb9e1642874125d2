// Per-user, per-day attendance state machine

use crate::core::errors::AttendanceError;
use crate::core::geo::Geofence;
use crate::core::models::{
    AttendanceRecord, AuditEventType, CheckKind, Coordinate, DayState, MonthlySummary,
};
use crate::engine::audit::AuditLog;
use crate::engine::device::DeviceBindingGuard;
use crate::state::AttendanceStore;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

/// Orders a user's day as CheckIn, CheckOut, CheckIn, ... and refuses
/// anything else. Every persisted record passed the geofence and device
/// checks at the moment of the request; nothing unverified is ever written.
pub struct AttendanceLedger {
    geofence: Geofence,
    guard: Arc<DeviceBindingGuard>,
    store: Arc<dyn AttendanceStore>,
    audit: Arc<AuditLog>,
}

impl AttendanceLedger {
    pub fn new(
        geofence: Geofence,
        guard: Arc<DeviceBindingGuard>,
        store: Arc<dyn AttendanceStore>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            geofence,
            guard,
            store,
            audit,
        }
    }

    pub async fn check_in(
        &self,
        user_id: &str,
        location: Coordinate,
        device_id: &str,
    ) -> Result<AttendanceRecord, AttendanceError> {
        self.check_at(user_id, location, device_id, CheckKind::CheckIn, Utc::now())
            .await
    }

    pub async fn check_out(
        &self,
        user_id: &str,
        location: Coordinate,
        device_id: &str,
    ) -> Result<AttendanceRecord, AttendanceError> {
        self.check_at(user_id, location, device_id, CheckKind::CheckOut, Utc::now())
            .await
    }

    /// Shared path for both kinds. Check order is fixed: geofence, then
    /// device binding, then the day's state machine under the ledger lock.
    pub async fn check_at(
        &self,
        user_id: &str,
        location: Coordinate,
        device_id: &str,
        kind: CheckKind,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord, AttendanceError> {
        if !self.geofence.contains(&location)? {
            return Err(AttendanceError::OutsideGeofence);
        }

        if !self.guard.validate(user_id, device_id).await? {
            self.audit
                .record_at(
                    user_id,
                    AuditEventType::DeviceMismatch,
                    json!({ "candidateDeviceId": device_id }),
                    now,
                )
                .await?;
            return Err(AttendanceError::DeviceMismatch);
        }

        let day = now.date_naive();
        let cell = self.store.day_ledger(user_id, day).await?;
        let record = {
            let mut ledger = cell.lock().await;
            match (kind, ledger.state) {
                (CheckKind::CheckIn, DayState::AwaitingCheckOut) => {
                    return Err(AttendanceError::AlreadyCheckedIn)
                }
                (CheckKind::CheckOut, DayState::AwaitingCheckIn) => {
                    return Err(AttendanceError::NoOpenCheckIn)
                }
                _ => {}
            }

            let record = AttendanceRecord {
                user_id: user_id.to_string(),
                day,
                seq: ledger.next_seq,
                kind,
                timestamp: now,
                location,
                device_id: device_id.to_string(),
                verified: true,
            };
            ledger.next_seq += 1;
            ledger.records.push(record.clone());
            ledger.state = match kind {
                CheckKind::CheckIn => DayState::AwaitingCheckOut,
                CheckKind::CheckOut => DayState::AwaitingCheckIn,
            };
            record
        };

        let event = match kind {
            CheckKind::CheckIn => AuditEventType::CheckIn,
            CheckKind::CheckOut => AuditEventType::CheckOut,
        };
        self.audit
            .record_at(
                user_id,
                event,
                json!({
                    "day": day,
                    "seq": record.seq,
                    "lat": location.lat,
                    "lng": location.lng,
                }),
                now,
            )
            .await?;
        Ok(record)
    }

    pub async fn records_for_day(
        &self,
        user_id: &str,
        day: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        self.store.records_for_day(user_id, day).await
    }

    /// Records and aggregate counts for one calendar month. A day counts as
    /// present when it has at least one verified record.
    pub async fn monthly_summary(
        &self,
        user_id: &str,
        year: i32,
        month: u32,
    ) -> Result<(MonthlySummary, Vec<AttendanceRecord>), AttendanceError> {
        let records = self.store.records_for_month(user_id, year, month).await?;

        let days_present: HashSet<NaiveDate> = records.iter().map(|r| r.day).collect();
        let check_in_count = records
            .iter()
            .filter(|r| r.kind == CheckKind::CheckIn)
            .count();
        let check_out_count = records.len() - check_in_count;

        let stats = MonthlySummary {
            total_days_present: days_present.len(),
            check_in_count,
            check_out_count,
        };
        Ok((stats, records))
    }
}
