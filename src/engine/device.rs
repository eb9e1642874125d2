// Device binding enforcement and admin reassignment

use crate::core::errors::AttendanceError;
use crate::core::models::{is_uuid_v4, AuditEventType, DeviceBindingEvent, Role};
use crate::engine::audit::AuditLog;
use crate::state::UserStore;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

/// Enforces that attendance writes come from the user's one registered
/// device. The binding only changes through `reassign`, which is
/// admin-gated and always leaves a DeviceBindingEvent behind.
pub struct DeviceBindingGuard {
    users: Arc<dyn UserStore>,
    audit: Arc<AuditLog>,
}

impl DeviceBindingGuard {
    pub fn new(users: Arc<dyn UserStore>, audit: Arc<AuditLog>) -> Self {
        Self { users, audit }
    }

    /// True iff `candidate_device_id` equals the user's registered device.
    /// Read-only; callers decide what a mismatch means.
    pub async fn validate(
        &self,
        user_id: &str,
        candidate_device_id: &str,
    ) -> Result<bool, AttendanceError> {
        let user = self
            .users
            .get(user_id)
            .await?
            .ok_or_else(|| AttendanceError::NotFound("user".to_string()))?;
        Ok(user.registered_device_id == candidate_device_id)
    }

    /// Admin-only rebinding. The device update and the binding event land
    /// atomically in the user store; the audit entry follows.
    pub async fn reassign(
        &self,
        actor_id: &str,
        target_user_id: &str,
        new_device_id: &str,
    ) -> Result<DeviceBindingEvent, AttendanceError> {
        let actor = self
            .users
            .get(actor_id)
            .await?
            .ok_or_else(|| AttendanceError::NotFound("user".to_string()))?;
        if actor.role != Role::Admin {
            return Err(AttendanceError::Forbidden(
                "device reassignment requires admin role".to_string(),
            ));
        }
        if !is_uuid_v4(new_device_id) {
            return Err(AttendanceError::InvalidInput(
                "device id must be a UUIDv4".to_string(),
            ));
        }
        if self.users.get(target_user_id).await?.is_none() {
            return Err(AttendanceError::NotFound("user".to_string()));
        }

        let event = self
            .users
            .reassign_device(target_user_id, new_device_id, actor_id, Utc::now())
            .await?;

        self.audit
            .record(
                target_user_id,
                AuditEventType::DeviceReassigned,
                json!({
                    "oldDeviceId": event.old_device_id,
                    "newDeviceId": event.new_device_id,
                    "changedBy": actor_id,
                }),
            )
            .await?;
        Ok(event)
    }

    /// Reassignment events for one user, newest first.
    pub async fn history(
        &self,
        target_user_id: &str,
    ) -> Result<Vec<DeviceBindingEvent>, AttendanceError> {
        if self.users.get(target_user_id).await?.is_none() {
            return Err(AttendanceError::NotFound("user".to_string()));
        }
        self.users.binding_history(target_user_id).await
    }
}
