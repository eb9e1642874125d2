// Domain models shared across the attendance core

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Role attached to a verified identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Employee,
}

/// A registered user. Immutable except for `registered_device_id`,
/// which only changes through an admin reassignment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub department: String,
    pub role: Role,
    pub registered_device_id: String,
    #[serde(skip_serializing)]
    pub password_digest: String,
    pub registered_at: DateTime<Utc>,
}

/// Public projection of a user, safe to return to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub department: String,
    pub role: Role,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            department: user.department.clone(),
            role: user.role,
        }
    }
}

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

/// Kind of attendance event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckKind {
    CheckIn,
    CheckOut,
}

/// One attendance event. Never mutated after creation.
///
/// `seq` is a per-(user, day) monotonic sequence assigned under the day
/// ledger lock; record ordering must never depend on storage-layer
/// incidental ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub user_id: String,
    pub day: NaiveDate,
    pub seq: u64,
    pub kind: CheckKind,
    pub timestamp: DateTime<Utc>,
    pub location: Coordinate,
    pub device_id: String,
    pub verified: bool,
}

/// Per-(user, day) state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DayState {
    #[default]
    AwaitingCheckIn,
    AwaitingCheckOut,
}

/// Aggregated attendance statistics for one calendar month.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySummary {
    pub total_days_present: usize,
    pub check_in_count: usize,
    pub check_out_count: usize,
}

/// Immutable record of an admin device reassignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceBindingEvent {
    pub user_id: String,
    pub old_device_id: String,
    pub new_device_id: String,
    pub changed_by: String,
    pub timestamp: DateTime<Utc>,
}

/// Kind of enrolled biometric credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialKind {
    Fingerprint,
    FaceId,
    PlatformKey,
}

/// An enrolled biometric credential. `attempts`, `locked`, `lock_until`
/// and `last_used` are mutated by every verification attempt under the
/// per-credential lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiometricCredential {
    pub credential_id: String,
    pub user_id: String,
    pub public_key_material: String,
    pub kind: CredentialKind,
    pub attempts: u32,
    pub locked: bool,
    pub lock_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
}

/// Client-facing view of an enrolled credential. Key material never leaves
/// the vault.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSummary {
    pub id: String,
    pub kind: CredentialKind,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
    pub locked: bool,
}

impl From<&BiometricCredential> for CredentialSummary {
    fn from(cred: &BiometricCredential) -> Self {
        Self {
            id: cred.credential_id.clone(),
            kind: cred.kind,
            created_at: cred.created_at,
            last_used: cred.last_used,
            locked: cred.locked,
        }
    }
}

/// A WebAuthn-style assertion, passed through to the injected verifier.
/// The core owns the surrounding lifecycle, not the cryptography.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assertion {
    pub authenticator_data: String,
    pub client_data_json: String,
    pub signature: String,
}

/// Security-relevant event types recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    CheckIn,
    CheckOut,
    DeviceMismatch,
    DeviceReassigned,
    BiometricRegistered,
    BiometricVerificationSuccess,
    BiometricVerificationFailed,
    BiometricRevoked,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::CheckIn => "CHECK_IN",
            AuditEventType::CheckOut => "CHECK_OUT",
            AuditEventType::DeviceMismatch => "DEVICE_MISMATCH",
            AuditEventType::DeviceReassigned => "DEVICE_REASSIGNED",
            AuditEventType::BiometricRegistered => "BIOMETRIC_REGISTERED",
            AuditEventType::BiometricVerificationSuccess => "BIOMETRIC_VERIFICATION_SUCCESS",
            AuditEventType::BiometricVerificationFailed => "BIOMETRIC_VERIFICATION_FAILED",
            AuditEventType::BiometricRevoked => "BIOMETRIC_REVOKED",
        }
    }
}

/// One append-only audit entry. `seq` is a process-wide monotonic counter
/// used as a tiebreak when timestamps collide.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub seq: u64,
    pub user_id: String,
    pub event_type: AuditEventType,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Sliding-log admission policy for one protected operation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RatePolicy {
    pub max_requests: u32,
    pub window_secs: u64,
}

/// Check that a string has UUIDv4 shape (version 4, RFC 4122 variant).
pub fn is_uuid_v4(candidate: &str) -> bool {
    match uuid::Uuid::parse_str(candidate) {
        Ok(parsed) => parsed.get_version_num() == 4,
        Err(_) => false,
    }
}
