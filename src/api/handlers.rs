// Request handlers for all endpoints

use crate::api::responses::{ApiError, HealthResponse};
use crate::api::AppState;
use crate::auth::password::{
    hash_password, validate_email, validate_password_strength, verify_password,
};
use crate::auth::token::AuthIdentity;
use crate::core::errors::AttendanceError;
use crate::core::models::{
    is_uuid_v4, Assertion, AttendanceRecord, Coordinate, CredentialKind, CredentialSummary,
    DeviceBindingEvent, MonthlySummary, Role, User, UserProfile,
};
use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, Path, State},
    http::HeaderMap,
    Extension, Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::info;

// ---- Attendance ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRequest {
    pub location: Coordinate,
    pub device_id: String,
}

#[derive(Debug, Serialize)]
pub struct RecordResponse {
    pub record: AttendanceRecord,
}

pub async fn check_in_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthIdentity>,
    Json(body): Json<CheckRequest>,
) -> Result<Json<RecordResponse>, ApiError> {
    let record = state
        .ledger
        .check_in(&identity.user_id, body.location, &body.device_id)
        .await?;
    Ok(Json(RecordResponse { record }))
}

pub async fn check_out_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthIdentity>,
    Json(body): Json<CheckRequest>,
) -> Result<Json<RecordResponse>, ApiError> {
    let record = state
        .ledger
        .check_out(&identity.user_id, body.location, &body.device_id)
        .await?;
    Ok(Json(RecordResponse { record }))
}

#[derive(Debug, Serialize)]
pub struct TodayResponse {
    pub records: Vec<AttendanceRecord>,
}

pub async fn today_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthIdentity>,
) -> Result<Json<TodayResponse>, ApiError> {
    let records = state
        .ledger
        .records_for_day(&identity.user_id, Utc::now().date_naive())
        .await?;
    Ok(Json(TodayResponse { records }))
}

#[derive(Debug, Serialize)]
pub struct MonthResponse {
    pub stats: MonthlySummary,
    pub records: Vec<AttendanceRecord>,
}

pub async fn month_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthIdentity>,
) -> Result<Json<MonthResponse>, ApiError> {
    use chrono::Datelike;
    let today = Utc::now().date_naive();
    let (stats, records) = state
        .ledger
        .monthly_summary(&identity.user_id, today.year(), today.month())
        .await?;
    Ok(Json(MonthResponse { stats, records }))
}

// ---- Admin: device binding ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignRequest {
    pub new_device_id: String,
}

#[derive(Debug, Serialize)]
pub struct ReassignResponse {
    pub event: DeviceBindingEvent,
}

pub async fn reassign_device_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthIdentity>,
    Path(user_id): Path<String>,
    Json(body): Json<ReassignRequest>,
) -> Result<Json<ReassignResponse>, ApiError> {
    let event = state
        .guard
        .reassign(&identity.user_id, &user_id, &body.new_device_id)
        .await?;
    Ok(Json(ReassignResponse { event }))
}

#[derive(Debug, Serialize)]
pub struct DeviceHistoryResponse {
    pub history: Vec<DeviceBindingEvent>,
}

pub async fn device_history_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthIdentity>,
    Path(user_id): Path<String>,
) -> Result<Json<DeviceHistoryResponse>, ApiError> {
    if identity.role != Role::Admin {
        return Err(AttendanceError::Forbidden(
            "device history requires admin role".to_string(),
        )
        .into());
    }
    let history = state.guard.history(&user_id).await?;
    Ok(Json(DeviceHistoryResponse { history }))
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<UserProfile>,
}

pub async fn list_users_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthIdentity>,
) -> Result<Json<UserListResponse>, ApiError> {
    if identity.role != Role::Admin {
        return Err(AttendanceError::Forbidden(
            "user listing requires admin role".to_string(),
        )
        .into());
    }
    let users = state
        .users
        .list()
        .await?
        .iter()
        .map(UserProfile::from)
        .collect();
    Ok(Json(UserListResponse { users }))
}

#[derive(Debug, Serialize)]
pub struct DayRecordsResponse {
    pub records: Vec<AttendanceRecord>,
}

/// Admin view of one user's records for one calendar day.
pub async fn admin_attendance_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthIdentity>,
    Path((user_id, date)): Path<(String, String)>,
) -> Result<Json<DayRecordsResponse>, ApiError> {
    if identity.role != Role::Admin {
        return Err(AttendanceError::Forbidden(
            "attendance lookup requires admin role".to_string(),
        )
        .into());
    }
    let day = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|_| {
        AttendanceError::InvalidInput(format!("invalid date '{}', expected YYYY-MM-DD", date))
    })?;
    if state.users.get(&user_id).await?.is_none() {
        return Err(AttendanceError::NotFound("user".to_string()).into());
    }
    let records = state.ledger.records_for_day(&user_id, day).await?;
    Ok(Json(DayRecordsResponse { records }))
}

#[derive(Debug, Serialize)]
pub struct AuditHistoryResponse {
    pub entries: Vec<crate::core::models::AuditEntry>,
}

/// Forensic view of one user's audit trail, newest first.
pub async fn audit_history_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthIdentity>,
    Path(user_id): Path<String>,
) -> Result<Json<AuditHistoryResponse>, ApiError> {
    if identity.role != Role::Admin {
        return Err(AttendanceError::Forbidden(
            "audit history requires admin role".to_string(),
        )
        .into());
    }
    let entries = state
        .audit
        .query(crate::state::AuditFilter {
            user_id: Some(user_id),
            order: crate::state::QueryOrder::Descending,
            ..Default::default()
        })
        .await?;
    Ok(Json(AuditHistoryResponse { entries }))
}

// ---- Biometric credentials ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiometricRegisterRequest {
    pub public_key_material: String,
    pub kind: CredentialKind,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BiometricRegisterResponse {
    pub credential_id: String,
}

pub async fn biometric_register_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthIdentity>,
    payload: Result<Json<BiometricRegisterRequest>, JsonRejection>,
) -> Result<Json<BiometricRegisterResponse>, ApiError> {
    // Malformed enrollment bodies (unknown kind, missing fields) are domain
    // input errors, not framework rejections.
    let Json(body) =
        payload.map_err(|e| AttendanceError::InvalidInput(e.body_text()))?;
    let credential_id = state
        .vault
        .register(&identity.user_id, &body.public_key_material, body.kind)
        .await?;
    Ok(Json(BiometricRegisterResponse { credential_id }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiometricVerifyRequest {
    pub credential_id: String,
    pub assertion: Assertion,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BiometricVerifyResponse {
    pub verified: bool,
    pub session_marker: String,
}

pub async fn biometric_verify_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthIdentity>,
    Json(body): Json<BiometricVerifyRequest>,
) -> Result<Json<BiometricVerifyResponse>, ApiError> {
    let session = state
        .vault
        .verify(&identity.user_id, &body.credential_id, &body.assertion)
        .await?;
    Ok(Json(BiometricVerifyResponse {
        verified: true,
        session_marker: session.session_marker,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiometricRevokeRequest {
    pub credential_id: String,
}

#[derive(Debug, Serialize)]
pub struct BiometricRevokeResponse {
    pub revoked: bool,
}

pub async fn biometric_revoke_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthIdentity>,
    Json(body): Json<BiometricRevokeRequest>,
) -> Result<Json<BiometricRevokeResponse>, ApiError> {
    state
        .vault
        .revoke(&identity.user_id, &body.credential_id)
        .await?;
    Ok(Json(BiometricRevokeResponse { revoked: true }))
}

#[derive(Debug, Serialize)]
pub struct BiometricListResponse {
    pub credentials: Vec<CredentialSummary>,
}

pub async fn biometric_list_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthIdentity>,
) -> Result<Json<BiometricListResponse>, ApiError> {
    let credentials = state.vault.list(&identity.user_id).await?;
    Ok(Json(BiometricListResponse { credentials }))
}

// ---- Account registration and login (rate limited) ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub department: String,
    pub device_id: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

pub async fn register_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let key = format!(
        "register:{}",
        client_key(peer, &headers, state.config.trust_proxy_headers)
    );
    state
        .limiter
        .admit(&key, state.config.register_policy())
        .await?;

    validate_email(&body.email)?;
    validate_password_strength(&body.password)?;
    if !is_uuid_v4(&body.device_id) {
        return Err(
            AttendanceError::InvalidInput("device id must be a UUIDv4".to_string()).into(),
        );
    }
    if body.name.trim().is_empty() {
        return Err(AttendanceError::InvalidInput("name must not be empty".to_string()).into());
    }

    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        email: body.email.clone(),
        name: body.name.trim().to_string(),
        department: body.department.trim().to_string(),
        role: Role::Employee,
        registered_device_id: body.device_id.clone(),
        password_digest: hash_password(&body.password),
        registered_at: Utc::now(),
    };
    state.users.insert(user.clone()).await?;
    info!(user_id = %user.id, "account registered");

    let token = state.tokens.mint(&user)?;
    Ok(Json(AuthResponse {
        token,
        user: UserProfile::from(&user),
    }))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let key = format!(
        "login:{}",
        client_key(peer, &headers, state.config.trust_proxy_headers)
    );
    state
        .limiter
        .admit(&key, state.config.login_policy())
        .await?;

    // One failure path for unknown email and wrong password alike.
    let rejected = || AttendanceError::Unauthorized("invalid credentials".to_string());
    let user = state
        .users
        .find_by_email(&body.email)
        .await?
        .ok_or_else(rejected)?;
    if !verify_password(&body.password, &user.password_digest) {
        return Err(rejected().into());
    }

    let token = state.tokens.mint(&user)?;
    Ok(Json(AuthResponse {
        token,
        user: UserProfile::from(&user),
    }))
}

// ---- Health ----

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Client identity for rate limiting.
///
/// The peer socket address is authoritative. Forwarded headers are
/// client-controlled, so they are honored only when the deployment declares
/// a trusted proxy in front (`trust_proxy_headers`); otherwise rotating
/// `X-Forwarded-For` would mint a fresh window per request.
fn client_key(peer: SocketAddr, headers: &HeaderMap, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = headers
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .or_else(|| {
                headers
                    .get("X-Real-IP")
                    .and_then(|v| v.to_str().ok())
                    .map(|v| v.to_string())
            });
        if let Some(client) = forwarded {
            return client;
        }
    }
    peer.ip().to_string()
}
