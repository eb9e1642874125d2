// Domain error types - secure error handling with no information disclosure

use thiserror::Error;

/// Main error type for the attendance core.
///
/// Every business-rule rejection the service can produce is a variant here;
/// handlers map them to HTTP responses via `status_code()` / `user_message()`.
#[derive(Error, Debug)]
pub enum AttendanceError {
    /// Malformed input: coordinates out of range, bad UUID, missing fields (HTTP 400)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Missing or invalid identity (HTTP 401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Role check failed (HTTP 403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Request device does not match the user's registered device (HTTP 403)
    #[error("Device mismatch")]
    DeviceMismatch,

    /// Request location is outside the configured geofence (HTTP 400)
    #[error("Outside geofence radius")]
    OutsideGeofence,

    /// Check-in attempted while a check-in is already open for the day (HTTP 409)
    #[error("Already checked in")]
    AlreadyCheckedIn,

    /// Check-out attempted with no open check-in for the day (HTTP 409)
    #[error("No open check-in")]
    NoOpenCheckIn,

    /// User or credential does not exist (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Credential is under failure lockout (HTTP 429)
    #[error("Credential locked, retry in {retry_after_secs}s")]
    CredentialLocked { retry_after_secs: i64 },

    /// Biometric verification failed (HTTP 401)
    #[error("Verification failed, {attempts_remaining} attempts remaining")]
    VerificationFailed { attempts_remaining: u32 },

    /// Sliding-window admission rejected the request (HTTP 429)
    #[error("Rate limited, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: i64 },

    /// Unexpected store or verifier failure (HTTP 500)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AttendanceError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            AttendanceError::InvalidInput(_) => 400,
            AttendanceError::Unauthorized(_) => 401,
            AttendanceError::Forbidden(_) => 403,
            AttendanceError::DeviceMismatch => 403,
            AttendanceError::OutsideGeofence => 400,
            AttendanceError::AlreadyCheckedIn => 409,
            AttendanceError::NoOpenCheckIn => 409,
            AttendanceError::NotFound(_) => 404,
            AttendanceError::CredentialLocked { .. } => 429,
            AttendanceError::VerificationFailed { .. } => 401,
            AttendanceError::RateLimited { .. } => 429,
            AttendanceError::Internal(_) => 500,
        }
    }

    /// Get user-friendly error message (no sensitive information)
    pub fn user_message(&self) -> String {
        match self {
            AttendanceError::InvalidInput(reason) => format!("Invalid input: {}", reason),
            AttendanceError::Unauthorized(_) => "Unauthorized".to_string(),
            AttendanceError::Forbidden(reason) => format!("Forbidden: {}", reason),
            AttendanceError::DeviceMismatch => {
                "Device mismatch - attendance must be recorded from your registered device"
                    .to_string()
            }
            AttendanceError::OutsideGeofence => "Outside geofence radius".to_string(),
            AttendanceError::AlreadyCheckedIn => "Already checked in today".to_string(),
            AttendanceError::NoOpenCheckIn => "No open check-in today".to_string(),
            AttendanceError::NotFound(what) => format!("{} not found", what),
            AttendanceError::CredentialLocked { retry_after_secs } => format!(
                "Credential temporarily locked, retry in {} seconds",
                retry_after_secs
            ),
            AttendanceError::VerificationFailed { attempts_remaining } => format!(
                "Verification failed, {} attempts remaining",
                attempts_remaining
            ),
            AttendanceError::RateLimited { retry_after_secs } => format!(
                "Too many requests, retry in {} seconds",
                retry_after_secs
            ),
            AttendanceError::Internal(_) => "Internal error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AttendanceError::OutsideGeofence.status_code(), 400);
        assert_eq!(AttendanceError::DeviceMismatch.status_code(), 403);
        assert_eq!(AttendanceError::AlreadyCheckedIn.status_code(), 409);
        assert_eq!(AttendanceError::NoOpenCheckIn.status_code(), 409);
        assert_eq!(
            AttendanceError::CredentialLocked {
                retry_after_secs: 300
            }
            .status_code(),
            429
        );
        assert_eq!(
            AttendanceError::VerificationFailed {
                attempts_remaining: 2
            }
            .status_code(),
            401
        );
        assert_eq!(
            AttendanceError::RateLimited {
                retry_after_secs: 60
            }
            .status_code(),
            429
        );
    }

    #[test]
    fn test_internal_message_no_sensitive_data() {
        let err = AttendanceError::Internal("store poisoned at /var/lib/punchclock".to_string());
        let user_msg = err.user_message();
        assert!(!user_msg.contains("/var/lib"));
        assert_eq!(user_msg, "Internal error");
    }

    #[test]
    fn test_unauthorized_message_hides_reason() {
        let err = AttendanceError::Unauthorized("token expired at 2024-01-01".to_string());
        assert_eq!(err.user_message(), "Unauthorized");
    }
}
