// Configuration management

use crate::core::errors::AttendanceError;
use crate::core::geo::Geofence;
use crate::core::models::{Coordinate, RatePolicy};
use crate::engine::vault::LockoutPolicy;
use std::env;

/// Application configuration loaded from environment variables
///
/// All tunables of the attendance core live here; nothing in the engine
/// hardcodes a geofence, threshold, or window. Validated on load with
/// clear error messages.
#[derive(Debug, Clone)]
pub struct Config {
    // Server configuration
    pub bind_address: String,
    pub port: u16,

    // Geofence
    pub geofence_center_lat: f64,
    pub geofence_center_lng: f64,
    pub geofence_radius_m: f64,

    // Credential lockout
    pub lockout_threshold: u32,
    pub lockout_duration_secs: u64,
    pub verify_timeout_secs: u64,

    // Rate limiting
    pub login_max_requests: u32,
    pub login_window_secs: u64,
    pub register_max_requests: u32,
    pub register_window_secs: u64,

    // Tokens
    pub jwt_secret: String,
    pub token_ttl_secs: i64,

    // Middleware configuration
    pub request_timeout_secs: u64,
    pub body_size_limit_bytes: usize,
    /// Honor X-Forwarded-For / X-Real-IP for rate-limit client identity.
    /// Only safe behind a proxy that strips client-supplied values.
    pub trust_proxy_headers: bool,

    // Logging configuration
    pub log_level: String,
    pub log_format: String, // "json" or "text"
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Supports `.env` file loading in development (via dotenv crate).
    pub fn from_env() -> Result<Self, AttendanceError> {
        #[cfg(not(test))]
        {
            dotenv::dotenv().ok(); // Ignore errors (file may not exist)
        }

        let config = Self {
            bind_address: Self::get_env_or_default("BIND_ADDRESS", "0.0.0.0")?,
            port: Self::parse_port()?,
            geofence_center_lat: Self::parse_f64_or_default("GEOFENCE_CENTER_LAT", -32.9198)?,
            geofence_center_lng: Self::parse_f64_or_default("GEOFENCE_CENTER_LNG", -60.7068)?,
            geofence_radius_m: Self::parse_f64_or_default("GEOFENCE_RADIUS_M", 100.0)?,
            lockout_threshold: Self::parse_u32_or_default("LOCKOUT_THRESHOLD", 5)?,
            lockout_duration_secs: Self::parse_u64_or_default("LOCKOUT_DURATION_SECS", 300)?,
            verify_timeout_secs: Self::parse_u64_or_default("VERIFY_TIMEOUT_SECS", 3)?,
            login_max_requests: Self::parse_u32_or_default("LOGIN_MAX_REQUESTS", 5)?,
            login_window_secs: Self::parse_u64_or_default("LOGIN_WINDOW_SECS", 900)?,
            register_max_requests: Self::parse_u32_or_default("REGISTER_MAX_REQUESTS", 10)?,
            register_window_secs: Self::parse_u64_or_default("REGISTER_WINDOW_SECS", 3600)?,
            jwt_secret: Self::get_required_env("JWT_SECRET")?,
            token_ttl_secs: Self::parse_u64_or_default("TOKEN_TTL_SECS", 8 * 3600)? as i64,
            request_timeout_secs: Self::parse_u64_or_default("REQUEST_TIMEOUT_SECS", 30)?,
            body_size_limit_bytes: Self::parse_usize_or_default(
                "BODY_SIZE_LIMIT_BYTES",
                256 * 1024,
            )?,
            trust_proxy_headers: Self::parse_bool_or_default("TRUST_PROXY_HEADERS", false)?,
            log_level: Self::get_env_or_default("LOG_LEVEL", "info")?,
            log_format: Self::get_env_or_default("LOG_FORMAT", "json")?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn geofence(&self) -> Geofence {
        Geofence {
            center: Coordinate {
                lat: self.geofence_center_lat,
                lng: self.geofence_center_lng,
            },
            radius_m: self.geofence_radius_m,
        }
    }

    pub fn lockout_policy(&self) -> LockoutPolicy {
        LockoutPolicy {
            threshold: self.lockout_threshold,
            lock_duration: chrono::Duration::seconds(self.lockout_duration_secs as i64),
            verify_timeout: std::time::Duration::from_secs(self.verify_timeout_secs),
        }
    }

    pub fn login_policy(&self) -> RatePolicy {
        RatePolicy {
            max_requests: self.login_max_requests,
            window_secs: self.login_window_secs,
        }
    }

    pub fn register_policy(&self) -> RatePolicy {
        RatePolicy {
            max_requests: self.register_max_requests,
            window_secs: self.register_window_secs,
        }
    }

    /// Get environment variable or return default value
    fn get_env_or_default(key: &str, default: &str) -> Result<String, AttendanceError> {
        Ok(env::var(key).unwrap_or_else(|_| default.to_string()))
    }

    /// Get required environment variable
    fn get_required_env(key: &str) -> Result<String, AttendanceError> {
        match env::var(key) {
            Ok(value) if !value.is_empty() => Ok(value),
            _ => Err(AttendanceError::Internal(format!("{} not set", key))),
        }
    }

    /// Parse port from PORT environment variable
    fn parse_port() -> Result<u16, AttendanceError> {
        let port_str = env::var("PORT").unwrap_or_else(|_| "8000".to_string());
        let port = port_str.parse::<u16>().map_err(|e| {
            AttendanceError::Internal(format!("Invalid PORT value '{}': {}", port_str, e))
        })?;
        if port == 0 {
            return Err(AttendanceError::Internal(
                "PORT must be between 1 and 65535".to_string(),
            ));
        }
        Ok(port)
    }

    /// Parse u64 from environment variable or return default
    fn parse_u64_or_default(key: &str, default: u64) -> Result<u64, AttendanceError> {
        match env::var(key) {
            Ok(value) => {
                let parsed = value.parse::<u64>().map_err(|e| {
                    AttendanceError::Internal(format!("Invalid {} value '{}': {}", key, value, e))
                })?;
                if parsed == 0 {
                    return Err(AttendanceError::Internal(format!(
                        "{} must be greater than 0",
                        key
                    )));
                }
                Ok(parsed)
            }
            _ => Ok(default),
        }
    }

    /// Parse u32 from environment variable or return default
    fn parse_u32_or_default(key: &str, default: u32) -> Result<u32, AttendanceError> {
        match env::var(key) {
            Ok(value) => {
                let parsed = value.parse::<u32>().map_err(|e| {
                    AttendanceError::Internal(format!("Invalid {} value '{}': {}", key, value, e))
                })?;
                if parsed == 0 {
                    return Err(AttendanceError::Internal(format!(
                        "{} must be greater than 0",
                        key
                    )));
                }
                Ok(parsed)
            }
            _ => Ok(default),
        }
    }

    /// Parse usize from environment variable or return default
    fn parse_usize_or_default(key: &str, default: usize) -> Result<usize, AttendanceError> {
        match env::var(key) {
            Ok(value) => {
                let parsed = value.parse::<usize>().map_err(|e| {
                    AttendanceError::Internal(format!("Invalid {} value '{}': {}", key, value, e))
                })?;
                if parsed == 0 {
                    return Err(AttendanceError::Internal(format!(
                        "{} must be greater than 0",
                        key
                    )));
                }
                Ok(parsed)
            }
            _ => Ok(default),
        }
    }

    /// Parse bool from environment variable or return default
    fn parse_bool_or_default(key: &str, default: bool) -> Result<bool, AttendanceError> {
        match env::var(key) {
            Ok(value) => match value.to_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                other => Err(AttendanceError::Internal(format!(
                    "Invalid {} value '{}': must be true or false",
                    key, other
                ))),
            },
            _ => Ok(default),
        }
    }

    /// Parse f64 from environment variable or return default
    fn parse_f64_or_default(key: &str, default: f64) -> Result<f64, AttendanceError> {
        match env::var(key) {
            Ok(value) => value.parse::<f64>().map_err(|e| {
                AttendanceError::Internal(format!("Invalid {} value '{}': {}", key, value, e))
            }),
            _ => Ok(default),
        }
    }

    /// Validate all configuration values
    fn validate(&self) -> Result<(), AttendanceError> {
        if !(-90.0..=90.0).contains(&self.geofence_center_lat) {
            return Err(AttendanceError::Internal(
                "GEOFENCE_CENTER_LAT must be in [-90, 90]".to_string(),
            ));
        }
        if !(-180.0..=180.0).contains(&self.geofence_center_lng) {
            return Err(AttendanceError::Internal(
                "GEOFENCE_CENTER_LNG must be in [-180, 180]".to_string(),
            ));
        }
        if !self.geofence_radius_m.is_finite() || self.geofence_radius_m <= 0.0 {
            return Err(AttendanceError::Internal(
                "GEOFENCE_RADIUS_M must be a positive number".to_string(),
            ));
        }
        if self.jwt_secret.len() < 16 {
            return Err(AttendanceError::Internal(
                "JWT_SECRET must be at least 16 characters".to_string(),
            ));
        }
        Self::validate_log_level(&self.log_level)?;
        Self::validate_log_format(&self.log_format)?;
        Ok(())
    }

    /// Validate log level
    fn validate_log_level(level: &str) -> Result<(), AttendanceError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&level.to_lowercase().as_str()) {
            return Err(AttendanceError::Internal(format!(
                "Invalid LOG_LEVEL '{}': must be one of {}",
                level,
                valid_levels.join(", ")
            )));
        }
        Ok(())
    }

    /// Validate log format
    fn validate_log_format(format: &str) -> Result<(), AttendanceError> {
        if format != "json" && format != "text" {
            return Err(AttendanceError::Internal(format!(
                "Invalid LOG_FORMAT '{}': must be 'json' or 'text'",
                format
            )));
        }
        Ok(())
    }
}

impl Config {
    /// Create a test configuration for unit tests
    ///
    /// Bypasses environment variable loading for tests that don't need
    /// real configuration.
    pub fn test_config() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8000,
            geofence_center_lat: -32.9198,
            geofence_center_lng: -60.7068,
            geofence_radius_m: 100.0,
            lockout_threshold: 5,
            lockout_duration_secs: 300,
            verify_timeout_secs: 3,
            login_max_requests: 5,
            login_window_secs: 900,
            register_max_requests: 10,
            register_window_secs: 3600,
            jwt_secret: "test-secret-at-least-16-chars".to_string(),
            token_ttl_secs: 8 * 3600,
            request_timeout_secs: 30,
            body_size_limit_bytes: 256 * 1024,
            trust_proxy_headers: false,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_or_default() {
        env::set_var("PUNCHCLOCK_TEST_VAR", "test_value");
        let result = Config::get_env_or_default("PUNCHCLOCK_TEST_VAR", "default").unwrap();
        assert_eq!(result, "test_value");
        env::remove_var("PUNCHCLOCK_TEST_VAR");
    }

    #[test]
    fn test_get_env_or_default_missing() {
        env::remove_var("PUNCHCLOCK_TEST_VAR_MISSING");
        let result = Config::get_env_or_default("PUNCHCLOCK_TEST_VAR_MISSING", "default").unwrap();
        assert_eq!(result, "default");
    }

    #[test]
    fn test_validate_rejects_bad_geofence() {
        let mut config = Config::test_config();
        config.geofence_radius_m = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::test_config();
        config.geofence_center_lat = 120.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_short_jwt_secret() {
        let mut config = Config::test_config();
        config.jwt_secret = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_log_level_and_format() {
        assert!(Config::validate_log_level("debug").is_ok());
        assert!(Config::validate_log_level("noisy").is_err());
        assert!(Config::validate_log_format("json").is_ok());
        assert!(Config::validate_log_format("xml").is_err());
    }

    #[test]
    fn test_parse_bool_or_default() {
        env::set_var("PUNCHCLOCK_TEST_BOOL", "true");
        assert!(Config::parse_bool_or_default("PUNCHCLOCK_TEST_BOOL", false).unwrap());
        env::set_var("PUNCHCLOCK_TEST_BOOL", "0");
        assert!(!Config::parse_bool_or_default("PUNCHCLOCK_TEST_BOOL", true).unwrap());
        env::set_var("PUNCHCLOCK_TEST_BOOL", "maybe");
        assert!(Config::parse_bool_or_default("PUNCHCLOCK_TEST_BOOL", false).is_err());
        env::remove_var("PUNCHCLOCK_TEST_BOOL");
        assert!(!Config::parse_bool_or_default("PUNCHCLOCK_TEST_BOOL", false).unwrap());
    }

    #[test]
    fn test_policy_accessors() {
        let config = Config::test_config();
        assert_eq!(config.login_policy().max_requests, 5);
        assert_eq!(config.register_policy().window_secs, 3600);
        assert_eq!(config.lockout_policy().threshold, 5);
        assert!((config.geofence().radius_m - 100.0).abs() < f64::EPSILON);
    }
}
