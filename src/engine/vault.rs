// Biometric credential lifecycle: enrollment, verification with
// failure lockout, revocation

use crate::core::errors::AttendanceError;
use crate::core::models::{
    Assertion, AuditEventType, BiometricCredential, CredentialKind, CredentialSummary,
};
use crate::engine::audit::AuditLog;
use crate::state::CredentialStore;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde_json::json;
use sha2::Sha256;
use std::sync::Arc;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Attempt-counter and timeout settings for the vault.
#[derive(Debug, Clone)]
pub struct LockoutPolicy {
    /// Consecutive failures at which the credential locks.
    pub threshold: u32,
    pub lock_duration: Duration,
    /// Upper bound on one call into the assertion verifier.
    pub verify_timeout: std::time::Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            threshold: 5,
            lock_duration: Duration::minutes(5),
            verify_timeout: std::time::Duration::from_secs(3),
        }
    }
}

/// The cryptographic check behind `verify`. The vault owns the lifecycle
/// around this call, never the signature math itself.
#[async_trait::async_trait]
pub trait AssertionVerifier: Send + Sync {
    /// `Ok(true)` accepts, `Ok(false)` rejects and consumes an attempt,
    /// `Err` is an infrastructure failure and consumes nothing.
    async fn verify(
        &self,
        public_key_material: &str,
        assertion: &Assertion,
    ) -> Result<bool, AttendanceError>;
}

/// Shared-secret verifier: the enrolled key material is a base64 secret and
/// a valid assertion carries an HMAC-SHA256 over
/// `authenticator_data.client_data_json` in `signature` (hex).
pub struct HmacSha256Verifier;

#[async_trait::async_trait]
impl AssertionVerifier for HmacSha256Verifier {
    async fn verify(
        &self,
        public_key_material: &str,
        assertion: &Assertion,
    ) -> Result<bool, AttendanceError> {
        let key = match BASE64.decode(public_key_material) {
            Ok(key) => key,
            Err(_) => return Ok(false),
        };
        let signature = match hex::decode(&assertion.signature) {
            Ok(sig) => sig,
            Err(_) => return Ok(false),
        };
        let mut mac = HmacSha256::new_from_slice(&key)
            .map_err(|e| AttendanceError::Internal(format!("hmac key setup: {}", e)))?;
        mac.update(assertion.authenticator_data.as_bytes());
        mac.update(b".");
        mac.update(assertion.client_data_json.as_bytes());
        Ok(mac.verify_slice(&signature).is_ok())
    }
}

/// Returned by a successful verification. The marker is an opaque bearer
/// artifact; nothing in it is structured.
#[derive(Debug, Clone)]
pub struct VerifiedSession {
    pub session_marker: String,
}

pub struct CredentialVault {
    store: Arc<dyn CredentialStore>,
    audit: Arc<AuditLog>,
    verifier: Arc<dyn AssertionVerifier>,
    policy: LockoutPolicy,
}

impl CredentialVault {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        audit: Arc<AuditLog>,
        verifier: Arc<dyn AssertionVerifier>,
        policy: LockoutPolicy,
    ) -> Self {
        Self {
            store,
            audit,
            verifier,
            policy,
        }
    }

    pub async fn register(
        &self,
        user_id: &str,
        public_key_material: &str,
        kind: CredentialKind,
    ) -> Result<String, AttendanceError> {
        self.register_at(user_id, public_key_material, kind, Utc::now())
            .await
    }

    pub async fn register_at(
        &self,
        user_id: &str,
        public_key_material: &str,
        kind: CredentialKind,
        now: DateTime<Utc>,
    ) -> Result<String, AttendanceError> {
        if public_key_material.trim().is_empty() {
            return Err(AttendanceError::InvalidInput(
                "public key material must not be empty".to_string(),
            ));
        }

        let credential_id = uuid::Uuid::new_v4().to_string();
        self.store
            .insert(BiometricCredential {
                credential_id: credential_id.clone(),
                user_id: user_id.to_string(),
                public_key_material: public_key_material.to_string(),
                kind,
                attempts: 0,
                locked: false,
                lock_until: None,
                created_at: now,
                last_used: None,
            })
            .await?;

        self.audit
            .record_at(
                user_id,
                AuditEventType::BiometricRegistered,
                json!({ "credentialId": credential_id, "kind": kind }),
                now,
            )
            .await?;
        Ok(credential_id)
    }

    pub async fn verify(
        &self,
        user_id: &str,
        credential_id: &str,
        assertion: &Assertion,
    ) -> Result<VerifiedSession, AttendanceError> {
        self.verify_at(user_id, credential_id, assertion, Utc::now())
            .await
    }

    /// The whole check-verify-update sequence runs under the per-credential
    /// lock so two concurrent failures cannot both observe the same attempt
    /// count.
    pub async fn verify_at(
        &self,
        user_id: &str,
        credential_id: &str,
        assertion: &Assertion,
        now: DateTime<Utc>,
    ) -> Result<VerifiedSession, AttendanceError> {
        let cell = self
            .store
            .entry(user_id, credential_id)
            .await?
            .ok_or_else(|| AttendanceError::NotFound("credential".to_string()))?;
        let mut cred = cell.lock().await;

        if cred.locked {
            match cred.lock_until {
                Some(until) if now < until => {
                    return Err(AttendanceError::CredentialLocked {
                        retry_after_secs: (until - now).num_seconds().max(1),
                    });
                }
                _ => {
                    // Lock window elapsed; this attempt proceeds fresh.
                    cred.locked = false;
                    cred.lock_until = None;
                    cred.attempts = 0;
                }
            }
        }

        let outcome = tokio::time::timeout(
            self.policy.verify_timeout,
            self.verifier.verify(&cred.public_key_material, assertion),
        )
        .await;
        let accepted = match outcome {
            Ok(Ok(accepted)) => accepted,
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                warn!(credential_id, "assertion verifier timed out");
                false
            }
        };

        if accepted {
            cred.attempts = 0;
            cred.locked = false;
            cred.lock_until = None;
            cred.last_used = Some(now);
            self.audit
                .record_at(
                    user_id,
                    AuditEventType::BiometricVerificationSuccess,
                    json!({ "credentialId": credential_id }),
                    now,
                )
                .await?;
            return Ok(VerifiedSession {
                session_marker: session_marker(),
            });
        }

        cred.attempts += 1;
        if cred.attempts >= self.policy.threshold {
            cred.locked = true;
            cred.lock_until = Some(now + self.policy.lock_duration);
        }
        let attempts_remaining = self.policy.threshold.saturating_sub(cred.attempts);
        self.audit
            .record_at(
                user_id,
                AuditEventType::BiometricVerificationFailed,
                json!({
                    "credentialId": credential_id,
                    "attempts": cred.attempts,
                    "locked": cred.locked,
                }),
                now,
            )
            .await?;
        Err(AttendanceError::VerificationFailed { attempts_remaining })
    }

    pub async fn revoke(&self, user_id: &str, credential_id: &str) -> Result<(), AttendanceError> {
        if !self.store.remove(user_id, credential_id).await? {
            return Err(AttendanceError::NotFound("credential".to_string()));
        }
        self.audit
            .record(
                user_id,
                AuditEventType::BiometricRevoked,
                json!({ "credentialId": credential_id }),
            )
            .await
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<CredentialSummary>, AttendanceError> {
        self.store.list(user_id).await
    }
}

/// 32 random bytes, hex-encoded. Opaque to everything downstream.
fn session_marker() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::memory::{MemoryAuditStore, MemoryCredentialStore};
    use crate::state::AuditFilter;

    /// Verifier with a fixed verdict, for exercising the lifecycle.
    struct StaticVerifier(bool);

    #[async_trait::async_trait]
    impl AssertionVerifier for StaticVerifier {
        async fn verify(&self, _: &str, _: &Assertion) -> Result<bool, AttendanceError> {
            Ok(self.0)
        }
    }

    /// Never completes; only the vault's timeout ends the call.
    struct HangingVerifier;

    #[async_trait::async_trait]
    impl AssertionVerifier for HangingVerifier {
        async fn verify(&self, _: &str, _: &Assertion) -> Result<bool, AttendanceError> {
            std::future::pending().await
        }
    }

    fn assertion() -> Assertion {
        Assertion {
            authenticator_data: "authdata".to_string(),
            client_data_json: "{}".to_string(),
            signature: "00".to_string(),
        }
    }

    fn vault_with(verifier: Arc<dyn AssertionVerifier>, policy: LockoutPolicy) -> CredentialVault {
        CredentialVault::new(
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(AuditLog::new(Arc::new(MemoryAuditStore::new()))),
            verifier,
            policy,
        )
    }

    #[tokio::test]
    async fn test_register_rejects_empty_material() {
        let vault = vault_with(Arc::new(StaticVerifier(true)), LockoutPolicy::default());
        assert!(matches!(
            vault
                .register("u1", "   ", CredentialKind::Fingerprint)
                .await,
            Err(AttendanceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_verify_unknown_credential_not_found() {
        let vault = vault_with(Arc::new(StaticVerifier(true)), LockoutPolicy::default());
        assert!(matches!(
            vault.verify("u1", "missing", &assertion()).await,
            Err(AttendanceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_success_issues_marker_and_resets_attempts() {
        let vault = vault_with(Arc::new(StaticVerifier(true)), LockoutPolicy::default());
        let id = vault
            .register("u1", "a2V5", CredentialKind::FaceId)
            .await
            .unwrap();
        let session = vault.verify("u1", &id, &assertion()).await.unwrap();
        assert_eq!(session.session_marker.len(), 64);

        let listed = vault.list("u1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].last_used.is_some());
        assert!(!listed[0].locked);
    }

    #[tokio::test]
    async fn test_five_failures_lock_sixth_does_not_consume() {
        let vault = vault_with(Arc::new(StaticVerifier(false)), LockoutPolicy::default());
        let id = vault
            .register("u1", "a2V5", CredentialKind::Fingerprint)
            .await
            .unwrap();
        let t0 = Utc::now();

        for attempt in 1..=5u32 {
            let err = vault
                .verify_at("u1", &id, &assertion(), t0)
                .await
                .unwrap_err();
            match err {
                AttendanceError::VerificationFailed { attempts_remaining } => {
                    assert_eq!(attempts_remaining, 5 - attempt);
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }

        // Locked now; a sixth attempt inside the window is rejected outright.
        let err = vault
            .verify_at("u1", &id, &assertion(), t0 + Duration::seconds(30))
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::CredentialLocked { retry_after_secs } if retry_after_secs > 0));

        // Still exactly 5 failure entries: the locked rejection consumed
        // nothing.
        let failures = vault
            .audit
            .query(AuditFilter {
                event_type: Some(AuditEventType::BiometricVerificationFailed),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(failures.len(), 5);
        assert_eq!(failures[4].details["locked"], serde_json::json!(true));
    }

    #[tokio::test]
    async fn test_lock_expiry_processes_attempt_fresh() {
        let vault = vault_with(Arc::new(StaticVerifier(false)), LockoutPolicy::default());
        let id = vault
            .register("u1", "a2V5", CredentialKind::Fingerprint)
            .await
            .unwrap();
        let t0 = Utc::now();
        for _ in 0..5 {
            let _ = vault.verify_at("u1", &id, &assertion(), t0).await;
        }

        // Past the lock window: processed normally, counter starts over.
        let err = vault
            .verify_at("u1", &id, &assertion(), t0 + Duration::minutes(6))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AttendanceError::VerificationFailed {
                attempts_remaining: 4
            }
        ));
    }

    #[tokio::test]
    async fn test_verifier_timeout_counts_as_failure() {
        let policy = LockoutPolicy {
            verify_timeout: std::time::Duration::from_millis(20),
            ..Default::default()
        };
        let vault = vault_with(Arc::new(HangingVerifier), policy);
        let id = vault
            .register("u1", "a2V5", CredentialKind::PlatformKey)
            .await
            .unwrap();
        let err = vault.verify("u1", &id, &assertion()).await.unwrap_err();
        assert!(matches!(
            err,
            AttendanceError::VerificationFailed {
                attempts_remaining: 4
            }
        ));
    }

    #[tokio::test]
    async fn test_revoke_removes_and_audits() {
        let vault = vault_with(Arc::new(StaticVerifier(true)), LockoutPolicy::default());
        let id = vault
            .register("u1", "a2V5", CredentialKind::FaceId)
            .await
            .unwrap();
        vault.revoke("u1", &id).await.unwrap();
        assert!(vault.list("u1").await.unwrap().is_empty());
        assert!(matches!(
            vault.revoke("u1", &id).await,
            Err(AttendanceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_hmac_verifier_accepts_valid_signature() {
        let key = b"vault-shared-secret";
        let material = BASE64.encode(key);
        let mut mac = HmacSha256::new_from_slice(key).unwrap();
        mac.update(b"authdata");
        mac.update(b".");
        mac.update(b"{}");
        let signature = hex::encode(mac.finalize().into_bytes());

        let good = Assertion {
            authenticator_data: "authdata".to_string(),
            client_data_json: "{}".to_string(),
            signature,
        };
        let verifier = HmacSha256Verifier;
        assert!(verifier.verify(&material, &good).await.unwrap());

        let bad = Assertion {
            signature: "00ff".to_string(),
            ..good
        };
        assert!(!verifier.verify(&material, &bad).await.unwrap());
    }
}
