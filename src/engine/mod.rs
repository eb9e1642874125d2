// Service components over the store traits
//
// Each component is a stateless service holding `Arc` handles to the stores
// it needs; all mutable state lives behind the store seams.

pub mod audit;
pub mod device;
pub mod ledger;
pub mod rate_limit;
pub mod vault;

pub use audit::AuditLog;
pub use device::DeviceBindingGuard;
pub use ledger::AttendanceLedger;
pub use rate_limit::RateLimiter;
pub use vault::{AssertionVerifier, CredentialVault, HmacSha256Verifier, LockoutPolicy};
