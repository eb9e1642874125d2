// Identity: JWT issuance/validation, password digests, request middleware

pub mod middleware;
pub mod password;
pub mod token;

pub use middleware::{auth_middleware, AuthState};
pub use token::{AuthIdentity, TokenService};
