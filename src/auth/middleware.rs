// Axum authentication middleware

use crate::api::responses::ApiError;
use crate::auth::token::TokenService;
use crate::state::UserStore;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::error;

/// Authentication state containing all dependencies
#[derive(Clone)]
pub struct AuthState {
    pub tokens: Arc<TokenService>,
    pub users: Arc<dyn UserStore>,
}

/// Authentication middleware function
///
/// Extracts the bearer token from `Authorization`, validates it, confirms
/// the account still exists, and sets the verified identity in request
/// extensions for handlers to use.
pub async fn auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(request.headers()).ok_or_else(|| {
        ApiError::new(StatusCode::UNAUTHORIZED, "Missing bearer token".to_string())
    })?;

    let identity = auth_state.tokens.verify(&token)?;

    // A token outliving its account must not authenticate.
    match auth_state.users.get(&identity.user_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return Err(ApiError::new(
                StatusCode::UNAUTHORIZED,
                "Unauthorized".to_string(),
            ))
        }
        Err(e) => {
            error!(error = %e, "user lookup failed during auth");
            return Err(e.into());
        }
    }

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Extract the token from an `Authorization: Bearer <token>` header
fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}
