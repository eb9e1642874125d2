// Axum web server layer

use axum::{error_handling::HandleErrorLayer, http::StatusCode, BoxError, Router};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

pub mod handlers;
pub mod responses;

use crate::auth::middleware::{auth_middleware, AuthState};
use crate::auth::token::TokenService;
use crate::engine::{AttendanceLedger, AuditLog, CredentialVault, DeviceBindingGuard, RateLimiter};
use crate::state::UserStore;

pub use crate::config::Config;

/// Application state containing all shared dependencies
///
/// All components are wrapped in Arc for shared ownership across async
/// tasks. AppState itself is cloned per request by Axum.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<AttendanceLedger>,
    pub guard: Arc<DeviceBindingGuard>,
    pub vault: Arc<CredentialVault>,
    pub limiter: Arc<RateLimiter>,
    pub audit: Arc<AuditLog>,
    pub users: Arc<dyn UserStore>,
    pub tokens: Arc<TokenService>,
    pub config: Arc<Config>,
}

/// Create the Axum router with all routes and middleware
///
/// Middleware stack (outermost to innermost):
/// - Request timeout (tower::timeout) behind HandleErrorLayer
/// - Body size limit (tower-http::limit)
/// - Tracing (tower-http::trace)
/// - Auth middleware on protected routes only (route_layer)
///
/// `/health`, `/auth/register` and `/auth/login` bypass auth; the auth
/// endpoints are rate limited inside their handlers instead.
pub fn create_router(app_state: AppState, auth_state: Arc<AuthState>) -> Router {
    let protected = Router::new()
        .route(
            "/attendance/check-in",
            axum::routing::post(handlers::check_in_handler),
        )
        .route(
            "/attendance/check-out",
            axum::routing::post(handlers::check_out_handler),
        )
        .route(
            "/attendance/today",
            axum::routing::get(handlers::today_handler),
        )
        .route(
            "/attendance/month",
            axum::routing::get(handlers::month_handler),
        )
        .route(
            "/admin/device/:user_id",
            axum::routing::post(handlers::reassign_device_handler),
        )
        .route(
            "/admin/device-history/:user_id",
            axum::routing::get(handlers::device_history_handler),
        )
        .route(
            "/admin/audit/:user_id",
            axum::routing::get(handlers::audit_history_handler),
        )
        .route("/admin/users", axum::routing::get(handlers::list_users_handler))
        .route(
            "/admin/attendance/:user_id/:date",
            axum::routing::get(handlers::admin_attendance_handler),
        )
        .route(
            "/biometric/register",
            axum::routing::post(handlers::biometric_register_handler),
        )
        .route(
            "/biometric/verify",
            axum::routing::post(handlers::biometric_verify_handler),
        )
        .route(
            "/biometric/revoke",
            axum::routing::post(handlers::biometric_revoke_handler),
        )
        .route(
            "/biometric/list",
            axum::routing::get(handlers::biometric_list_handler),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ));

    let public = Router::new()
        .route("/health", axum::routing::get(handlers::health_handler))
        .route(
            "/auth/register",
            axum::routing::post(handlers::register_handler),
        )
        .route("/auth/login", axum::routing::post(handlers::login_handler));

    let body_limit = app_state.config.body_size_limit_bytes;
    let timeout_secs = app_state.config.request_timeout_secs;

    let router = protected
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(app_state);

    // HandleErrorLayer must come BEFORE timeout to catch the timeout error.
    let middleware_stack = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(|e: BoxError| async move {
            let status = if e.is::<tower::timeout::error::Elapsed>() {
                StatusCode::REQUEST_TIMEOUT
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (status, e.to_string())
        }))
        .timeout(Duration::from_secs(timeout_secs))
        .into_inner();

    router.layer(middleware_stack)
}
