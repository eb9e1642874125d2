// Shared fixtures for integration tests

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use punchclock::api::{create_router, AppState};
use punchclock::auth::middleware::AuthState;
use punchclock::auth::password::hash_password;
use punchclock::auth::token::TokenService;
use punchclock::config::Config;
use punchclock::core::models::{Role, User};
use punchclock::engine::{
    AttendanceLedger, AuditLog, CredentialVault, DeviceBindingGuard, HmacSha256Verifier,
    RateLimiter,
};
use punchclock::state::memory::{
    MemoryAttendanceStore, MemoryAuditStore, MemoryCredentialStore, MemoryUserStore,
};
use punchclock::state::UserStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

/// Peer address stamped on requests unless a test picks its own.
pub fn default_peer() -> SocketAddr {
    "127.0.0.1:4000".parse().unwrap()
}

pub struct TestApp {
    pub router: Router,
    pub users: Arc<MemoryUserStore>,
    pub tokens: Arc<TokenService>,
    pub config: Arc<Config>,
}

/// Full application wired against in-memory stores and the HMAC verifier.
pub fn test_app() -> TestApp {
    let config = Arc::new(Config::test_config());
    let users = Arc::new(MemoryUserStore::new());
    let users_dyn: Arc<dyn UserStore> = users.clone();

    let audit = Arc::new(AuditLog::new(Arc::new(MemoryAuditStore::new())));
    let guard = Arc::new(DeviceBindingGuard::new(
        Arc::clone(&users_dyn),
        Arc::clone(&audit),
    ));
    let ledger = Arc::new(AttendanceLedger::new(
        config.geofence(),
        Arc::clone(&guard),
        Arc::new(MemoryAttendanceStore::new()),
        Arc::clone(&audit),
    ));
    let vault = Arc::new(CredentialVault::new(
        Arc::new(MemoryCredentialStore::new()),
        Arc::clone(&audit),
        Arc::new(HmacSha256Verifier),
        config.lockout_policy(),
    ));
    let tokens = Arc::new(TokenService::new(&config.jwt_secret, config.token_ttl_secs));

    let auth_state = Arc::new(AuthState {
        tokens: Arc::clone(&tokens),
        users: Arc::clone(&users_dyn),
    });
    let app_state = AppState {
        ledger,
        guard,
        vault,
        limiter: Arc::new(RateLimiter::new()),
        audit,
        users: users_dyn,
        tokens: Arc::clone(&tokens),
        config: Arc::clone(&config),
    };

    TestApp {
        router: create_router(app_state, auth_state),
        users,
        tokens,
        config,
    }
}

impl TestApp {
    /// Seed a user directly into the store and return (user, bearer token).
    pub async fn seed_user(&self, id: &str, role: Role, device_id: &str) -> (User, String) {
        let user = User {
            id: id.to_string(),
            email: format!("{}@example.com", id),
            name: id.to_string(),
            department: "ops".to_string(),
            role,
            registered_device_id: device_id.to_string(),
            password_digest: hash_password("Str0ng-pass"),
            registered_at: chrono::Utc::now(),
        };
        self.users.insert(user.clone()).await.unwrap();
        let token = self.tokens.mint(&user).unwrap();
        (user, token)
    }

    pub async fn post_json(
        &self,
        uri: &str,
        token: Option<&str>,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();
        send(self.router.clone(), request, default_peer()).await
    }

    /// POST from a chosen peer address with extra headers. Used by tests that
    /// exercise per-client rate limiting.
    pub async fn post_json_from(
        &self,
        uri: &str,
        peer: SocketAddr,
        extra_headers: &[(&str, &str)],
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        for (name, value) in extra_headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();
        send(self.router.clone(), request, peer).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = builder.body(Body::empty()).unwrap();
        send(self.router.clone(), request, default_peer()).await
    }
}

async fn send(
    router: Router,
    mut request: Request<Body>,
    peer: SocketAddr,
) -> (StatusCode, serde_json::Value) {
    use http_body_util::BodyExt;
    // `oneshot` bypasses the connect-info make-service, so the peer address
    // goes in as the extension that service would have inserted.
    request
        .extensions_mut()
        .insert(axum::extract::ConnectInfo(peer));
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, value)
}

/// A point ~80m from the test geofence center, inside the 100m radius.
pub fn inside_location() -> serde_json::Value {
    serde_json::json!({ "lat": -32.9198, "lng": -60.7077 })
}

/// A point ~580m from the test geofence center, well outside.
pub fn outside_location() -> serde_json::Value {
    serde_json::json!({ "lat": -32.9250, "lng": -60.7068 })
}
