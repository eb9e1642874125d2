// Main entry point for the punchclock attendance service

use punchclock::api::{create_router, AppState};
use punchclock::auth::middleware::AuthState;
use punchclock::auth::token::TokenService;
use punchclock::config::Config;
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
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load and validate configuration first (before any logging)
    let config = Config::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("configuration error: {}", e)
    })?;

    init_tracing(&config)?;

    info!("Starting punchclock attendance service");
    info!(
        bind_address = %config.bind_address,
        port = config.port,
        geofence_radius_m = config.geofence_radius_m,
        "Configuration loaded"
    );

    // Stores
    let users: Arc<dyn UserStore> = Arc::new(MemoryUserStore::new());
    let attendance = Arc::new(MemoryAttendanceStore::new());
    let credentials = Arc::new(MemoryCredentialStore::new());
    let audit_store = Arc::new(MemoryAuditStore::new());

    // Engine components
    let audit = Arc::new(AuditLog::new(audit_store));
    let guard = Arc::new(DeviceBindingGuard::new(
        Arc::clone(&users),
        Arc::clone(&audit),
    ));
    let ledger = Arc::new(AttendanceLedger::new(
        config.geofence(),
        Arc::clone(&guard),
        attendance,
        Arc::clone(&audit),
    ));
    let vault = Arc::new(CredentialVault::new(
        credentials,
        Arc::clone(&audit),
        Arc::new(HmacSha256Verifier),
        config.lockout_policy(),
    ));
    let limiter = Arc::new(RateLimiter::new());
    let tokens = Arc::new(TokenService::new(&config.jwt_secret, config.token_ttl_secs));

    info!("Stores and engine initialized");

    let auth_state = Arc::new(AuthState {
        tokens: Arc::clone(&tokens),
        users: Arc::clone(&users),
    });

    let app_state = AppState {
        ledger,
        guard,
        vault,
        limiter,
        audit,
        users,
        tokens,
        config: Arc::new(config.clone()),
    };

    let router = create_router(app_state, auth_state);

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        error!(error = %e, addr = %addr, "Failed to bind to address");
        e
    })?;

    info!(addr = %addr, "Server listening on {}", addr);

    // Peer addresses feed the per-client rate-limit keys.
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!(error = %e, "Server error");
            e
        })?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing subscriber based on configuration
fn init_tracing(config: &Config) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_env_filter(filter);

    if config.log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use signal::unix::{signal, SignalKind};
        signal(SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            info!("SIGTERM received, starting graceful shutdown");
        },
    }
}
