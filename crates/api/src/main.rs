use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vigil_db::pg::{PgConnectionMirror, PgTokenStore, PgUserDirectory};

use vigil_api::background::token_sweep;
use vigil_api::config::ServerConfig;
use vigil_api::notifications::NotificationRouter;
use vigil_api::router::build_app_router;
use vigil_api::state::{AppState, Stores};
use vigil_api::ws;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vigil_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        instance_id = %config.instance_id,
        allow_multiple_sessions = config.session.allow_multiple_sessions,
        "Loaded server configuration"
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = vigil_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    vigil_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    vigil_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- App state ---
    let stores = Stores {
        tokens: Arc::new(PgTokenStore::new(pool.clone())),
        users: Arc::new(PgUserDirectory::new(pool.clone())),
        connections: Arc::new(PgConnectionMirror::new(pool)),
    };
    let state = AppState::new(config.clone(), stores);

    // Rows left active by a previous run of this instance.
    if let Err(e) = state.hub.sweep_stale_mirror().await {
        tracing::warn!(error = %e, "Startup connection sweep failed");
    }

    // --- Background tasks ---
    let background_cancel = CancellationToken::new();

    let heartbeat_handle =
        ws::start_heartbeat(Arc::clone(&state.ws_manager), background_cancel.clone());

    let notification_router = NotificationRouter::new(Arc::clone(&state.ws_manager));
    let router_handle = tokio::spawn(
        notification_router.run(state.event_bus.subscribe(), background_cancel.clone()),
    );

    let sweep_handle = tokio::spawn(token_sweep::run(
        Arc::clone(&state.tokens),
        Duration::from_secs(config.token_sweep_interval_secs),
        background_cancel.clone(),
    ));

    tracing::info!("Background tasks started (heartbeat, notification router, token sweep)");

    // --- Router ---
    let app = build_app_router(state.clone(), &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    state.hub.disconnect_all().await;

    let ws_count = state.ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    state.ws_manager.shutdown_all().await;

    background_cancel.cancel();
    let drain = Duration::from_secs(config.shutdown_timeout_secs);
    let _ = tokio::time::timeout(drain, heartbeat_handle).await;
    let _ = tokio::time::timeout(drain, router_handle).await;
    let _ = tokio::time::timeout(drain, sweep_handle).await;
    tracing::info!("Background tasks stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server shuts
/// down cleanly whether stopped interactively or by a process manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
