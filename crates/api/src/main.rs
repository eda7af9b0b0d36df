use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storyforge_api::config::ServerConfig;
use storyforge_api::router::build_app_router;
use storyforge_api::state::AppState;
use storyforge_api::{background, ws};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storyforge_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = storyforge_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    storyforge_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    storyforge_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Completion and payment providers ---
    let llm = Arc::new(storyforge_llm::LlmClient::from_config(&config.llm));
    let payments = storyforge_payments::gateway_from_config(&config.payments);

    // --- WebSocket manager and presence ---
    let ws_manager = Arc::new(ws::WsManager::new());
    let presence = Arc::new(ws::PresenceTracker::new());

    // --- Event bus ---
    let event_bus = Arc::new(storyforge_events::EventBus::default());

    // Persist every event as project activity.
    let persistence_handle = tokio::spawn(storyforge_events::EventPersistence::run(
        pool.clone(),
        event_bus.subscribe(),
    ));

    // Forward project events to the project's WebSocket room.
    let relay_handle = tokio::spawn(ws::run_event_relay(
        Arc::clone(&ws_manager),
        event_bus.subscribe(),
    ));
    tracing::info!("Event services started (persistence, relay)");

    // --- Background jobs ---
    let jobs_cancel = CancellationToken::new();
    let job_handles: Vec<(&str, JoinHandle<()>)> = vec![
        (
            "heartbeat",
            tokio::spawn(ws::run_heartbeat(
                Arc::clone(&ws_manager),
                jobs_cancel.clone(),
            )),
        ),
        (
            "session cleanup",
            tokio::spawn(background::session_cleanup::run(
                pool.clone(),
                jobs_cancel.clone(),
            )),
        ),
        (
            "subscription rollover",
            tokio::spawn(background::subscription_rollover::run(
                pool.clone(),
                jobs_cancel.clone(),
            )),
        ),
        (
            "presence sweep",
            tokio::spawn(background::presence_sweep::run(
                Arc::clone(&presence),
                Arc::clone(&ws_manager),
                jobs_cancel.clone(),
            )),
        ),
    ];
    tracing::info!(jobs = job_handles.len(), "Background jobs started");

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        ws_manager: Arc::clone(&ws_manager),
        presence,
        event_bus: Arc::clone(&event_bus),
        llm,
        payments,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let grace = Duration::from_secs(config.shutdown_timeout_secs);

    jobs_cancel.cancel();
    for (name, handle) in job_handles {
        if tokio::time::timeout(grace, handle).await.is_err() {
            tracing::warn!(job = name, "Background job did not stop in time");
        }
    }
    tracing::info!("Background jobs stopped");

    // Dropping the last sender closes the channel for persistence and relay.
    drop(event_bus);
    let _ = tokio::time::timeout(grace, persistence_handle).await;
    let _ = tokio::time::timeout(grace, relay_handle).await;
    tracing::info!("Event services shut down");

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
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
