use axum::{
    routing::{get, patch},
    Router,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use crate::auth::CredentialVerifier;
use crate::config::FarmdeskConfig;
use crate::reminders::{self, ReminderQueue};
use crate::resolver::SchemaAdaptiveResolver;

pub mod routes;

/// Server state
pub struct AppState {
    pub database_path: PathBuf,
    pub resolver: Arc<SchemaAdaptiveResolver>,
    pub verifier: CredentialVerifier,
    pub reminders: Arc<ReminderQueue>,
    pub query_timeout: Duration,
}

impl AppState {
    pub fn from_config(config: &FarmdeskConfig) -> anyhow::Result<Self> {
        let secret = config
            .jwt_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow::anyhow!("JWT secret not configured (set JWT_SECRET or jwt_secret in farmdesk.toml)"))?;

        Ok(Self {
            database_path: config.database_path(),
            resolver: Arc::new(config.resolver()),
            verifier: CredentialVerifier::new(secret).with_required_role(config.worker_role()),
            reminders: Arc::new(ReminderQueue::new(config.reminder_ttl(), config.reminder_capacity())),
            query_timeout: config.query_timeout(),
        })
    }
}

/// Worker API routes, mounted under `/api/worker`
pub fn router(state: Arc<AppState>) -> Router {
    let worker = Router::new()
        .route("/tasks", get(routes::get_tasks))
        .route("/new-orders", get(routes::get_new_orders))
        .route("/update-order-status", patch(routes::update_order_status))
        .route("/time-table", get(routes::get_time_table))
        .route("/reminders", get(routes::get_reminders));

    Router::new()
        .nest("/api/worker", worker)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(port: u16, state: AppState) -> anyhow::Result<()> {
    let state = Arc::new(state);
    let poller = reminders::spawn_poller(state.database_path.clone(), Arc::clone(&state.reminders));
    let app = router(Arc::clone(&state));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Starting server on {}", addr);
    println!("🌍 Server running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    poller.abort();
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Received Ctrl+C, shutting down");
}
