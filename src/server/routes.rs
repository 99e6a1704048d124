use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use crate::auth::{extract_token, AuthError};
use crate::claim::OwnerKey;
use crate::reminders::Reminder;
use crate::resolver::{Record, ResolveError};
use crate::server::AppState;
use crate::storage::SqliteStore;

#[derive(Deserialize, Default)]
pub struct TokenParams {
    pub token: Option<String>,
}

#[derive(Deserialize)]
pub struct OrderStatusUpdate {
    pub order_id: Option<Value>,
    pub status: Option<String>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: message.into() }))
}

/// Status and client message for an authentication failure
pub fn auth_error(err: &AuthError) -> ApiError {
    match err {
        AuthError::MissingToken => api_error(StatusCode::UNAUTHORIZED, "Token missing"),
        AuthError::Expired => api_error(StatusCode::UNAUTHORIZED, "Token expired"),
        AuthError::Invalid(_) => api_error(StatusCode::UNAUTHORIZED, "Invalid token"),
        AuthError::RoleMismatch(_) => api_error(StatusCode::FORBIDDEN, "Access denied"),
        AuthError::Signing(_) => api_error(StatusCode::INTERNAL_SERVER_ERROR, "Authentication failed"),
    }
}

/// Status and client message for a resolution failure
pub fn resolve_error(err: &ResolveError) -> ApiError {
    match err {
        ResolveError::UnresolvableIdentity { .. } => api_error(
            StatusCode::BAD_REQUEST,
            "Worker identifier not present in token and no suitable column found to match by email",
        ),
        ResolveError::TableNotFound { .. } => api_error(StatusCode::INTERNAL_SERVER_ERROR, "Tasks table not found"),
        ResolveError::OwnershipColumnNotFound { .. } => {
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Worker column not found in tasks table")
        }
        ResolveError::ResolutionTimedOut => api_error(StatusCode::GATEWAY_TIMEOUT, "Fetching tasks timed out"),
        ResolveError::QueryExecutionFailed(_) => api_error(StatusCode::INTERNAL_SERVER_ERROR, "Error fetching tasks"),
    }
}

/// Run a store operation on the blocking pool
async fn with_store<T, F>(path: PathBuf, read_only: bool, op: F) -> crate::Result<T>
where
    F: FnOnce(&SqliteStore) -> crate::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let store = if read_only {
            SqliteStore::open_read_only(&path)?
        } else {
            SqliteStore::open(&path)?
        };
        op(&store)
    })
    .await
    .map_err(|e| crate::Error::Io(std::io::Error::other(e)))?
}

/// Run `op` over a read-only connection on the blocking pool.
///
/// The connection is opened on the blocking thread, which hands its interrupt
/// handle back. When `limit` expires the running statement is interrupted and
/// the call fails with `ResolutionTimedOut`.
async fn run_interruptible<T, F>(path: PathBuf, limit: Duration, op: F) -> Result<T, ResolveError>
where
    F: FnOnce(&SqliteStore) -> Result<T, ResolveError> + Send + 'static,
    T: Send + 'static,
{
    let (handle_tx, handle_rx) = oneshot::channel();
    let task = tokio::task::spawn_blocking(move || {
        let store = SqliteStore::open_read_only(&path)?;
        let _ = handle_tx.send(store.interrupt_handle());
        op(&store)
    });

    let deadline = Instant::now() + limit;
    // no handle arrives when the open fails; the task reports that error
    let interrupt = match tokio::time::timeout_at(deadline, handle_rx).await {
        Ok(handle) => handle.ok(),
        Err(_) => return Err(ResolveError::ResolutionTimedOut),
    };

    match tokio::time::timeout_at(deadline, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(ResolveError::QueryExecutionFailed(crate::Error::Io(std::io::Error::other(join_err)))),
        Err(_) => {
            if let Some(interrupt) = interrupt {
                interrupt.interrupt();
            }
            Err(ResolveError::ResolutionTimedOut)
        }
    }
}

pub async fn get_tasks(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<TokenParams>,
    body: Bytes,
) -> Result<Json<Vec<Record>>, ApiError> {
    let body_token = serde_json::from_slice::<TokenParams>(&body).ok().and_then(|b| b.token);
    let token = extract_token(&headers, body_token.as_deref(), params.token.as_deref()).ok_or_else(|| {
        tracing::warn!("Authentication failed: token missing");
        auth_error(&AuthError::MissingToken)
    })?;

    let credential = state.verifier.verify(&token).map_err(|e| {
        tracing::warn!("Authentication failed: {}", e);
        auth_error(&e)
    })?;

    tracing::debug!(role = ?credential.role, "Worker authenticated");
    let resolver = Arc::clone(&state.resolver);
    let claim = credential.claim;
    let resolution = run_interruptible(state.database_path.clone(), state.query_timeout, move |store| {
        resolver.resolve(store, &claim)
    })
    .await
    .map_err(|e| {
        tracing::error!("Error resolving tasks: {}", e);
        resolve_error(&e)
    })?;

    tracing::info!(count = resolution.records.len(), path = ?resolution.path, "Tasks returned");
    Ok(Json(resolution.records))
}

pub async fn get_new_orders(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Record>>, ApiError> {
    let orders = with_store(state.database_path.clone(), true, |store| store.approved_orders())
        .await
        .map_err(|e| {
            tracing::error!("Error fetching customer order details: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Error fetching customer order data")
        })?;
    Ok(Json(orders))
}

pub async fn update_order_status(
    State(state): State<Arc<AppState>>,
    Json(update): Json<OrderStatusUpdate>,
) -> Result<Json<Value>, ApiError> {
    let order_id = update.order_id.as_ref().and_then(OwnerKey::from_json);
    let status = update.status.filter(|s| !s.trim().is_empty());
    let (Some(order_id), Some(status)) = (order_id, status) else {
        return Err(api_error(StatusCode::BAD_REQUEST, "Order ID and status are required"));
    };

    let (key, new_status) = (order_id.clone(), status.clone());
    let updated = with_store(state.database_path.clone(), false, move |store| {
        store.update_order_status(&key, &new_status)
    })
    .await
    .map_err(|e| {
        tracing::error!("Error updating order status: {}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "Error updating order status")
    })?;

    if !updated {
        return Err(api_error(StatusCode::NOT_FOUND, "Order not found"));
    }

    tracing::info!(order_id = %order_id, status = status.as_str(), "Order status updated");
    Ok(Json(json!({
        "message": "Order status updated successfully",
        "notification": {
            "text": "Order update",
            "status": status,
            "order_id": order_id.to_json(),
        }
    })))
}

pub async fn get_time_table(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Record>>, ApiError> {
    let schedule = with_store(state.database_path.clone(), true, |store| store.feeding_schedule())
        .await
        .map_err(|e| {
            tracing::error!("Error fetching feeding schedule: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Error fetching feeding schedule")
        })?;
    Ok(Json(schedule))
}

pub async fn get_reminders(State(state): State<Arc<AppState>>) -> Json<Vec<Reminder>> {
    Json(state.reminders.drain().await)
}
