use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::domain::auth::SessionStore;
use crate::infrastructure::db::{check_connection, DbPool};

#[derive(Clone)]
pub struct Readiness {
    pub store: Arc<dyn SessionStore>,
    /// Absent when identities are resolved without Postgres.
    pub pool: Option<Arc<DbPool>>,
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub async fn health_ready(State(readiness): State<Readiness>) -> impl IntoResponse {
    let store_ok = match readiness.store.ping().await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(error = %err, "session store not ready");
            false
        }
    };
    let database = match &readiness.pool {
        Some(pool) => match check_connection(pool).await {
            Ok(_) => "connected",
            Err(err) => {
                tracing::warn!(error = %err, "database not ready");
                "disconnected"
            }
        },
        None => "not_configured",
    };

    let ready = store_ok && database != "disconnected";
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if ready { "ready" } else { "not_ready" },
            "session_store": if store_ok { "connected" } else { "disconnected" },
            "database": database,
        })),
    )
}
