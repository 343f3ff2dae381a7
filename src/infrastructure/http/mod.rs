use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::controllers::{
    auth::AuthController,
    health::{self, Readiness},
    oauth::OAuthController,
};
use crate::domain::auth::{OAuthCallbackHandler, PathParamOwner, SessionStore, TokenIssuer};
use crate::infrastructure::auth::{auth_middleware, ownership_middleware, request_id_middleware, OwnershipGuard};
use crate::infrastructure::config::Config;
use crate::infrastructure::db::DbPool;

/// Everything the router needs. Built once in `main` and by the e2e harness.
#[derive(Clone)]
pub struct AppServices {
    pub issuer: Arc<TokenIssuer>,
    pub oauth: Arc<OAuthCallbackHandler>,
    pub store: Arc<dyn SessionStore>,
    pub pool: Option<Arc<DbPool>>,
    /// Upper bound for ownership lookups made by the middleware.
    pub ownership_timeout: std::time::Duration,
    pub secure_cookies: bool,
}

pub fn build_router(services: AppServices) -> Router {
    let signer = services.issuer.signer().clone();
    let auth_controller = Arc::new(AuthController::new(
        services.issuer.clone(),
        services.secure_cookies,
    ));
    let oauth_controller = Arc::new(OAuthController::new(
        services.oauth.clone(),
        services.secure_cookies,
    ));

    // Sign-in and token endpoints (public)
    let oauth_routes = Router::new()
        .route("/auth/signin/:provider", get(OAuthController::signin))
        .route("/auth/callback/:provider", get(OAuthController::callback))
        .with_state(oauth_controller);

    let token_routes = Router::new()
        .route("/auth/tokens", post(AuthController::refresh))
        .route("/auth/logout", post(AuthController::logout))
        .with_state(auth_controller.clone());

    // Authenticated routes
    let session_routes = Router::new()
        .route("/api/session", get(AuthController::session))
        .route_layer(middleware::from_fn_with_state(signer.clone(), auth_middleware));

    // Authenticated and owner-only routes; the ownership layer runs after authentication
    let owner_guard = OwnershipGuard::new(
        Arc::new(PathParamOwner::new("owner_id")),
        services.ownership_timeout,
    );
    let owner_routes = Router::new()
        .route(
            "/api/users/:owner_id/sessions",
            delete(AuthController::revoke_sessions),
        )
        .route_layer(middleware::from_fn_with_state(owner_guard, ownership_middleware))
        .route_layer(middleware::from_fn_with_state(signer, auth_middleware))
        .with_state(auth_controller);

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::health_ready))
        .with_state(Readiness {
            store: services.store.clone(),
            pool: services.pool.clone(),
        })
        .merge(oauth_routes)
        .merge(token_routes)
        .merge(session_routes)
        .merge(owner_routes)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server with all routes configured
pub async fn start_http_server(
    config: Arc<Config>,
    services: AppServices,
) -> anyhow::Result<()> {
    let app = build_router(services);

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;

    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
