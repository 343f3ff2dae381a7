use axum::{
    extract::{Path, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::auth::{AuthError, Identity, OwnershipCheck, StoreError, TokenSigner};
use crate::error::AppError;

/// Verified caller, injected into request extensions after authentication
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub identity: Identity,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredentials)?
        .to_str()
        .map_err(|_| AuthError::Malformed("authorization header is not ascii".to_string()))?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(AuthError::Malformed("expected a bearer credential".to_string())),
    }
}

/// Authentication middleware: extract, verify, attach. Never calls `next` on failure.
pub async fn auth_middleware(
    State(signer): State<Arc<TokenSigner>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let verified = bearer_token(request.headers())
        .and_then(|token| signer.verify(token))
        .and_then(|claims| {
            Ok(AuthUser {
                identity: claims.identity()?,
                issued_at: claims.issued_at(),
                expires_at: claims.expires_at(),
            })
        });

    let auth_user = match verified {
        Ok(user) => user,
        Err(err) => {
            err.log();
            return Err(err.into());
        }
    };

    tracing::debug!(identity = %auth_user.identity, "request authenticated");
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Ownership step for routes that name a resource owner. Layer it inside `auth_middleware`
/// with `route_layer` so the path parameters are available.
#[derive(Clone)]
pub struct OwnershipGuard {
    check: Arc<dyn OwnershipCheck>,
    timeout: Duration,
}

impl OwnershipGuard {
    pub fn new(check: Arc<dyn OwnershipCheck>, timeout: Duration) -> Self {
        Self { check, timeout }
    }
}

pub async fn ownership_middleware(
    State(guard): State<OwnershipGuard>,
    Path(params): Path<HashMap<String, String>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(caller) = request.extensions().get::<AuthUser>().map(|u| u.identity) else {
        AuthError::MissingCredentials.log();
        return Err(AppError::Unauthenticated);
    };

    let decision = match tokio::time::timeout(guard.timeout, guard.check.owns(caller, &params)).await {
        Ok(result) => result,
        Err(_) => Err(AuthError::StoreUnavailable(StoreError::Timeout(guard.timeout))),
    };

    match decision {
        Ok(true) => Ok(next.run(request).await),
        Ok(false) => {
            tracing::info!(identity = %caller, params = ?params, "caller does not own resource");
            Err(AppError::Forbidden)
        }
        Err(err) => {
            err.log();
            Err(match err {
                AuthError::StoreUnavailable(_) | AuthError::Internal(_) => AppError::ServiceUnavailable,
                other => other.into(),
            })
        }
    }
}
