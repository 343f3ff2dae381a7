use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::domain::auth::{AuthError, RefreshTokenRequest, SessionInfo, TokenIssuer, TokenResponse};
use crate::{
    error::AppResult,
    infrastructure::auth::{clear_refresh_cookie, get_cookie, refresh_cookie, AuthUser, REFRESH_COOKIE_NAME},
};

/// Header alternative to the JSON body for clients that cannot send one.
pub const X_REFRESH_TOKEN: &str = "x-refresh-token";

#[derive(Debug, Serialize)]
pub struct RevokeResponse {
    pub revoked: u64,
}

pub struct AuthController {
    issuer: Arc<TokenIssuer>,
    secure_cookies: bool,
}

/// Body first, then the `X-Refresh-Token` header, then the refresh cookie.
fn presented_refresh_token(headers: &HeaderMap, body: Option<RefreshTokenRequest>) -> Option<String> {
    body.and_then(|b| b.refresh_token)
        .filter(|t| !t.is_empty())
        .or_else(|| {
            headers
                .get(X_REFRESH_TOKEN)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .or_else(|| get_cookie(headers, REFRESH_COOKIE_NAME).map(str::to_string))
        .filter(|t| !t.is_empty())
}

impl AuthController {
    pub fn new(issuer: Arc<TokenIssuer>, secure_cookies: bool) -> Self {
        Self {
            issuer,
            secure_cookies,
        }
    }

    /// POST /auth/tokens - Rotate a refresh token into a new pair
    pub async fn refresh(
        State(controller): State<Arc<AuthController>>,
        headers: HeaderMap,
        body: Option<Json<RefreshTokenRequest>>,
    ) -> AppResult<impl IntoResponse> {
        let presented = presented_refresh_token(&headers, body.map(|Json(b)| b))
            .ok_or(AuthError::MissingCredentials)
            .inspect_err(AuthError::log)?;

        let pair = controller
            .issuer
            .refresh(&presented)
            .await
            .inspect_err(AuthError::log)?;

        let now = controller.issuer.signer().clock().now();
        let cookie = refresh_cookie(
            pair.refresh_token.as_str(),
            pair.refresh_expires_at - now,
            controller.secure_cookies,
        );

        Ok((
            [(header::SET_COOKIE, cookie)],
            Json(TokenResponse::from_pair(&pair, now)),
        ))
    }

    /// POST /auth/logout - End the session of the presented refresh token
    pub async fn logout(
        State(controller): State<Arc<AuthController>>,
        headers: HeaderMap,
        body: Option<Json<RefreshTokenRequest>>,
    ) -> AppResult<impl IntoResponse> {
        if let Some(presented) = presented_refresh_token(&headers, body.map(|Json(b)| b)) {
            controller
                .issuer
                .logout(&presented)
                .await
                .inspect_err(AuthError::log)?;
        }

        Ok((
            StatusCode::NO_CONTENT,
            [(header::SET_COOKIE, clear_refresh_cookie(controller.secure_cookies))],
        ))
    }

    /// GET /api/session - Describe the caller's access token
    pub async fn session(Extension(auth_user): Extension<AuthUser>) -> Json<SessionInfo> {
        Json(SessionInfo {
            identity: auth_user.identity,
            issued_at: auth_user.issued_at,
            expires_at: auth_user.expires_at,
        })
    }

    /// DELETE /api/users/:owner_id/sessions - Sign the owner out everywhere
    pub async fn revoke_sessions(
        State(controller): State<Arc<AuthController>>,
        Extension(auth_user): Extension<AuthUser>,
    ) -> AppResult<Json<RevokeResponse>> {
        let revoked = controller
            .issuer
            .revoke(auth_user.identity)
            .await
            .inspect_err(AuthError::log)?;

        Ok(Json(RevokeResponse { revoked }))
    }
}
