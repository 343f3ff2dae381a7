use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Redirect},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    domain::auth::{AuthError, OAuthCallbackHandler, TokenResponse},
    error::{AppError, AppResult},
    infrastructure::auth::refresh_cookie,
};

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by the provider when the user denies access.
    pub error: Option<String>,
}

pub struct OAuthController {
    handler: Arc<OAuthCallbackHandler>,
    secure_cookies: bool,
}

impl OAuthController {
    pub fn new(handler: Arc<OAuthCallbackHandler>, secure_cookies: bool) -> Self {
        Self {
            handler,
            secure_cookies,
        }
    }

    /// GET /auth/signin/:provider - Redirect to the provider's consent page
    pub async fn signin(
        State(controller): State<Arc<OAuthController>>,
        Path(provider): Path<String>,
    ) -> AppResult<Redirect> {
        let url = controller.handler.begin(&provider).await.map_err(|err| {
            err.log();
            AppError::NotFound(format!("Unknown provider {}", provider))
        })?;

        Ok(Redirect::temporary(&url))
    }

    /// GET /auth/callback/:provider - Finish sign-in and hand out the first token pair
    pub async fn callback(
        State(controller): State<Arc<OAuthController>>,
        Path(provider): Path<String>,
        Query(params): Query<OAuthCallbackParams>,
    ) -> AppResult<impl IntoResponse> {
        if let Some(error) = params.error {
            AuthError::Provider(format!("provider returned error '{}'", error)).log();
            return Err(AppError::SignInFailed);
        }

        let (Some(code), Some(state)) = (params.code, params.state) else {
            return Err(AppError::BadRequest("code and state are required".to_string()));
        };

        controller
            .handler
            .take_state(&provider, &state)
            .await
            .inspect_err(AuthError::log)?;

        let pair = controller
            .handler
            .handle(&provider, &code)
            .await
            .inspect_err(AuthError::log)?;

        let now = controller.handler.issuer().signer().clock().now();
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
}
