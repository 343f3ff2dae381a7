use crate::error::AppError;

/// Failures of the session store port. Both variants mean "state unknown".
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session store timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("session store backend error: {0}")]
    Backend(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("no credentials presented")]
    MissingCredentials,
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("refresh token already used")]
    AlreadyUsed,
    #[error("refresh token not found")]
    NotFound,
    #[error("caller does not own the resource")]
    Forbidden,
    #[error("session store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
    #[error("oauth provider error: {0}")]
    Provider(String),
    #[error("identity resolution failed: {0}")]
    IdentityResolution(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Emit the rejection at the level its kind deserves. Clients only ever see the
    /// collapsed `AppError`.
    pub fn log(&self) {
        match self {
            Self::MissingCredentials | Self::Malformed(_) | Self::NotFound => {
                tracing::debug!(error = %self, "authentication rejected");
            }
            Self::InvalidSignature => {
                tracing::warn!(error = %self, "token signature mismatch, possible tampering");
            }
            Self::Expired => {
                tracing::trace!("expired token presented");
            }
            Self::AlreadyUsed => {
                tracing::warn!(security = true, error = %self, "refresh token replay detected");
            }
            Self::Forbidden => {
                tracing::info!(error = %self, "authorization rejected");
            }
            Self::StoreUnavailable(_) | Self::Internal(_) => {
                tracing::error!(error = %self, "authentication dependency failure");
            }
            Self::Provider(_) | Self::IdentityResolution(_) => {
                tracing::warn!(error = %self, "sign-in failed");
            }
        }
    }

    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials
            | AuthError::Malformed(_)
            | AuthError::InvalidSignature
            | AuthError::Expired
            | AuthError::AlreadyUsed
            | AuthError::NotFound => AppError::Unauthenticated,
            AuthError::Forbidden => AppError::Forbidden,
            AuthError::StoreUnavailable(_) => AppError::ServiceUnavailable,
            AuthError::Provider(_) | AuthError::IdentityResolution(_) => {
                AppError::SignInFailed
            }
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}
