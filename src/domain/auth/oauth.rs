use super::error::AuthError;
use super::model::{Identity, ProviderIdentity, TokenPair};
use super::service::TokenIssuer;
use moka::future::Cache;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// One third-party sign-in provider. The assertion is treated as opaque.
#[async_trait::async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Route name, e.g. `github`.
    fn name(&self) -> &str;

    /// Where to send the browser to start the flow.
    fn authorization_url(&self, state: &str) -> String;

    /// Trade the provider's assertion (authorization code) for the external identity.
    async fn exchange(&self, assertion: &str) -> Result<ProviderIdentity, AuthError>;
}

/// Maps an external identity to a local one, creating it on first sign-in.
#[async_trait::async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn find_or_create(&self, identity: &ProviderIdentity) -> Result<Identity, AuthError>;
}

/// Runs the sign-in flow: provider redirect, CSRF state, assertion exchange, issuance.
pub struct OAuthCallbackHandler {
    providers: HashMap<String, Arc<dyn OAuthProvider>>,
    resolver: Arc<dyn IdentityResolver>,
    issuer: Arc<TokenIssuer>,
    pending_states: Cache<String, String>,
}

impl OAuthCallbackHandler {
    pub fn new(
        providers: Vec<Arc<dyn OAuthProvider>>,
        resolver: Arc<dyn IdentityResolver>,
        issuer: Arc<TokenIssuer>,
        state_ttl: std::time::Duration,
    ) -> Self {
        let providers = providers
            .into_iter()
            .map(|p| (p.name().to_string(), p))
            .collect();
        Self {
            providers,
            resolver,
            issuer,
            pending_states: Cache::builder()
                .max_capacity(100_000)
                .time_to_live(state_ttl)
                .build(),
        }
    }

    pub fn issuer(&self) -> &Arc<TokenIssuer> {
        &self.issuer
    }

    fn provider(&self, name: &str) -> Result<&Arc<dyn OAuthProvider>, AuthError> {
        self.providers
            .get(name)
            .ok_or_else(|| AuthError::Provider(format!("unknown provider '{}'", name)))
    }

    /// Start a sign-in: remember a fresh state and return the provider URL.
    pub async fn begin(&self, provider: &str) -> Result<String, AuthError> {
        let provider = self.provider(provider)?;
        let state = Uuid::new_v4().simple().to_string();
        self.pending_states
            .insert(state.clone(), provider.name().to_string())
            .await;
        Ok(provider.authorization_url(&state))
    }

    /// Check and consume a state issued by `begin` for the same provider.
    pub async fn take_state(&self, provider: &str, state: &str) -> Result<(), AuthError> {
        match self.pending_states.remove(state).await {
            Some(expected) if expected == provider => Ok(()),
            Some(_) => Err(AuthError::Provider("state issued for another provider".to_string())),
            None => Err(AuthError::Provider("unknown or expired state".to_string())),
        }
    }

    /// Exchange the assertion and issue a fresh pair. Nothing is stored on failure.
    pub async fn handle(&self, provider: &str, assertion: &str) -> Result<TokenPair, AuthError> {
        let provider = self.provider(provider)?;
        let external = provider.exchange(assertion).await?;
        let identity = self.resolver.find_or_create(&external).await?;

        tracing::info!(
            provider = %external.provider,
            identity = %identity,
            "provider sign-in resolved"
        );

        self.issuer.issue(identity).await
    }
}
