use super::error::AuthError;
use super::model::Identity;
use std::collections::HashMap;

/// Per-route predicate: does the verified caller own the resource named by the route?
///
/// Implementations backed by a domain store should return `AuthError::StoreUnavailable`
/// (or any error) when they cannot tell; the middleware then denies the request.
#[async_trait::async_trait]
pub trait OwnershipCheck: Send + Sync {
    async fn owns(
        &self,
        caller: Identity,
        params: &HashMap<String, String>,
    ) -> Result<bool, AuthError>;
}

/// The route parameter itself is the owner's identity, e.g. `/api/users/:owner_id/...`.
#[derive(Debug, Clone)]
pub struct PathParamOwner {
    param: String,
}

impl PathParamOwner {
    pub fn new(param: impl Into<String>) -> Self {
        Self {
            param: param.into(),
        }
    }
}

#[async_trait::async_trait]
impl OwnershipCheck for PathParamOwner {
    async fn owns(
        &self,
        caller: Identity,
        params: &HashMap<String, String>,
    ) -> Result<bool, AuthError> {
        let owner = params
            .get(&self.param)
            .and_then(|raw| raw.parse::<Identity>().ok());
        Ok(owner == Some(caller))
    }
}
