pub mod clock;
pub mod dto;
pub mod error;
pub mod jwt;
pub mod model;
pub mod oauth;
pub mod ownership;
pub mod service;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dto::{RefreshTokenRequest, SessionInfo, TokenResponse};
pub use error::{AuthError, StoreError};
pub use jwt::{AccessClaims, TokenClass, TokenSigner};
pub use model::{Identity, Invalidation, ProviderIdentity, RefreshRecord, TokenId, TokenPair};
pub use oauth::{IdentityResolver, OAuthCallbackHandler, OAuthProvider};
pub use ownership::{OwnershipCheck, PathParamOwner};
pub use service::{ReplayPolicy, TokenIssuer, TokenLifetimes};
pub use store::SessionStore;
