pub mod cookie;
pub mod middleware;
pub mod request_id;

pub use cookie::{clear_refresh_cookie, get_cookie, refresh_cookie, REFRESH_COOKIE_NAME};
pub use middleware::{auth_middleware, ownership_middleware, AuthUser, OwnershipGuard};
pub use request_id::{request_id_middleware, RequestId};
