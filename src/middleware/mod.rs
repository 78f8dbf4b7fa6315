pub mod auth;
pub mod cookie;
pub mod response;
pub mod usage;

pub use auth::{extract_token, require_auth, AuthUser};
pub use cookie::{clear_session_cookie, session_cookie, SESSION_COOKIE};
pub use response::{ApiResponse, ApiResult};
pub use usage::{track_endpoint_usage, UNMATCHED_ENDPOINT};
