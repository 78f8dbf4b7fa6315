// handlers/public/auth/mod.rs - Public authentication handlers
//
// Account creation and token acquisition. None of these require a session.

use serde::Deserialize;

pub mod login; // POST /login - verify credentials, set session cookie
pub mod logout; // GET /logout - clear session cookie
pub mod register; // POST /register - create new identity

pub use login::login_post;
pub use logout::logout_get;
pub use register::register_post;

/// Body shared by `/register` and `/login`.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}
