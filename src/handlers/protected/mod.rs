// handlers/protected/mod.rs - Protected handlers (session required)
//
// Security Level: valid session token (cookie or bearer)
// Middleware: require_auth, which attaches AuthUser to the request

pub mod account; // /me, /update-user, /delete-user, /get-users
pub mod query; // /api/v1/sql
pub mod usage; // /update-user-usage, /get-self-usage
