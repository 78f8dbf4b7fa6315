// handlers/mod.rs - Two-tier handler layout
//
// Public (no session) → Protected (session token verified by require_auth)

pub mod protected;
pub mod public;
