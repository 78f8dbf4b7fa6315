// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Security Level: None
// Middleware: endpoint tracking only

pub mod auth;
pub mod health;
pub mod usage;
