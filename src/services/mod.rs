pub mod account_service;
pub mod error;
pub mod query_gateway;
pub mod usage_ledger;

pub use account_service::{AccountService, LoginOutcome, UpdatableField};
pub use error::ServiceError;
pub use query_gateway::QueryGateway;
pub use usage_ledger::UsageLedger;
