pub mod identity;
pub mod query;
pub mod usage;

pub use identity::{Identity, IdentityChange};
pub use query::{CommandKind, QueryOutcome, QueryRejection, SqlParam, WhitelistedQuery};
pub use usage::{EndpointUsage, UserUsage};
