pub mod dynamic;
pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{IdentityStore, StatementStore, Store, UsageStore};

use std::future::Future;
use std::time::Duration;

/// Run a storage call under a deadline so a stalled store cannot hang the request.
pub async fn bounded<T, E, F>(limit: Duration, call: F) -> Result<T, DatabaseError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<DatabaseError>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(DatabaseError::Timeout(limit)),
    }
}
