use async_trait::async_trait;

use super::manager::DatabaseError;
use super::models::{
    EndpointUsage, Identity, IdentityChange, QueryOutcome, UserUsage, WhitelistedQuery,
};

/// Identity rows.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_identity(&self, id: i32) -> Result<Option<Identity>, DatabaseError>;

    async fn find_identity_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Identity>, DatabaseError>;

    async fn list_identities(&self) -> Result<Vec<Identity>, DatabaseError>;

    /// Whether `username` belongs to a row other than `excluding`.
    async fn username_taken(
        &self,
        username: &str,
        excluding: Option<i32>,
    ) -> Result<bool, DatabaseError>;

    /// Insert a new identity and return its id. Fails with `UniqueViolation` on a taken name.
    async fn insert_identity(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<i32, DatabaseError>;

    /// Apply `change` to row `id`, returning the updated row or `None` if no row matched.
    async fn update_identity(
        &self,
        id: i32,
        change: &IdentityChange,
    ) -> Result<Option<Identity>, DatabaseError>;

    /// Delete row `id`, returning the number of rows removed.
    async fn delete_identity(&self, id: i32) -> Result<u64, DatabaseError>;
}

/// Usage counters. Both increments are atomic insert-or-increment operations: concurrent calls
/// on the same key are all reflected in the stored count.
#[async_trait]
pub trait UsageStore: Send + Sync {
    async fn increment_endpoint_usage(
        &self,
        endpoint: &str,
        method: &str,
    ) -> Result<EndpointUsage, DatabaseError>;

    async fn increment_user_usage(
        &self,
        user_id: i32,
        success: bool,
    ) -> Result<UserUsage, DatabaseError>;

    async fn find_user_usage(&self, user_id: i32) -> Result<Option<UserUsage>, DatabaseError>;

    /// All per-user counters ordered by user id.
    async fn list_user_usage(&self) -> Result<Vec<UserUsage>, DatabaseError>;

    /// All per-endpoint counters ordered by endpoint, then method.
    async fn list_endpoint_usage(&self) -> Result<Vec<EndpointUsage>, DatabaseError>;
}

/// Execution of already-whitelisted ad-hoc statements.
#[async_trait]
pub trait StatementStore: Send + Sync {
    async fn execute_statement(
        &self,
        query: &WhitelistedQuery,
    ) -> Result<QueryOutcome, DatabaseError>;
}

#[async_trait]
pub trait Store: IdentityStore + UsageStore + StatementStore {
    async fn health_check(&self) -> Result<(), DatabaseError>;
}
