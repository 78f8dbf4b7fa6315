use async_trait::async_trait;
use sqlx::postgres::PgTypeInfo;
use sqlx::{Executor, PgPool};
use std::time::Duration;

use super::bounded;
use super::dynamic::{bind_all, leading_integer, row_to_json};
use super::manager::{DatabaseError, DatabaseManager};
use super::models::{
    CommandKind, EndpointUsage, Identity, IdentityChange, QueryOutcome, UserUsage,
    WhitelistedQuery,
};
use super::store::{IdentityStore, StatementStore, Store, UsageStore};

/// Postgres-backed store. Every call is bounded by `statement_timeout`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    statement_timeout: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool, statement_timeout: Duration) -> Self {
        Self {
            pool,
            statement_timeout,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Types Postgres infers for the placeholders of `sql`, in order.
    async fn parameter_types(&self, sql: &str) -> Result<Vec<PgTypeInfo>, DatabaseError> {
        let described = bounded(self.statement_timeout, self.pool.describe(sql)).await?;
        Ok(described
            .parameters()
            .and_then(|params| params.left())
            .map(<[PgTypeInfo]>::to_vec)
            .unwrap_or_default())
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn find_identity(&self, id: i32) -> Result<Option<Identity>, DatabaseError> {
        let query = sqlx::query_as::<_, Identity>(
            "SELECT id, username, password, is_admin FROM users WHERE id = $1",
        )
        .bind(id);
        bounded(self.statement_timeout, query.fetch_optional(&self.pool)).await
    }

    async fn find_identity_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Identity>, DatabaseError> {
        let query = sqlx::query_as::<_, Identity>(
            "SELECT id, username, password, is_admin FROM users WHERE username = $1",
        )
        .bind(username);
        bounded(self.statement_timeout, query.fetch_optional(&self.pool)).await
    }

    async fn list_identities(&self) -> Result<Vec<Identity>, DatabaseError> {
        let query = sqlx::query_as::<_, Identity>(
            "SELECT id, username, password, is_admin FROM users ORDER BY id",
        );
        bounded(self.statement_timeout, query.fetch_all(&self.pool)).await
    }

    async fn username_taken(
        &self,
        username: &str,
        excluding: Option<i32>,
    ) -> Result<bool, DatabaseError> {
        let query = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (
                SELECT 1 FROM users
                WHERE username = $1 AND ($2::INTEGER IS NULL OR id <> $2)
            )",
        )
        .bind(username)
        .bind(excluding);
        bounded(self.statement_timeout, query.fetch_one(&self.pool)).await
    }

    async fn insert_identity(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<i32, DatabaseError> {
        let query = sqlx::query_scalar::<_, i32>(
            "INSERT INTO users (username, password) VALUES ($1, $2) RETURNING id",
        )
        .bind(username)
        .bind(password_hash);
        bounded(self.statement_timeout, query.fetch_one(&self.pool)).await
    }

    async fn update_identity(
        &self,
        id: i32,
        change: &IdentityChange,
    ) -> Result<Option<Identity>, DatabaseError> {
        let query = sqlx::query_as::<_, Identity>(change.statement())
            .bind(change.value())
            .bind(id);
        bounded(self.statement_timeout, query.fetch_optional(&self.pool)).await
    }

    async fn delete_identity(&self, id: i32) -> Result<u64, DatabaseError> {
        let query = sqlx::query("DELETE FROM users WHERE id = $1").bind(id);
        let result = bounded(self.statement_timeout, query.execute(&self.pool)).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl UsageStore for PgStore {
    async fn increment_endpoint_usage(
        &self,
        endpoint: &str,
        method: &str,
    ) -> Result<EndpointUsage, DatabaseError> {
        // One statement: the unique key makes concurrent first hits collapse into increments.
        let query = sqlx::query_as::<_, EndpointUsage>(
            "INSERT INTO endpoint_stats (endpoint, method, call_count)
             VALUES ($1, $2, 1)
             ON CONFLICT (endpoint, method)
             DO UPDATE SET call_count = endpoint_stats.call_count + 1
             RETURNING endpoint, method, call_count",
        )
        .bind(endpoint)
        .bind(method);
        bounded(self.statement_timeout, query.fetch_one(&self.pool)).await
    }

    async fn increment_user_usage(
        &self,
        user_id: i32,
        success: bool,
    ) -> Result<UserUsage, DatabaseError> {
        let (succeeded, failed): (i64, i64) = if success { (1, 0) } else { (0, 1) };
        let query = sqlx::query_as::<_, UserUsage>(
            "INSERT INTO user_api_usage (user_id, total_calls, successful_calls, failed_calls)
             VALUES ($1, 1, $2, $3)
             ON CONFLICT (user_id) DO UPDATE SET
                 total_calls = user_api_usage.total_calls + 1,
                 successful_calls = user_api_usage.successful_calls + EXCLUDED.successful_calls,
                 failed_calls = user_api_usage.failed_calls + EXCLUDED.failed_calls
             RETURNING user_id, total_calls, successful_calls, failed_calls",
        )
        .bind(user_id)
        .bind(succeeded)
        .bind(failed);
        bounded(self.statement_timeout, query.fetch_one(&self.pool)).await
    }

    async fn find_user_usage(&self, user_id: i32) -> Result<Option<UserUsage>, DatabaseError> {
        let query = sqlx::query_as::<_, UserUsage>(
            "SELECT user_id, total_calls, successful_calls, failed_calls
             FROM user_api_usage WHERE user_id = $1",
        )
        .bind(user_id);
        bounded(self.statement_timeout, query.fetch_optional(&self.pool)).await
    }

    async fn list_user_usage(&self) -> Result<Vec<UserUsage>, DatabaseError> {
        let query = sqlx::query_as::<_, UserUsage>(
            "SELECT user_id, total_calls, successful_calls, failed_calls
             FROM user_api_usage ORDER BY user_id",
        );
        bounded(self.statement_timeout, query.fetch_all(&self.pool)).await
    }

    async fn list_endpoint_usage(&self) -> Result<Vec<EndpointUsage>, DatabaseError> {
        let query = sqlx::query_as::<_, EndpointUsage>(
            "SELECT endpoint, method, call_count
             FROM endpoint_stats ORDER BY endpoint, method",
        );
        bounded(self.statement_timeout, query.fetch_all(&self.pool)).await
    }
}

#[async_trait]
impl StatementStore for PgStore {
    async fn execute_statement(
        &self,
        query: &WhitelistedQuery,
    ) -> Result<QueryOutcome, DatabaseError> {
        match query.command_kind() {
            CommandKind::Select => {
                let sql = query.sql_text();
                let types = self.parameter_types(sql).await?;
                let statement = bind_all(sqlx::query(sql), query.params(), &types)?;
                let rows = bounded(self.statement_timeout, statement.fetch_all(&self.pool)).await?;
                Ok(QueryOutcome::Rows {
                    rows: rows.iter().map(row_to_json).collect(),
                })
            }
            CommandKind::Insert => {
                let sql = query.insert_statement();
                let types = self.parameter_types(&sql).await?;
                let statement = bind_all(sqlx::query(sql.as_ref()), query.params(), &types)?;
                let rows = bounded(self.statement_timeout, statement.fetch_all(&self.pool)).await?;
                Ok(QueryOutcome::Inserted {
                    inserted_id: rows.first().and_then(leading_integer),
                    rows_affected: rows.len() as u64,
                })
            }
        }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> Result<(), DatabaseError> {
        bounded(self.statement_timeout, DatabaseManager::health_check(&self.pool)).await
    }
}
