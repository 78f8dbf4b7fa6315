//! In-process store used by the test-suite and for running the router without Postgres.
//!
//! All state sits behind one async mutex, so every operation is atomic with respect to the
//! others, the same guarantee the Postgres upserts give per row.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::sync::Mutex;

use super::bounded;
use super::manager::DatabaseError;
use super::models::{
    CommandKind, EndpointUsage, Identity, IdentityChange, QueryOutcome, UserUsage,
    WhitelistedQuery,
};
use super::store::{IdentityStore, StatementStore, Store, UsageStore};

#[derive(Default)]
struct State {
    next_identity_id: i32,
    identities: BTreeMap<i32, Identity>,
    user_usage: BTreeMap<i32, UserUsage>,
    endpoint_usage: BTreeMap<(String, String), i64>,
    statements: Vec<WhitelistedQuery>,
    next_row_id: i64,
    rows: HashMap<String, Vec<Map<String, Value>>>,
}

pub struct MemoryStore {
    state: Mutex<State>,
    latency: Duration,
    timeout: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            latency: Duration::ZERO,
            timeout: Duration::from_secs(5),
        }
    }

    /// Make every call take `latency`, failing with a timeout once it exceeds `timeout`.
    pub fn with_latency(mut self, latency: Duration, timeout: Duration) -> Self {
        self.latency = latency;
        self.timeout = timeout;
        self
    }

    /// Seed an identity directly, bypassing registration. Returns its id.
    pub async fn seed_identity(&self, username: &str, password_hash: &str, is_admin: bool) -> i32 {
        let mut state = self.state.lock().await;
        let id = Self::allocate_identity_id(&mut state);
        state.identities.insert(
            id,
            Identity {
                id,
                username: username.to_string(),
                password_hash: password_hash.to_string(),
                is_admin,
            },
        );
        id
    }

    /// Seed rows returned by SELECT statements whose text mentions `table`.
    pub async fn seed_rows(&self, table: &str, rows: Vec<Map<String, Value>>) {
        self.state.lock().await.rows.insert(table.to_string(), rows);
    }

    /// Every statement that reached this store, in arrival order.
    pub async fn executed_statements(&self) -> Vec<WhitelistedQuery> {
        self.state.lock().await.statements.clone()
    }

    async fn io(&self) -> Result<(), DatabaseError> {
        if self.latency.is_zero() {
            return Ok(());
        }
        let latency = self.latency;
        bounded(self.timeout, async move {
            tokio::time::sleep(latency).await;
            Ok::<(), DatabaseError>(())
        })
        .await
    }

    fn allocate_identity_id(state: &mut State) -> i32 {
        state.next_identity_id += 1;
        state.next_identity_id
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn find_identity(&self, id: i32) -> Result<Option<Identity>, DatabaseError> {
        self.io().await?;
        Ok(self.state.lock().await.identities.get(&id).cloned())
    }

    async fn find_identity_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Identity>, DatabaseError> {
        self.io().await?;
        let state = self.state.lock().await;
        Ok(state
            .identities
            .values()
            .find(|identity| identity.username == username)
            .cloned())
    }

    async fn list_identities(&self) -> Result<Vec<Identity>, DatabaseError> {
        self.io().await?;
        Ok(self.state.lock().await.identities.values().cloned().collect())
    }

    async fn username_taken(
        &self,
        username: &str,
        excluding: Option<i32>,
    ) -> Result<bool, DatabaseError> {
        self.io().await?;
        let state = self.state.lock().await;
        Ok(state
            .identities
            .values()
            .any(|identity| identity.username == username && Some(identity.id) != excluding))
    }

    async fn insert_identity(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<i32, DatabaseError> {
        self.io().await?;
        let mut state = self.state.lock().await;
        if state.identities.values().any(|identity| identity.username == username) {
            return Err(DatabaseError::UniqueViolation(format!(
                "duplicate key value violates unique constraint \"users_username_key\" ({})",
                username
            )));
        }
        let id = Self::allocate_identity_id(&mut state);
        state.identities.insert(
            id,
            Identity {
                id,
                username: username.to_string(),
                password_hash: password_hash.to_string(),
                is_admin: false,
            },
        );
        Ok(id)
    }

    async fn update_identity(
        &self,
        id: i32,
        change: &IdentityChange,
    ) -> Result<Option<Identity>, DatabaseError> {
        self.io().await?;
        let mut state = self.state.lock().await;
        if let IdentityChange::Username(name) = change {
            if state
                .identities
                .values()
                .any(|identity| &identity.username == name && identity.id != id)
            {
                return Err(DatabaseError::UniqueViolation(name.clone()));
            }
        }
        Ok(state.identities.get_mut(&id).map(|identity| {
            match change {
                IdentityChange::Username(name) => identity.username = name.clone(),
                IdentityChange::PasswordHash(hash) => identity.password_hash = hash.clone(),
            }
            identity.clone()
        }))
    }

    async fn delete_identity(&self, id: i32) -> Result<u64, DatabaseError> {
        self.io().await?;
        let mut state = self.state.lock().await;
        let removed = state.identities.remove(&id).is_some();
        if removed {
            // Mirrors ON DELETE CASCADE.
            state.user_usage.remove(&id);
        }
        Ok(u64::from(removed))
    }
}

#[async_trait]
impl UsageStore for MemoryStore {
    async fn increment_endpoint_usage(
        &self,
        endpoint: &str,
        method: &str,
    ) -> Result<EndpointUsage, DatabaseError> {
        self.io().await?;
        let mut state = self.state.lock().await;
        let count = state
            .endpoint_usage
            .entry((endpoint.to_string(), method.to_string()))
            .or_insert(0);
        *count += 1;
        Ok(EndpointUsage {
            endpoint: endpoint.to_string(),
            method: method.to_string(),
            call_count: *count,
        })
    }

    async fn increment_user_usage(
        &self,
        user_id: i32,
        success: bool,
    ) -> Result<UserUsage, DatabaseError> {
        self.io().await?;
        let mut state = self.state.lock().await;
        // Mirrors the users foreign key.
        if !state.identities.contains_key(&user_id) {
            return Err(DatabaseError::ForeignKeyViolation(format!(
                "insert or update on table \"user_api_usage\" violates foreign key constraint \"user_api_usage_user_id_fkey\" (user_id {})",
                user_id
            )));
        }
        let usage = state
            .user_usage
            .entry(user_id)
            .and_modify(|usage| usage.record(success))
            .or_insert_with(|| UserUsage::first_call(user_id, success));
        Ok(usage.clone())
    }

    async fn find_user_usage(&self, user_id: i32) -> Result<Option<UserUsage>, DatabaseError> {
        self.io().await?;
        Ok(self.state.lock().await.user_usage.get(&user_id).cloned())
    }

    async fn list_user_usage(&self) -> Result<Vec<UserUsage>, DatabaseError> {
        self.io().await?;
        Ok(self.state.lock().await.user_usage.values().cloned().collect())
    }

    async fn list_endpoint_usage(&self) -> Result<Vec<EndpointUsage>, DatabaseError> {
        self.io().await?;
        let state = self.state.lock().await;
        Ok(state
            .endpoint_usage
            .iter()
            .map(|((endpoint, method), count)| EndpointUsage {
                endpoint: endpoint.clone(),
                method: method.clone(),
                call_count: *count,
            })
            .collect())
    }
}

#[async_trait]
impl StatementStore for MemoryStore {
    /// Records the statement. SELECTs return rows seeded for a table named in the text;
    /// INSERTs report a fresh sequential id.
    async fn execute_statement(
        &self,
        query: &WhitelistedQuery,
    ) -> Result<QueryOutcome, DatabaseError> {
        self.io().await?;
        let mut state = self.state.lock().await;
        state.statements.push(query.clone());

        match query.command_kind() {
            CommandKind::Select => {
                let text = query.sql_text().to_ascii_lowercase();
                let rows = state
                    .rows
                    .iter()
                    .find(|(table, _)| {
                        text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                            .any(|word| word == table.to_ascii_lowercase())
                    })
                    .map(|(_, rows)| rows.clone())
                    .unwrap_or_default();
                Ok(QueryOutcome::Rows { rows })
            }
            CommandKind::Insert => {
                state.next_row_id += 1;
                Ok(QueryOutcome::Inserted {
                    inserted_id: Some(state.next_row_id),
                    rows_affected: 1,
                })
            }
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> Result<(), DatabaseError> {
        self.io().await
    }
}
