use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::database::models::{QueryOutcome, WhitelistedQuery};
use crate::database::{DatabaseError, StatementStore};
use crate::services::error::ServiceError;

/// Constrained ad-hoc query path: only SELECT and INSERT, always with bound parameters.
#[derive(Clone)]
pub struct QueryGateway {
    store: Arc<dyn StatementStore>,
}

impl QueryGateway {
    pub fn new(store: Arc<dyn StatementStore>) -> Self {
        Self { store }
    }

    /// Whitelist-check `sql_text` and run it with `params` bound positionally.
    ///
    /// A rejected statement never reaches the store.
    pub async fn execute(
        &self,
        sql_text: &str,
        params: &[Value],
    ) -> Result<QueryOutcome, ServiceError> {
        let query = WhitelistedQuery::parse(sql_text, params).map_err(|rejection| {
            warn!("Rejected gateway statement: {}", rejection);
            ServiceError::from(rejection)
        })?;

        info!(
            "Executing {} with {} bound parameter(s)",
            query.command_kind().as_str(),
            query.params().len()
        );

        self.store
            .execute_statement(&query)
            .await
            .map_err(|e| match e {
                DatabaseError::Timeout(_) | DatabaseError::InvalidParam(_) => {
                    ServiceError::from(e)
                }
                other => {
                    error!("SQL execution error: {}", other);
                    ServiceError::QueryExecution(other.statement_message())
                }
            })
    }
}
