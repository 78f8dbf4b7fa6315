use serde::Serialize;
use sqlx::FromRow;

/// Per-user call tally. `total_calls == successful_calls + failed_calls` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct UserUsage {
    pub user_id: i32,
    pub total_calls: i64,
    pub successful_calls: i64,
    pub failed_calls: i64,
}

impl UserUsage {
    /// Counter state after exactly one recorded call.
    pub fn first_call(user_id: i32, success: bool) -> Self {
        let mut usage = Self {
            user_id,
            total_calls: 0,
            successful_calls: 0,
            failed_calls: 0,
        };
        usage.record(success);
        usage
    }

    pub fn record(&mut self, success: bool) {
        self.total_calls += 1;
        if success {
            self.successful_calls += 1;
        } else {
            self.failed_calls += 1;
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.total_calls == self.successful_calls + self.failed_calls
    }
}

/// Per-route hit count, unique on `(endpoint, method)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct EndpointUsage {
    pub endpoint: String,
    pub method: String,
    pub call_count: i64,
}
