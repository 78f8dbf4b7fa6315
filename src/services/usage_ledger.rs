use std::sync::Arc;
use tracing::{debug, error};

use crate::database::models::{EndpointUsage, UserUsage};
use crate::database::UsageStore;
use crate::services::error::ServiceError;

/// Maintains the per-endpoint and per-user call counters.
///
/// Every increment is delegated to the store's atomic insert-or-increment, so concurrent
/// recordings for the same key never lose an update.
#[derive(Clone)]
pub struct UsageLedger {
    store: Arc<dyn UsageStore>,
}

impl UsageLedger {
    pub fn new(store: Arc<dyn UsageStore>) -> Self {
        Self { store }
    }

    pub async fn record_endpoint_hit(
        &self,
        endpoint: &str,
        method: &str,
    ) -> Result<EndpointUsage, ServiceError> {
        let usage = self.store.increment_endpoint_usage(endpoint, method).await?;
        debug!("{} {} now at {} calls", method, endpoint, usage.call_count);
        Ok(usage)
    }

    pub async fn record_user_call(
        &self,
        user_id: i32,
        success: bool,
    ) -> Result<UserUsage, ServiceError> {
        let usage = self.store.increment_user_usage(user_id, success).await?;
        debug!(
            "user {} usage: total={} ok={} failed={}",
            usage.user_id, usage.total_calls, usage.successful_calls, usage.failed_calls
        );
        Ok(usage)
    }

    /// Best-effort variant for the request path: failures are logged and swallowed.
    pub async fn track_endpoint_hit(&self, endpoint: &str, method: &str) {
        if let Err(e) = self.record_endpoint_hit(endpoint, method).await {
            error!("Error logging endpoint usage for {} {}: {}", method, endpoint, e);
        }
    }

    pub async fn user_usage(&self) -> Result<Vec<UserUsage>, ServiceError> {
        Ok(self.store.list_user_usage().await?)
    }

    pub async fn endpoint_usage(&self) -> Result<Vec<EndpointUsage>, ServiceError> {
        Ok(self.store.list_endpoint_usage().await?)
    }

    pub async fn usage_for(&self, user_id: i32) -> Result<Option<UserUsage>, ServiceError> {
        Ok(self.store.find_user_usage(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use std::time::Duration;

    fn ledger() -> UsageLedger {
        UsageLedger::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn first_hit_creates_counter_at_one() {
        let ledger = ledger();
        let usage = ledger.record_endpoint_hit("/login", "POST").await.unwrap();
        assert_eq!(usage.call_count, 1);

        let usage = ledger.record_endpoint_hit("/login", "POST").await.unwrap();
        assert_eq!(usage.call_count, 2);

        // method is part of the key
        let usage = ledger.record_endpoint_hit("/login", "GET").await.unwrap();
        assert_eq!(usage.call_count, 1);
    }

    #[tokio::test]
    async fn mixed_concurrent_calls_split_correctly() {
        let store = MemoryStore::new();
        for i in 1..=7 {
            store.seed_identity(&format!("user{}@b.com", i), "h", false).await;
        }
        let ledger = UsageLedger::new(Arc::new(store));
        let (a, b) = tokio::join!(
            ledger.record_user_call(7, true),
            ledger.record_user_call(7, false)
        );
        a.unwrap();
        b.unwrap();

        let usage = ledger.usage_for(7).await.unwrap().unwrap();
        assert_eq!(usage.total_calls, 2);
        assert_eq!(usage.successful_calls, 1);
        assert_eq!(usage.failed_calls, 1);
    }

    #[tokio::test]
    async fn tracking_swallows_store_failures() {
        let store = MemoryStore::new()
            .with_latency(Duration::from_millis(100), Duration::from_millis(5));
        let ledger = UsageLedger::new(Arc::new(store));

        // Must return normally even though the store times out.
        ledger.track_endpoint_hit("/x", "GET").await;

        assert!(matches!(
            ledger.record_endpoint_hit("/x", "GET").await,
            Err(ServiceError::StorageTimeout)
        ));
    }
}
