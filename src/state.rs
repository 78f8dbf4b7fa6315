use std::sync::Arc;

use crate::auth::TokenCodec;
use crate::config::AppConfig;
use crate::database::Store;
use crate::services::{AccountService, QueryGateway, UsageLedger};

/// Everything a handler needs, built once at startup and cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tokens: Arc<TokenCodec>,
    pub accounts: AccountService,
    pub ledger: UsageLedger,
    pub gateway: QueryGateway,
    pub store: Arc<dyn Store>,
}

impl AppState {
    pub fn new<S: Store + 'static>(config: AppConfig, store: Arc<S>) -> Self {
        let tokens = Arc::new(TokenCodec::new(
            &config.security.jwt_secret,
            config.security.token_ttl_secs,
        ));

        Self {
            accounts: AccountService::new(store.clone(), tokens.clone()),
            ledger: UsageLedger::new(store.clone()),
            gateway: QueryGateway::new(store.clone()),
            store,
            tokens,
            config: Arc::new(config),
        }
    }
}
