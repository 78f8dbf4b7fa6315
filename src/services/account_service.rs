//! Identity management behind the login/register/update/delete endpoints.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{hash_password, verify_password, TokenCodec};
use crate::database::models::{Identity, IdentityChange};
use crate::database::{DatabaseError, IdentityStore};
use crate::services::error::ServiceError;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,6}$").expect("static email pattern")
});

pub fn validate_username(username: &str) -> Result<(), ServiceError> {
    if EMAIL_PATTERN.is_match(username) {
        Ok(())
    } else {
        Err(ServiceError::InvalidFormat("Invalid email format".to_string()))
    }
}

fn validate_password(password: &str) -> Result<(), ServiceError> {
    if password.is_empty() {
        return Err(ServiceError::InvalidFormat("Password cannot be empty".to_string()));
    }
    Ok(())
}

/// The identity columns a user may change, one per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdatableField {
    Username(String),
    Password(String),
}

impl UpdatableField {
    /// Read the single field to update from a request body. An `id` key is ignored: the
    /// authenticated caller decides which row changes.
    pub fn from_body(body: &Map<String, Value>) -> Result<Self, ServiceError> {
        let mut fields = body.iter().filter(|(key, _)| key.as_str() != "id");

        let (key, value) = match (fields.next(), fields.next()) {
            (Some(field), None) => field,
            _ => {
                return Err(ServiceError::InvalidFormat(
                    "Invalid request: exactly one field must be updated.".to_string(),
                ))
            }
        };

        let value = value.as_str().ok_or_else(|| {
            ServiceError::InvalidFormat(format!("Field \"{}\" must be a string", key))
        })?;

        match key.as_str() {
            "username" => Ok(UpdatableField::Username(value.to_string())),
            "password" => Ok(UpdatableField::Password(value.to_string())),
            _ => Err(ServiceError::InvalidField),
        }
    }

    pub fn validate(&self) -> Result<(), ServiceError> {
        match self {
            UpdatableField::Username(username) => validate_username(username),
            UpdatableField::Password(password) => validate_password(password),
        }
    }
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub identity: Identity,
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn IdentityStore>,
    tokens: Arc<TokenCodec>,
}

impl AccountService {
    pub fn new(store: Arc<dyn IdentityStore>, tokens: Arc<TokenCodec>) -> Self {
        Self { store, tokens }
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<i32, ServiceError> {
        validate_username(username)?;
        validate_password(password)?;

        if self.store.username_taken(username, None).await? {
            return Err(ServiceError::DuplicateUsername);
        }

        let password_hash = hash_off_thread(password.to_string()).await?;

        // A concurrent registration can still win the race; the unique index decides.
        let id = self
            .store
            .insert_identity(username, &password_hash)
            .await
            .map_err(duplicate_or)?;

        info!("Registered user {}", id);
        Ok(id)
    }

    /// Check credentials and issue a session token.
    ///
    /// Unknown usernames and wrong passwords produce the same error.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, ServiceError> {
        validate_username(username)?;

        let Some(identity) = self.store.find_identity_by_username(username).await? else {
            warn!("Login failed: unknown username");
            return Err(ServiceError::InvalidCredentials);
        };

        if !verify_off_thread(password.to_string(), identity.password_hash.clone()).await? {
            warn!("Login failed: password mismatch for user {}", identity.id);
            return Err(ServiceError::InvalidCredentials);
        }

        let token = self.tokens.issue(&identity)?;
        info!("User {} logged in", identity.id);
        Ok(LoginOutcome { token, identity })
    }

    pub async fn update_field(
        &self,
        id: i32,
        field: UpdatableField,
    ) -> Result<Identity, ServiceError> {
        field.validate()?;

        let change = match field {
            UpdatableField::Username(username) => {
                if self.store.username_taken(&username, Some(id)).await? {
                    return Err(ServiceError::DuplicateUsername);
                }
                IdentityChange::Username(username)
            }
            UpdatableField::Password(password) => {
                IdentityChange::PasswordHash(hash_off_thread(password).await?)
            }
        };

        let updated = self
            .store
            .update_identity(id, &change)
            .await
            .map_err(duplicate_or)?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

        info!("Updated {} for user {}", change.column(), id);
        Ok(updated)
    }

    /// Delete by id. Deleting an id that no longer exists is not an error.
    pub async fn delete_user(&self, id: i32) -> Result<bool, ServiceError> {
        let removed = self.store.delete_identity(id).await? > 0;
        if removed {
            info!("Deleted user {}", id);
        }
        Ok(removed)
    }

    pub async fn profile(&self, id: i32) -> Result<Identity, ServiceError> {
        self.store
            .find_identity(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
    }

    /// All identities, for administrators only.
    pub async fn list_identities(&self, caller_id: i32) -> Result<Vec<Identity>, ServiceError> {
        let caller = self.profile(caller_id).await?;
        if !caller.is_admin {
            return Err(ServiceError::Forbidden("Admin access required".to_string()));
        }
        Ok(self.store.list_identities().await?)
    }
}

fn duplicate_or(err: DatabaseError) -> ServiceError {
    match err {
        DatabaseError::UniqueViolation(_) => ServiceError::DuplicateUsername,
        other => other.into(),
    }
}

async fn hash_off_thread(password: String) -> Result<String, ServiceError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ServiceError::Internal(format!("password hashing task failed: {}", e)))?
        .map_err(ServiceError::from)
}

async fn verify_off_thread(password: String, hash: String) -> Result<bool, ServiceError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ServiceError::Internal(format!("password verification task failed: {}", e)))?
        .map_err(ServiceError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::DEFAULT_TOKEN_TTL_SECS;
    use crate::database::MemoryStore;
    use serde_json::json;

    fn service() -> (AccountService, Arc<TokenCodec>) {
        let tokens = Arc::new(TokenCodec::new("test-secret", DEFAULT_TOKEN_TTL_SECS));
        let service = AccountService::new(Arc::new(MemoryStore::new()), tokens.clone());
        (service, tokens)
    }

    #[test]
    fn username_must_look_like_an_email() {
        assert!(validate_username("a@b.com").is_ok());
        assert!(validate_username("first.last-1@mail.example.org").is_ok());
        for bad in ["", "ab", "a@b", "@b.com", "a b@c.com", "a@b.c", "a@b.commerce"] {
            assert!(validate_username(bad).is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn updatable_field_requires_exactly_one_known_field() {
        let body = json!({ "id": 4, "username": "x@y.com" });
        assert_eq!(
            UpdatableField::from_body(body.as_object().unwrap()).unwrap(),
            UpdatableField::Username("x@y.com".to_string())
        );

        let body = json!({ "password": "pw" });
        assert_eq!(
            UpdatableField::from_body(body.as_object().unwrap()).unwrap(),
            UpdatableField::Password("pw".to_string())
        );

        let body = json!({ "is_admin": "true" });
        assert!(matches!(
            UpdatableField::from_body(body.as_object().unwrap()),
            Err(ServiceError::InvalidField)
        ));

        let body = json!({ "username": "x@y.com", "password": "pw" });
        assert!(matches!(
            UpdatableField::from_body(body.as_object().unwrap()),
            Err(ServiceError::InvalidFormat(_))
        ));

        let body = json!({});
        assert!(UpdatableField::from_body(body.as_object().unwrap()).is_err());
    }

    #[tokio::test]
    async fn register_then_login() {
        let (service, tokens) = service();
        let id = service.register("a@b.com", "pw1").await.unwrap();

        let outcome = service.login("a@b.com", "pw1").await.unwrap();
        assert_eq!(outcome.identity.id, id);
        assert!(!outcome.identity.is_admin);
        assert_eq!(tokens.verify(&outcome.token).unwrap().id, id);
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let (service, _) = service();
        service.register("a@b.com", "pw1").await.unwrap();

        assert!(matches!(
            service.register("a@b.com", "other").await,
            Err(ServiceError::DuplicateUsername)
        ));
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let (service, _) = service();
        service.register("a@b.com", "pw1").await.unwrap();

        let wrong_password = service.login("a@b.com", "wrong").await.unwrap_err();
        let unknown_user = service.login("nobody@b.com", "pw1").await.unwrap_err();
        assert!(matches!(wrong_password, ServiceError::InvalidCredentials));
        assert!(matches!(unknown_user, ServiceError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    }

    #[tokio::test]
    async fn username_update_checks_other_users_only() {
        let (service, _) = service();
        let a = service.register("a@b.com", "pw").await.unwrap();
        service.register("c@d.com", "pw").await.unwrap();

        // Re-saving your own name is fine.
        let updated = service
            .update_field(a, UpdatableField::Username("a@b.com".to_string()))
            .await
            .unwrap();
        assert_eq!(updated.username, "a@b.com");

        assert!(matches!(
            service
                .update_field(a, UpdatableField::Username("c@d.com".to_string()))
                .await,
            Err(ServiceError::DuplicateUsername)
        ));
    }

    #[tokio::test]
    async fn password_update_is_hashed_and_usable() {
        let (service, _) = service();
        let id = service.register("a@b.com", "old").await.unwrap();

        let updated = service
            .update_field(id, UpdatableField::Password("new".to_string()))
            .await
            .unwrap();
        assert_ne!(updated.password_hash, "new");

        assert!(service.login("a@b.com", "new").await.is_ok());
        assert!(service.login("a@b.com", "old").await.is_err());
    }

    #[tokio::test]
    async fn update_of_missing_user_is_not_found() {
        let (service, _) = service();
        assert!(matches!(
            service
                .update_field(99, UpdatableField::Username("z@z.com".to_string()))
                .await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (service, _) = service();
        let id = service.register("a@b.com", "pw").await.unwrap();

        assert!(service.delete_user(id).await.unwrap());
        assert!(!service.delete_user(id).await.unwrap());
        assert!(matches!(service.profile(id).await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn listing_requires_admin() {
        let store = Arc::new(MemoryStore::new());
        let tokens = Arc::new(TokenCodec::new("test-secret", DEFAULT_TOKEN_TTL_SECS));
        let service = AccountService::new(store.clone(), tokens);

        let admin = store.seed_identity("root@b.com", "unused", true).await;
        let user = service.register("a@b.com", "pw").await.unwrap();

        assert_eq!(service.list_identities(admin).await.unwrap().len(), 2);
        assert!(matches!(
            service.list_identities(user).await,
            Err(ServiceError::Forbidden(_))
        ));
    }
}
