use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// Errors raised by the storage layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("Invalid statement parameter: {0}")]
    InvalidParam(String),

    #[error("Storage call did not complete within {0:?}")]
    Timeout(Duration),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DatabaseError::UniqueViolation(db.message().to_string())
            }
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                DatabaseError::ForeignKeyViolation(db.message().to_string())
            }
            _ => DatabaseError::Sqlx(err),
        }
    }
}

impl DatabaseError {
    /// Message suitable for reporting a rejected statement back to its author.
    pub fn statement_message(&self) -> String {
        match self {
            DatabaseError::Sqlx(sqlx::Error::Database(db)) => db.message().to_string(),
            other => other.to_string(),
        }
    }
}

/// Builds and maintains the process-wide connection pool
pub struct DatabaseManager;

impl DatabaseManager {
    /// Open the pool described by `config`. Called once before serving.
    pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        if config.url.is_empty() {
            return Err(DatabaseError::ConfigMissing("DATABASE_URL"));
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(&config.url)
            .await?;

        info!(
            "Created database pool for {} (max {} connections)",
            Self::describe_target(&config.url)?,
            config.max_connections
        );
        Ok(pool)
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(|e| DatabaseError::MigrationError(e.to_string()))?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }

    /// Host and database name of a connection URL, without credentials, for logging.
    fn describe_target(database_url: &str) -> Result<String, DatabaseError> {
        let url = url::Url::parse(database_url).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        let host = url.host_str().unwrap_or("localhost");
        let database = url.path().trim_start_matches('/');
        Ok(match url.port() {
            Some(port) => format!("{}:{}/{}", host, port, database),
            None => format!("{}/{}", host, database),
        })
    }
}
