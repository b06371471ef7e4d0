//! Database connection pool.
//!
//! # Responsibilities
//! - Build a Postgres pool from the `database` options
//! - Health-check every newly opened connection (`SELECT 1`)
//! - Expose the pool and a ping for readiness checks
//!
//! # Design Decisions
//! - Pool is created lazily: no network traffic until first use
//! - Statement logging only in debug mode or the development environment
//! - Connection strings are redacted before they reach the logs

use std::str::FromStr;
use std::time::Duration;

use log::LevelFilter;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::ConnectOptions;

use crate::config::validation::SUPPORTED_CLIENTS;
use crate::config::DatabaseConfig;

/// Query run on every new pooled connection and by `ping`.
pub const HEALTH_CHECK_QUERY: &str = "SELECT 1";

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Unsupported database client '{0}'")]
    UnsupportedClient(String),

    #[error("Invalid connection string {connection}: {source}")]
    InvalidConnection {
        connection: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Database query failed: {0}")]
    Query(#[from] sqlx::Error),
}

/// Handle on the shared connection pool.
#[derive(Debug, Clone)]
pub struct DatabaseService {
    pool: PgPool,
}

impl DatabaseService {
    /// Build the pool. Must be called within a Tokio runtime.
    pub fn initialize(config: &DatabaseConfig, environment: &str) -> Result<Self, DatabaseError> {
        let client = config.client.to_ascii_lowercase();
        if !SUPPORTED_CLIENTS.contains(&client.as_str()) {
            return Err(DatabaseError::UnsupportedClient(config.client.clone()));
        }

        let statement_logging = config.debug || environment == "development";
        let connect_options = PgConnectOptions::from_str(&config.connection)
            .map_err(|source| DatabaseError::InvalidConnection {
                connection: redact_connection(&config.connection),
                source,
            })?
            .log_statements(if statement_logging { LevelFilter::Debug } else { LevelFilter::Off });

        let pool = PgPoolOptions::new()
            .min_connections(config.pool.min)
            .max_connections(config.pool.max)
            .acquire_timeout(Duration::from_secs(config.pool.acquire_timeout_secs))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query(HEALTH_CHECK_QUERY).execute(conn).await?;
                    Ok(())
                })
            })
            .connect_lazy_with(connect_options);

        tracing::info!(
            connection = %redact_connection(&config.connection),
            min = config.pool.min,
            max = config.pool.max,
            statement_logging,
            "Database pool configured"
        );

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the health check query on a pooled connection.
    pub async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query(HEALTH_CHECK_QUERY).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Replace the password of a connection URL with `****`.
pub fn redact_connection(connection: &str) -> String {
    match url::Url::parse(connection) {
        Ok(mut parsed) => {
            if parsed.password().is_some() && parsed.set_password(Some("****")).is_err() {
                return "<redacted>".to_string();
            }
            parsed.to_string()
        }
        Err(_) => "<redacted>".to_string(),
    }
}
