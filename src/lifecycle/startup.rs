//! Startup orchestration and composition root.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize services in dependency order
//! - Build every router and register it with the server
//! - Bind the listener and serve until shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Services initialize in order, not concurrently
//! - The listener binds last (traffic only when every route is registered)

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::{ConfigError, ConfigService, EnvVars};
use crate::database::{DatabaseError, DatabaseService};
use crate::http::ApiServer;
use crate::lifecycle::{crash, shutdown::Shutdown, signals};
use crate::observability::logging::{LogError, LogService};
use crate::observability::metrics::{self, MetricsError};
use crate::routers::IndexRouter;
use crate::routing::options::INTERNAL_STRATEGY;
use crate::routing::{ControllerRouter, DefinitionError, Router, RouterError};
use crate::security::BearerToken;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Logger error: {0}")]
    Log(#[from] LogError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error("Router definition error: {0}")]
    Definition(#[from] DefinitionError),

    #[error("Router initialization error: {0}")]
    Router(#[from] RouterError),

    #[error("Invalid address '{address}' for {field}")]
    InvalidAddress { field: &'static str, address: String },

    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Every router the application serves, in registration order.
pub fn routers(
    config: Arc<ConfigService>,
    database: Arc<DatabaseService>,
) -> Result<Vec<Box<dyn Router>>, DefinitionError> {
    let index: Box<dyn Router> =
        Box::new(ControllerRouter::new(Arc::new(IndexRouter::new(config, database)))?);
    Ok(vec![index])
}

/// Create the server and register `routers` on it, in order.
pub fn build_server(
    config: &ConfigService,
    routers: &[Box<dyn Router>],
) -> Result<ApiServer, StartupError> {
    let options = config.options();
    let mut server = ApiServer::new(options.http.clone());

    if let Some(token) = options.auth.internal_token.as_deref().filter(|t| !t.is_empty()) {
        server.auth_strategy(INTERNAL_STRATEGY, Arc::new(BearerToken::new(token)));
    }

    for router in routers {
        router.initialize(&mut server, None)?;
        tracing::info!(router = %router.name(), path = %router.path(), "Router initialized");
    }

    Ok(server)
}

/// Boot the whole application and serve until a shutdown signal.
pub async fn run(env: EnvVars) -> Result<(), StartupError> {
    let config = Arc::new(ConfigService::initialize(env.config_dir(), &env)?);
    let log = LogService::initialize(&config.options().log, &env)?;

    tracing::info!(
        name = %log.settings().name,
        environment = %config.environment(),
        version = %config.version(),
        commit = %config.commit(),
        location = %config.location().display(),
        "Configuration loaded"
    );

    let database = Arc::new(DatabaseService::initialize(
        &config.options().database,
        config.environment(),
    )?);

    crash::install_panic_hook();

    let observability = &config.options().observability;
    if observability.metrics_enabled {
        let address = parse_address("observability.metrics_address", &observability.metrics_address)?;
        metrics::init_metrics(address)?;
    }

    let routers = routers(config.clone(), database.clone())?;
    let server = build_server(&config, &routers)?;

    let bind_address = &config.options().http.bind_address;
    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: bind_address.clone(),
            source,
        })?;

    let shutdown = Arc::new(Shutdown::new());
    signals::spawn_signal_listener(shutdown.clone());

    server
        .start(listener, shutdown.subscribe())
        .await
        .map_err(StartupError::Serve)?;

    database.close().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

fn parse_address(field: &'static str, address: &str) -> Result<SocketAddr, StartupError> {
    address.parse().map_err(|_| StartupError::InvalidAddress {
        field,
        address: address.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, RuntimeInfo};

    fn config(token: Option<&str>) -> ConfigService {
        let mut options = AppConfig::default();
        options.auth.internal_token = token.map(str::to_string);
        ConfigService::from_options(
            options,
            RuntimeInfo {
                version: "1.2.3".into(),
                commit: "abc123".into(),
                environment: "test".into(),
            },
        )
    }

    #[tokio::test]
    async fn test_index_routes_registered_in_order() {
        let config = Arc::new(config(None));
        let database = Arc::new(
            DatabaseService::initialize(&config.options().database, "test").unwrap(),
        );
        let routers = routers(config.clone(), database).unwrap();
        let server = build_server(&config, &routers).unwrap();

        let paths: Vec<&str> = server.table().iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/", "/version", "/health"]);
        assert!(server.table().iter().all(|r| r.router == "IndexRouter"));
        assert!(server.auth_scheme(INTERNAL_STRATEGY).is_none());
    }

    #[test]
    fn test_internal_strategy_only_with_token() {
        let server = build_server(&config(Some("s3cret")), &[]).unwrap();
        assert!(server.auth_scheme(INTERNAL_STRATEGY).is_some());

        let server = build_server(&config(Some("")), &[]).unwrap();
        assert!(server.auth_scheme(INTERNAL_STRATEGY).is_none());
    }

    #[tokio::test]
    async fn test_missing_environment_fails_before_server() {
        let dir = tempfile::tempdir().unwrap();
        let env = EnvVars::from_pairs([
            ("CONFIG_DIR", dir.path().to_str().unwrap()),
            ("NODE_ENV", "staging"),
        ]);
        let err = run(env).await.unwrap_err();
        assert!(matches!(err, StartupError::Config(ConfigError::MissingEnvironment { .. })));
    }

    #[test]
    fn test_parse_address() {
        assert!(parse_address("x", "127.0.0.1:9090").is_ok());
        assert!(matches!(
            parse_address("x", "nope"),
            Err(StartupError::InvalidAddress { field: "x", .. })
        ));
    }
}
