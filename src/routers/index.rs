//! Bundled index routes: banner, build information and health.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use crate::config::ConfigService;
use crate::database::DatabaseService;
use crate::http::{ApiError, Reply, ResponseToolkit, RouteRequest};
use crate::routing::{handle, Controller, DefinitionError, RouterDefinition};

/// Config key echoed by `GET /version` when set.
pub const VERSION_LOOKUP_KEY: &str = "this.is.something";

/// Body of `GET /version`.
#[derive(Debug, Clone, Serialize)]
pub struct VersionInfo {
    pub commit: String,
    pub environment: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub something: Option<Value>,
}

pub struct IndexRouter {
    config: Arc<ConfigService>,
    database: Arc<DatabaseService>,
}

impl IndexRouter {
    pub fn new(config: Arc<ConfigService>, database: Arc<DatabaseService>) -> Self {
        Self { config, database }
    }

    async fn index(self: Arc<Self>, _: RouteRequest, _: ResponseToolkit) -> anyhow::Result<&'static str> {
        Ok("apito")
    }

    async fn version(self: Arc<Self>, _: RouteRequest, _: ResponseToolkit) -> anyhow::Result<Reply> {
        Reply::json(&VersionInfo {
            commit: self.config.commit().to_string(),
            environment: self.config.environment().to_string(),
            version: self.config.version().to_string(),
            something: self.config.lookup(VERSION_LOOKUP_KEY).cloned(),
        })
    }

    async fn health(self: Arc<Self>, _: RouteRequest, _: ResponseToolkit) -> anyhow::Result<Value> {
        if let Err(err) = self.database.ping().await {
            tracing::warn!(error = %err, "Health check failed");
            return Err(ApiError::service_unavailable("Database unavailable").into());
        }
        Ok(json!({"status": "ok"}))
    }
}

impl Controller for IndexRouter {
    fn define() -> Result<RouterDefinition<Self>, DefinitionError> {
        RouterDefinition::new()
            .route(handle(Self::index).exposed().get("/"))?
            .route(handle(Self::version).exposed().get("/version"))?
            .route(handle(Self::health).exposed().describe("Database health").get("~/health"))
    }
}
