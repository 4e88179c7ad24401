use std::sync::Arc;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{ConfigError, EndpointConfig, HandlerConfig};
use crate::handler::{DispatchStats, PostHandler};
use crate::registry::{EndpointRegistry, UpdateMode};

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("unexpected config object at index {index}: {reason}")]
    TypeMismatch { index: usize, reason: String },
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Options accepted by [`AlertPostService::test`]. There are none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOptions {}

/// Owns the endpoint registry and the HTTP client shared by every handler.
#[derive(Debug, Clone)]
pub struct AlertPostService {
    registry: Arc<EndpointRegistry>,
    client: Client,
    stats: Arc<DispatchStats>,
}

impl AlertPostService {
    /// `configs` are expected to be validated already.
    pub fn new(configs: Vec<EndpointConfig>) -> Self {
        Self::with_client(configs, Client::new())
    }

    pub fn with_client(configs: Vec<EndpointConfig>, client: Client) -> Self {
        Self {
            registry: Arc::new(EndpointRegistry::build(configs)),
            client,
            stats: Arc::new(DispatchStats::default()),
        }
    }

    pub fn open(&self) {
        debug!("Alert post service opened");
    }

    pub fn close(&self) {
        debug!("Alert post service closed");
    }

    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> &Arc<DispatchStats> {
        &self.stats
    }

    pub fn handler(&self, config: HandlerConfig) -> PostHandler {
        PostHandler::new(config, Arc::clone(&self.registry), self.client.clone())
            .with_stats(Arc::clone(&self.stats))
    }

    /// Applies untyped config records, e.g. a JSON body from the admin API.
    ///
    /// Every record is decoded and validated before the registry is touched,
    /// so a bad record leaves it unchanged.
    pub async fn update(
        &self,
        mode: UpdateMode,
        records: Vec<serde_json::Value>,
    ) -> Result<usize, UpdateError> {
        let configs = records
            .into_iter()
            .enumerate()
            .map(|(index, record)| {
                serde_json::from_value::<EndpointConfig>(record).map_err(|e| {
                    UpdateError::TypeMismatch {
                        index,
                        reason: e.to_string(),
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        for config in &configs {
            config.validate()?;
        }

        let count = configs.len();
        self.registry.update(mode, configs).await;
        info!(?mode, count, "Applied endpoint update");
        Ok(count)
    }

    /// Connectivity is not checked; this only exists for parity with other
    /// handler services.
    pub fn test(&self, _options: &TestOptions) {}

    pub fn test_options(&self) -> TestOptions {
        TestOptions::default()
    }
}
