use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::debug;

use crate::config::EndpointConfig;

/// How a bulk update is applied to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Drop every existing entry and install the new set.
    Replace,
    /// Upsert the given entries, keeping the rest.
    Merge,
}

/// Named endpoints shared by every handler of a service.
///
/// A single reader/writer lock guards the map. Lookups clone the entry out
/// under a read guard, and bulk updates hold the write guard for the whole
/// pass, so a reader sees either the old or the new config, never a mix.
#[derive(Debug, Default)]
pub struct EndpointRegistry {
    endpoints: RwLock<HashMap<String, EndpointConfig>>,
}

impl EndpointRegistry {
    /// Indexes `configs` by endpoint name. Later duplicates win.
    pub fn build(configs: impl IntoIterator<Item = EndpointConfig>) -> Self {
        Self {
            endpoints: RwLock::new(index(configs)),
        }
    }

    pub async fn lookup(&self, name: &str) -> Option<EndpointConfig> {
        self.endpoints.read().await.get(name).cloned()
    }

    pub async fn replace(&self, configs: impl IntoIterator<Item = EndpointConfig>) {
        self.update(UpdateMode::Replace, configs).await;
    }

    pub async fn merge(&self, configs: impl IntoIterator<Item = EndpointConfig>) {
        self.update(UpdateMode::Merge, configs).await;
    }

    pub async fn update(&self, mode: UpdateMode, configs: impl IntoIterator<Item = EndpointConfig>) {
        let incoming = index(configs);
        let mut endpoints = self.endpoints.write().await;
        match mode {
            UpdateMode::Replace => *endpoints = incoming,
            UpdateMode::Merge => endpoints.extend(incoming),
        }
        debug!(?mode, count = endpoints.len(), "Endpoint registry updated");
    }

    /// Snapshot of all endpoints, sorted by name.
    pub async fn list(&self) -> Vec<EndpointConfig> {
        let mut all: Vec<_> = self.endpoints.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
        all
    }

    pub async fn len(&self) -> usize {
        self.endpoints.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.endpoints.read().await.is_empty()
    }
}

fn index(configs: impl IntoIterator<Item = EndpointConfig>) -> HashMap<String, EndpointConfig> {
    configs
        .into_iter()
        .map(|c| (c.endpoint.clone(), c))
        .collect()
}
