//! Known server names for the natural-language collaborator.
//!
//! After every list or start the bot pushes the current names to an
//! [`EntityStore`] so free text can be matched against them later. The
//! names are best effort: a stale list is fine.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::compute::{ComputeClient, ComputeError, Server};

const NAMESPACE: &str = "virtualservers";

/// Global parameter name under which names are published.
pub fn parameter_name(parameter: &str) -> String {
    format!("{}_{}", NAMESPACE, parameter)
}

/// Where entity values are published.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn update_values(&self, parameter: &str, values: Vec<String>);
}

/// In-process entity store.
#[derive(Default)]
pub struct MemoryEntityStore {
    values: RwLock<HashMap<String, Vec<String>>>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn values(&self, parameter: &str) -> Vec<String> {
        self.values
            .read()
            .await
            .get(parameter)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn update_values(&self, parameter: &str, values: Vec<String>) {
        self.values
            .write()
            .await
            .insert(parameter.to_string(), values);
    }
}

/// Last known server names, overwritten wholesale on each refresh.
#[derive(Clone)]
pub struct KnownNames {
    names: Arc<RwLock<Vec<String>>>,
    store: Arc<dyn EntityStore>,
}

impl KnownNames {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            names: Arc::new(RwLock::new(Vec::new())),
            store,
        }
    }

    pub async fn get(&self) -> Vec<String> {
        self.names.read().await.clone()
    }

    /// Record the names in `servers` and publish them.
    pub async fn update(&self, servers: &[Server]) {
        let names: Vec<String> = servers.iter().map(|s| s.name.clone()).collect();
        *self.names.write().await = names.clone();
        self.store
            .update_values(&parameter_name(crate::bot::intent::PARAM_VSNAME), names)
            .await;
    }

    /// Fetch a fresh snapshot and publish its names.
    pub async fn refresh(&self, client: &dyn ComputeClient) -> Result<Vec<String>, ComputeError> {
        let servers = client.list_servers().await?;
        self.update(&servers).await;
        Ok(self.get().await)
    }
}
