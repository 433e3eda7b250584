//! Looking up models by name.

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;

use crate::ModelService;

/// Resolves model handles by name.
#[async_trait::async_trait]
pub trait ModelRegistry: Send + Sync {
    async fn resolve(&self, name: &str) -> Option<ModelService>;
}

/// A registry of models registered by hand.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    models: RwLock<HashMap<String, ModelService>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `model` under `name`, returning the model it replaced if any.
    pub fn register(&self, name: impl Into<String>, model: ModelService) -> Option<ModelService> {
        self.models.write().insert(name.into(), model)
    }

    pub fn remove(&self, name: &str) -> Option<ModelService> {
        self.models.write().remove(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.models.read().keys().cloned().collect()
    }
}

#[async_trait::async_trait]
impl ModelRegistry for InMemoryRegistry {
    async fn resolve(&self, name: &str) -> Option<ModelService> {
        self.models.read().get(name).cloned()
    }
}

/// Asks each of its providers in turn, the first one knowing the name wins.
#[derive(Default)]
pub struct CompositeRegistry {
    providers: Vec<Arc<dyn ModelRegistry>>,
}

impl CompositeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: Arc<dyn ModelRegistry>) -> Self {
        self.providers.push(provider);
        self
    }
}

#[async_trait::async_trait]
impl ModelRegistry for CompositeRegistry {
    async fn resolve(&self, name: &str) -> Option<ModelService> {
        for provider in &self.providers {
            if let Some(model) = provider.resolve(name).await {
                return Some(model);
            }
        }

        None
    }
}
