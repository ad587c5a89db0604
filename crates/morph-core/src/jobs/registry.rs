use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::transformer::Transformer;

/// Transformers addressable by name from queued payloads
#[derive(Clone, Default)]
pub struct TransformerRegistry {
    inner: Arc<RwLock<HashMap<String, Arc<dyn Transformer>>>>,
}

impl TransformerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under the transformer's own name, replacing any previous entry
    pub fn register(&self, transformer: Arc<dyn Transformer>) {
        let name = transformer.name().to_string();
        self.register_as(name, transformer);
    }

    /// Register under an explicit key, replacing any previous entry
    pub fn register_as(&self, key: impl Into<String>, transformer: Arc<dyn Transformer>) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), transformer);
    }

    pub fn remove(&self, key: &str) -> Option<Arc<dyn Transformer>> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Transformer>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}
