//! Ordered set of registered transformers

use crate::config::TransformersConfig;
use crate::transformer::BlockTransformer;
use crate::transformers::create_transformer;
use crate::user_state::UserStateStore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("transformer {0:?} is already registered")]
    Duplicate(String),

    #[error("unknown transformer {0:?}")]
    Unknown(String),
}

/// Transformers in registration order. Order matters: during the transform
/// phase each one sees the structure as left by those before it.
#[derive(Default, Clone)]
pub struct TransformerRegistry {
    transformers: Vec<Arc<dyn BlockTransformer>>,
}

impl std::fmt::Debug for TransformerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.transformers.iter().map(|t| t.name()))
            .finish()
    }
}

impl TransformerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from the configured ranked list of names.
    pub fn from_config(
        config: &TransformersConfig,
        user_state: Arc<dyn UserStateStore>,
    ) -> Result<Self, RegistryError> {
        let mut registry = TransformerRegistry::new();
        for name in &config.order {
            registry.register(create_transformer(name, config, Arc::clone(&user_state))?)?;
        }
        tracing::debug!("Transformer registry: {:?}", registry);
        Ok(registry)
    }

    pub fn register(&mut self, transformer: Arc<dyn BlockTransformer>) -> Result<(), RegistryError> {
        if self.get(transformer.name()).is_some() {
            return Err(RegistryError::Duplicate(transformer.name().to_string()));
        }
        self.transformers.push(transformer);
        Ok(())
    }

    pub fn all(&self) -> &[Arc<dyn BlockTransformer>] {
        &self.transformers
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn BlockTransformer>> {
        self.transformers.iter().find(|t| t.name() == name)
    }

    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }

    /// The requested transformers, in registry order regardless of the order
    /// they were asked for in.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Arc<dyn BlockTransformer>>, RegistryError> {
        let names: Vec<&str> = names.iter().map(|n| n.as_ref()).collect();
        if let Some(unknown) = names.iter().find(|n| self.get(n).is_none()) {
            return Err(RegistryError::Unknown(unknown.to_string()));
        }
        Ok(self
            .transformers
            .iter()
            .filter(|t| names.contains(&t.name()))
            .cloned()
            .collect())
    }

    /// Hash of the `name:version` pairs of `transformers`, in order. Changes
    /// whenever a transformer is added, removed, reordered or re-versioned.
    pub fn fingerprint(transformers: &[Arc<dyn BlockTransformer>]) -> String {
        let joined = transformers
            .iter()
            .map(|t| format!("{}:{}", t.name(), t.version()))
            .collect::<Vec<_>>()
            .join(";");
        format!("{:x}", Sha256::digest(joined.as_bytes()))
    }
}
