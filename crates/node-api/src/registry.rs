//! Chain type registry capability.
//!
//! Each chain session owns its own registry instance so the type systems of
//! two chains never mix. Bootstrap writes to it before anything reads
//! chain-property dependent state.

use std::collections::BTreeMap;
use std::sync::RwLock;

use tracing::debug;

use dualnode_protocol::{ChainProperties, RuntimeMetadata, TypeOverrides};

/// Errors from metadata decoding.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("metadata is not 0x-prefixed hex")]
    MissingPrefix,

    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("invalid metadata: {0}")]
    Json(#[from] serde_json::Error),
}

/// Type registry used by an API session.
pub trait TypeRegistry: Send + Sync {
    /// Registers (or replaces) type definitions.
    fn register(&self, types: &TypeOverrides);

    /// Stores the chain properties used for address and balance encoding.
    fn set_chain_properties(&self, properties: ChainProperties);

    fn chain_properties(&self) -> Option<ChainProperties>;

    /// Names of every registered type, sorted.
    fn known_types(&self) -> Vec<String>;

    /// Decodes the raw `state_getMetadata` result.
    fn decode_metadata(&self, raw: &str) -> Result<RuntimeMetadata, RegistryError>;
}

/// In-memory [`TypeRegistry`].
///
/// Metadata is accepted as hex-encoded JSON. SCALE-encoded metadata needs a
/// registry backed by a real codec.
#[derive(Debug, Default)]
pub struct Registry {
    types: RwLock<BTreeMap<String, serde_json::Value>>,
    properties: RwLock<Option<ChainProperties>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the definition registered under `name`.
    pub fn get(&self, name: &str) -> Option<serde_json::Value> {
        self.types
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }
}

impl TypeRegistry for Registry {
    fn register(&self, types: &TypeOverrides) {
        if types.is_empty() {
            return;
        }
        let mut map = self.types.write().unwrap_or_else(|e| e.into_inner());
        for (name, def) in types {
            map.insert(name.clone(), def.clone());
        }
        debug!(count = types.len(), total = map.len(), "registered types");
    }

    fn set_chain_properties(&self, properties: ChainProperties) {
        *self.properties.write().unwrap_or_else(|e| e.into_inner()) = Some(properties);
    }

    fn chain_properties(&self) -> Option<ChainProperties> {
        self.properties
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn known_types(&self) -> Vec<String> {
        self.types
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    fn decode_metadata(&self, raw: &str) -> Result<RuntimeMetadata, RegistryError> {
        let hex_str = raw.strip_prefix("0x").ok_or(RegistryError::MissingPrefix)?;
        let bytes = hex::decode(hex_str)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
