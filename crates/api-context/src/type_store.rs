//! Persisted type overrides.
//!
//! Overrides live in a JSON file under the key `"types"`, cached in memory.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use dualnode_protocol::TypeOverrides;

/// Errors from the type store.
#[derive(Debug, thiserror::Error)]
pub enum TypeStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    types: TypeOverrides,
}

/// File-backed store of user type overrides.
pub struct TypeStore {
    path: PathBuf,
    types: RwLock<TypeOverrides>,
}

impl TypeStore {
    /// Opens the store, loading existing overrides from disk.
    pub fn new(path: PathBuf) -> Result<Self, TypeStoreError> {
        let types = load_types(&path)?;
        Ok(Self {
            path,
            types: RwLock::new(types),
        })
    }

    /// File the overrides are persisted to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stored overrides.
    pub fn types(&self) -> TypeOverrides {
        self.types
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replaces the stored overrides.
    pub fn save_types(&self, types: &TypeOverrides) -> Result<(), TypeStoreError> {
        *self.types.write().unwrap_or_else(|e| e.into_inner()) = types.clone();
        self.persist()
    }

    /// Removes every stored override.
    pub fn clear(&self) -> Result<(), TypeStoreError> {
        self.types
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        self.persist()
    }

    fn persist(&self) -> Result<(), TypeStoreError> {
        let file = StoreFile {
            types: self.types(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, json)?;
        debug!("persisted {} type(s) to {:?}", file.types.len(), self.path);
        Ok(())
    }
}

fn load_types(path: &Path) -> Result<TypeOverrides, TypeStoreError> {
    if !path.exists() {
        return Ok(TypeOverrides::new());
    }
    let data = std::fs::read_to_string(path)?;
    let file: StoreFile = serde_json::from_str(&data)?;
    debug!("loaded {} type(s) from {:?}", file.types.len(), path);
    Ok(file.types)
}

/// Returns the default type store path.
pub fn default_types_path() -> Option<PathBuf> {
    dualnode_settings::app_dir().map(|d| d.join("types.json"))
}

/// Picks the overrides for a session: the explicit ones, else the stored
/// ones, else none.
pub fn resolve_type_overrides(
    explicit: Option<&TypeOverrides>,
    store: Option<&TypeStore>,
) -> TypeOverrides {
    let types = match (explicit, store) {
        (Some(types), _) => types.clone(),
        (None, Some(store)) => store.types(),
        (None, None) => TypeOverrides::new(),
    };
    if !types.is_empty() {
        let names: Vec<&str> = types.keys().map(String::as_str).collect();
        info!(types = ?names, "type overrides");
    }
    types
}
