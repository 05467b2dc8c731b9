//! Derived-query memo caches keyed by genesis hash.
//!
//! Bootstrap publishes one cache per chain; derived-data consumers look it
//! up by genesis hash and memoize their computations in it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use tracing::debug;

/// Memo cache for one chain.
#[derive(Debug)]
pub struct DeriveCache {
    genesis_hash: String,
    entries: Mutex<HashMap<String, serde_json::Value>>,
}

impl DeriveCache {
    fn new(genesis_hash: String) -> Self {
        Self {
            genesis_hash,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn genesis_hash(&self) -> &str {
        &self.genesis_hash
    }

    /// Cached value for `key`, if any.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.lock().get(key).cloned()
    }

    /// Stores `value`, replacing any previous entry.
    pub fn set(&self, key: impl Into<String>, value: serde_json::Value) {
        self.lock().insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, serde_json::Value>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// All published caches.
#[derive(Debug, Default)]
pub struct DeriveCaches {
    caches: Mutex<HashMap<String, Arc<DeriveCache>>>,
}

impl DeriveCaches {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide set of caches.
    pub fn global() -> Arc<DeriveCaches> {
        static GLOBAL: OnceLock<Arc<DeriveCaches>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(DeriveCaches::new())).clone()
    }

    /// Publishes the cache for `genesis_hash`. Written once: later calls
    /// return the existing cache untouched.
    pub fn publish(&self, genesis_hash: &str) -> Arc<DeriveCache> {
        let mut caches = self.caches.lock().unwrap_or_else(|e| e.into_inner());
        caches
            .entry(genesis_hash.to_string())
            .or_insert_with(|| {
                debug!(genesis = %genesis_hash, "derive cache published");
                Arc::new(DeriveCache::new(genesis_hash.to_string()))
            })
            .clone()
    }

    /// The cache published for `genesis_hash`, if any.
    pub fn lookup(&self, genesis_hash: &str) -> Option<Arc<DeriveCache>> {
        self.caches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(genesis_hash)
            .cloned()
    }
}
