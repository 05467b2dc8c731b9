//! Local key store capability.

use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::injector::InjectedAccount;

/// Errors from loading the key store.
#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Account derivation family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Ethereum,
    Standard,
}

impl AccountKind {
    /// Ethereum chains use 20-byte accounts.
    pub fn for_chain(is_ethereum: bool) -> Self {
        if is_ethereum {
            AccountKind::Ethereum
        } else {
            AccountKind::Standard
        }
    }
}

/// Options passed to [`KeyStore::load_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyringOptions {
    pub genesis_hash: String,
    pub is_development: bool,
    pub ss58_format: u16,
    /// Backing directory, if accounts are persisted.
    pub store: Option<PathBuf>,
    pub kind: AccountKind,
}

/// Key store loaded once per process.
pub trait KeyStore: Send + Sync {
    /// Whether [`load_all`](Self::load_all) already succeeded.
    fn is_loaded(&self) -> bool;

    /// Loads stored accounts and merges the injected ones.
    ///
    /// Calling it again once loaded is a no-op.
    fn load_all(
        &self,
        options: KeyringOptions,
        injected: &[InjectedAccount],
    ) -> Result<(), KeyStoreError>;
}

#[derive(Debug, Clone)]
struct Loaded {
    options: KeyringOptions,
    accounts: Vec<InjectedAccount>,
}

/// In-memory [`KeyStore`].
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    loaded: Mutex<Option<Loaded>>,
}

impl MemoryKeyStore {
    /// An empty, unloaded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options of the first (and only) load.
    pub fn options(&self) -> Option<KeyringOptions> {
        self.lock().as_ref().map(|l| l.options.clone())
    }

    /// Accounts merged by the load, empty before it.
    pub fn accounts(&self) -> Vec<InjectedAccount> {
        self.lock()
            .as_ref()
            .map(|l| l.accounts.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Loaded>> {
        self.loaded.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyStore for MemoryKeyStore {
    fn is_loaded(&self) -> bool {
        self.lock().is_some()
    }

    fn load_all(
        &self,
        options: KeyringOptions,
        injected: &[InjectedAccount],
    ) -> Result<(), KeyStoreError> {
        let mut guard = self.lock();
        if guard.is_some() {
            debug!("key store already loaded, skipping");
            return Ok(());
        }

        if let Some(dir) = &options.store {
            std::fs::create_dir_all(dir)?;
        }

        info!(
            genesis = %options.genesis_hash,
            ss58 = options.ss58_format,
            dev = options.is_development,
            kind = ?options.kind,
            injected = injected.len(),
            "key store loaded"
        );
        *guard = Some(Loaded {
            options,
            accounts: injected.to_vec(),
        });
        Ok(())
    }
}
