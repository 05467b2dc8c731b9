//! Connection lifecycle for a primary and an optional secondary chain.
//!
//! The [`DualChainCoordinator`] opens the primary session, bootstraps it
//! once the runtime is loaded (registry, formatting defaults, key store,
//! derive cache), and only then opens the secondary session. Consumers
//! observe the combined state through the [`ReadinessContext`].

pub mod bootstrap;
pub mod coordinator;
pub mod derive_cache;
pub mod error;
pub mod format;
pub mod injector;
pub mod keyring;
pub mod readiness;
pub mod state;
pub mod type_store;

#[cfg(test)]
mod mock_node;

pub use bootstrap::{BootstrapContext, BootstrapOutput, ChainMetadata, bootstrap};
pub use coordinator::{CoordinatorOptions, DualChainCoordinator};
pub use derive_cache::{DeriveCache, DeriveCaches};
pub use error::BootstrapError;
pub use format::{BalanceFormatter, FormatDefaults};
pub use injector::{
    ExtensionAccount, ExtensionEnabler, ExtensionError, ExtensionInfo, InjectedAccount,
    InjectedExtension, web3_accounts,
};
pub use keyring::{AccountKind, KeyStore, KeyStoreError, KeyringOptions, MemoryKeyStore};
pub use readiness::{ReadinessContext, ReadinessInputs, ReadinessSnapshot};
pub use state::{ConnectionHandle, ConnectionState, SessionRef};
pub use type_store::{TypeStore, TypeStoreError, default_types_path};
