//! Observable readiness state.
//!
//! Writers update the inputs; the snapshot is recomputed from them by
//! [`derive_snapshot`] and republished only when it changed. Subscribing
//! never recomputes anything.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::bootstrap::{BootstrapOutput, ChainMetadata};
use crate::injector::{ExtensionInfo, InjectedAccount};
use crate::state::ConnectionHandle;

/// Everything the snapshot is derived from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadinessInputs {
    pub primary: Option<ConnectionHandle>,
    pub secondary: Option<ConnectionHandle>,
    pub api_error: Option<String>,
    pub bootstrap: Option<BootstrapOutput>,
    /// `None` until extension enablement resolves.
    pub extensions: Option<Vec<ExtensionInfo>>,
}

/// The value consumers observe.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadinessSnapshot {
    pub primary: Option<ConnectionHandle>,
    pub secondary: Option<ConnectionHandle>,
    /// Primary transport connected.
    pub is_api_connected: bool,
    pub is_api_initialized: bool,
    /// Primary connected and bootstrapped.
    pub is_api_ready: bool,
    pub api_error: Option<String>,
    /// Always `false` when no secondary endpoint is configured.
    pub is_secondary_ready: bool,
    pub metadata: Option<ChainMetadata>,
    pub is_development: bool,
    pub is_ethereum: bool,
    pub has_injected_accounts: bool,
    pub injected_accounts: Vec<InjectedAccount>,
    /// `true` until extension enablement resolves, either way.
    pub is_waiting_injected: bool,
    pub extensions: Option<Vec<ExtensionInfo>>,
}

/// Derives the snapshot from its inputs.
pub fn derive_snapshot(inputs: &ReadinessInputs) -> ReadinessSnapshot {
    let primary = inputs.primary.as_ref();
    let bootstrap = inputs.bootstrap.as_ref();
    ReadinessSnapshot {
        primary: inputs.primary.clone(),
        secondary: inputs.secondary.clone(),
        is_api_connected: primary.is_some_and(|h| h.is_connected),
        is_api_initialized: primary.is_some_and(|h| h.is_initialized),
        is_api_ready: primary.is_some_and(|h| h.is_ready),
        api_error: inputs.api_error.clone(),
        is_secondary_ready: inputs.secondary.as_ref().is_some_and(|h| h.is_ready),
        metadata: bootstrap.map(|b| b.metadata.clone()),
        is_development: bootstrap.is_some_and(|b| b.is_development),
        is_ethereum: bootstrap.is_some_and(|b| b.is_ethereum),
        has_injected_accounts: bootstrap.is_some_and(|b| b.has_injected_accounts),
        injected_accounts: bootstrap
            .map(|b| b.injected_accounts.clone())
            .unwrap_or_default(),
        is_waiting_injected: inputs.extensions.is_none(),
        extensions: inputs.extensions.clone(),
    }
}

/// Holds the inputs and publishes the derived snapshot.
pub struct ReadinessContext {
    inputs: Mutex<ReadinessInputs>,
    tx: watch::Sender<Arc<ReadinessSnapshot>>,
}

impl Default for ReadinessContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessContext {
    /// Starts from empty inputs and publishes their snapshot.
    pub fn new() -> Self {
        let inputs = ReadinessInputs::default();
        let (tx, _rx) = watch::channel(Arc::new(derive_snapshot(&inputs)));
        Self {
            inputs: Mutex::new(inputs),
            tx,
        }
    }

    /// Receiver that wakes on every published snapshot.
    ///
    /// Identical snapshots are never republished, so each wakeup carries a
    /// change.
    pub fn subscribe(&self) -> watch::Receiver<Arc<ReadinessSnapshot>> {
        self.tx.subscribe()
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<ReadinessSnapshot> {
        self.tx.borrow().clone()
    }

    /// Mutates the inputs and republishes if the snapshot changed.
    /// Returns `true` when a new snapshot was published.
    pub fn update(&self, f: impl FnOnce(&mut ReadinessInputs)) -> bool {
        let mut inputs = self.inputs.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut inputs);
        let next = derive_snapshot(&inputs);
        // Publish while holding the inputs lock so snapshots are never
        // published out of order.
        self.tx.send_if_modified(|current| {
            if **current == next {
                false
            } else {
                *current = Arc::new(next);
                true
            }
        })
    }

    /// Replaces the primary handle. Returns `true` when a new snapshot was
    /// published, as do the other setters.
    pub fn set_primary(&self, handle: Option<ConnectionHandle>) -> bool {
        self.update(|i| i.primary = handle)
    }

    pub fn set_secondary(&self, handle: Option<ConnectionHandle>) -> bool {
        self.update(|i| i.secondary = handle)
    }

    pub fn set_api_error(&self, error: Option<String>) -> bool {
        self.update(|i| i.api_error = error)
    }

    pub fn set_bootstrap(&self, output: Option<BootstrapOutput>) -> bool {
        self.update(|i| i.bootstrap = output)
    }

    pub fn set_extensions(&self, extensions: Option<Vec<ExtensionInfo>>) -> bool {
        self.update(|i| i.extensions = extensions)
    }

    /// Back to the initial inputs.
    pub fn reset(&self) -> bool {
        self.update(|i| *i = ReadinessInputs::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_snapshot() {
        let ctx = ReadinessContext::new();
        let snap = ctx.snapshot();
        assert!(snap.primary.is_none());
        assert!(!snap.is_api_connected);
        assert!(!snap.is_api_initialized);
        assert!(!snap.is_api_ready);
        assert!(!snap.is_secondary_ready);
        assert!(snap.is_waiting_injected);
        assert!(snap.extensions.is_none());
        assert!(snap.metadata.is_none());
    }

    #[test]
    fn identical_write_does_not_republish() {
        let ctx = ReadinessContext::new();
        let rx = ctx.subscribe();
        let before = ctx.snapshot();

        assert!(!ctx.set_api_error(None));
        assert!(!rx.has_changed().unwrap());
        assert!(Arc::ptr_eq(&before, &ctx.snapshot()));
    }

    #[test]
    fn changed_input_republishes() {
        let ctx = ReadinessContext::new();
        let rx = ctx.subscribe();
        let before = ctx.snapshot();

        assert!(ctx.set_extensions(Some(vec![])));
        assert!(rx.has_changed().unwrap());
        let after = ctx.snapshot();
        assert!(!Arc::ptr_eq(&before, &after));
        assert!(!after.is_waiting_injected);
        assert_eq!(after.extensions, Some(vec![]));
    }

    #[test]
    fn resubscribe_keeps_identity() {
        let ctx = ReadinessContext::new();
        ctx.set_api_error(Some("boom".into()));
        let a = ctx.subscribe().borrow().clone();
        let b = ctx.subscribe().borrow().clone();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.api_error.as_deref(), Some("boom"));
    }

    #[test]
    fn reset_returns_to_initial() {
        let ctx = ReadinessContext::new();
        let initial = ctx.snapshot();
        ctx.set_extensions(Some(vec![ExtensionInfo {
            name: "polkadot-js".into(),
            version: "0.1.0".into(),
        }]));
        ctx.reset();
        assert_eq!(*ctx.snapshot(), *initial);
    }

    #[test]
    fn derive_is_pure() {
        let inputs = ReadinessInputs {
            api_error: Some("x".into()),
            ..ReadinessInputs::default()
        };
        assert_eq!(derive_snapshot(&inputs), derive_snapshot(&inputs.clone()));
    }
}
