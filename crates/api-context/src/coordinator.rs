//! Dual chain coordinator.
//!
//! Opens the primary chain session, bootstraps it once it is ready and only
//! then opens the secondary session. Each session gets its own registry and
//! its own event loop; the loops own the [`ConnectionHandle`]s and push
//! every change into the [`ReadinessContext`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use dualnode_node_api::{
    Api, ApiEvent, ApiOptions, ApiSigner, QueuePayloadFn, QueueSetTxStatusFn, ReconnectConfig,
    Registry, Signer, TypeRegistry, WsProvider,
};
use dualnode_protocol::{RpcDefinitions, TypeOverrides, custom_rpc_definitions};
use dualnode_settings::Settings;

use crate::bootstrap::{BootstrapContext, ChainMetadata, bootstrap};
use crate::derive_cache::DeriveCaches;
use crate::format::BalanceFormatter;
use crate::injector::{EnableFuture, ExtensionEnabler, extension_infos, start_enable};
use crate::keyring::KeyStore;
use crate::readiness::ReadinessContext;
use crate::state::{ConnectionHandle, ConnectionState};
use crate::type_store::{TypeStore, resolve_type_overrides};

/// Collaborators handed to the coordinator.
pub struct CoordinatorOptions {
    /// Loaded once, by the first successful bootstrap.
    pub keystore: Arc<dyn KeyStore>,
    /// Browser-extension access. `None` means no extensions are available.
    pub enabler: Option<Arc<dyn ExtensionEnabler>>,
    pub type_store: Option<Arc<TypeStore>>,
    /// Explicit type overrides; take precedence over the type store.
    pub type_overrides: Option<TypeOverrides>,
    /// Signing requests of both sessions land here.
    pub queue_payload: QueuePayloadFn,
    pub queue_set_tx_status: QueueSetTxStatusFn,
    pub formatter: Arc<BalanceFormatter>,
    pub derive_caches: Arc<DeriveCaches>,
    /// Backoff used by both providers.
    pub reconnect: ReconnectConfig,
    /// Registry the primary bootstrap writes chain properties into.
    pub primary_registry: Arc<dyn TypeRegistry>,
    pub secondary_registry: Arc<dyn TypeRegistry>,
    pub rpc: RpcDefinitions,
}

impl CoordinatorOptions {
    /// Options with process-wide formatter and caches, fresh registries, no
    /// extensions and no persisted types.
    pub fn new(
        keystore: Arc<dyn KeyStore>,
        queue_payload: QueuePayloadFn,
        queue_set_tx_status: QueueSetTxStatusFn,
    ) -> Self {
        Self {
            keystore,
            enabler: None,
            type_store: None,
            type_overrides: None,
            queue_payload,
            queue_set_tx_status,
            formatter: BalanceFormatter::global(),
            derive_caches: DeriveCaches::global(),
            reconnect: ReconnectConfig::default(),
            primary_registry: Arc::new(Registry::new()),
            secondary_registry: Arc::new(Registry::new()),
            rpc: custom_rpc_definitions(),
        }
    }
}

/// A running chain session.
struct ChainSession {
    api: Arc<Api>,
    cancel: CancellationToken,
}

impl ChainSession {
    async fn close(self) {
        self.cancel.cancel();
        self.api.close().await;
    }
}

struct Inner {
    options: CoordinatorOptions,
    readiness: Arc<ReadinessContext>,
    primary: Mutex<Option<ChainSession>>,
    secondary: Mutex<Option<ChainSession>>,
    metadata: std::sync::RwLock<Option<ChainMetadata>>,
    /// Bumped on every (re)initialization; loops of older generations stop
    /// publishing.
    generation: AtomicU64,
}

/// Orchestrates the primary and secondary chain connections.
#[derive(Clone)]
pub struct DualChainCoordinator {
    inner: Arc<Inner>,
}

impl DualChainCoordinator {
    /// Creates an idle coordinator. Nothing connects until
    /// [`init_primary`](Self::init_primary).
    pub fn new(options: CoordinatorOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                options,
                readiness: Arc::new(ReadinessContext::new()),
                primary: Mutex::new(None),
                secondary: Mutex::new(None),
                metadata: std::sync::RwLock::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Shared readiness state. Subscribe to follow both chains.
    pub fn readiness(&self) -> Arc<ReadinessContext> {
        self.inner.readiness.clone()
    }

    /// Metadata of the last successful primary bootstrap.
    pub fn metadata(&self) -> Option<ChainMetadata> {
        self.inner
            .metadata
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Session of the primary chain, if initialized.
    pub async fn primary_api(&self) -> Option<Arc<Api>> {
        self.inner.primary.lock().await.as_ref().map(|s| s.api.clone())
    }

    /// Session of the secondary chain, if initialized.
    pub async fn secondary_api(&self) -> Option<Arc<Api>> {
        self.inner.secondary.lock().await.as_ref().map(|s| s.api.clone())
    }

    /// Opens the primary chain. Without a primary endpoint nothing happens.
    ///
    /// Returns once the session exists; connection progress, bootstrap and
    /// the secondary chain follow asynchronously.
    pub async fn init_primary(&self, settings: &Settings) {
        self.inner.init_primary(settings).await;
    }

    /// Opens the secondary chain. Nothing happens without a secondary
    /// endpoint, when a secondary session already exists, or before the
    /// primary chain finished its bootstrap.
    ///
    /// Returns `true` if a session was opened.
    pub async fn init_secondary(&self, settings: &Settings) -> bool {
        if self.metadata().is_none() {
            debug!("primary chain not bootstrapped, secondary deferred");
            return false;
        }
        let generation = self.inner.generation.load(Ordering::SeqCst);
        self.inner.init_secondary(settings, generation).await
    }

    /// Replaces both sessions with fresh ones for `settings`.
    ///
    /// Holders of the previous `Arc<Api>` keep a closed session.
    pub async fn reinitialize(&self, settings: &Settings) {
        self.shutdown().await;
        self.inner.readiness.reset();
        self.inner.init_primary(settings).await;
    }

    /// Closes both sessions and stops their event loops.
    pub async fn shutdown(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.close_sessions().await;
        debug!("coordinator shut down");
    }
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Closes both sessions. Returns `true` if any was open.
    async fn close_sessions(&self) -> bool {
        let primary = self.primary.lock().await.take();
        let secondary = self.secondary.lock().await.take();
        let had_sessions = primary.is_some() || secondary.is_some();
        for session in [primary, secondary].into_iter().flatten() {
            session.close().await;
        }
        *self.metadata.write().unwrap_or_else(|e| e.into_inner()) = None;
        had_sessions
    }

    async fn open_session(
        &self,
        endpoint: &str,
        registry: Arc<dyn TypeRegistry>,
        types: TypeOverrides,
    ) -> (Arc<Api>, Option<mpsc::Receiver<ApiEvent>>) {
        let signer: Arc<dyn Signer> = Arc::new(ApiSigner::new(
            registry.clone(),
            self.options.queue_payload.clone(),
            self.options.queue_set_tx_status.clone(),
        ));
        let api = Api::create(ApiOptions {
            provider: WsProvider::new(endpoint, self.options.reconnect.clone()),
            registry,
            signer: Some(signer),
            types,
            rpc: self.options.rpc.clone(),
        })
        .await;
        let events = api.take_events().await;
        (api, events)
    }

    async fn init_primary(self: &Arc<Self>, settings: &Settings) {
        let Some(endpoint) = settings.primary_endpoint() else {
            debug!("no primary endpoint configured, staying idle");
            return;
        };

        // Loops of a replaced session must stop publishing before the new
        // session exists.
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if self.close_sessions().await {
            debug!("replacing previous chain sessions");
            self.readiness.reset();
        }

        let types = resolve_type_overrides(
            self.options.type_overrides.as_ref(),
            self.options.type_store.as_deref(),
        );
        let enable = start_enable(
            self.options.enabler.clone(),
            settings.extension_origin.clone(),
        );
        let cancel = CancellationToken::new();

        let (api, events) = self
            .open_session(endpoint, self.options.primary_registry.clone(), types.clone())
            .await;
        let handle = ConnectionHandle::new(endpoint, api.clone());
        self.readiness.set_primary(Some(handle.clone()));
        info!(endpoint, "primary chain initialized");

        tokio::spawn(watch_extensions(
            self.clone(),
            enable.clone(),
            generation,
            cancel.clone(),
        ));

        match events {
            Some(events) => {
                tokio::spawn(run_primary(PrimaryLoop {
                    inner: self.clone(),
                    api: api.clone(),
                    events,
                    handle,
                    settings: settings.clone(),
                    types,
                    enable,
                    generation,
                    cancel: cancel.clone(),
                }));
            }
            None => warn!(endpoint, "primary session events unavailable"),
        }

        *self.primary.lock().await = Some(ChainSession { api, cancel });
    }

    async fn init_secondary(self: &Arc<Self>, settings: &Settings, generation: u64) -> bool {
        let Some(endpoint) = settings.secondary_endpoint() else {
            debug!("no secondary endpoint configured");
            return false;
        };

        // Held across creation so concurrent callers cannot open two sessions.
        let mut slot = self.secondary.lock().await;
        if slot.is_some() {
            debug!("secondary chain already initialized");
            return false;
        }
        if !self.is_current(generation) {
            return false;
        }

        let types = resolve_type_overrides(
            self.options.type_overrides.as_ref(),
            self.options.type_store.as_deref(),
        );
        let (api, events) = self
            .open_session(endpoint, self.options.secondary_registry.clone(), types)
            .await;
        let handle = ConnectionHandle::new(endpoint, api.clone());
        self.readiness.set_secondary(Some(handle.clone()));
        info!(endpoint, "secondary chain initialized");

        let cancel = CancellationToken::new();
        match events {
            Some(events) => {
                tokio::spawn(run_secondary(
                    self.clone(),
                    events,
                    handle,
                    generation,
                    cancel.clone(),
                ));
            }
            None => warn!(endpoint, "secondary session events unavailable"),
        }
        *slot = Some(ChainSession { api, cancel });
        true
    }
}

/// Publishes the enabled extensions once enablement resolves.
async fn watch_extensions(
    inner: Arc<Inner>,
    enable: EnableFuture,
    generation: u64,
    cancel: CancellationToken,
) {
    let result = tokio::select! {
        _ = cancel.cancelled() => return,
        result = extension_infos(enable) => result,
    };
    if !inner.is_current(generation) {
        return;
    }
    let extensions = match result {
        Ok(extensions) => extensions,
        Err(e) => {
            warn!(error = %e, "extension enable failed");
            Vec::new()
        }
    };
    inner.readiness.set_extensions(Some(extensions));
}

struct PrimaryLoop {
    inner: Arc<Inner>,
    api: Arc<Api>,
    events: mpsc::Receiver<ApiEvent>,
    handle: ConnectionHandle,
    settings: Settings,
    types: TypeOverrides,
    enable: EnableFuture,
    generation: u64,
    cancel: CancellationToken,
}

async fn run_primary(mut lp: PrimaryLoop) {
    loop {
        let event = tokio::select! {
            _ = lp.cancel.cancelled() => break,
            event = lp.events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let Some(state) = lp.handle.apply(&event) else {
            debug!(?event, state = ?lp.handle.state, "ignoring primary event");
            continue;
        };
        if !lp.inner.is_current(lp.generation) {
            break;
        }
        if let ApiEvent::Error(msg) = &event {
            warn!(error = %msg, "primary chain error");
            lp.inner.readiness.set_api_error(Some(msg.clone()));
        }
        lp.inner.readiness.set_primary(Some(lp.handle.clone()));

        if state == ConnectionState::Ready {
            on_primary_ready(&mut lp).await;
        }
    }
    debug!("primary event loop stopped");
}

async fn on_primary_ready(lp: &mut PrimaryLoop) {
    let inner = lp.inner.clone();
    let result = bootstrap(
        lp.api.as_ref(),
        BootstrapContext {
            settings: &lp.settings,
            type_overrides: &lp.types,
            injected: lp.enable.clone(),
            keystore: inner.options.keystore.as_ref(),
            formatter: &inner.options.formatter,
            derive_caches: &inner.options.derive_caches,
        },
    )
    .await;

    if lp.cancel.is_cancelled() || !inner.is_current(lp.generation) {
        debug!("dropping bootstrap result of a replaced session");
        return;
    }

    match result {
        Ok(output) => {
            *inner.metadata.write().unwrap_or_else(|e| e.into_inner()) =
                Some(output.metadata.clone());
            lp.handle.is_ready = true;
            inner.readiness.update(|i| {
                i.bootstrap = Some(output);
                i.primary = Some(lp.handle.clone());
            });
            inner.init_secondary(&lp.settings, lp.generation).await;
        }
        Err(e) => {
            warn!(error = %e, "primary bootstrap failed");
            lp.handle.fail(e.to_string());
            inner.readiness.update(|i| {
                i.api_error = Some(e.to_string());
                i.primary = Some(lp.handle.clone());
            });
        }
    }
}

async fn run_secondary(
    inner: Arc<Inner>,
    mut events: mpsc::Receiver<ApiEvent>,
    mut handle: ConnectionHandle,
    generation: u64,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let Some(state) = handle.apply(&event) else {
            debug!(?event, state = ?handle.state, "ignoring secondary event");
            continue;
        };
        if !inner.is_current(generation) {
            break;
        }
        if state == ConnectionState::Ready {
            handle.is_ready = true;
            info!(endpoint = %handle.endpoint, "secondary chain ready");
        }
        if let ApiEvent::Error(msg) = &event {
            warn!(error = %msg, "secondary chain error");
        }
        inner.readiness.set_secondary(Some(handle.clone()));
    }
    debug!("secondary event loop stopped");
}
