//! API session over a [`WsProvider`].
//!
//! An [`Api`] is the per-chain session handle: it owns the provider, the
//! chain's type registry and signer, and turns provider events into
//! [`ApiEvent`]s. `Ready` fires after the runtime info for the current
//! connection has been loaded.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use dualnode_protocol::constants::methods;
use dualnode_protocol::{
    ChainProperties, ChainType, RpcDefinitions, RpcMethods, RuntimeMetadata, RuntimeVersion,
    TypeOverrides,
};

use crate::provider::WsProvider;
use crate::registry::{RegistryError, TypeRegistry};
use crate::signer::Signer;
use crate::types::{ApiEvent, ProviderEvent};
use crate::ws_client::WsError;

/// Errors from API session calls.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Ws(#[from] WsError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("runtime info not loaded yet")]
    NotReady,

    #[error("unknown rpc {section}.{method}")]
    UnknownRpc { section: String, method: String },

    #[error("{method} expects at least {expected} params, got {got}")]
    MissingParams {
        method: String,
        expected: usize,
        got: usize,
    },
}

/// Boxed future returned by [`ChainApi`] queries.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Runtime information loaded on every (re)connect.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeInfo {
    /// Hex block hash of block 0.
    pub genesis_hash: String,
    pub version: RuntimeVersion,
    pub metadata: Arc<RuntimeMetadata>,
    /// Output of `rpc_methods`.
    pub rpc_methods: Vec<String>,
}

impl RuntimeInfo {
    /// Returns `true` if the node exposes `method`.
    pub fn has_rpc_method(&self, method: &str) -> bool {
        self.rpc_methods.iter().any(|m| m == method)
    }
}

/// Chain queries the bootstrap sequence depends on.
pub trait ChainApi: Send + Sync {
    /// Runtime info of the current connection, once loaded.
    fn runtime(&self) -> Option<Arc<RuntimeInfo>>;

    /// Type registry bound to this session.
    fn registry(&self) -> Arc<dyn TypeRegistry>;

    /// `system_properties`: token decimals, symbols and address prefix.
    fn system_properties(&self) -> ApiFuture<'_, ChainProperties>;

    fn system_chain(&self) -> ApiFuture<'_, String>;

    /// Only meaningful when the node exposes `system_chainType`.
    fn system_chain_type(&self) -> ApiFuture<'_, ChainType>;

    fn system_name(&self) -> ApiFuture<'_, String>;

    fn system_version(&self) -> ApiFuture<'_, String>;
}

/// Options for [`Api::create`].
pub struct ApiOptions {
    /// Transport. Connected by [`Api::create`].
    pub provider: WsProvider,
    pub registry: Arc<dyn TypeRegistry>,
    pub signer: Option<Arc<dyn Signer>>,
    /// Type definitions registered before the first metadata load.
    pub types: TypeOverrides,
    pub rpc: RpcDefinitions,
}

/// Session handle for one chain.
pub struct Api {
    provider: Arc<WsProvider>,
    registry: Arc<dyn TypeRegistry>,
    signer: Option<Arc<dyn Signer>>,
    rpc: RpcDefinitions,
    runtime: Arc<RwLock<Option<Arc<RuntimeInfo>>>>,
    events_rx: Mutex<Option<mpsc::Receiver<ApiEvent>>>,
    cancel: CancellationToken,
}

impl Api {
    /// Registers the type overrides, starts connecting and returns the session.
    ///
    /// Does not wait for the connection; progress is reported through
    /// [`take_events`](Self::take_events).
    pub async fn create(options: ApiOptions) -> Arc<Self> {
        let ApiOptions {
            provider,
            registry,
            signer,
            types,
            rpc,
        } = options;

        registry.register(&types);

        let provider = Arc::new(provider);
        let runtime = Arc::new(RwLock::new(None));
        let (events_tx, events_rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();

        match provider.take_events().await {
            Some(provider_rx) => {
                tokio::spawn(event_pump(
                    provider_rx,
                    provider.clone(),
                    registry.clone(),
                    runtime.clone(),
                    events_tx,
                    cancel.clone(),
                ));
            }
            None => warn!(
                endpoint = provider.endpoint(),
                "provider events already taken, session will not report state"
            ),
        }

        provider.connect();

        Arc::new(Self {
            provider,
            registry,
            signer,
            rpc,
            runtime,
            events_rx: Mutex::new(Some(events_rx)),
            cancel,
        })
    }

    /// Takes the event receiver. Can only be called once.
    pub async fn take_events(&self) -> Option<mpsc::Receiver<ApiEvent>> {
        self.events_rx.lock().await.take()
    }

    /// Endpoint this session connects to.
    pub fn endpoint(&self) -> &str {
        self.provider.endpoint()
    }

    /// Whether the underlying provider is connected.
    pub fn is_connected(&self) -> bool {
        self.provider.is_connected()
    }

    /// Signer attached at creation, if any.
    pub fn signer(&self) -> Option<Arc<dyn Signer>> {
        self.signer.clone()
    }

    /// Custom RPC definitions this session was created with.
    pub fn rpc_definitions(&self) -> &RpcDefinitions {
        &self.rpc
    }

    /// Methods exposed by the node, as of the last load.
    pub fn rpc_methods(&self) -> Vec<String> {
        self.runtime()
            .map(|r| r.rpc_methods.clone())
            .unwrap_or_default()
    }

    /// Calls one of the custom RPC definitions passed in [`ApiOptions::rpc`].
    pub async fn custom_rpc<T: DeserializeOwned>(
        &self,
        section: &str,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<Option<T>, ApiError> {
        let def = self
            .rpc
            .get(section)
            .and_then(|s| s.get(method))
            .ok_or_else(|| ApiError::UnknownRpc {
                section: section.to_string(),
                method: method.to_string(),
            })?;

        let rpc_name = format!("{section}_{method}");
        let expected = def.required_params();
        if params.len() < expected {
            return Err(ApiError::MissingParams {
                method: rpc_name,
                expected,
                got: params.len(),
            });
        }

        Ok(self.provider.send_optional(&rpc_name, &params).await?)
    }

    /// Parameterless query with a non-null result.
    async fn query<T: DeserializeOwned>(&self, method: &'static str) -> Result<T, ApiError> {
        let value = self.provider.send::<_, T>(method, &json!([])).await?;
        Ok(value)
    }

    /// Stops the event pump and closes the provider.
    pub async fn close(&self) {
        self.cancel.cancel();
        self.provider.disconnect().await;
    }
}

impl ChainApi for Api {
    fn runtime(&self) -> Option<Arc<RuntimeInfo>> {
        self.runtime
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn registry(&self) -> Arc<dyn TypeRegistry> {
        self.registry.clone()
    }

    fn system_properties(&self) -> ApiFuture<'_, ChainProperties> {
        Box::pin(self.query::<ChainProperties>(methods::SYSTEM_PROPERTIES))
    }

    fn system_chain(&self) -> ApiFuture<'_, String> {
        Box::pin(self.query::<String>(methods::SYSTEM_CHAIN))
    }

    fn system_chain_type(&self) -> ApiFuture<'_, ChainType> {
        Box::pin(self.query::<ChainType>(methods::SYSTEM_CHAIN_TYPE))
    }

    fn system_name(&self) -> ApiFuture<'_, String> {
        Box::pin(self.query::<String>(methods::SYSTEM_NAME))
    }

    fn system_version(&self) -> ApiFuture<'_, String> {
        Box::pin(self.query::<String>(methods::SYSTEM_VERSION))
    }
}

impl std::fmt::Debug for Api {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Api")
            .field("endpoint", &self.endpoint())
            .field("connected", &self.is_connected())
            .field("ready", &self.runtime().is_some())
            .finish_non_exhaustive()
    }
}

impl Drop for Api {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Loads genesis hash, runtime version, metadata and rpc methods.
async fn load_runtime(
    provider: &WsProvider,
    registry: &dyn TypeRegistry,
) -> Result<RuntimeInfo, ApiError> {
    let genesis_block = json!([0]);
    let no_params = json!([]);
    let (genesis_hash, version, raw_metadata, rpc) = tokio::try_join!(
        provider.send::<_, String>(methods::CHAIN_GET_BLOCK_HASH, &genesis_block),
        provider.send::<_, RuntimeVersion>(methods::STATE_GET_RUNTIME_VERSION, &no_params),
        provider.send::<_, String>(methods::STATE_GET_METADATA, &no_params),
        provider.send::<_, RpcMethods>(methods::RPC_METHODS, &no_params),
    )?;

    let metadata = registry.decode_metadata(&raw_metadata)?;

    Ok(RuntimeInfo {
        genesis_hash,
        version,
        metadata: Arc::new(metadata),
        rpc_methods: rpc.methods,
    })
}

/// Translates provider events into session events.
async fn event_pump(
    mut provider_rx: mpsc::Receiver<ProviderEvent>,
    provider: Arc<WsProvider>,
    registry: Arc<dyn TypeRegistry>,
    runtime: Arc<RwLock<Option<Arc<RuntimeInfo>>>>,
    events_tx: mpsc::Sender<ApiEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = provider_rx.recv() => match event {
                Some(e) => e,
                None => break,
            },
        };

        match event {
            ProviderEvent::Connected => {
                let _ = events_tx.send(ApiEvent::Connected).await;

                match load_runtime(&provider, registry.as_ref()).await {
                    Ok(info) => {
                        info!(
                            endpoint = provider.endpoint(),
                            spec = %info.version.spec_name,
                            spec_version = info.version.spec_version,
                            "runtime loaded"
                        );
                        *runtime.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(info));
                        let _ = events_tx.send(ApiEvent::Ready).await;
                    }
                    Err(e) => {
                        warn!(endpoint = provider.endpoint(), error = %e, "failed to load runtime");
                        let _ = events_tx.send(ApiEvent::Error(e.to_string())).await;
                    }
                }
            }
            ProviderEvent::Disconnected => {
                let _ = events_tx.send(ApiEvent::Disconnected).await;
            }
            ProviderEvent::Error(msg) => {
                let _ = events_tx.send(ApiEvent::Error(msg)).await;
            }
        }
    }

    debug!(endpoint = provider.endpoint(), "api event pump stopped");
}
