//! Node transport and session layer.
//!
//! Provides a JSON-RPC WebSocket client with keepalive, a reconnecting
//! provider, per-chain type registries, the UI-queue signer and the
//! [`Api`] session handle built on top of them.

pub mod api;
pub mod provider;
mod pumps;
pub(crate) mod reconnection;
pub mod registry;
pub mod signer;
pub mod types;
pub mod ws_client;

pub use api::{Api, ApiError, ApiFuture, ApiOptions, ChainApi, RuntimeInfo};
pub use provider::WsProvider;
pub use registry::{Registry, RegistryError, TypeRegistry};
pub use signer::{
    ApiSigner, QueuePayloadFn, QueueSetTxStatusFn, QueuedPayload, Signer, SignerError,
    SignerPayload, SignerResult, TxStatusUpdate, TxUpdate,
};
pub use types::{ApiEvent, ProviderEvent, ReconnectConfig};
pub use ws_client::{WsClient, WsError};
