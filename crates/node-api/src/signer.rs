//! Signing capability bound to a UI approval queue.
//!
//! [`ApiSigner`] never signs anything itself: payloads are handed to the
//! caller's queue and the signature comes back through the queued
//! responder once the user approves.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::debug;

use crate::registry::TypeRegistry;

/// Errors from a signing request.
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("signing rejected: {0}")]
    Rejected(String),

    #[error("signing request dropped before an answer")]
    Cancelled,
}

/// Extrinsic payload to be signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerPayload {
    pub address: String,
    pub block_hash: String,
    pub genesis_hash: String,
    pub method: String,
    pub nonce: u64,
    pub spec_version: u32,
    pub transaction_version: u32,
}

/// Answer to a signing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerResult {
    /// Request id the signature answers.
    pub id: String,
    pub signature: String,
}

/// Progress of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxUpdate {
    /// The transaction was broadcast and has this hash.
    Hash(String),
    /// A status reported by the node, e.g. `InBlock` or `Finalized`.
    Status { kind: String, detail: Option<String> },
}

/// Status change forwarded to the UI queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxStatusUpdate {
    pub id: String,
    pub status: String,
    pub detail: Option<String>,
}

/// A payload waiting for user approval.
pub struct QueuedPayload {
    /// Request id, also used for later status updates.
    pub id: String,
    pub registry: Arc<dyn TypeRegistry>,
    pub payload: SignerPayload,
    /// Receives the signature, or the rejection reason.
    pub responder: oneshot::Sender<Result<SignerResult, String>>,
}

impl std::fmt::Debug for QueuedPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedPayload")
            .field("id", &self.id)
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

/// Enqueues a payload for user approval.
pub type QueuePayloadFn = Arc<dyn Fn(QueuedPayload) + Send + Sync>;

/// Updates the status of a previously queued payload.
pub type QueueSetTxStatusFn = Arc<dyn Fn(TxStatusUpdate) + Send + Sync>;

/// Signing capability attached to an API session.
pub trait Signer: Send + Sync {
    /// Asks for a signature over `payload`.
    fn sign_payload(
        &self,
        payload: SignerPayload,
    ) -> Pin<Box<dyn Future<Output = Result<SignerResult, SignerError>> + Send + '_>>;

    /// Reports progress of the transaction signed under `id`.
    fn update(&self, id: &str, update: TxUpdate);
}

/// [`Signer`] that routes every request through the UI queue.
pub struct ApiSigner {
    registry: Arc<dyn TypeRegistry>,
    queue_payload: QueuePayloadFn,
    queue_set_tx_status: QueueSetTxStatusFn,
}

impl ApiSigner {
    /// Creates a signer that forwards requests to `queue_payload`.
    pub fn new(
        registry: Arc<dyn TypeRegistry>,
        queue_payload: QueuePayloadFn,
        queue_set_tx_status: QueueSetTxStatusFn,
    ) -> Self {
        Self {
            registry,
            queue_payload,
            queue_set_tx_status,
        }
    }
}

impl Signer for ApiSigner {
    fn sign_payload(
        &self,
        payload: SignerPayload,
    ) -> Pin<Box<dyn Future<Output = Result<SignerResult, SignerError>> + Send + '_>> {
        Box::pin(async move {
            let id = uuid::Uuid::new_v4().to_string();
            let (tx, rx) = oneshot::channel();
            debug!(%id, address = %payload.address, "queueing payload for approval");

            (self.queue_payload)(QueuedPayload {
                id,
                registry: self.registry.clone(),
                payload,
                responder: tx,
            });

            match rx.await {
                Ok(Ok(result)) => Ok(result),
                Ok(Err(reason)) => Err(SignerError::Rejected(reason)),
                Err(_) => Err(SignerError::Cancelled),
            }
        })
    }

    fn update(&self, id: &str, update: TxUpdate) {
        let (status, detail) = match update {
            TxUpdate::Hash(hash) => ("sent".to_string(), Some(hash)),
            TxUpdate::Status { kind, detail } => (kind.to_lowercase(), detail),
        };
        (self.queue_set_tx_status)(TxStatusUpdate {
            id: id.to_string(),
            status,
            detail,
        });
    }
}
