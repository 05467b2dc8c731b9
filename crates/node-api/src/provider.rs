//! Reconnecting WebSocket provider for one node endpoint.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, mpsc};
use tracing::info;

use crate::reconnection::{ProviderContext, cancel_any_reconnect, spawn_connect_loop};
use crate::types::{ProviderEvent, ReconnectConfig};
use crate::ws_client::{WsClient, WsError};

/// Owns the socket to a single node and keeps it alive.
///
/// Connection changes are reported on the channel returned by
/// [`take_events`](Self::take_events). Unexpected drops trigger a reconnect
/// loop; [`disconnect`](Self::disconnect) stops it.
pub struct WsProvider {
    ctx: ProviderContext,
    events_rx: Mutex<Option<mpsc::Receiver<ProviderEvent>>>,
}

impl WsProvider {
    /// Creates a disconnected provider for `endpoint`.
    pub fn new(endpoint: impl Into<String>, config: ReconnectConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(64);
        Self {
            ctx: ProviderContext::new(endpoint.into(), events_tx, config),
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    /// Starts connecting in the background. Returns immediately.
    pub fn connect(&self) {
        self.ctx.manual_disconnect.store(false, Ordering::Relaxed);
        info!(endpoint = %self.ctx.endpoint, "connecting");
        spawn_connect_loop(self.ctx.clone(), 0);
    }

    /// Takes the event receiver. Can only be called once.
    pub async fn take_events(&self) -> Option<mpsc::Receiver<ProviderEvent>> {
        self.events_rx.lock().await.take()
    }

    /// The WebSocket URL this provider dials.
    pub fn endpoint(&self) -> &str {
        &self.ctx.endpoint
    }

    /// Whether a live connection exists right now.
    pub fn is_connected(&self) -> bool {
        self.ctx.connected.load(Ordering::Relaxed)
    }

    async fn client(&self) -> Result<Arc<WsClient>, WsError> {
        self.ctx.client.lock().await.clone().ok_or(WsError::Closed)
    }

    /// Sends a request and deserializes a non-null result.
    pub async fn send<P: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        params: &P,
    ) -> Result<T, WsError> {
        // Clone the client out so the lock is not held across the request.
        let client = self.client().await?;
        client.call(method, params).await
    }

    /// Sends a request whose result may legitimately be `null`.
    pub async fn send_optional<P: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        params: &P,
    ) -> Result<Option<T>, WsError> {
        let client = self.client().await?;
        let resp = client.send_request(method, params).await?;
        Ok(resp.parse_result::<T>()?)
    }

    /// Closes the socket and stops any reconnect loop.
    pub async fn disconnect(&self) {
        self.ctx.manual_disconnect.store(true, Ordering::Relaxed);
        cancel_any_reconnect(&self.ctx.reconnect_cancel);

        let client = self.ctx.client.lock().await.take();
        if let Some(client) = client {
            client.close().await;
        }
        self.ctx.connected.store(false, Ordering::Relaxed);
    }
}

impl Drop for WsProvider {
    fn drop(&mut self) {
        self.ctx.manual_disconnect.store(true, Ordering::Relaxed);
        cancel_any_reconnect(&self.ctx.reconnect_cancel);
        // The client's disconnect callback holds the context, so the cycle
        // must be broken here.
        if let Ok(mut guard) = self.ctx.client.try_lock() {
            guard.take();
        }
    }
}

impl std::fmt::Debug for WsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsProvider")
            .field("endpoint", &self.ctx.endpoint)
            .field("connected", &self.is_connected())
            .finish()
    }
}
