//! WebSocket JSON-RPC client for a single node connection.
//!
//! Implements request-response with numeric id correlation and ping/pong
//! keepalive.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::StreamExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_tungstenite::tungstenite;
use tracing::trace;

use dualnode_protocol::constants::{WS_MAX_MESSAGE_SIZE, WS_REQUEST_TIMEOUT};
use dualnode_protocol::envelope::Message;

/// Errors from the WebSocket client.
#[derive(Debug, thiserror::Error)]
pub enum WsError {
    #[error("WebSocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request timed out")]
    Timeout,

    #[error("connection closed")]
    Closed,

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("empty result for {0}")]
    EmptyResult(String),
}

/// Pending requests awaiting their response, keyed by request id.
pub(crate) type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Message>>>>;

/// Callback type for disconnect notification.
pub(crate) type DisconnectCallback = Arc<Mutex<Option<Box<dyn Fn() + Send + Sync>>>>;

/// WebSocket client connected to a single node endpoint.
pub struct WsClient {
    endpoint: String,
    next_id: AtomicU64,
    write_tx: mpsc::Sender<tungstenite::Message>,
    pending: PendingMap,
    on_disconnect: DisconnectCallback,
    _read_handle: tokio::task::JoinHandle<()>,
    _write_handle: tokio::task::JoinHandle<()>,
    _ping_handle: tokio::task::JoinHandle<()>,
    cancel: tokio_util::sync::CancellationToken,
}

impl WsClient {
    /// Opens a WebSocket to the node and starts the read, write and ping pumps.
    pub async fn connect(endpoint: &str) -> Result<Self, WsError> {
        let mut ws_config = tokio_tungstenite::tungstenite::protocol::WebSocketConfig::default();
        ws_config.max_message_size = Some(WS_MAX_MESSAGE_SIZE);
        ws_config.max_frame_size = Some(WS_MAX_MESSAGE_SIZE);
        let (ws_stream, _) =
            tokio_tungstenite::connect_async_with_config(endpoint, Some(ws_config), false).await?;
        let (write, read) = ws_stream.split();

        let (write_tx, write_rx) = mpsc::channel::<tungstenite::Message>(256);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let on_disconnect: DisconnectCallback = Arc::new(Mutex::new(None));
        let cancel = tokio_util::sync::CancellationToken::new();

        let write_handle = {
            let cancel = cancel.clone();
            tokio::spawn(crate::pumps::write::write_pump(write, write_rx, cancel))
        };

        let read_handle = {
            let pending = pending.clone();
            let on_disconnect = on_disconnect.clone();
            let cancel = cancel.clone();
            let write_tx = write_tx.clone();
            tokio::spawn(crate::pumps::read::read_pump(
                read,
                pending,
                on_disconnect,
                write_tx,
                cancel,
            ))
        };

        let ping_handle = {
            let write_tx = write_tx.clone();
            let cancel = cancel.clone();
            tokio::spawn(crate::pumps::ping::ping_pump(write_tx, cancel))
        };

        Ok(Self {
            endpoint: endpoint.to_string(),
            next_id: AtomicU64::new(1),
            write_tx,
            pending,
            on_disconnect,
            _read_handle: read_handle,
            _write_handle: write_handle,
            _ping_handle: ping_handle,
            cancel,
        })
    }

    /// Endpoint this client is connected to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sends a request and waits for the raw response message.
    pub async fn send_request<P: Serialize>(
        &self,
        method: &str,
        params: &P,
    ) -> Result<Message, WsError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let msg = Message::request(id, method, params)?;
        let json = serde_json::to_string(&msg)?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        trace!(id, method, "sending request");
        self.write_tx
            .send(tungstenite::Message::Text(json.into()))
            .await
            .map_err(|_| WsError::Closed)?;

        let result = tokio::time::timeout(WS_REQUEST_TIMEOUT, rx).await;

        // Clean up pending entry on any exit path.
        self.pending.lock().await.remove(&id);

        match result {
            Ok(Ok(resp)) => {
                if let Some(err) = &resp.error {
                    return Err(WsError::Rpc {
                        code: err.code,
                        message: err.message.clone(),
                    });
                }
                Ok(resp)
            }
            Ok(Err(_)) => Err(WsError::Closed),
            Err(_) => Err(WsError::Timeout),
        }
    }

    /// Sends a request and deserializes its result.
    ///
    /// A `null` result is an error here; use [`send_request`](Self::send_request)
    /// when `null` is a meaningful answer.
    pub async fn call<P: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        params: &P,
    ) -> Result<T, WsError> {
        let resp = self.send_request(method, params).await?;
        resp.parse_result::<T>()?
            .ok_or_else(|| WsError::EmptyResult(method.to_string()))
    }

    /// Sets the callback for disconnection.
    pub async fn set_disconnect_callback(&self, cb: Box<dyn Fn() + Send + Sync>) {
        *self.on_disconnect.lock().await = Some(cb);
    }

    /// Gracefully closes the connection.
    pub async fn close(&self) {
        self.cancel.cancel();
        let _ = self.write_tx.send(tungstenite::Message::Close(None)).await;
    }
}

impl Drop for WsClient {
    fn drop(&mut self) {
        self.cancel.cancel();
        self._read_handle.abort();
        self._write_handle.abort();
        self._ping_handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detached_client() -> (WsClient, mpsc::Receiver<tungstenite::Message>) {
        let (write_tx, write_rx) = mpsc::channel::<tungstenite::Message>(16);
        let client = WsClient {
            endpoint: "ws://test".into(),
            next_id: AtomicU64::new(1),
            write_tx,
            pending: Arc::new(Mutex::new(HashMap::new())),
            on_disconnect: Arc::new(Mutex::new(None)),
            _read_handle: tokio::spawn(async {}),
            _write_handle: tokio::spawn(async {}),
            _ping_handle: tokio::spawn(async {}),
            cancel: tokio_util::sync::CancellationToken::new(),
        };
        (client, write_rx)
    }

    #[test]
    fn ws_error_display() {
        assert_eq!(WsError::Timeout.to_string(), "request timed out");
        assert_eq!(WsError::Closed.to_string(), "connection closed");

        let err = WsError::Rpc {
            code: -32601,
            message: "Method not found".into(),
        };
        assert!(err.to_string().contains("-32601"));
        assert_eq!(
            WsError::EmptyResult("system_chain".into()).to_string(),
            "empty result for system_chain"
        );
    }

    #[tokio::test]
    async fn request_frame_and_response_routing() {
        let (client, mut write_rx) = detached_client();
        let client = Arc::new(client);
        let pending = client.pending.clone();

        let c = client.clone();
        let call = tokio::spawn(async move {
            c.call::<_, String>("system_chain", &serde_json::json!([])).await
        });

        let frame = match write_rx.recv().await.unwrap() {
            tungstenite::Message::Text(t) => t.to_string(),
            other => panic!("expected text frame, got {other:?}"),
        };
        let req: Message = serde_json::from_str(&frame).unwrap();
        assert_eq!(req.method.as_deref(), Some("system_chain"));
        let id = req.id.unwrap();

        let reply = Message::response(id, &"Development").unwrap();
        let tx = pending.lock().await.remove(&id).unwrap();
        tx.send(reply).unwrap();

        assert_eq!(call.await.unwrap().unwrap(), "Development");
    }

    #[tokio::test]
    async fn request_ids_increase() {
        let (client, mut write_rx) = detached_client();
        let client = Arc::new(client);

        for _ in 0..2 {
            let c = client.clone();
            tokio::spawn(async move {
                let _ = c.send_request("system_name", &serde_json::json!([])).await;
            });
        }

        let mut ids = Vec::new();
        for _ in 0..2 {
            if let tungstenite::Message::Text(t) = write_rx.recv().await.unwrap() {
                let msg: Message = serde_json::from_str(&t).unwrap();
                ids.push(msg.id.unwrap());
            }
        }
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn rpc_error_maps_to_ws_error() {
        let (client, mut write_rx) = detached_client();
        let client = Arc::new(client);
        let pending = client.pending.clone();

        let c = client.clone();
        let call = tokio::spawn(async move {
            c.send_request("system_chainType", &serde_json::json!([])).await
        });

        let _ = write_rx.recv().await.unwrap();
        let tx = pending.lock().await.remove(&1).unwrap();
        tx.send(Message::error(1, -32601, "Method not found")).unwrap();

        match call.await.unwrap() {
            Err(WsError::Rpc { code, .. }) => assert_eq!(code, -32601),
            other => panic!("expected rpc error, got {other:?}"),
        }
    }
}
