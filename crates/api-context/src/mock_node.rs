//! In-process JSON-RPC node for session and coordinator tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use dualnode_protocol::constants::methods;
use dualnode_protocol::{ChainType, RuntimeMetadata};

use crate::bootstrap::tests::metadata;

/// What the mock node answers.
#[derive(Clone)]
pub(crate) struct NodeConfig {
    pub(crate) chain: String,
    pub(crate) genesis_hash: String,
    pub(crate) spec_name: String,
    pub(crate) properties: Value,
    /// `system_chainType` is only exposed when set.
    pub(crate) chain_type: Option<ChainType>,
    pub(crate) metadata: RuntimeMetadata,
    /// Method answered with an RPC error.
    pub(crate) fail_method: Option<String>,
    /// Method answered only after the given delay.
    pub(crate) slow_method: Option<(String, Duration)>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            chain: "Mock Chain".into(),
            genesis_hash: "0xgenesis".into(),
            spec_name: "node".into(),
            properties: json!({}),
            chain_type: None,
            metadata: metadata(None, true),
            fail_method: None,
            slow_method: None,
        }
    }
}

struct NodeState {
    config: NodeConfig,
    connections: AtomicUsize,
    requests: Mutex<Vec<String>>,
    /// Cancelled to drop every open connection.
    sessions: Mutex<CancellationToken>,
}

pub(crate) struct MockNode {
    addr: SocketAddr,
    state: Arc<NodeState>,
    cancel: CancellationToken,
}

impl MockNode {
    pub(crate) async fn start(config: NodeConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(NodeState {
            config,
            connections: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            sessions: Mutex::new(CancellationToken::new()),
        });
        let cancel = CancellationToken::new();

        let accept_state = state.clone();
        let accept_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                let stream = tokio::select! {
                    _ = accept_cancel.cancelled() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, _)) => stream,
                        Err(_) => continue,
                    },
                };
                let session = accept_state.sessions.lock().unwrap().clone();
                tokio::spawn(serve(stream, accept_state.clone(), session));
            }
        });

        Self {
            addr,
            state,
            cancel,
        }
    }

    pub(crate) fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Number of WebSocket connections accepted so far.
    pub(crate) fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// Number of requests received for `method`.
    pub(crate) fn request_count(&self, method: &str) -> usize {
        self.state
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|m| *m == method)
            .count()
    }

    /// Closes every open connection. New connections are still accepted.
    pub(crate) fn drop_connections(&self) {
        let mut sessions = self.state.sessions.lock().unwrap();
        sessions.cancel();
        *sessions = CancellationToken::new();
    }
}

impl Drop for MockNode {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.state.sessions.lock().unwrap().cancel();
    }
}

async fn serve(stream: TcpStream, state: Arc<NodeState>, session: CancellationToken) {
    let Ok(mut ws) = accept_async(stream).await else {
        return;
    };
    state.connections.fetch_add(1, Ordering::SeqCst);

    loop {
        let msg = tokio::select! {
            _ = session.cancelled() => {
                let _ = ws.close(None).await;
                break;
            }
            msg = ws.next() => match msg {
                Some(Ok(msg)) => msg,
                _ => break,
            },
        };
        let Message::Text(text) = msg else {
            continue;
        };
        let Ok(request) = serde_json::from_str::<Value>(text.as_str()) else {
            continue;
        };
        let method = request["method"].as_str().unwrap_or_default().to_string();
        state.requests.lock().unwrap().push(method.clone());
        if let Some((slow, delay)) = &state.config.slow_method
            && *slow == method
        {
            tokio::time::sleep(*delay).await;
        }

        let mut response = json!({"jsonrpc": "2.0", "id": request["id"]});
        match answer(&state.config, &method) {
            Ok(result) => response["result"] = result,
            Err((code, message)) => {
                response["error"] = json!({"code": code, "message": message});
            }
        }
        if ws
            .send(Message::Text(response.to_string().into()))
            .await
            .is_err()
        {
            break;
        }
    }
}

fn answer(config: &NodeConfig, method: &str) -> Result<Value, (i64, String)> {
    if config.fail_method.as_deref() == Some(method) {
        return Err((-32000, format!("{method} failed")));
    }
    let result = match method {
        methods::CHAIN_GET_BLOCK_HASH => json!(config.genesis_hash),
        methods::STATE_GET_RUNTIME_VERSION => json!({
            "specName": config.spec_name,
            "implName": "mock",
            "specVersion": 1,
            "transactionVersion": 1,
        }),
        methods::STATE_GET_METADATA => {
            let bytes = serde_json::to_vec(&config.metadata).unwrap();
            json!(format!("0x{}", hex::encode(bytes)))
        }
        methods::RPC_METHODS => {
            let mut exposed = vec![
                methods::SYSTEM_CHAIN,
                methods::SYSTEM_NAME,
                methods::SYSTEM_PROPERTIES,
                methods::SYSTEM_VERSION,
            ];
            if config.chain_type.is_some() {
                exposed.push(methods::SYSTEM_CHAIN_TYPE);
            }
            json!({"version": 1, "methods": exposed})
        }
        methods::SYSTEM_PROPERTIES => config.properties.clone(),
        methods::SYSTEM_CHAIN => json!(config.chain),
        methods::SYSTEM_CHAIN_TYPE => match &config.chain_type {
            Some(chain_type) => json!(chain_type),
            None => return Err((-32601, "Method not found".into())),
        },
        methods::SYSTEM_NAME => json!("mock-node"),
        methods::SYSTEM_VERSION => json!("1.0.0"),
        _ => return Err((-32601, "Method not found".into())),
    };
    Ok(result)
}
