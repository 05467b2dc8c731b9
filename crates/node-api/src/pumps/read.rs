//! WebSocket read pump: routes responses to their pending requests.

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use dualnode_protocol::constants::{WS_MAX_MESSAGE_SIZE, WS_PONG_WAIT};
use dualnode_protocol::envelope::Message;

use crate::ws_client::{DisconnectCallback, PendingMap};

/// Reads messages from the WebSocket and dispatches them.
///
/// Any incoming frame resets the read deadline. If nothing arrives within
/// [`WS_PONG_WAIT`] the connection is considered dead and the loop exits,
/// firing the disconnect callback.
pub(crate) async fn read_pump<S>(
    mut read: S,
    pending: PendingMap,
    on_disconnect: DisconnectCallback,
    write_tx: mpsc::Sender<tungstenite::Message>,
    cancel: CancellationToken,
) where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    let pong_deadline = tokio::time::sleep(WS_PONG_WAIT);
    tokio::pin!(pong_deadline);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            () = &mut pong_deadline => {
                warn!("read deadline exceeded, closing connection");
                break;
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(msg)) => {
                        pong_deadline.as_mut().reset(tokio::time::Instant::now() + WS_PONG_WAIT);

                        match msg {
                            tungstenite::Message::Text(text) => {
                                handle_text_message(&text, &pending).await;
                            }
                            tungstenite::Message::Ping(data) => {
                                trace!("received ping, sending pong");
                                let _ = write_tx.send(tungstenite::Message::Pong(data)).await;
                            }
                            tungstenite::Message::Pong(_) => {
                                trace!("received pong");
                            }
                            tungstenite::Message::Close(frame) => {
                                debug!(?frame, "received close frame");
                                break;
                            }
                            _ => {}
                        }
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket read error: {e}");
                        break;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    // Fail every in-flight request instead of letting it hit the timeout.
    pending.lock().await.clear();

    if let Some(cb) = on_disconnect.lock().await.as_ref() {
        cb();
    }
}

/// Handles a text frame from the node.
async fn handle_text_message(text: &str, pending: &PendingMap) {
    if text.len() > WS_MAX_MESSAGE_SIZE {
        warn!("message too large ({} bytes), dropping", text.len());
        return;
    }

    let msg: Message = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            warn!("failed to parse message: {e}");
            return;
        }
    };

    let Some(id) = msg.id else {
        // No subscriptions are made, so id-less frames are unsolicited.
        if msg.is_notification() {
            debug!(method = ?msg.method, "unsolicited notification, dropping");
        } else {
            warn!("frame without id or method, dropping");
        }
        return;
    };

    trace!(id, "received response");
    let mut map = pending.lock().await;
    if let Some(tx) = map.remove(&id) {
        let _ = tx.send(msg);
    } else {
        debug!(id, "response for unknown request, dropping");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::{Mutex, oneshot};
    use futures_util::stream;

    fn empty_pending() -> PendingMap {
        Arc::new(Mutex::new(HashMap::new()))
    }

    fn disconnect_flag() -> (Arc<std::sync::Mutex<bool>>, DisconnectCallback) {
        let disconnected = Arc::new(std::sync::Mutex::new(false));
        let dc = disconnected.clone();
        let cb: DisconnectCallback = Arc::new(Mutex::new(Some(Box::new(move || {
            *dc.lock().unwrap() = true;
        }))));
        (disconnected, cb)
    }

    #[tokio::test]
    async fn handle_text_routes_response_to_pending() {
        let pending = empty_pending();

        let (tx, rx) = oneshot::channel();
        pending.lock().await.insert(5, tx);

        let msg = Message::response(5, &"0xabc").unwrap();
        let json = serde_json::to_string(&msg).unwrap();

        handle_text_message(&json, &pending).await;

        let resp = rx.await.unwrap();
        assert_eq!(resp.id, Some(5));
        assert_eq!(resp.parse_result::<String>().unwrap().unwrap(), "0xabc");
        assert!(pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn handle_text_drops_frames_without_id() {
        let pending = empty_pending();
        let (tx, mut rx) = oneshot::channel();
        pending.lock().await.insert(1, tx);

        let json = r#"{"jsonrpc":"2.0","method":"chain_newHead","params":{"subscription":"s1","result":{}}}"#;
        handle_text_message(json, &pending).await;

        assert_eq!(pending.lock().await.len(), 1, "pending request untouched");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn handle_text_ignores_malformed_json() {
        let pending = empty_pending();
        handle_text_message("not valid json {{{", &pending).await;
        assert!(pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn read_pump_fires_disconnect_on_stream_end() {
        let (disconnected, on_disconnect) = disconnect_flag();
        let pending = empty_pending();
        let (tx, rx) = oneshot::channel();
        pending.lock().await.insert(1, tx);

        let (write_tx, _write_rx) = mpsc::channel(16);
        let empty = stream::empty::<Result<tungstenite::Message, tungstenite::Error>>();

        read_pump(
            empty,
            pending,
            on_disconnect,
            write_tx,
            CancellationToken::new(),
        )
        .await;

        assert!(*disconnected.lock().unwrap());
        // In-flight request observes the closed channel.
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn read_pump_answers_ping() {
        let (_disconnected, on_disconnect) = disconnect_flag();
        let (write_tx, mut write_rx) = mpsc::channel(16);
        let frames = stream::iter(vec![Ok::<_, tungstenite::Error>(
            tungstenite::Message::Ping(vec![1, 2].into()),
        )]);

        read_pump(
            frames,
            empty_pending(),
            on_disconnect,
            write_tx,
            CancellationToken::new(),
        )
        .await;

        assert!(matches!(
            write_rx.recv().await,
            Some(tungstenite::Message::Pong(_))
        ));
    }

    #[tokio::test]
    async fn read_pump_timeout_on_silence() {
        tokio::time::pause();

        let (disconnected, on_disconnect) = disconnect_flag();
        let (write_tx, _write_rx) = mpsc::channel(16);
        let silent = stream::pending::<Result<tungstenite::Message, tungstenite::Error>>();

        read_pump(
            silent,
            empty_pending(),
            on_disconnect,
            write_tx,
            CancellationToken::new(),
        )
        .await;

        assert!(
            *disconnected.lock().unwrap(),
            "should disconnect on read deadline"
        );
    }
}
