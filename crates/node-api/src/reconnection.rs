//! Provider connect/reconnect logic with exponential backoff.
//!
//! Contains the shared [`ProviderContext`], cancellation helpers, WebSocket
//! callback setup, and the connect loop.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::types::{ProviderEvent, ReconnectConfig};
use crate::ws_client::WsClient;

/// Shared state handed to the disconnect callback and the connect loop.
#[derive(Clone)]
pub(crate) struct ProviderContext {
    pub(crate) endpoint: String,
    pub(crate) client: Arc<Mutex<Option<Arc<WsClient>>>>,
    pub(crate) events_tx: mpsc::Sender<ProviderEvent>,
    pub(crate) connected: Arc<AtomicBool>,
    pub(crate) manual_disconnect: Arc<AtomicBool>,
    pub(crate) reconnect_cancel: Arc<std::sync::Mutex<Option<CancellationToken>>>,
    pub(crate) config: ReconnectConfig,
}

impl ProviderContext {
    pub(crate) fn new(
        endpoint: String,
        events_tx: mpsc::Sender<ProviderEvent>,
        config: ReconnectConfig,
    ) -> Self {
        Self {
            endpoint,
            client: Arc::new(Mutex::new(None)),
            events_tx,
            connected: Arc::new(AtomicBool::new(false)),
            manual_disconnect: Arc::new(AtomicBool::new(false)),
            reconnect_cancel: Arc::new(std::sync::Mutex::new(None)),
            config,
        }
    }
}

/// Cancels the active connect loop, if any.
pub(crate) fn cancel_any_reconnect(
    reconnect_cancel: &std::sync::Mutex<Option<CancellationToken>>,
) {
    if let Ok(mut guard) = reconnect_cancel.lock()
        && let Some(token) = guard.take()
    {
        token.cancel();
    }
}

/// Starts a connect loop, replacing any loop already running.
pub(crate) fn spawn_connect_loop(ctx: ProviderContext, first_attempt: u32) {
    let cancel = CancellationToken::new();
    cancel_any_reconnect(&ctx.reconnect_cancel);
    if let Ok(mut guard) = ctx.reconnect_cancel.lock() {
        *guard = Some(cancel.clone());
    }
    tokio::spawn(connect_loop(ctx, cancel, first_attempt));
}

/// Installs the disconnect callback that drives reconnection on `client`.
pub(crate) async fn setup_ws_callbacks(client: &WsClient, ctx: ProviderContext) {
    client
        .set_disconnect_callback(Box::new(move || {
            ctx.connected.store(false, Ordering::Relaxed);
            let _ = ctx.events_tx.try_send(ProviderEvent::Disconnected);

            let ctx = ctx.clone();
            tokio::spawn(async move {
                ctx.client.lock().await.take();

                if ctx.manual_disconnect.load(Ordering::Relaxed) {
                    debug!(endpoint = %ctx.endpoint, "manual disconnect, not reconnecting");
                    return;
                }
                spawn_connect_loop(ctx, 1);
            });
        }))
        .await;
}

/// Connects to the endpoint, retrying with backoff until it succeeds or
/// `cancel` fires.
///
/// Attempt 0 connects immediately; later attempts wait
/// [`ReconnectConfig::delay_for_attempt`]. Returns a boxed future to break
/// the recursive type cycle with [`setup_ws_callbacks`].
pub(crate) fn connect_loop(
    ctx: ProviderContext,
    cancel: CancellationToken,
    first_attempt: u32,
) -> Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
    Box::pin(async move {
        let mut attempt = first_attempt;

        loop {
            if attempt > 0 {
                let delay = ctx.config.delay_for_attempt(attempt);
                info!(
                    endpoint = %ctx.endpoint,
                    attempt,
                    delay_secs = format_args!("{:.1}", delay.as_secs_f64()),
                    "reconnecting"
                );

                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!(endpoint = %ctx.endpoint, "reconnect cancelled");
                        return;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            if cancel.is_cancelled() {
                return;
            }

            match WsClient::connect(&ctx.endpoint).await {
                Ok(client) => {
                    if cancel.is_cancelled() {
                        client.close().await;
                        return;
                    }

                    setup_ws_callbacks(&client, ctx.clone()).await;
                    *ctx.client.lock().await = Some(Arc::new(client));
                    ctx.connected.store(true, Ordering::Relaxed);
                    let _ = ctx.events_tx.send(ProviderEvent::Connected).await;

                    info!(endpoint = %ctx.endpoint, attempt, "connected");
                    return;
                }
                Err(e) => {
                    warn!(
                        endpoint = %ctx.endpoint,
                        attempt,
                        error = %e,
                        "connect attempt failed"
                    );
                    let _ = ctx.events_tx.send(ProviderEvent::Error(e.to_string())).await;
                }
            }

            attempt = attempt.saturating_add(1);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn cancel_any_reconnect_clears_token() {
        let cancel = Arc::new(std::sync::Mutex::new(None));
        let token = CancellationToken::new();
        *cancel.lock().unwrap() = Some(token.clone());

        cancel_any_reconnect(&cancel);

        assert!(cancel.lock().unwrap().is_none());
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn connect_loop_reports_errors_and_stops_on_cancel() {
        let (events_tx, mut events_rx) = mpsc::channel(16);
        let config = ReconnectConfig {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
            backoff_factor: 1.0,
        };
        // Port 9 (discard) on loopback refuses connections.
        let ctx = ProviderContext::new("ws://127.0.0.1:9".into(), events_tx, config);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(connect_loop(ctx, cancel.clone(), 0));

        let first = tokio::time::timeout(Duration::from_secs(5), events_rx.recv())
            .await
            .expect("event")
            .expect("channel open");
        assert!(matches!(first, ProviderEvent::Error(_)));

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop should stop")
            .expect("no panic");
    }
}
