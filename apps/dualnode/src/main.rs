//! Connects to the configured chains and logs readiness until Ctrl-C.

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dualnode_api_context::{
    CoordinatorOptions, DualChainCoordinator, MemoryKeyStore, ReadinessSnapshot, TypeStore,
    default_types_path,
};
use dualnode_node_api::{QueuedPayload, TxStatusUpdate};
use dualnode_settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,dualnode=debug")),
        )
        .init();

    let settings = Settings::load().unwrap_or_else(|e| {
        warn!("failed to load settings, using defaults: {e}");
        Settings::default()
    });

    let mut options = CoordinatorOptions::new(
        Arc::new(MemoryKeyStore::new()),
        Arc::new(reject_payload),
        Arc::new(|update: TxStatusUpdate| {
            info!(id = %update.id, status = %update.status, "tx status");
        }),
    );
    options.type_store = open_type_store(&settings).map(Arc::new);

    let coordinator = DualChainCoordinator::new(options);
    let mut readiness = coordinator.readiness().subscribe();
    coordinator.init_primary(&settings).await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = readiness.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = readiness.borrow_and_update().clone();
                log_snapshot(&snapshot);
            }
        }
    }

    info!("shutting down");
    coordinator.shutdown().await;
    Ok(())
}

/// No signing UI here: every payload is rejected.
fn reject_payload(queued: QueuedPayload) {
    warn!(id = %queued.id, "rejecting signing request, no approval UI");
    let _ = queued.responder.send(Err("no approval UI".into()));
}

fn open_type_store(settings: &Settings) -> Option<TypeStore> {
    let path = settings.types_path.clone().or_else(default_types_path)?;
    match TypeStore::new(path) {
        Ok(store) => Some(store),
        Err(e) => {
            warn!("ignoring type store: {e}");
            None
        }
    }
}

fn log_snapshot(snapshot: &ReadinessSnapshot) {
    info!(
        connected = snapshot.is_api_connected,
        ready = snapshot.is_api_ready,
        secondary_ready = snapshot.is_secondary_ready,
        dev = snapshot.is_development,
        eth = snapshot.is_ethereum,
        injected = snapshot.injected_accounts.len(),
        waiting_injected = snapshot.is_waiting_injected,
        "readiness changed"
    );
    if let Some(error) = &snapshot.api_error {
        warn!("api error: {error}");
    }
    if let Some(meta) = &snapshot.metadata {
        info!(
            chain = %meta.system_chain,
            spec = %meta.spec_name,
            version = meta.spec_version,
            ss58 = meta.ss58_format,
            default_tx = %meta.default_tx,
            "chain metadata"
        );
    }
}
