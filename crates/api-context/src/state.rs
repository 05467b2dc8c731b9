//! Per-endpoint connection state machine.

use std::ops::Deref;
use std::sync::Arc;

use dualnode_node_api::{Api, ApiEvent};

/// Lifecycle of one chain connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No endpoint configured, or not started yet.
    #[default]
    Idle,
    /// Session created, waiting for the socket.
    Connecting,
    /// Socket open, runtime info loading.
    Connected,
    /// Runtime info loaded for the current connection.
    Ready,
    /// Socket dropped. The provider may reconnect.
    Disconnected,
    /// Connect, load or bootstrap failure.
    Errored,
}

impl ConnectionState {
    /// Returns the state reached by applying `event`, or `None` when the
    /// event is redundant or invalid in the current state.
    ///
    /// | from \ event      | Connected | Ready | Disconnected | Error   |
    /// |-------------------|-----------|-------|--------------|---------|
    /// | Idle              | Connected | -     | -            | Errored |
    /// | Connecting        | Connected | -     | Disconnected | Errored |
    /// | Connected         | -         | Ready | Disconnected | Errored |
    /// | Ready             | Connected | -     | Disconnected | Errored |
    /// | Disconnected      | Connected | -     | -            | Errored |
    /// | Errored           | Connected | -     | Disconnected | Errored |
    pub fn next(self, event: &ApiEvent) -> Option<ConnectionState> {
        use ConnectionState::*;
        match (self, event) {
            (Connected, ApiEvent::Connected) => None,
            (_, ApiEvent::Connected) => Some(Connected),

            (Connected, ApiEvent::Ready) => Some(Ready),
            (_, ApiEvent::Ready) => None,

            (Idle | Disconnected, ApiEvent::Disconnected) => None,
            (_, ApiEvent::Disconnected) => Some(Disconnected),

            (_, ApiEvent::Error(_)) => Some(Errored),
        }
    }
}

/// Shared session handle compared by identity.
///
/// Two snapshots holding the same session compare equal; a replaced session
/// never does, even if it points at the same endpoint.
#[derive(Clone)]
pub struct SessionRef(pub Arc<Api>);

impl PartialEq for SessionRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for SessionRef {
    type Target = Api;

    fn deref(&self) -> &Api {
        &self.0
    }
}

impl std::fmt::Debug for SessionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One chain connection as seen by consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionHandle {
    pub endpoint: String,
    pub state: ConnectionState,
    pub is_connected: bool,
    pub is_initialized: bool,
    /// Set by the coordinator: after bootstrap for the primary chain, on
    /// `Ready` for the secondary.
    pub is_ready: bool,
    /// Last error seen on this connection.
    pub error: Option<String>,
    /// Session behind this handle. Compared by identity.
    pub api: Option<SessionRef>,
}

impl ConnectionHandle {
    /// Handle for a freshly created session: initialized and connecting.
    pub fn new(endpoint: impl Into<String>, api: Arc<Api>) -> Self {
        Self {
            endpoint: endpoint.into(),
            state: ConnectionState::Connecting,
            is_connected: false,
            is_initialized: true,
            is_ready: false,
            error: None,
            api: Some(SessionRef(api)),
        }
    }

    /// Applies a session event. Returns the new state, or `None` if the
    /// event was ignored.
    pub fn apply(&mut self, event: &ApiEvent) -> Option<ConnectionState> {
        let next = self.state.next(event)?;
        self.state = next;
        match event {
            ApiEvent::Connected => self.is_connected = true,
            ApiEvent::Disconnected => {
                self.is_connected = false;
                self.is_ready = false;
            }
            ApiEvent::Error(msg) => self.error = Some(msg.clone()),
            ApiEvent::Ready => {}
        }
        Some(next)
    }

    /// Records a failure that did not come from the session itself.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.state = ConnectionState::Errored;
        self.is_ready = false;
        self.error = Some(error.into());
    }
}
