use std::time::Duration;

/// JSON-RPC protocol version carried by every message.
pub const JSONRPC_VERSION: &str = "2.0";

/// Time to wait for a pong response (or any incoming message).
///
/// Acts as a read deadline: if nothing arrives within this window the
/// connection is considered dead and the provider reconnects.
pub const WS_PONG_WAIT: Duration = Duration::from_secs(60);

/// How often to send keepalive pings (must be < [`WS_PONG_WAIT`]).
pub const WS_PING_PERIOD: Duration = Duration::from_secs(20);

/// Maximum message size in bytes (runtime metadata can exceed 1 MB).
pub const WS_MAX_MESSAGE_SIZE: usize = 32 * 1024 * 1024;

/// Timeout for a single request/response round trip.
pub const WS_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Node RPC method names used by the API session and the bootstrapper.
pub mod methods {
    pub const CHAIN_GET_BLOCK_HASH: &str = "chain_getBlockHash";
    pub const RPC_METHODS: &str = "rpc_methods";
    pub const STATE_GET_METADATA: &str = "state_getMetadata";
    pub const STATE_GET_RUNTIME_VERSION: &str = "state_getRuntimeVersion";
    pub const SYSTEM_CHAIN: &str = "system_chain";
    /// Not exposed by every node; check `rpc_methods` first.
    pub const SYSTEM_CHAIN_TYPE: &str = "system_chainType";
    pub const SYSTEM_NAME: &str = "system_name";
    pub const SYSTEM_PROPERTIES: &str = "system_properties";
    pub const SYSTEM_VERSION: &str = "system_version";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_period_below_pong_wait() {
        assert!(WS_PING_PERIOD < WS_PONG_WAIT);
    }

    #[test]
    fn method_names_are_namespaced() {
        for method in [
            methods::CHAIN_GET_BLOCK_HASH,
            methods::STATE_GET_METADATA,
            methods::SYSTEM_CHAIN_TYPE,
            methods::SYSTEM_PROPERTIES,
        ] {
            assert!(method.contains('_'), "{method} has no section prefix");
        }
    }
}
