//! Wire protocol and data types shared by the dualnode crates.
//!
//! The node speaks JSON-RPC 2.0 over a WebSocket. This crate holds the
//! message envelope, the method names and timeouts, and the typed results
//! of the queries issued while bootstrapping a chain.

pub mod constants;
pub mod definitions;
pub mod envelope;
pub mod metadata;
pub mod node;

// Re-export primary types for convenience.
pub use definitions::{RpcDefinition, RpcDefinitions, RpcParam, custom_rpc_definitions};
pub use envelope::{Message, RpcError};
pub use metadata::{CallRef, ConstantMetadata, PalletMetadata, RuntimeMetadata};
pub use node::{ChainProperties, ChainType, RpcMethods, RuntimeVersion, TypeOverrides};
