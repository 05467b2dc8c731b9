use dualnode_node_api::ApiError;

use crate::keyring::KeyStoreError;

/// Errors that abort a chain bootstrap.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("key store: {0}")]
    KeyStore(#[from] KeyStoreError),

    #[error("runtime declares no callable extrinsics")]
    NoCallableExtrinsics,
}
