//! Injected (wallet extension) account discovery.
//!
//! Extension enablement starts once at init and is shared: the bootstrapper
//! and the readiness context both await the same future.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Source id of the reference browser extension.
pub const DEFAULT_EXTENSION_SOURCE: &str = "polkadot-js";

/// Errors reported by an extension.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtensionError {
    #[error("extension enable rejected: {0}")]
    Rejected(String),

    #[error("extension account query failed: {0}")]
    Accounts(String),
}

/// Boxed future returned by extension calls.
pub type ExtensionFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, ExtensionError>> + Send + 'a>>;

/// An account as reported by an extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionAccount {
    pub address: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// An enabled signer extension.
pub trait InjectedExtension: Send + Sync {
    /// Extension name, also the account source.
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// Accounts this extension exposes to the origin.
    fn accounts(&self) -> ExtensionFuture<'_, Vec<ExtensionAccount>>;
}

/// Enables every available extension for an origin.
pub trait ExtensionEnabler: Send + Sync {
    /// Asks the user to authorize `origin`. Rejection is an error.
    fn enable(&self, origin: &str) -> ExtensionFuture<'_, Vec<Arc<dyn InjectedExtension>>>;
}

/// Name and version of an enabled extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Key-store metadata of an [`InjectedAccount`].
pub struct InjectedAccountMeta {
    /// Display name, `"<name> (<source label>)"`.
    pub name: String,
    /// Name of the extension that reported the account.
    pub source: String,
    /// Position in the discovery order.
    pub when_created: u64,
}

/// An externally managed account, annotated for the key store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectedAccount {
    pub address: String,
    pub meta: InjectedAccountMeta,
}

/// Shared, pending result of extension enablement.
pub type EnableFuture =
    Shared<BoxFuture<'static, Result<Vec<Arc<dyn InjectedExtension>>, ExtensionError>>>;

/// Starts enabling extensions. Without an enabler there are none.
pub fn start_enable(enabler: Option<Arc<dyn ExtensionEnabler>>, origin: String) -> EnableFuture {
    async move {
        match enabler {
            Some(enabler) => enabler.enable(&origin).await,
            None => Ok(Vec::new()),
        }
    }
    .boxed()
    .shared()
}

/// Name and version of every enabled extension.
pub async fn extension_infos(enable: EnableFuture) -> Result<Vec<ExtensionInfo>, ExtensionError> {
    let extensions = enable.await?;
    Ok(extensions
        .iter()
        .map(|e| ExtensionInfo {
            name: e.name().to_string(),
            version: e.version().to_string(),
        })
        .collect())
}

/// Collects the accounts of every enabled extension, in enumeration order.
///
/// Never fails: any error is logged and yields an empty list.
pub async fn web3_accounts(enable: EnableFuture) -> Vec<InjectedAccount> {
    match collect_accounts(enable).await {
        Ok(raw) => {
            let accounts = annotate(raw);
            debug!(count = accounts.len(), "injected accounts resolved");
            accounts
        }
        Err(e) => {
            warn!(error = %e, "web3 accounts unavailable");
            Vec::new()
        }
    }
}

async fn collect_accounts(
    enable: EnableFuture,
) -> Result<Vec<(ExtensionAccount, String)>, ExtensionError> {
    let extensions = enable.await?;
    let mut all = Vec::new();
    for extension in &extensions {
        let source = extension.name().to_string();
        for account in extension.accounts().await? {
            all.push((account, source.clone()));
        }
    }
    Ok(all)
}

/// Label shown for an account source.
pub fn source_label(source: &str) -> &str {
    if source == DEFAULT_EXTENSION_SOURCE {
        "extension"
    } else {
        source
    }
}

fn annotate(raw: Vec<(ExtensionAccount, String)>) -> Vec<InjectedAccount> {
    raw.into_iter()
        .enumerate()
        .map(|(index, (account, source))| {
            let name = account
                .name
                .as_deref()
                .filter(|n| !n.is_empty())
                .unwrap_or("unknown");
            InjectedAccount {
                address: account.address,
                meta: InjectedAccountMeta {
                    name: format!("{name} ({})", source_label(&source)),
                    source,
                    when_created: index as u64,
                },
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Extension returning fixed accounts, or failing.
    pub(crate) struct MockExtension {
        pub(crate) name: String,
        pub(crate) accounts: Result<Vec<ExtensionAccount>, ExtensionError>,
    }

    impl InjectedExtension for MockExtension {
        fn name(&self) -> &str {
            &self.name
        }

        fn version(&self) -> &str {
            "0.1.0"
        }

        fn accounts(&self) -> ExtensionFuture<'_, Vec<ExtensionAccount>> {
            let accounts = self.accounts.clone();
            Box::pin(async move { accounts })
        }
    }

    pub(crate) struct MockEnabler {
        pub(crate) result: Result<Vec<Arc<dyn InjectedExtension>>, ExtensionError>,
    }

    impl ExtensionEnabler for MockEnabler {
        fn enable(&self, _origin: &str) -> ExtensionFuture<'_, Vec<Arc<dyn InjectedExtension>>> {
            let result = self.result.clone();
            Box::pin(async move { result })
        }
    }

    pub(crate) fn account(address: &str, name: &str) -> ExtensionAccount {
        ExtensionAccount {
            address: address.into(),
            name: Some(name.into()),
        }
    }

    pub(crate) fn two_extensions() -> Arc<dyn ExtensionEnabler> {
        Arc::new(MockEnabler {
            result: Ok(vec![
                Arc::new(MockExtension {
                    name: "polkadot-js".into(),
                    accounts: Ok(vec![account("A1", "Alice")]),
                }),
                Arc::new(MockExtension {
                    name: "other-ext".into(),
                    accounts: Ok(vec![account("A2", "")]),
                }),
            ]),
        })
    }

    #[tokio::test]
    async fn accounts_are_annotated_in_order() {
        let enable = start_enable(Some(two_extensions()), "test".into());
        let accounts = web3_accounts(enable).await;

        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].address, "A1");
        assert_eq!(accounts[0].meta.name, "Alice (extension)");
        assert_eq!(accounts[0].meta.source, "polkadot-js");
        assert_eq!(accounts[0].meta.when_created, 0);
        assert_eq!(accounts[1].address, "A2");
        assert_eq!(accounts[1].meta.name, "unknown (other-ext)");
        assert_eq!(accounts[1].meta.when_created, 1);
    }

    #[tokio::test]
    async fn enable_rejection_yields_empty() {
        let enabler: Arc<dyn ExtensionEnabler> = Arc::new(MockEnabler {
            result: Err(ExtensionError::Rejected("denied".into())),
        });
        let enable = start_enable(Some(enabler), "test".into());
        assert!(web3_accounts(enable.clone()).await.is_empty());
        assert!(extension_infos(enable).await.is_err());
    }

    #[tokio::test]
    async fn account_query_failure_yields_empty() {
        let enabler: Arc<dyn ExtensionEnabler> = Arc::new(MockEnabler {
            result: Ok(vec![
                Arc::new(MockExtension {
                    name: "polkadot-js".into(),
                    accounts: Ok(vec![account("A1", "Alice")]),
                }),
                Arc::new(MockExtension {
                    name: "broken".into(),
                    accounts: Err(ExtensionError::Accounts("locked".into())),
                }),
            ]),
        });
        let accounts = web3_accounts(start_enable(Some(enabler), "test".into())).await;
        assert!(accounts.is_empty());
    }

    #[tokio::test]
    async fn no_enabler_means_no_extensions() {
        let enable = start_enable(None, "test".into());
        assert!(web3_accounts(enable.clone()).await.is_empty());
        assert_eq!(extension_infos(enable).await.unwrap(), Vec::new());
    }

    #[tokio::test]
    async fn shared_enable_is_awaited_twice() {
        let enable = start_enable(Some(two_extensions()), "test".into());
        let infos = extension_infos(enable.clone()).await.unwrap();
        let names: Vec<_> = infos.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["polkadot-js", "other-ext"]);
        assert_eq!(web3_accounts(enable).await.len(), 2);
    }

    #[test]
    fn source_labels() {
        assert_eq!(source_label("polkadot-js"), "extension");
        assert_eq!(source_label("talisman"), "talisman");
    }
}
