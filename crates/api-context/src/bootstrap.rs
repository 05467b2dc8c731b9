//! One-time chain bootstrap after a connection becomes ready.
//!
//! Fetches chain identity and properties together with the injected
//! accounts, then (strictly after all of them resolved) configures the
//! registry, the formatting defaults, the key store and the derive cache.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use dualnode_node_api::{ApiError, ApiFuture, ChainApi};
use dualnode_protocol::constants::methods;
use dualnode_protocol::{CallRef, ChainProperties, ChainType, RuntimeMetadata, TypeOverrides};
use dualnode_settings::Settings;

use crate::derive_cache::DeriveCaches;
use crate::error::BootstrapError;
use crate::format::BalanceFormatter;
use crate::injector::{EnableFuture, InjectedAccount, web3_accounts};
use crate::keyring::{AccountKind, KeyStore, KeyringOptions};

/// Decimals assumed when the chain reports none.
pub const DEFAULT_DECIMALS: u32 = 12;

/// Address format assumed when neither the runtime nor the node reports one.
pub const DEFAULT_SS58: u16 = 42;

/// Number of placeholder symbols appended after the default unit.
const AUX_SYMBOLS: usize = 9;

/// Spec names of Ethereum-compatible runtimes.
pub const ETHEREUM_CHAINS: [&str; 3] = ["moonbase", "moonbeam", "moonriver"];

/// Chain-name suffixes marking a test network.
const TEST_CHAIN_SUFFIXES: [&str; 2] = ["Development", "Local Testnet"];

/// Chain metadata derived by a successful bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainMetadata {
    pub system_chain: String,
    pub system_chain_type: ChainType,
    pub system_name: String,
    pub system_version: String,
    /// Address format in use: manual setting, else the chain's.
    pub ss58_format: u16,
    pub token_decimals: Vec<u32>,
    pub token_symbol: Vec<String>,
    pub spec_name: String,
    pub spec_version: u32,
    pub genesis_hash: String,
    /// First call of the first pallet, the UI's preselected extrinsic.
    pub default_tx: CallRef,
    /// `System.set_code` when the runtime has it, else [`Self::default_tx`].
    pub default_tx_sudo: CallRef,
}

/// Result of [`bootstrap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapOutput {
    pub metadata: ChainMetadata,
    /// Spec name is in [`ETHEREUM_CHAINS`].
    pub is_ethereum: bool,
    pub is_development: bool,
    pub has_injected_accounts: bool,
    pub injected_accounts: Vec<InjectedAccount>,
}

/// Collaborators the bootstrap writes to.
pub struct BootstrapContext<'a> {
    pub settings: &'a Settings,
    pub type_overrides: &'a TypeOverrides,
    /// Enablement already started at init; awaited here.
    pub injected: EnableFuture,
    pub keystore: &'a dyn KeyStore,
    pub formatter: &'a BalanceFormatter,
    pub derive_caches: &'a DeriveCaches,
}

/// Properties after defaults were applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProperties {
    pub ss58_format: u16,
    pub token_decimals: Vec<u32>,
    pub token_symbol: Vec<String>,
}

/// Applies the property fallbacks.
///
/// The ss58 format comes from the runtime's `System.SS58Prefix` constant
/// when present, else from the node's properties, else [`DEFAULT_SS58`].
pub fn resolve_properties(
    metadata: &RuntimeMetadata,
    fetched: &ChainProperties,
    default_unit: &str,
) -> ResolvedProperties {
    let runtime_ss58 = metadata
        .constant("system", "SS58Prefix")
        .and_then(serde_json::Value::as_u64)
        .and_then(|v| u16::try_from(v).ok());

    let token_decimals = if fetched.token_decimals.is_empty() {
        vec![DEFAULT_DECIMALS]
    } else {
        fetched.token_decimals.clone()
    };

    let token_symbol = if fetched.token_symbol.is_empty() {
        std::iter::once(default_unit.to_string())
            .chain((1..=AUX_SYMBOLS).map(|i| format!("Aux{i}")))
            .collect()
    } else {
        fetched.token_symbol.clone()
    };

    ResolvedProperties {
        ss58_format: runtime_ss58
            .or(fetched.ss58_format)
            .unwrap_or(DEFAULT_SS58),
        token_decimals,
        token_symbol,
    }
}

/// Returns `true` if `spec_name` is an Ethereum-compatible runtime.
pub fn is_ethereum_chain(spec_name: &str) -> bool {
    ETHEREUM_CHAINS.contains(&spec_name)
}

/// Name heuristic for test networks.
pub fn is_test_chain(system_chain: &str) -> bool {
    TEST_CHAIN_SUFFIXES
        .iter()
        .any(|suffix| system_chain.ends_with(suffix))
}

/// Ethereum-compatible runtimes are never development chains, since
/// development accounts would be derived on the wrong path.
pub fn is_development_chain(is_ethereum: bool, chain_type: &ChainType, system_chain: &str) -> bool {
    !is_ethereum && (chain_type.is_test_network() || is_test_chain(system_chain))
}

/// Picks the default call and the privileged default.
///
/// The default is the first call in declaration order; the privileged one
/// is `System.set_code` if the runtime has it, else the default.
pub fn select_default_calls(metadata: &RuntimeMetadata) -> Option<(CallRef, CallRef)> {
    let default_tx = metadata.calls().next()?;
    let sudo_tx = metadata
        .pallet("system")
        .filter(|p| p.calls.iter().any(|c| c == "set_code"))
        .map(|p| CallRef::new(&p.name, "set_code"))
        .unwrap_or_else(|| default_tx.clone());
    Some((default_tx, sudo_tx))
}

/// Runs the bootstrap sequence against a ready session.
pub async fn bootstrap(
    api: &dyn ChainApi,
    ctx: BootstrapContext<'_>,
) -> Result<BootstrapOutput, BootstrapError> {
    let runtime = api.runtime().ok_or(ApiError::NotReady)?;

    let chain_type: ApiFuture<'_, ChainType> =
        if runtime.has_rpc_method(methods::SYSTEM_CHAIN_TYPE) {
            api.system_chain_type()
        } else {
            Box::pin(async { Ok(ChainType::Live) })
        };
    let injected = async { Ok::<_, ApiError>(web3_accounts(ctx.injected.clone()).await) };

    let (fetched, system_chain, system_chain_type, system_name, system_version, injected) = tokio::try_join!(
        api.system_properties(),
        api.system_chain(),
        chain_type,
        api.system_name(),
        api.system_version(),
        injected,
    )?;

    let resolved = resolve_properties(&runtime.metadata, &fetched, &ctx.settings.default_unit);
    let ss58_format = ctx.settings.manual_ss58().unwrap_or(resolved.ss58_format);
    let spec_name = runtime.version.spec_name.clone();
    let is_ethereum = is_ethereum_chain(&spec_name);
    let is_development = is_development_chain(is_ethereum, &system_chain_type, &system_chain);

    let registry = api.registry();
    registry.register(ctx.type_overrides);
    registry.set_chain_properties(ChainProperties {
        ss58_format: Some(ss58_format),
        token_decimals: resolved.token_decimals.clone(),
        token_symbol: resolved.token_symbol.clone(),
    });

    // Both lists are non-empty after `resolve_properties`.
    if let (Some(decimals), Some(unit)) =
        (resolved.token_decimals.first(), resolved.token_symbol.first())
    {
        ctx.formatter.set_defaults(*decimals, unit);
    }

    if ctx.keystore.is_loaded() {
        debug!("key store already loaded");
    } else {
        ctx.keystore.load_all(
            KeyringOptions {
                genesis_hash: runtime.genesis_hash.clone(),
                is_development,
                ss58_format,
                store: ctx.settings.keyring_path.clone(),
                kind: AccountKind::for_chain(is_ethereum),
            },
            &injected,
        )?;
    }

    let (default_tx, default_tx_sudo) =
        select_default_calls(&runtime.metadata).ok_or(BootstrapError::NoCallableExtrinsics)?;

    ctx.derive_caches.publish(&runtime.genesis_hash);

    info!(
        chain = %system_chain,
        spec = %spec_name,
        ss58 = ss58_format,
        dev = is_development,
        eth = is_ethereum,
        injected = injected.len(),
        "chain bootstrapped"
    );

    Ok(BootstrapOutput {
        metadata: ChainMetadata {
            system_chain,
            system_chain_type,
            system_name,
            system_version,
            ss58_format,
            token_decimals: resolved.token_decimals,
            token_symbol: resolved.token_symbol,
            spec_name,
            spec_version: runtime.version.spec_version,
            genesis_hash: runtime.genesis_hash.clone(),
            default_tx,
            default_tx_sudo,
        },
        is_ethereum,
        is_development,
        has_injected_accounts: !injected.is_empty(),
        injected_accounts: injected,
    })
}
