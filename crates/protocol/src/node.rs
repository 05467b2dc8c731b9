//! Typed results of the node queries issued during bootstrap.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Pluggable type definitions, keyed by type name.
pub type TypeOverrides = BTreeMap<String, serde_json::Value>;

/// Chain properties as reported by `system_properties`.
///
/// Nodes report `tokenDecimals` and `tokenSymbol` either as a scalar or as
/// a list (multi-token chains); both shapes normalise to a `Vec`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainProperties {
    #[serde(default, alias = "SS58Prefix", skip_serializing_if = "Option::is_none")]
    pub ss58_format: Option<u16>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub token_decimals: Vec<u32>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub token_symbol: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match Option::<OneOrMany<T>>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(value)) => vec![value],
        Some(OneOrMany::Many(values)) => values,
    })
}

/// Chain classification returned by `system_chainType`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainType {
    Development,
    Local,
    #[default]
    Live,
    Custom(String),
}

impl ChainType {
    /// Development and local chains are treated as test networks.
    pub fn is_test_network(&self) -> bool {
        matches!(self, ChainType::Development | ChainType::Local)
    }
}

/// Runtime version returned by `state_getRuntimeVersion`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeVersion {
    pub spec_name: String,
    #[serde(default)]
    pub impl_name: String,
    pub spec_version: u32,
    #[serde(default)]
    pub transaction_version: u32,
}

/// Result of `rpc_methods`: every method the node exposes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcMethods {
    #[serde(default)]
    pub methods: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn properties_scalar_shape() {
        let json = r#"{"ss58Format":0,"tokenDecimals":10,"tokenSymbol":"DOT"}"#;
        let props: ChainProperties = serde_json::from_str(json).unwrap();
        assert_eq!(props.ss58_format, Some(0));
        assert_eq!(props.token_decimals, vec![10]);
        assert_eq!(props.token_symbol, vec!["DOT".to_string()]);
    }

    #[test]
    fn properties_list_shape() {
        let json = r#"{"ss58Format":8,"tokenDecimals":[12,12],"tokenSymbol":["KAR","KUSD"]}"#;
        let props: ChainProperties = serde_json::from_str(json).unwrap();
        assert_eq!(props.token_decimals, vec![12, 12]);
        assert_eq!(props.token_symbol, vec!["KAR".to_string(), "KUSD".to_string()]);
    }

    #[test]
    fn properties_empty_object() {
        let props: ChainProperties = serde_json::from_str("{}").unwrap();
        assert_eq!(props, ChainProperties::default());
    }

    #[test]
    fn properties_null_fields() {
        let json = r#"{"tokenDecimals":null,"tokenSymbol":null}"#;
        let props: ChainProperties = serde_json::from_str(json).unwrap();
        assert!(props.token_decimals.is_empty());
        assert!(props.token_symbol.is_empty());
    }

    #[test]
    fn chain_type_wire_format() {
        let live: ChainType = serde_json::from_str(r#""Live""#).unwrap();
        assert_eq!(live, ChainType::Live);
        let dev: ChainType = serde_json::from_str(r#""Development""#).unwrap();
        assert!(dev.is_test_network());
        let custom: ChainType = serde_json::from_str(r#"{"Custom":"staging"}"#).unwrap();
        assert_eq!(custom, ChainType::Custom("staging".into()));
        assert!(!custom.is_test_network());
    }

    #[test]
    fn runtime_version_ignores_unknown_fields() {
        let json = r#"{"specName":"node","implName":"substrate-node","authoringVersion":10,
            "specVersion":268,"implVersion":0,"apis":[],"transactionVersion":2}"#;
        let version: RuntimeVersion = serde_json::from_str(json).unwrap();
        assert_eq!(version.spec_name, "node");
        assert_eq!(version.spec_version, 268);
        assert_eq!(version.transaction_version, 2);
    }
}
