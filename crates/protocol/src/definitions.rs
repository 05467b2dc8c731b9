//! Custom read-only RPC definitions layered on top of the node's standard
//! interface. They are carried as static data and handed to the API session
//! as-is.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One positional parameter of a custom RPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcParam {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub is_optional: bool,
}

/// A custom RPC method definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcDefinition {
    pub description: String,
    #[serde(default)]
    pub params: Vec<RpcParam>,
    #[serde(rename = "type")]
    pub ty: String,
}

impl RpcDefinition {
    /// Number of parameters that must be supplied.
    pub fn required_params(&self) -> usize {
        self.params.iter().filter(|p| !p.is_optional).count()
    }
}

/// Definitions keyed by section, then by method name.
pub type RpcDefinitions = BTreeMap<String, BTreeMap<String, RpcDefinition>>;

fn param(name: &str, ty: &str, is_optional: bool) -> RpcParam {
    RpcParam {
        name: name.into(),
        ty: ty.into(),
        is_optional,
    }
}

/// The fixed set of custom queries the session registers.
pub fn custom_rpc_definitions() -> RpcDefinitions {
    let mut oracle = BTreeMap::new();
    oracle.insert(
        "getValue".to_string(),
        RpcDefinition {
            description: "Retrieves the oracle value for a given key.".into(),
            params: vec![
                param("providerId", "RpcDataProviderId", false),
                param("key", "OracleKey", false),
                param("at", "BlockHash", true),
            ],
            ty: "Option<TimestampedValue>".into(),
        },
    );
    oracle.insert(
        "getAllValues".to_string(),
        RpcDefinition {
            description: "Retrieves all oracle values.".into(),
            params: vec![
                param("providerId", "RpcDataProviderId", false),
                param("at", "BlockHash", true),
            ],
            ty: "Vec<(OracleKey, Option<TimestampedValue>)>".into(),
        },
    );

    let mut dex = BTreeMap::new();
    dex.insert(
        "getSupplyAmount".to_string(),
        RpcDefinition {
            description: "Get supply amount for a target amount along a swap path.".into(),
            params: vec![
                param("path", "Vec<CurrencyId>", false),
                param("targetAmount", "Balance", false),
                param("at", "BlockHash", true),
            ],
            ty: "BalanceWrapper".into(),
        },
    );
    dex.insert(
        "getTargetAmount".to_string(),
        RpcDefinition {
            description: "Get target amount for a supply amount along a swap path.".into(),
            params: vec![
                param("path", "Vec<CurrencyId>", false),
                param("supplyAmount", "Balance", false),
                param("at", "BlockHash", true),
            ],
            ty: "BalanceWrapper".into(),
        },
    );

    let mut defs = RpcDefinitions::new();
    defs.insert("oracle".to_string(), oracle);
    defs.insert("dex".to_string(), dex);
    defs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_definitions_are_present() {
        let defs = custom_rpc_definitions();
        let get_value = &defs["oracle"]["getValue"];
        assert_eq!(get_value.params.len(), 3);
        assert_eq!(get_value.required_params(), 2);
        assert_eq!(get_value.ty, "Option<TimestampedValue>");
        assert!(defs["dex"].contains_key("getSupplyAmount"));
    }

    #[test]
    fn definition_wire_shape() {
        let json = serde_json::to_value(&custom_rpc_definitions()["oracle"]["getAllValues"]).unwrap();
        assert_eq!(json["type"], "Vec<(OracleKey, Option<TimestampedValue>)>");
        assert_eq!(json["params"][1]["isOptional"], true);
        assert_eq!(json["params"][0]["type"], "RpcDataProviderId");
    }
}
