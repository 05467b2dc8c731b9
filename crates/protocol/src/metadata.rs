//! Decoded runtime metadata, reduced to what the bootstrapper needs.
//!
//! Pallets and calls are kept in declaration order (`Vec`, never a map):
//! the default transaction is picked as the first call found, which is only
//! reproducible when the order is stable.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Decoded runtime metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeMetadata {
    #[serde(default)]
    pub pallets: Vec<PalletMetadata>,
}

/// One pallet (module) of the runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PalletMetadata {
    pub name: String,
    #[serde(default)]
    pub calls: Vec<String>,
    #[serde(default)]
    pub constants: Vec<ConstantMetadata>,
}

/// A runtime constant with its decoded value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantMetadata {
    pub name: String,
    /// Decoded value. Integers may arrive as numbers or strings.
    pub value: serde_json::Value,
}

impl RuntimeMetadata {
    /// Looks up a pallet by name (case-insensitive).
    pub fn pallet(&self, name: &str) -> Option<&PalletMetadata> {
        self.pallets
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Returns the value of a pallet constant, if declared.
    pub fn constant(&self, pallet: &str, name: &str) -> Option<&serde_json::Value> {
        self.pallet(pallet)?
            .constants
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.value)
    }

    /// Returns `true` if the pallet declares the given call.
    pub fn has_call(&self, pallet: &str, call: &str) -> bool {
        self.pallet(pallet)
            .is_some_and(|p| p.calls.iter().any(|c| c == call))
    }

    /// Iterates every callable extrinsic in declaration order.
    pub fn calls(&self) -> impl Iterator<Item = CallRef> + '_ {
        self.pallets.iter().flat_map(|p| {
            p.calls.iter().map(move |c| CallRef {
                section: p.name.clone(),
                method: c.clone(),
            })
        })
    }
}

/// Reference to a callable extrinsic, e.g. `System.set_code`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallRef {
    pub section: String,
    pub method: String,
}

impl CallRef {
    /// Builds a reference from pallet and call name.
    pub fn new(section: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            method: method.into(),
        }
    }
}

impl fmt::Display for CallRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section, self.method)
    }
}
