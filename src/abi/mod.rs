//! Contract interface descriptions
//!
//! A minimal model of the Solidity JSON ABI: enough to look functions up by
//! name, carry their descriptors across the transport boundary, and hand
//! them to a wallet back end's encoder.

pub mod contracts;

use crate::errors::{EvvmError, Result};
use serde::{Deserialize, Serialize};

/// Kind of an ABI item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbiItemKind {
    Function,
    Event,
    Error,
    Constructor,
    Fallback,
    Receive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateMutability {
    Pure,
    View,
    #[default]
    Nonpayable,
    Payable,
}

/// A typed parameter of a function, event or error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbiParam {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<AbiParam>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed: Option<bool>,
}

impl AbiParam {
    pub fn new(name: &str, ty: &str) -> Self {
        Self {
            name: name.to_string(),
            ty: ty.to_string(),
            internal_type: None,
            components: None,
            indexed: None,
        }
    }

    pub fn tuple(name: &str, ty: &str, components: Vec<AbiParam>) -> Self {
        Self {
            components: Some(components),
            ..Self::new(name, ty)
        }
    }

    /// Split a trailing array suffix off the type tag.
    ///
    /// Returns the element parameter (same components, suffix removed) and
    /// the fixed length if the suffix is `[N]`.
    pub fn array_element(&self) -> Option<(AbiParam, Option<usize>)> {
        let ty = self.ty.trim();
        if !ty.ends_with(']') {
            return None;
        }
        let open = ty.rfind('[')?;
        let size = &ty[open + 1..ty.len() - 1];
        let fixed = if size.is_empty() {
            None
        } else {
            Some(size.parse().ok()?)
        };
        let element = AbiParam {
            ty: ty[..open].to_string(),
            internal_type: None,
            ..self.clone()
        };
        Some((element, fixed))
    }

    pub fn is_tuple(&self) -> bool {
        self.ty.starts_with("tuple") && self.array_element().is_none()
    }
}

/// One item of a contract interface description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbiItem {
    #[serde(rename = "type")]
    pub kind: AbiItemKind,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    #[serde(default)]
    pub outputs: Vec<AbiParam>,
    #[serde(default)]
    pub state_mutability: StateMutability,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anonymous: Option<bool>,
}

impl AbiItem {
    pub fn function(
        name: &str,
        inputs: Vec<AbiParam>,
        outputs: Vec<AbiParam>,
        state_mutability: StateMutability,
    ) -> Self {
        Self {
            kind: AbiItemKind::Function,
            name: name.to_string(),
            inputs,
            outputs,
            state_mutability,
            anonymous: None,
        }
    }

    pub fn is_function(&self) -> bool {
        self.kind == AbiItemKind::Function
    }
}

/// A contract interface description: an ordered list of ABI items
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Abi(Vec<AbiItem>);

impl Abi {
    pub fn new(items: Vec<AbiItem>) -> Self {
        Self(items)
    }

    /// Parse a JSON ABI (either a bare item list or a `{ "abi": [...] }` artifact)
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let items = match value {
            serde_json::Value::Object(mut artifact) => artifact
                .remove("abi")
                .ok_or_else(|| EvvmError::Serialization("artifact has no 'abi' field".into()))?,
            other => other,
        };
        Ok(Self(serde_json::from_value(items)?))
    }

    pub fn items(&self) -> &[AbiItem] {
        &self.0
    }

    /// Look up a function descriptor by exact name
    pub fn function(&self, name: &str) -> Option<&AbiItem> {
        self.0
            .iter()
            .find(|item| item.is_function() && item.name == name)
    }
}

impl From<Vec<AbiItem>> for Abi {
    fn from(items: Vec<AbiItem>) -> Self {
        Self(items)
    }
}
