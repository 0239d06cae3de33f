//! Canonical message rendering
//!
//! The message an action signs is `"{domainId},{actionName},{fields}"`. The
//! verifying contract rebuilds the same string on-chain, so the field order
//! of each action is fixed and every value renders in exactly one way:
//! addresses and hex payloads lowercased, integers in base 10, booleans as
//! `true`/`false`, absent optional values as the empty string.

use ethers::types::{Address, H256, U256};

/// A value that participates in a canonical message
pub trait CanonicalField {
    fn render(&self) -> String;
}

impl CanonicalField for Address {
    fn render(&self) -> String {
        format!("0x{}", hex::encode(self.as_bytes()))
    }
}

impl CanonicalField for H256 {
    fn render(&self) -> String {
        format!("0x{}", hex::encode(self.as_bytes()))
    }
}

impl CanonicalField for U256 {
    fn render(&self) -> String {
        self.to_string()
    }
}

impl CanonicalField for bool {
    fn render(&self) -> String {
        if *self { "true" } else { "false" }.to_string()
    }
}

impl CanonicalField for str {
    fn render(&self) -> String {
        self.to_string()
    }
}

impl CanonicalField for String {
    fn render(&self) -> String {
        self.clone()
    }
}

impl<T: CanonicalField> CanonicalField for Option<T> {
    fn render(&self) -> String {
        self.as_ref().map(CanonicalField::render).unwrap_or_default()
    }
}

/// Ordered field list of one action
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalFields {
    fields: Vec<String>,
}

impl CanonicalFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<T: CanonicalField + ?Sized>(mut self, value: &T) -> Self {
        self.fields.push(value.render());
        self
    }

    pub fn render(&self) -> String {
        self.fields.join(",")
    }
}

/// Full signable message for one action
pub fn message(domain_id: U256, action_name: &str, fields: &str) -> String {
    format!("{},{},{}", domain_id, action_name, fields)
}
