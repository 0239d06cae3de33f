//! Serde helpers rendering 256-bit integers as base-10 strings
//!
//! The transport form carries every big integer as a decimal string; these
//! helpers are attached to payload fields with `#[serde(with = ...)]`.

/// `U256` as a decimal string
pub mod decimal {
    use ethers::types::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    /// Parse a decimal string, or a `0x` hex string
    pub fn parse(raw: &str) -> Result<U256, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err("empty integer string".to_string());
        }
        match raw.strip_prefix("0x") {
            Some(hex_digits) => U256::from_str_radix(hex_digits, 16).map_err(|e| e.to_string()),
            None => U256::from_dec_str(raw).map_err(|e| e.to_string()),
        }
    }

    /// `Option<U256>`; `None` serializes as `null`
    pub mod option {
        use ethers::types::U256;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<U256>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => serializer.collect_str(value),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<U256>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| super::parse(&raw).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
