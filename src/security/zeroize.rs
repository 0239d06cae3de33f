//! Secure memory zeroization utilities
//!
//! Uses the `zeroize` crate so compiler optimizations don't remove the
//! zeroing of private key bytes and strings.

use crate::errors::{EvvmError, Result};
use zeroize::ZeroizeOnDrop;

/// A wrapper for sensitive byte arrays that automatically zeros memory on drop
#[derive(Clone, ZeroizeOnDrop)]
pub struct SecureBytes {
    inner: Vec<u8>,
}

impl SecureBytes {
    pub fn new(data: Vec<u8>) -> Self {
        Self { inner: data }
    }

    /// Decode a hex string (with or without `0x`) without leaving the
    /// decoded bytes behind in an unmanaged buffer
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let trimmed = hex_str.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(digits)
            .map_err(|e| EvvmError::InvalidKeyFormat(format!("Hex decode error: {}", e)))?;
        Ok(Self::new(bytes))
    }

    pub fn expose(&self) -> &[u8] {
        &self.inner
    }
}

/// A secure string that zeros its memory on drop
#[derive(Clone, ZeroizeOnDrop)]
pub struct SecureString {
    inner: String,
}

impl SecureString {
    pub fn new(s: String) -> Self {
        Self { inner: s }
    }

    pub fn expose(&self) -> &str {
        &self.inner
    }
}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecureString(***)")
    }
}
