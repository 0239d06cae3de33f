//! Ethereum cryptographic utilities
//!
//! Provides:
//! - Key loading from raw or hex-encoded secrets
//! - Message signing (EIP-191 personal sign)
//! - Prehash signing for transactions
//! - Address derivation

use crate::errors::{EvvmError, Result};
use crate::security::SecureBytes;
use ethers::types::Address;
use k256::{ecdsa::SigningKey, SecretKey};
use sha3::{Digest, Keccak256};

/// Ethereum key pair
pub struct EthKeyPair {
    signing_key: SigningKey,
}

impl EthKeyPair {
    /// Create from raw private key bytes (32 bytes)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(EvvmError::InvalidKeyFormat(format!(
                "Expected 32 bytes, got {}",
                bytes.len()
            )));
        }

        let secret_key = SecretKey::from_slice(bytes)
            .map_err(|e| EvvmError::InvalidKeyFormat(e.to_string()))?;

        let signing_key = SigningKey::from(secret_key);
        Ok(Self { signing_key })
    }

    /// Create from a hex-encoded private key (with or without `0x`)
    pub fn from_hex(hex_key: &str) -> Result<Self> {
        let bytes = SecureBytes::from_hex(hex_key)?;
        Self::from_bytes(bytes.expose())
    }

    /// Get the public key (uncompressed, 65 bytes with 0x04 prefix)
    pub fn public_key_uncompressed(&self) -> Vec<u8> {
        let verifying_key = self.signing_key.verifying_key();
        verifying_key.to_encoded_point(false).as_bytes().to_vec()
    }

    /// Get the Ethereum address
    pub fn address(&self) -> Address {
        let pubkey = self.public_key_uncompressed();
        // Skip the 0x04 prefix and hash the remaining 64 bytes
        let hash = Keccak256::digest(&pubkey[1..]);
        Address::from_slice(&hash[12..])
    }

    /// Sign a 32 byte digest
    pub fn sign_hash(&self, hash: &[u8; 32]) -> Result<EthSignature> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(hash)
            .map_err(|e| EvvmError::SigningFailed(e.to_string()))?;

        let r = signature.r().to_bytes();
        let s = signature.s().to_bytes();
        let v = recovery_id.to_byte();

        Ok(EthSignature {
            r: r.to_vec(),
            s: s.to_vec(),
            v,
        })
    }

    /// Sign a message with EIP-191 personal sign
    pub fn sign_message(&self, message: &[u8]) -> Result<EthSignature> {
        let hash = hash_message(message);
        self.sign_hash(&hash)
    }
}

/// Ethereum signature with recovery id (0 or 1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthSignature {
    pub r: Vec<u8>,
    pub s: Vec<u8>,
    pub v: u8,
}

impl EthSignature {
    /// Get the full signature bytes in personal-sign layout (r || s || v, v = 27/28)
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut sig = [0u8; 65];
        sig[0..32].copy_from_slice(&self.r);
        sig[32..64].copy_from_slice(&self.s);
        sig[64] = self.v_legacy();
        sig
    }

    /// Get v for messages and legacy transactions (27/28)
    pub fn v_legacy(&self) -> u8 {
        self.v + 27
    }

    /// Convert to a `0x` prefixed hex string
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }
}

/// Hash a message according to EIP-191 (personal sign)
pub fn hash_message(message: &[u8]) -> [u8; 32] {
    let prefix = format!("\x19Ethereum Signed Message:\n{}", message.len());
    let mut hasher = Keccak256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

/// Compute keccak256 hash
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}
