//! Zeroizing containers for private key material
//!
//! Private keys only pass through these wrappers on their way into a
//! signing key, so no copy of the raw bytes outlives the signer setup.

pub mod zeroize;

pub use self::zeroize::{SecureBytes, SecureString};
