//! Cryptographic utilities for EVM signing

pub mod eth;

pub use eth::{hash_message, keccak256, EthKeyPair, EthSignature};
