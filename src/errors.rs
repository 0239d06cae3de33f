//! Error types for evvm-actions

use thiserror::Error;

/// Main error type for action construction, signing and dispatch
#[derive(Error, Debug)]
pub enum EvvmError {
    // Interface description errors
    #[error("No such function: {0}")]
    NoSuchFunction(String),

    #[error("Unknown function '{0}' in contract interface")]
    UnknownFunction(String),

    // Payload errors
    #[error("Missing data property '{field}' for function '{function}'")]
    MissingField { field: String, function: String },

    #[error("Ambiguous recipient at index {index}: {reason}")]
    AmbiguousRecipient { index: usize, reason: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Network errors
    #[error("Network mismatch: expected chain {expected}, signer is on chain {actual}")]
    NetworkMismatch { expected: u64, actual: u64 },

    #[error("Failed to switch to chain {chain_id}: {reason}")]
    NetworkSwitchFailed { chain_id: u64, reason: String },

    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(u64),

    // Cryptographic errors
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    // Wallet / provider library errors, kept as the source
    #[error("Signer back end error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl EvvmError {
    pub(crate) fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        EvvmError::Backend(Box::new(err))
    }

    /// Whether retrying after user interaction (approving a network switch) can succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EvvmError::NetworkMismatch { .. } | EvvmError::NetworkSwitchFailed { .. }
        )
    }
}

impl From<serde_json::Error> for EvvmError {
    fn from(err: serde_json::Error) -> Self {
        EvvmError::Serialization(format!("JSON error: {}", err))
    }
}

impl From<hex::FromHexError> for EvvmError {
    fn from(err: hex::FromHexError) -> Self {
        EvvmError::InvalidArgument(format!("Hex decode error: {}", err))
    }
}

impl From<ethers::providers::ProviderError> for EvvmError {
    fn from(err: ethers::providers::ProviderError) -> Self {
        EvvmError::backend(err)
    }
}

impl From<ethers::signers::WalletError> for EvvmError {
    fn from(err: ethers::signers::WalletError) -> Self {
        EvvmError::backend(err)
    }
}

impl From<ethers::abi::Error> for EvvmError {
    fn from(err: ethers::abi::Error) -> Self {
        EvvmError::InvalidArgument(format!("ABI encoding error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, EvvmError>;
