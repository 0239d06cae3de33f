//! Configuration management for evvm-actions
//!
//! Supports loading configuration from:
//! - Defaults (a local development chain)
//! - Config file (evvm.toml or an explicit path)
//! - Environment variables (EVVM_*)

use crate::errors::{EvvmError, Result};
use crate::security::SecureString;
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// RPC endpoints the signer may connect to
    pub networks: Vec<NetworkConfig>,

    /// Signer back end configuration
    pub signer: SignerConfig,

    /// Deployed protocol contracts
    pub contracts: ContractsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// One reachable chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// EIP-155 chain id
    pub chain_id: u64,

    /// Human readable name
    pub name: String,

    /// JSON-RPC endpoint
    pub rpc_url: String,
}

impl NetworkConfig {
    pub fn new(chain_id: u64, name: &str, rpc_url: &str) -> Self {
        Self {
            chain_id,
            name: name.to_string(),
            rpc_url: rpc_url.to_string(),
        }
    }
}

/// Which wallet library signs and submits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerBackend {
    /// ethers-rs `LocalWallet` behind a `SignerMiddleware`
    #[default]
    Ethers,
    /// In-process k256 key, raw EIP-1559 transactions
    LocalKey,
}

/// Signer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    /// Back end used by `connect_signer`
    pub backend: SignerBackend,

    /// Environment variable holding the hex private key
    pub private_key_env: String,

    /// Confirmations to wait for after submitting a transaction
    pub confirmations: usize,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            backend: SignerBackend::Ethers,
            private_key_env: "EVVM_PRIVATE_KEY".to_string(),
            confirmations: 1,
        }
    }
}

/// Protocol deployment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractsConfig {
    /// Chain the contracts are deployed on
    pub chain_id: u64,

    /// Known EVVM id, saves a `getEvvmID` query per action
    pub evvm_id: Option<u64>,

    pub evvm: Option<String>,
    pub staking: Option<String>,
    pub name_service: Option<String>,
    pub p2p_swap: Option<String>,
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self {
            chain_id: 31337,
            evvm_id: None,
            evvm: None,
            staking: None,
            name_service: None,
            p2p_swap: None,
        }
    }
}

impl ContractsConfig {
    pub fn evvm_address(&self) -> Result<Option<Address>> {
        parse_optional_address("evvm", self.evvm.as_deref())
    }

    pub fn staking_address(&self) -> Result<Option<Address>> {
        parse_optional_address("staking", self.staking.as_deref())
    }

    pub fn name_service_address(&self) -> Result<Option<Address>> {
        parse_optional_address("name_service", self.name_service.as_deref())
    }

    pub fn p2p_swap_address(&self) -> Result<Option<Address>> {
        parse_optional_address("p2p_swap", self.p2p_swap.as_deref())
    }
}

fn parse_optional_address(field: &str, raw: Option<&str>) -> Result<Option<Address>> {
    raw.map(|raw| {
        raw.parse::<Address>().map_err(|e| {
            EvvmError::ConfigError(format!("contracts.{} is not an address ({}): {}", field, raw, e))
        })
    })
    .transpose()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::new(31337, "local", "http://127.0.0.1:8545")
    }
}

impl Config {
    /// Defaults with a single local development network
    pub fn local() -> Self {
        Self {
            networks: vec![NetworkConfig::default()],
            ..Self::default()
        }
    }

    /// Load configuration from file and environment
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = config::Config::try_from(&Config::local())
            .map_err(|e| EvvmError::ConfigError(e.to_string()))?;

        let mut builder = config::Config::builder().add_source(defaults);

        // Load from file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        } else {
            builder = builder.add_source(config::File::with_name("evvm").required(false));
        }

        // Load from environment (EVVM_CONTRACTS__CHAIN_ID, etc.)
        builder = builder.add_source(
            config::Environment::with_prefix("EVVM")
                .separator("__")
                .try_parsing(true),
        );

        let config: Config = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| EvvmError::ConfigError(e.to_string()))?;

        info!(
            "Configuration loaded: {} network(s), contracts on chain {}",
            config.networks.len(),
            config.contracts.chain_id
        );
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.networks.is_empty() {
            return Err(EvvmError::ConfigError("no networks configured".to_string()));
        }

        if self.network(self.contracts.chain_id).is_none() {
            return Err(EvvmError::ConfigError(format!(
                "contracts.chain_id {} has no entry in networks",
                self.contracts.chain_id
            )));
        }

        for (i, network) in self.networks.iter().enumerate() {
            if self.networks[..i].iter().any(|n| n.chain_id == network.chain_id) {
                return Err(EvvmError::ConfigError(format!(
                    "chain {} is configured twice",
                    network.chain_id
                )));
            }
        }

        self.contracts.evvm_address()?;
        self.contracts.staking_address()?;
        self.contracts.name_service_address()?;
        self.contracts.p2p_swap_address()?;

        if self.contracts.evvm.is_none() {
            warn!("contracts.evvm is not set, payment actions cannot be built");
        }

        Ok(())
    }

    /// Look up a configured network by chain id
    pub fn network(&self, chain_id: u64) -> Option<&NetworkConfig> {
        self.networks.iter().find(|n| n.chain_id == chain_id)
    }

    /// Read the signer's private key from the configured environment variable
    pub fn private_key(&self) -> Result<SecureString> {
        env::var(&self.signer.private_key_env)
            .map(SecureString::from)
            .map_err(|_| {
                EvvmError::ConfigError(format!(
                    "{} environment variable not set",
                    self.signer.private_key_env
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::local();
        assert_eq!(config.contracts.chain_id, 31337);
        assert_eq!(config.signer.backend, SignerBackend::Ethers);
        assert_eq!(config.signer.private_key_env, "EVVM_PRIVATE_KEY");
        assert_eq!(config.network(31337).unwrap().rpc_url, "http://127.0.0.1:8545");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_declared_network() {
        let mut config = Config::local();
        config.contracts.chain_id = 11155111;
        assert!(matches!(config.validate(), Err(EvvmError::ConfigError(_))));
    }

    #[test]
    fn test_validate_rejects_duplicate_networks() {
        let mut config = Config::local();
        config.networks.push(NetworkConfig::new(31337, "dup", "http://localhost:9545"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_contract_addresses() {
        let mut config = Config::local();
        config.contracts.evvm = Some("0xdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef".to_string());
        assert!(config.contracts.evvm_address().unwrap().is_some());
        assert!(config.contracts.staking_address().unwrap().is_none());

        config.contracts.staking = Some("not-an-address".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = Config::load(None).unwrap();
        assert!(config.network(config.contracts.chain_id).is_some());
    }

    #[test]
    fn test_missing_private_key() {
        let mut config = Config::local();
        config.signer.private_key_env = "EVVM_TEST_KEY_THAT_IS_NEVER_SET".to_string();
        assert!(matches!(config.private_key(), Err(EvvmError::ConfigError(_))));
    }
}
