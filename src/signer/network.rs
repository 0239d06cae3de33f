//! Chain id to RPC endpoint resolution

use crate::config::NetworkConfig;
use crate::errors::{EvvmError, Result};
use ethers::providers::{Http, Provider};
use std::collections::HashMap;

/// Networks a signer is allowed to switch to
#[derive(Debug, Clone, Default)]
pub struct NetworkTable {
    endpoints: HashMap<u64, String>,
}

impl NetworkTable {
    pub fn from_config(networks: &[NetworkConfig]) -> Self {
        Self {
            endpoints: networks
                .iter()
                .map(|n| (n.chain_id, n.rpc_url.clone()))
                .collect(),
        }
    }

    pub fn with_endpoint(mut self, chain_id: u64, rpc_url: &str) -> Self {
        self.endpoints.insert(chain_id, rpc_url.to_string());
        self
    }

    pub fn endpoint(&self, chain_id: u64) -> Result<&str> {
        self.endpoints
            .get(&chain_id)
            .map(String::as_str)
            .ok_or(EvvmError::UnsupportedNetwork(chain_id))
    }

    pub fn contains(&self, chain_id: u64) -> bool {
        self.endpoints.contains_key(&chain_id)
    }

    /// Build an HTTP provider for `chain_id`. No request is made.
    pub fn connect(&self, chain_id: u64) -> Result<Provider<Http>> {
        let url = self.endpoint(chain_id)?;
        Provider::<Http>::try_from(url)
            .map_err(|e| EvvmError::ConfigError(format!("invalid RPC url {}: {}", url, e)))
    }
}
