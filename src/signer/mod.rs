//! Capability signers
//!
//! A [`CapabilitySigner`] is whatever can hold a key, sign EIP-191 messages
//! and talk to a chain. Actions are built and executed only through this
//! trait, so the wallet library behind it is interchangeable.

pub mod coerce;
pub mod ethers_signer;
pub mod local_key;
pub mod network;

use crate::abi::{Abi, AbiItem};
use crate::action::canonical;
use crate::config::{Config, SignerBackend};
use crate::errors::{EvvmError, Result};
use crate::security::SecureString;
use async_trait::async_trait;
use ethers::abi::{Function, Token};
use ethers::types::{Address, U256};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

pub use self::coerce::Coercion;
pub use self::ethers_signer::EthersSigner;
pub use self::local_key::LocalKeySigner;
pub use self::network::NetworkTable;

/// Transaction hash returned by a submission
pub type TxHash = ethers::types::H256;

/// A contract function invocation, arguments still in transport form
#[derive(Debug, Clone)]
pub struct CallDescriptor {
    pub contract_address: Address,
    pub interface: Abi,
    pub function_name: String,
    pub args: Vec<Value>,
    pub gas: Option<U256>,
}

impl CallDescriptor {
    pub fn new(contract_address: Address, interface: Abi, function_name: &str, args: Vec<Value>) -> Self {
        Self {
            contract_address,
            interface,
            function_name: function_name.to_string(),
            args,
            gas: None,
        }
    }

    pub fn with_gas(mut self, gas: Option<U256>) -> Self {
        self.gas = gas;
        self
    }

    /// Look the function up and convert it to the ethers encoder's type
    pub(crate) fn encoder(&self) -> Result<(&AbiItem, Function)> {
        let unknown = || EvvmError::UnknownFunction(self.function_name.clone());

        let item = self.interface.function(&self.function_name).ok_or_else(unknown)?;
        let abi: ethers::abi::Abi = serde_json::from_value(serde_json::to_value(vec![item])?)?;
        let function = abi.function(&self.function_name).map_err(|_| unknown())?.clone();
        Ok((item, function))
    }

    /// ABI encoded calldata
    pub(crate) fn calldata(&self, mode: Coercion) -> Result<(Function, Vec<u8>)> {
        let (item, function) = self.encoder()?;
        let tokens = coerce::coerce_arguments(&item.inputs, &self.args, mode)?;
        let calldata = function.encode_input(&tokens)?;
        Ok((function, calldata))
    }
}

#[async_trait]
pub trait CapabilitySigner: Send + Sync {
    fn address(&self) -> Address;

    /// Chain id the signer is connected to
    async fn active_network(&self) -> Result<u64>;

    async fn switch_network(&self, chain_id: u64) -> Result<()>;

    /// EIP-191 personal sign, `0x` + hex(r || s || v)
    async fn sign_message(&self, message: &str) -> Result<String>;

    async fn sign_structured_domain_message(
        &self,
        domain_id: U256,
        function_name: &str,
        fields: &str,
    ) -> Result<String> {
        self.sign_message(&canonical::message(domain_id, function_name, fields))
            .await
    }

    /// Read-only call, returns the decoded outputs
    async fn call(&self, descriptor: &CallDescriptor) -> Result<Vec<Token>>;

    /// State-changing call, returns once confirmed
    async fn submit(&self, descriptor: &CallDescriptor) -> Result<TxHash>;
}

/// Build the signer selected by `config.signer.backend`, connected to the
/// chain the contracts are declared on
pub fn connect_signer(config: &Config, private_key: &SecureString) -> Result<Arc<dyn CapabilitySigner>> {
    let networks = NetworkTable::from_config(&config.networks);
    let chain_id = config.contracts.chain_id;
    let confirmations = config.signer.confirmations;

    let signer: Arc<dyn CapabilitySigner> = match config.signer.backend {
        SignerBackend::Ethers => Arc::new(EthersSigner::new(
            private_key,
            networks,
            chain_id,
            confirmations,
        )?),
        SignerBackend::LocalKey => Arc::new(LocalKeySigner::new(
            private_key,
            networks,
            chain_id,
            confirmations,
        )?),
    };

    info!(
        "Signer ready: backend={:?}, address={:?}, chain={}",
        config.signer.backend,
        signer.address(),
        chain_id
    );
    Ok(signer)
}
