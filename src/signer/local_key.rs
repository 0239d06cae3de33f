//! In-process key back end
//!
//! Holds a k256 signing key, signs messages with EIP-191 and builds, signs
//! and RLP encodes its own EIP-1559 transactions. The provider is only used
//! to read chain state and broadcast the raw transaction.

use super::coerce::Coercion;
use super::network::NetworkTable;
use super::{CallDescriptor, CapabilitySigner, TxHash};
use crate::crypto::{keccak256, EthKeyPair};
use crate::errors::{EvvmError, Result};
use crate::security::SecureString;
use async_trait::async_trait;
use ethers::abi::Token;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, BlockNumber, Bytes, Eip1559TransactionRequest, H256, U256, U64};
use rlp::RlpStream;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

struct Connection {
    chain_id: u64,
    provider: Arc<Provider<Http>>,
}

/// Signer backed by a raw secp256k1 key
pub struct LocalKeySigner {
    key: EthKeyPair,
    address: Address,
    networks: NetworkTable,
    active: RwLock<Connection>,
    confirmations: usize,
}

impl LocalKeySigner {
    pub fn new(
        private_key: &SecureString,
        networks: NetworkTable,
        chain_id: u64,
        confirmations: usize,
    ) -> Result<Self> {
        let key = EthKeyPair::from_hex(private_key.expose())?;
        let address = key.address();
        let active = Self::connect(&networks, chain_id)?;

        Ok(Self {
            key,
            address,
            networks,
            active: RwLock::new(active),
            confirmations,
        })
    }

    fn connect(networks: &NetworkTable, chain_id: u64) -> Result<Connection> {
        Ok(Connection {
            chain_id,
            provider: Arc::new(networks.connect(chain_id)?),
        })
    }

    fn connection(&self) -> (u64, Arc<Provider<Http>>) {
        let active = self.active.read().unwrap_or_else(PoisonError::into_inner);
        (active.chain_id, active.provider.clone())
    }

    /// Sign an EIP-1559 transaction
    pub fn sign_transaction(&self, tx: &Eip1559Transaction) -> Result<SignedEip1559Transaction> {
        let hash = keccak256(&tx.rlp_unsigned());
        let signature = self.key.sign_hash(&hash)?;

        debug!(
            "Signed EIP-1559 tx: chain={}, nonce={}, to={:?}",
            tx.chain_id, tx.nonce, tx.to
        );

        Ok(SignedEip1559Transaction {
            tx: tx.clone(),
            v: signature.v,
            r: signature.r,
            s: signature.s,
        })
    }
}

#[async_trait]
impl CapabilitySigner for LocalKeySigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn active_network(&self) -> Result<u64> {
        Ok(self.connection().0)
    }

    async fn switch_network(&self, chain_id: u64) -> Result<()> {
        let connection = Self::connect(&self.networks, chain_id)?;
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = connection;
        info!("local key signer switched to chain {}", chain_id);
        Ok(())
    }

    async fn sign_message(&self, message: &str) -> Result<String> {
        Ok(self.key.sign_message(message.as_bytes())?.to_hex())
    }

    async fn call(&self, descriptor: &CallDescriptor) -> Result<Vec<Token>> {
        let (function, calldata) = descriptor.calldata(Coercion::Typed)?;
        let (chain_id, provider) = self.connection();

        let tx: TypedTransaction = Eip1559TransactionRequest::new()
            .from(self.address)
            .to(descriptor.contract_address)
            .data(calldata)
            .chain_id(chain_id)
            .into();
        let output = provider.call(&tx, None).await?;
        Ok(function.decode_output(&output)?)
    }

    async fn submit(&self, descriptor: &CallDescriptor) -> Result<TxHash> {
        let (_, calldata) = descriptor.calldata(Coercion::Typed)?;
        let (chain_id, provider) = self.connection();

        let nonce = provider
            .get_transaction_count(self.address, Some(BlockNumber::Pending.into()))
            .await?;
        let (max_fee, max_priority_fee) = provider.estimate_eip1559_fees(None).await?;
        let gas_limit = match descriptor.gas {
            Some(gas) => gas,
            None => {
                let request: TypedTransaction = Eip1559TransactionRequest::new()
                    .from(self.address)
                    .to(descriptor.contract_address)
                    .data(calldata.clone())
                    .chain_id(chain_id)
                    .into();
                provider.estimate_gas(&request, None).await?
            }
        };

        let tx = Eip1559Transaction {
            chain_id,
            nonce: to_u64("nonce", nonce)?,
            max_priority_fee_per_gas: to_u128("max priority fee", max_priority_fee)?,
            max_fee_per_gas: to_u128("max fee", max_fee)?,
            gas_limit: to_u64("gas limit", gas_limit)?,
            to: Some(descriptor.contract_address),
            value: 0,
            data: calldata,
            access_list: vec![],
        };
        let signed = self.sign_transaction(&tx)?;
        let local_hash = signed.tx_hash();

        let pending = provider
            .send_raw_transaction(Bytes::from(signed.rlp_signed()))
            .await?;
        let tx_hash = pending.tx_hash();
        if tx_hash != local_hash {
            warn!("Node reported {:?} for locally hashed {:?}", tx_hash, local_hash);
        }
        info!("Submitted {} as {:?}", descriptor.function_name, tx_hash);

        let receipt = pending.confirmations(self.confirmations).await?;
        match receipt {
            Some(receipt) if receipt.status == Some(U64::zero()) => {
                warn!("Transaction {:?} reverted", tx_hash);
            }
            None => warn!("Transaction {:?} dropped from the mempool", tx_hash),
            _ => {}
        }

        Ok(tx_hash)
    }
}

fn to_u64(what: &str, value: U256) -> Result<u64> {
    if value > U256::from(u64::MAX) {
        return Err(EvvmError::InvalidArgument(format!("{} {} exceeds u64", what, value)));
    }
    Ok(value.as_u64())
}

fn to_u128(what: &str, value: U256) -> Result<u128> {
    if value > U256::from(u128::MAX) {
        return Err(EvvmError::InvalidArgument(format!("{} {} exceeds u128", what, value)));
    }
    Ok(value.as_u128())
}

// Helper functions for RLP encoding
fn u128_to_be_bytes_trimmed(value: u128) -> Vec<u8> {
    trim_leading_zeros(&value.to_be_bytes()).to_vec()
}

fn u64_to_be_bytes_trimmed(value: u64) -> Vec<u8> {
    trim_leading_zeros(&value.to_be_bytes()).to_vec()
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

/// EIP-1559 transaction
#[derive(Debug, Clone)]
pub struct Eip1559Transaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
    pub gas_limit: u64,
    pub to: Option<Address>,
    pub value: u128,
    pub data: Vec<u8>,
    pub access_list: Vec<AccessListItem>,
}

#[derive(Debug, Clone)]
pub struct AccessListItem {
    pub address: Address,
    pub storage_keys: Vec<H256>,
}

impl Eip1559Transaction {
    fn append_fields(&self, stream: &mut RlpStream) {
        stream.append(&u64_to_be_bytes_trimmed(self.chain_id).as_slice());
        stream.append(&u64_to_be_bytes_trimmed(self.nonce).as_slice());
        stream.append(&u128_to_be_bytes_trimmed(self.max_priority_fee_per_gas).as_slice());
        stream.append(&u128_to_be_bytes_trimmed(self.max_fee_per_gas).as_slice());
        stream.append(&u64_to_be_bytes_trimmed(self.gas_limit).as_slice());

        match &self.to {
            Some(addr) => stream.append(&addr.as_bytes()),
            None => stream.append_empty_data(),
        };

        stream.append(&u128_to_be_bytes_trimmed(self.value).as_slice());
        stream.append(&self.data);

        // Access list
        stream.begin_list(self.access_list.len());
        for item in &self.access_list {
            stream.begin_list(2);
            stream.append(&item.address.as_bytes());
            stream.begin_list(item.storage_keys.len());
            for key in &item.storage_keys {
                stream.append(&key.as_bytes());
            }
        }
    }

    /// Type-prefixed payload whose keccak hash is signed
    pub fn rlp_unsigned(&self) -> Vec<u8> {
        let mut stream = RlpStream::new_list(9);
        self.append_fields(&mut stream);

        let mut result = vec![0x02];
        result.extend(stream.out());
        result
    }
}

/// Signed EIP-1559 transaction
#[derive(Debug, Clone)]
pub struct SignedEip1559Transaction {
    pub tx: Eip1559Transaction,
    pub v: u8,
    pub r: Vec<u8>,
    pub s: Vec<u8>,
}

impl SignedEip1559Transaction {
    pub fn rlp_signed(&self) -> Vec<u8> {
        let mut stream = RlpStream::new_list(12);
        self.tx.append_fields(&mut stream);

        stream.append(&trim_leading_zeros(&[self.v]));
        stream.append(&trim_leading_zeros(&self.r));
        stream.append(&trim_leading_zeros(&self.s));

        let mut result = vec![0x02];
        result.extend(stream.out());
        result
    }

    pub fn tx_hash(&self) -> H256 {
        H256::from(keccak256(&self.rlp_signed()))
    }
}
