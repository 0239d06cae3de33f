//! ethers-rs wallet back end

use super::coerce::Coercion;
use super::network::NetworkTable;
use super::{CallDescriptor, CapabilitySigner, TxHash};
use crate::crypto::EthKeyPair;
use crate::errors::{EvvmError, Result};
use crate::security::{SecureBytes, SecureString};
use async_trait::async_trait;
use ethers::abi::Token;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, TransactionRequest, U64};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

type Client = SignerMiddleware<Provider<Http>, LocalWallet>;

struct Connection {
    chain_id: u64,
    client: Arc<Client>,
}

/// `LocalWallet` inside a `SignerMiddleware`, reconnected on network switch
pub struct EthersSigner {
    wallet: LocalWallet,
    networks: NetworkTable,
    active: RwLock<Connection>,
    confirmations: usize,
}

impl EthersSigner {
    pub fn new(
        private_key: &SecureString,
        networks: NetworkTable,
        chain_id: u64,
        confirmations: usize,
    ) -> Result<Self> {
        let key = SecureBytes::from_hex(private_key.expose())?;
        // from_bytes panics on a slice that is not 32 bytes long
        EthKeyPair::from_bytes(key.expose())?;
        let wallet = LocalWallet::from_bytes(key.expose())
            .map_err(|e| EvvmError::InvalidKeyFormat(e.to_string()))?;
        let active = Self::connect(&wallet, &networks, chain_id)?;

        Ok(Self {
            wallet,
            networks,
            active: RwLock::new(active),
            confirmations,
        })
    }

    fn connect(wallet: &LocalWallet, networks: &NetworkTable, chain_id: u64) -> Result<Connection> {
        let provider = networks.connect(chain_id)?;
        let client = SignerMiddleware::new(provider, wallet.clone().with_chain_id(chain_id));
        Ok(Connection {
            chain_id,
            client: Arc::new(client),
        })
    }

    fn client(&self) -> Arc<Client> {
        let active = self.active.read().unwrap_or_else(PoisonError::into_inner);
        active.client.clone()
    }
}

#[async_trait]
impl CapabilitySigner for EthersSigner {
    fn address(&self) -> Address {
        self.wallet.address()
    }

    async fn active_network(&self) -> Result<u64> {
        Ok(self.active.read().unwrap_or_else(PoisonError::into_inner).chain_id)
    }

    async fn switch_network(&self, chain_id: u64) -> Result<()> {
        let connection = Self::connect(&self.wallet, &self.networks, chain_id)?;
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = connection;
        info!("ethers signer switched to chain {}", chain_id);
        Ok(())
    }

    async fn sign_message(&self, message: &str) -> Result<String> {
        let signature = self.wallet.sign_message(message).await?;
        Ok(format!("0x{}", hex::encode(signature.to_vec())))
    }

    async fn call(&self, descriptor: &CallDescriptor) -> Result<Vec<Token>> {
        let (function, calldata) = descriptor.calldata(Coercion::Lenient)?;
        let client = self.client();

        let tx: TypedTransaction = TransactionRequest::new()
            .from(self.address())
            .to(descriptor.contract_address)
            .data(calldata)
            .into();
        let output = client.call(&tx, None).await.map_err(EvvmError::backend)?;

        debug!("call {} returned {} bytes", descriptor.function_name, output.len());
        Ok(function.decode_output(&output)?)
    }

    async fn submit(&self, descriptor: &CallDescriptor) -> Result<TxHash> {
        let (_, calldata) = descriptor.calldata(Coercion::Lenient)?;
        let client = self.client();

        let mut request = TransactionRequest::new()
            .from(self.address())
            .to(descriptor.contract_address)
            .data(calldata);
        if let Some(gas) = descriptor.gas {
            request = request.gas(gas);
        }

        let pending = client
            .send_transaction(request, None)
            .await
            .map_err(EvvmError::backend)?;
        let tx_hash = pending.tx_hash();
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
