//! Protocol services
//!
//! A [`ServiceBinding`] ties a signer to one deployed contract. The concrete
//! services build their signed actions through it, always on the contract's
//! chain and always validating the payload against the function before
//! asking the signer for anything.

pub mod evvm;
pub mod name_service;
pub mod p2p_swap;
pub mod staking;

use crate::abi::Abi;
use crate::action::codec::decimal;
use crate::action::{ContractRef, SignedAction};
use crate::config::ContractsConfig;
use crate::errors::{EvvmError, Result};
use crate::executor;
use crate::signer::{CallDescriptor, CapabilitySigner};
use ethers::abi::{Detokenize, Token};
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub use evvm::{DisperseRecipient, DispersePayData, Evvm, PayData, Recipient};
pub use name_service::NameService;
pub use p2p_swap::P2PSwap;
pub use staking::Staking;

/// A signer bound to one deployed contract
#[derive(Clone)]
pub struct ServiceBinding {
    signer: Arc<dyn CapabilitySigner>,
    address: Address,
    abi: Abi,
    chain_id: u64,
    evvm_id: Option<U256>,
}

impl ServiceBinding {
    pub fn new(signer: Arc<dyn CapabilitySigner>, address: Address, abi: Abi, chain_id: u64) -> Self {
        Self {
            signer,
            address,
            abi,
            chain_id,
            evvm_id: None,
        }
    }

    /// Bind to a module listed in the `contracts` configuration section.
    /// Fails when the module's address is not configured.
    pub fn from_config(
        signer: Arc<dyn CapabilitySigner>,
        abi: Abi,
        module: &str,
        address: Option<Address>,
        deployment: &ContractsConfig,
    ) -> Result<Self> {
        let address = address
            .ok_or_else(|| EvvmError::ConfigError(format!("contracts.{} is not set", module)))?;
        let binding = Self::new(signer, address, abi, deployment.chain_id);
        Ok(match deployment.evvm_id {
            Some(evvm_id) => binding.with_evvm_id(U256::from(evvm_id)),
            None => binding,
        })
    }

    /// Use a known domain id instead of querying `getEvvmID`
    pub fn with_evvm_id(mut self, evvm_id: U256) -> Self {
        self.evvm_id = Some(evvm_id);
        self
    }

    pub fn signer(&self) -> &dyn CapabilitySigner {
        self.signer.as_ref()
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn abi(&self) -> &Abi {
        &self.abi
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn contract(&self) -> ContractRef {
        ContractRef {
            address: self.address,
            chain_id: self.chain_id,
        }
    }

    /// Read-only call against the bound contract
    pub async fn view(&self, function_name: &str, args: Vec<Value>) -> Result<Vec<Token>> {
        let descriptor = CallDescriptor::new(self.address, self.abi.clone(), function_name, args);
        self.signer.call(&descriptor).await
    }

    /// [`view`](Self::view), decoded into `T`
    pub async fn view_as<T: Detokenize>(&self, function_name: &str, args: Vec<Value>) -> Result<T> {
        let tokens = self.view(function_name, args).await?;
        T::from_tokens(tokens).map_err(|e| {
            EvvmError::Serialization(format!("cannot decode {} output: {}", function_name, e))
        })
    }

    /// Domain id actions are signed for. Queried each time unless known.
    pub async fn evvm_id(&self) -> Result<U256> {
        match self.evvm_id {
            Some(evvm_id) => Ok(evvm_id),
            None => self.view_as("getEvvmID", vec![]).await,
        }
    }

    /// Next synchronous nonce of the signer
    pub async fn sync_nonce(&self) -> Result<U256> {
        self.view_as("getNextCurrentSyncNonce", vec![json!(self.signer.address())])
            .await
    }

    /// `true` if the signer has not used `nonce` yet
    pub async fn is_valid_async_nonce(&self, nonce: U256) -> Result<bool> {
        let used: bool = self
            .view_as(
                "getIfUsedAsyncNonce",
                vec![json!(self.signer.address()), json!(nonce.to_string())],
            )
            .await?;
        Ok(!used)
    }

    pub async fn ensure_network(&self) -> Result<()> {
        executor::ensure_network(self.signer.as_ref(), self.chain_id).await
    }

    /// Sign `fields` under `message_name` and bind the payload `build`
    /// produces to `function_name`.
    ///
    /// `build` is first called with an empty signature so a payload that
    /// does not fit the function fails before the signer is asked.
    pub(crate) async fn sign_action<T, B>(
        &self,
        function_name: &str,
        message_name: &str,
        fields: String,
        build: B,
    ) -> Result<SignedAction<T>>
    where
        T: Serialize,
        B: Fn(String) -> T,
    {
        executor::on_network(self.signer.as_ref(), self.chain_id, move || async move {
            let evvm_id = self.evvm_id().await?;
            SignedAction::new(self.contract(), &self.abi, evvm_id, function_name, build(String::new()))?;

            let signature = self
                .signer
                .sign_structured_domain_message(evvm_id, message_name, &fields)
                .await?;

            debug!("Signed {} for domain {}", message_name, evvm_id);
            SignedAction::new(self.contract(), &self.abi, evvm_id, function_name, build(signature))
        })
        .await
    }

    /// Bind a payload that carries no signature of its own
    pub(crate) async fn unsigned_action<T: Serialize>(
        &self,
        function_name: &str,
        data: T,
    ) -> Result<SignedAction<T>> {
        executor::on_network(self.signer.as_ref(), self.chain_id, move || async move {
            let evvm_id = self.evvm_id().await?;
            SignedAction::new(self.contract(), &self.abi, evvm_id, function_name, data)
        })
        .await
    }

    pub(crate) fn user_or_signer(&self, user: Option<Address>) -> Address {
        user.unwrap_or_else(|| self.signer.address())
    }
}

/// The parts of a signed `pay` action another action can carry along to
/// settle its fee
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainedPayment {
    pub priority_fee: U256,
    pub nonce: U256,
    pub priority_flag: bool,
    pub signature: String,
}

impl From<&SignedAction<PayData>> for ChainedPayment {
    fn from(action: &SignedAction<PayData>) -> Self {
        let data = action.data();
        Self {
            priority_fee: data.priority_fee,
            nonce: data.nonce,
            priority_flag: data.priority_flag,
            signature: data.signature.clone(),
        }
    }
}

/// Chained payment keys used by the staking and name service modules
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvvmPaymentFields {
    #[serde(rename = "priorityFee_EVVM", with = "decimal::option")]
    pub priority_fee: Option<U256>,
    #[serde(rename = "nonce_EVVM", with = "decimal::option")]
    pub nonce: Option<U256>,
    #[serde(rename = "priorityFlag_EVVM")]
    pub priority_flag: Option<bool>,
    #[serde(rename = "signature_EVVM")]
    pub signature: Option<String>,
}

impl From<Option<&ChainedPayment>> for EvvmPaymentFields {
    fn from(payment: Option<&ChainedPayment>) -> Self {
        match payment {
            Some(p) => Self {
                priority_fee: Some(p.priority_fee),
                nonce: Some(p.nonce),
                priority_flag: Some(p.priority_flag),
                signature: Some(p.signature.clone()),
            },
            None => Self::default(),
        }
    }
}

/// Chained payment keys used by the swap module
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapPaymentFields {
    #[serde(rename = "_priorityFee_Evvm", with = "decimal::option")]
    pub priority_fee: Option<U256>,
    #[serde(rename = "_nonce_Evvm", with = "decimal::option")]
    pub nonce: Option<U256>,
    #[serde(rename = "_priority_Evvm")]
    pub priority_flag: Option<bool>,
    #[serde(rename = "_signature_Evvm")]
    pub signature: Option<String>,
}

impl From<Option<&ChainedPayment>> for SwapPaymentFields {
    fn from(payment: Option<&ChainedPayment>) -> Self {
        let fields = EvvmPaymentFields::from(payment);
        Self {
            priority_fee: fields.priority_fee,
            nonce: fields.nonce,
            priority_flag: fields.priority_flag,
            signature: fields.signature,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::contracts;
    use crate::config::Config;
    use crate::service::evvm::PayParams;
    use crate::testing::{FakeSigner, FAKE_EVVM_ID, FAKE_SYNC_NONCE};

    fn binding(signer: Arc<FakeSigner>) -> ServiceBinding {
        ServiceBinding::new(
            signer,
            "0x9999999999999999999999999999999999999999".parse().unwrap(),
            contracts::evvm().unwrap(),
            1,
        )
    }

    #[tokio::test]
    async fn test_evvm_id_queried_each_time() {
        let signer = Arc::new(FakeSigner::new(1));
        let binding = binding(signer.clone());

        assert_eq!(binding.evvm_id().await.unwrap(), U256::from(FAKE_EVVM_ID));
        assert_eq!(binding.evvm_id().await.unwrap(), U256::from(FAKE_EVVM_ID));
        assert_eq!(signer.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_known_evvm_id_skips_query() {
        let signer = Arc::new(FakeSigner::new(1));
        let binding = binding(signer.clone()).with_evvm_id(U256::from(42));

        assert_eq!(binding.evvm_id().await.unwrap(), U256::from(42));
        assert!(signer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_nonce_helpers() {
        let signer = Arc::new(FakeSigner::new(1));
        let binding = binding(signer.clone());

        assert_eq!(binding.sync_nonce().await.unwrap(), U256::from(FAKE_SYNC_NONCE));
        assert!(binding.is_valid_async_nonce(U256::from(4)).await.unwrap());
        assert!(!binding.is_valid_async_nonce(U256::from(3)).await.unwrap());

        let calls = signer.calls();
        assert_eq!(calls[0].args, vec![json!(signer.address())]);
        assert_eq!(calls[2].args[1], json!("3"));
    }

    #[tokio::test]
    async fn test_view_unknown_function() {
        let binding = binding(Arc::new(FakeSigner::new(1)));
        assert!(matches!(
            binding.view("mint", vec![]).await,
            Err(EvvmError::UnknownFunction(_))
        ));
    }

    fn deployed(evvm_id: Option<u64>) -> Config {
        let mut config = Config::local();
        config.contracts.evvm_id = evvm_id;
        config.contracts.evvm = Some("0x9999999999999999999999999999999999999999".to_string());
        config
    }

    #[tokio::test]
    async fn test_configured_evvm_id_skips_query() {
        let signer = Arc::new(FakeSigner::new(31337));
        let evvm = Evvm::from_config(signer.clone(), &deployed(Some(42))).unwrap();

        assert_eq!(evvm.binding().chain_id(), 31337);
        assert_eq!(evvm.binding().address(), Address::repeat_byte(0x99));

        evvm.pay(PayParams {
            to: Recipient::Identity("alice".to_string()),
            token: Address::zero(),
            amount: U256::from(10),
            priority_fee: U256::zero(),
            nonce: U256::one(),
            priority_flag: false,
            executor: None,
        })
        .await
        .unwrap();

        assert!(signer.calls().iter().all(|call| call.function_name != "getEvvmID"));
        assert!(signer.signed_messages()[0].starts_with("42,pay,alice,"));
    }

    #[tokio::test]
    async fn test_unconfigured_evvm_id_is_queried() {
        let signer = Arc::new(FakeSigner::new(31337));
        let evvm = Evvm::from_config(signer.clone(), &deployed(None)).unwrap();
        assert_eq!(evvm.binding().evvm_id().await.unwrap(), U256::from(FAKE_EVVM_ID));
        assert_eq!(signer.calls()[0].function_name, "getEvvmID");
    }

    #[test]
    fn test_from_config_requires_address() {
        let signer = Arc::new(FakeSigner::new(31337));
        let config = deployed(Some(42));
        assert!(matches!(
            Staking::from_config(signer.clone(), &config),
            Err(EvvmError::ConfigError(msg)) if msg.contains("contracts.staking")
        ));

        let mut bad = config;
        bad.contracts.p2p_swap = Some("0x12".to_string());
        assert!(matches!(
            P2PSwap::from_config(signer, &bad),
            Err(EvvmError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_ensure_network_moves_signer() {
        let signer = Arc::new(FakeSigner::new(5));
        binding(signer.clone()).ensure_network().await.unwrap();
        assert_eq!(signer.switch_calls(), vec![1]);
    }

    #[test]
    fn test_chained_fields_serialize_null_when_absent() {
        let value = serde_json::to_value(EvvmPaymentFields::from(None)).unwrap();
        assert_eq!(
            value,
            json!({
                "priorityFee_EVVM": null,
                "nonce_EVVM": null,
                "priorityFlag_EVVM": null,
                "signature_EVVM": null,
            })
        );

        let payment = ChainedPayment {
            priority_fee: U256::from(10),
            nonce: U256::from(3),
            priority_flag: true,
            signature: "0xabcd".to_string(),
        };
        let value = serde_json::to_value(SwapPaymentFields::from(Some(&payment))).unwrap();
        assert_eq!(
            value,
            json!({
                "_priorityFee_Evvm": "10",
                "_nonce_Evvm": "3",
                "_priority_Evvm": true,
                "_signature_Evvm": "0xabcd",
            })
        );
    }
}
