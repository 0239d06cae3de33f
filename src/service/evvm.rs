//! Core EVVM contract: payments and nonces

use super::ServiceBinding;
use crate::abi::contracts;
use crate::action::codec::decimal;
use crate::action::{CanonicalField, CanonicalFields, SignedAction};
use crate::config::Config;
use crate::errors::{EvvmError, Result};
use crate::signer::CapabilitySigner;
use ethers::abi::Token;
use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::str::FromStr;
use std::sync::Arc;

/// Payment destination: an account or a registered identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Address(Address),
    Identity(String),
}

impl FromStr for Recipient {
    type Err = EvvmError;

    /// `0x...` must be a valid address, anything else is an identity
    fn from_str(raw: &str) -> Result<Self> {
        if raw.starts_with("0x") {
            raw.parse::<Address>()
                .map(Recipient::Address)
                .map_err(|e| EvvmError::InvalidArgument(format!("invalid recipient {}: {}", raw, e)))
        } else {
            Ok(Recipient::Identity(raw.to_string()))
        }
    }
}

impl CanonicalField for Recipient {
    fn render(&self) -> String {
        match self {
            Recipient::Address(address) => address.render(),
            Recipient::Identity(identity) => identity.clone(),
        }
    }
}

/// Arguments of [`Evvm::pay`]
#[derive(Debug, Clone)]
pub struct PayParams {
    pub to: Recipient,
    pub token: Address,
    pub amount: U256,
    pub priority_fee: U256,
    pub nonce: U256,
    pub priority_flag: bool,
    /// Only this account may execute the payment; anyone when `None`
    pub executor: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayData {
    pub from: Address,
    #[serde(rename = "to_address")]
    pub to_address: Option<Address>,
    #[serde(rename = "to_identity")]
    pub to_identity: Option<String>,
    pub token: Address,
    #[serde(with = "decimal")]
    pub amount: U256,
    #[serde(with = "decimal")]
    pub priority_fee: U256,
    #[serde(with = "decimal")]
    pub nonce: U256,
    pub priority_flag: bool,
    pub executor: Address,
    pub signature: String,
}

/// One entry of a `dispersePay` recipient table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisperseRecipient {
    #[serde(with = "decimal")]
    pub amount: U256,
    pub to_address: Option<Address>,
    pub to_identity: Option<String>,
}

impl DisperseRecipient {
    pub fn address(amount: U256, to: Address) -> Self {
        Self {
            amount,
            to_address: Some(to),
            to_identity: None,
        }
    }

    pub fn identity(amount: U256, to: &str) -> Self {
        Self {
            amount,
            to_address: None,
            to_identity: Some(to.to_string()),
        }
    }

    fn check(&self, index: usize) -> Result<()> {
        let has_identity = self.to_identity.as_deref().is_some_and(|id| !id.is_empty());
        let reason = match (self.to_address.is_some(), has_identity) {
            (true, false) | (false, true) => return Ok(()),
            (true, true) => "both an address and an identity",
            (false, false) => "neither an address nor an identity",
        };
        Err(EvvmError::AmbiguousRecipient {
            index,
            reason: reason.to_string(),
        })
    }

    fn token(&self) -> Token {
        Token::Tuple(vec![
            Token::Uint(self.amount),
            Token::Address(self.to_address.unwrap_or_default()),
            Token::String(self.to_identity.clone().unwrap_or_default()),
        ])
    }
}

/// SHA-256 of the ABI encoded `(uint256,address,string)[]` table
pub fn hash_recipients(recipients: &[DisperseRecipient]) -> H256 {
    let table = Token::Array(recipients.iter().map(DisperseRecipient::token).collect());
    H256::from_slice(&Sha256::digest(ethers::abi::encode(&[table])))
}

/// Arguments of [`Evvm::disperse_pay`]
#[derive(Debug, Clone)]
pub struct DispersePayParams {
    pub recipients: Vec<DisperseRecipient>,
    pub token: Address,
    pub amount: U256,
    pub priority_fee: U256,
    pub nonce: U256,
    pub priority_flag: bool,
    pub executor: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispersePayData {
    pub from: Address,
    pub to_data: Vec<DisperseRecipient>,
    pub token: Address,
    #[serde(with = "decimal")]
    pub amount: U256,
    #[serde(with = "decimal")]
    pub priority_fee: U256,
    #[serde(with = "decimal")]
    pub nonce: U256,
    pub priority_flag: bool,
    pub executor: Address,
    pub signature: String,
}

/// The EVVM core contract
#[derive(Clone)]
pub struct Evvm {
    binding: ServiceBinding,
}

impl Evvm {
    pub fn new(signer: Arc<dyn CapabilitySigner>, address: Address, chain_id: u64) -> Result<Self> {
        Ok(Self::from_binding(ServiceBinding::new(
            signer,
            address,
            contracts::evvm()?,
            chain_id,
        )))
    }

    /// Bind to the `contracts.evvm` deployment, reusing a configured EVVM id
    pub fn from_config(signer: Arc<dyn CapabilitySigner>, config: &Config) -> Result<Self> {
        let deployment = &config.contracts;
        let address = deployment.evvm_address()?;
        let abi = contracts::evvm()?;
        ServiceBinding::from_config(signer, abi, "evvm", address, deployment).map(Self::from_binding)
    }

    pub fn from_binding(binding: ServiceBinding) -> Self {
        Self { binding }
    }

    pub fn binding(&self) -> &ServiceBinding {
        &self.binding
    }

    pub async fn sync_nonce(&self) -> Result<U256> {
        self.binding.sync_nonce().await
    }

    pub async fn is_valid_async_nonce(&self, nonce: U256) -> Result<bool> {
        self.binding.is_valid_async_nonce(nonce).await
    }

    /// Balance of `user` in `token`
    pub async fn balance(&self, user: Address, token: Address) -> Result<U256> {
        self.binding
            .view_as("getBalance", vec![json!(user), json!(token)])
            .await
    }

    pub async fn pay(&self, params: PayParams) -> Result<SignedAction<PayData>> {
        let executor = params.executor.unwrap_or_default();
        let fields = CanonicalFields::new()
            .push(&params.to)
            .push(&params.token)
            .push(&params.amount)
            .push(&params.priority_fee)
            .push(&params.nonce)
            .push(&params.priority_flag)
            .push(&executor)
            .render();

        let from = self.binding.signer().address();
        let (to_address, to_identity) = match &params.to {
            Recipient::Address(address) => (Some(*address), None),
            Recipient::Identity(identity) => (None, Some(identity.clone())),
        };

        self.binding
            .sign_action("pay", "pay", fields, |signature| PayData {
                from,
                to_address,
                to_identity: to_identity.clone(),
                token: params.token,
                amount: params.amount,
                priority_fee: params.priority_fee,
                nonce: params.nonce,
                priority_flag: params.priority_flag,
                executor,
                signature,
            })
            .await
    }

    /// Pay several recipients under one signature.
    ///
    /// Every entry must name exactly one of an address or an identity;
    /// otherwise this fails before anything is signed.
    pub async fn disperse_pay(&self, params: DispersePayParams) -> Result<SignedAction<DispersePayData>> {
        for (index, recipient) in params.recipients.iter().enumerate() {
            recipient.check(index)?;
        }

        let executor = params.executor.unwrap_or_default();
        let fields = CanonicalFields::new()
            .push(&hash_recipients(&params.recipients))
            .push(&params.token)
            .push(&params.amount)
            .push(&params.priority_fee)
            .push(&params.nonce)
            .push(&params.priority_flag)
            .push(&executor)
            .render();

        let from = self.binding.signer().address();
        self.binding
            .sign_action("dispersePay", "dispersePay", fields, |signature| DispersePayData {
                from,
                to_data: params.recipients.clone(),
                token: params.token,
                amount: params.amount,
                priority_fee: params.priority_fee,
                nonce: params.nonce,
                priority_flag: params.priority_flag,
                executor,
                signature,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{execute, ExecuteOptions};
    use crate::testing::{fake_signature, FakeSigner, DEV_ADDRESS};
    use serde_json::Value;

    const EVVM_ADDRESS: &str = "0xdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef";
    const TOKEN: &str = "0x2222222222222222222222222222222222222222";

    fn evvm(signer: Arc<FakeSigner>) -> Evvm {
        Evvm::new(signer, EVVM_ADDRESS.parse().unwrap(), 1).unwrap()
    }

    fn pay_params(to: &str) -> PayParams {
        PayParams {
            to: to.parse().unwrap(),
            token: TOKEN.parse().unwrap(),
            amount: U256::from(100),
            priority_fee: U256::zero(),
            nonce: U256::one(),
            priority_flag: false,
            executor: None,
        }
    }

    fn disperse_params(recipients: Vec<DisperseRecipient>) -> DispersePayParams {
        DispersePayParams {
            recipients,
            token: TOKEN.parse().unwrap(),
            amount: U256::from(3),
            priority_fee: U256::zero(),
            nonce: U256::from(9),
            priority_flag: true,
            executor: None,
        }
    }

    #[test]
    fn test_recipient_parsing() {
        assert_eq!(
            "0x1111111111111111111111111111111111111111".parse::<Recipient>().unwrap(),
            Recipient::Address("0x1111111111111111111111111111111111111111".parse().unwrap())
        );
        assert_eq!(
            "alice".parse::<Recipient>().unwrap(),
            Recipient::Identity("alice".to_string())
        );
        assert!(matches!(
            "0xnotanaddress".parse::<Recipient>(),
            Err(EvvmError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_pay_to_address() {
        let signer = Arc::new(FakeSigner::new(1));
        let action = evvm(signer.clone())
            .pay(pay_params("0x1111111111111111111111111111111111111111"))
            .await
            .unwrap();

        assert_eq!(action.function_name(), "pay");
        assert_eq!(action.data().from, DEV_ADDRESS.parse::<Address>().unwrap());
        assert_eq!(action.data().token, TOKEN.parse::<Address>().unwrap());
        assert!(action.data().to_address.is_some());
        assert_eq!(action.data().to_identity, None);
        assert_eq!(action.args().len(), action.function_abi().inputs.len());

        let expected = "777,pay,0x1111111111111111111111111111111111111111,\
                        0x2222222222222222222222222222222222222222,100,0,1,false,\
                        0x0000000000000000000000000000000000000000";
        assert_eq!(signer.signed_messages(), vec![expected.to_string()]);
        assert_eq!(action.data().signature, fake_signature(expected));

        let data = action.serialized_data().unwrap();
        assert_eq!(data["to_identity"], Value::Null);
        assert_eq!(data["amount"], json!("100"));
        assert_eq!(data["executor"], json!("0x0000000000000000000000000000000000000000"));
    }

    #[tokio::test]
    async fn test_pay_to_identity() {
        let signer = Arc::new(FakeSigner::new(1));
        let mut params = pay_params("alice");
        params.amount = U256::from(50);
        params.priority_fee = U256::one();
        params.nonce = U256::from(2);
        params.priority_flag = true;

        let action = evvm(signer.clone()).pay(params).await.unwrap();

        assert_eq!(action.data().to_identity.as_deref(), Some("alice"));
        assert_eq!(action.data().to_address, None);
        assert!(signer.signed_messages()[0].starts_with("777,pay,alice,"));
        assert!(signer.signed_messages()[0].ends_with(",50,1,2,true,0x0000000000000000000000000000000000000000"));
    }

    #[tokio::test]
    async fn test_pay_switches_network_before_signing() {
        let signer = Arc::new(FakeSigner::new(5));
        evvm(signer.clone()).pay(pay_params("alice")).await.unwrap();
        assert_eq!(signer.switch_calls(), vec![1]);

        let signer = Arc::new(FakeSigner::new(5).rejecting_switch());
        let result = evvm(signer.clone()).pay(pay_params("alice")).await;
        assert!(matches!(result, Err(EvvmError::NetworkSwitchFailed { .. })));
        assert!(signer.signed_messages().is_empty());
    }

    #[tokio::test]
    async fn test_disperse_pay() {
        let signer = Arc::new(FakeSigner::new(1));
        let recipients = vec![
            DisperseRecipient::address(U256::one(), "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".parse().unwrap()),
            DisperseRecipient::identity(U256::from(2), "id2"),
        ];
        let hash = hash_recipients(&recipients);

        let action = evvm(signer.clone())
            .disperse_pay(disperse_params(recipients))
            .await
            .unwrap();

        assert_eq!(action.function_name(), "dispersePay");
        assert_eq!(action.data().to_data.len(), 2);
        assert_eq!(action.args().len(), action.function_abi().inputs.len());
        assert_eq!(action.args()[1].as_array().unwrap().len(), 2);

        let message = &signer.signed_messages()[0];
        assert!(message.starts_with(&format!("777,dispersePay,0x{},", hex::encode(hash))));
        assert!(message.ends_with(",3,0,9,true,0x0000000000000000000000000000000000000000"));
    }

    #[tokio::test]
    async fn test_disperse_pay_rejects_ambiguous_recipient() {
        let signer = Arc::new(FakeSigner::new(1));
        let both = DisperseRecipient {
            amount: U256::one(),
            to_address: Some(Address::repeat_byte(0xaa)),
            to_identity: Some("bob".to_string()),
        };
        let neither = DisperseRecipient {
            amount: U256::one(),
            to_address: None,
            to_identity: None,
        };

        let service = evvm(signer.clone());
        let err = service
            .disperse_pay(disperse_params(vec![DisperseRecipient::identity(U256::one(), "a"), both]))
            .await
            .unwrap_err();
        assert!(matches!(err, EvvmError::AmbiguousRecipient { index: 1, .. }));

        let err = service.disperse_pay(disperse_params(vec![neither])).await.unwrap_err();
        assert!(matches!(err, EvvmError::AmbiguousRecipient { index: 0, .. }));

        assert!(signer.signed_messages().is_empty());
        assert!(signer.calls().is_empty());
    }

    #[test]
    fn test_recipient_hash_depends_on_order() {
        let a = DisperseRecipient::identity(U256::one(), "a");
        let b = DisperseRecipient::identity(U256::from(2), "b");
        assert_eq!(hash_recipients(&[a.clone(), b.clone()]), hash_recipients(&[a.clone(), b.clone()]));
        assert_ne!(hash_recipients(&[a.clone(), b.clone()]), hash_recipients(&[b, a]));
    }

    #[tokio::test]
    async fn test_signed_payments_execute_after_transport() {
        let signer = Arc::new(FakeSigner::new(1));
        let service = evvm(signer.clone());

        let pay = service
            .pay(pay_params("0x1111111111111111111111111111111111111111"))
            .await
            .unwrap();
        let disperse = service
            .disperse_pay(disperse_params(vec![
                DisperseRecipient::address(U256::one(), Address::repeat_byte(0x11)),
                DisperseRecipient::identity(U256::from(2), "carol"),
            ]))
            .await
            .unwrap();

        let restored = crate::action::SerializedSignedAction::from_json(&pay.to_json().unwrap()).unwrap();
        execute(signer.as_ref(), &pay, ExecuteOptions::default()).await.unwrap();
        execute(signer.as_ref(), &restored, ExecuteOptions::default()).await.unwrap();
        execute(signer.as_ref(), &disperse, ExecuteOptions::default()).await.unwrap();

        let submitted = signer.submissions();
        assert_eq!(submitted.len(), 3);
        assert_eq!(submitted[0].args, submitted[1].args);
        assert_eq!(submitted[2].function_name, "dispersePay");
    }

    #[tokio::test]
    async fn test_balance_view() {
        let signer = Arc::new(FakeSigner::new(1));
        let balance = evvm(signer.clone())
            .balance(signer.address(), TOKEN.parse().unwrap())
            .await
            .unwrap();
        assert_eq!(balance, U256::from(1_000_000u64));
    }
}
