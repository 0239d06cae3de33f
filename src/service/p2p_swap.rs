//! Peer-to-peer swap module

use super::{ChainedPayment, ServiceBinding, SwapPaymentFields};
use crate::abi::contracts;
use crate::action::codec::decimal;
use crate::action::{CanonicalFields, SignedAction};
use crate::config::Config;
use crate::errors::Result;
use crate::signer::CapabilitySigner;
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Both dispatch variants sign under this name
const DISPATCH_ORDER: &str = "dispatchOrder";

#[derive(Debug, Clone)]
pub struct MakeOrderParams {
    pub user: Option<Address>,
    pub nonce: U256,
    pub token_a: Address,
    pub token_b: Address,
    pub amount_a: U256,
    pub amount_b: U256,
    /// Deposit of `amount_a` into the swap contract
    pub payment: ChainedPayment,
}

#[derive(Debug, Clone)]
pub struct CancelOrderParams {
    pub user: Option<Address>,
    pub nonce: U256,
    pub token_a: Address,
    pub token_b: Address,
    pub order_id: U256,
    pub payment: Option<ChainedPayment>,
}

#[derive(Debug, Clone)]
pub struct DispatchOrderParams {
    pub user: Option<Address>,
    pub nonce: U256,
    pub token_a: Address,
    pub token_b: Address,
    pub order_id: U256,
    pub amount_of_token_b_to_fill: U256,
    pub payment: ChainedPayment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MakeOrderMetadata {
    #[serde(with = "decimal")]
    pub nonce: U256,
    pub token_a: Address,
    pub token_b: Address,
    #[serde(with = "decimal")]
    pub amount_a: U256,
    #[serde(with = "decimal")]
    pub amount_b: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MakeOrderData {
    pub user: Address,
    pub metadata: MakeOrderMetadata,
    pub signature: String,
    #[serde(flatten)]
    pub payment: SwapPaymentFields,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderMetadata {
    #[serde(with = "decimal")]
    pub nonce: U256,
    pub token_a: Address,
    pub token_b: Address,
    #[serde(with = "decimal")]
    pub order_id: U256,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrderData {
    pub user: Address,
    pub metadata: CancelOrderMetadata,
    #[serde(flatten)]
    pub payment: SwapPaymentFields,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOrderMetadata {
    #[serde(with = "decimal")]
    pub nonce: U256,
    pub token_a: Address,
    pub token_b: Address,
    #[serde(with = "decimal")]
    pub order_id: U256,
    #[serde(with = "decimal")]
    pub amount_of_token_b_to_fill: U256,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOrderData {
    pub user: Address,
    pub metadata: DispatchOrderMetadata,
    #[serde(flatten)]
    pub payment: SwapPaymentFields,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOrderFixedFeeData {
    #[serde(flatten)]
    pub order: DispatchOrderData,
    #[serde(with = "decimal")]
    pub max_fill_fixed_fee: U256,
}

#[derive(Clone)]
pub struct P2PSwap {
    binding: ServiceBinding,
}

impl P2PSwap {
    pub fn new(signer: Arc<dyn CapabilitySigner>, address: Address, chain_id: u64) -> Result<Self> {
        Ok(Self::from_binding(ServiceBinding::new(
            signer,
            address,
            contracts::p2p_swap()?,
            chain_id,
        )))
    }

    /// Bind to the `contracts.p2p_swap` deployment, reusing a configured EVVM id
    pub fn from_config(signer: Arc<dyn CapabilitySigner>, config: &Config) -> Result<Self> {
        let deployment = &config.contracts;
        let address = deployment.p2p_swap_address()?;
        let abi = contracts::p2p_swap()?;
        ServiceBinding::from_config(signer, abi, "p2p_swap", address, deployment).map(Self::from_binding)
    }

    pub fn from_binding(binding: ServiceBinding) -> Self {
        Self { binding }
    }

    pub fn binding(&self) -> &ServiceBinding {
        &self.binding
    }

    /// Whether the signer can still use `nonce` for a swap action
    pub async fn is_nonce_available(&self, nonce: U256) -> Result<bool> {
        self.binding
            .view_as(
                "checkIfNonceIsAvailable",
                vec![json!(self.binding.signer().address()), json!(nonce.to_string())],
            )
            .await
    }

    pub async fn make_order(&self, params: MakeOrderParams) -> Result<SignedAction<MakeOrderData>> {
        let fields = CanonicalFields::new()
            .push(&params.nonce)
            .push(&params.token_a)
            .push(&params.token_b)
            .push(&params.amount_a)
            .push(&params.amount_b)
            .render();

        let user = self.binding.user_or_signer(params.user);
        let metadata = MakeOrderMetadata {
            nonce: params.nonce,
            token_a: params.token_a,
            token_b: params.token_b,
            amount_a: params.amount_a,
            amount_b: params.amount_b,
        };
        let payment = SwapPaymentFields::from(Some(&params.payment));

        self.binding
            .sign_action("makeOrder", "makeOrder", fields, |signature| MakeOrderData {
                user,
                metadata: metadata.clone(),
                signature,
                payment: payment.clone(),
            })
            .await
    }

    pub async fn cancel_order(&self, params: CancelOrderParams) -> Result<SignedAction<CancelOrderData>> {
        let fields = CanonicalFields::new()
            .push(&params.nonce)
            .push(&params.token_a)
            .push(&params.token_b)
            .push(&params.order_id)
            .render();

        let user = self.binding.user_or_signer(params.user);
        let payment = SwapPaymentFields::from(params.payment.as_ref());

        self.binding
            .sign_action("cancelOrder", "cancelOrder", fields, |signature| CancelOrderData {
                user,
                metadata: CancelOrderMetadata {
                    nonce: params.nonce,
                    token_a: params.token_a,
                    token_b: params.token_b,
                    order_id: params.order_id,
                    signature,
                },
                payment: payment.clone(),
            })
            .await
    }

    /// Fill an order, paying the fee as a share of the filled amount
    pub async fn dispatch_order_fill_propotional_fee(
        &self,
        params: DispatchOrderParams,
    ) -> Result<SignedAction<DispatchOrderData>> {
        let fields = dispatch_fields(&params);
        let user = self.binding.user_or_signer(params.user);

        self.binding
            .sign_action("dispatchOrder_fillPropotionalFee", DISPATCH_ORDER, fields, |signature| {
                dispatch_data(user, &params, signature)
            })
            .await
    }

    /// Fill an order, paying at most `max_fill_fixed_fee`
    pub async fn dispatch_order_fill_fixed_fee(
        &self,
        params: DispatchOrderParams,
        max_fill_fixed_fee: U256,
    ) -> Result<SignedAction<DispatchOrderFixedFeeData>> {
        let fields = dispatch_fields(&params);
        let user = self.binding.user_or_signer(params.user);

        self.binding
            .sign_action("dispatchOrder_fillFixedFee", DISPATCH_ORDER, fields, |signature| {
                DispatchOrderFixedFeeData {
                    order: dispatch_data(user, &params, signature),
                    max_fill_fixed_fee,
                }
            })
            .await
    }
}

fn dispatch_fields(params: &DispatchOrderParams) -> String {
    CanonicalFields::new()
        .push(&params.nonce)
        .push(&params.token_a)
        .push(&params.token_b)
        .push(&params.order_id)
        .render()
}

fn dispatch_data(user: Address, params: &DispatchOrderParams, signature: String) -> DispatchOrderData {
    DispatchOrderData {
        user,
        metadata: DispatchOrderMetadata {
            nonce: params.nonce,
            token_a: params.token_a,
            token_b: params.token_b,
            order_id: params.order_id,
            amount_of_token_b_to_fill: params.amount_of_token_b_to_fill,
            signature,
        },
        payment: SwapPaymentFields::from(Some(&params.payment)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{execute, ExecuteOptions};
    use crate::testing::{fake_signature, FakeSigner, DEV_ADDRESS};
    use serde_json::Value;

    const TOKEN_A: &str = "0xAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAa";
    const TOKEN_B: &str = "0xbBbBBBBbbBBBbbbBbbBbbbbBBbBbbbbBbBbbBBbB";

    fn swap(signer: Arc<FakeSigner>) -> P2PSwap {
        P2PSwap::new(signer, Address::repeat_byte(0x33), 1).unwrap()
    }

    fn deposit() -> ChainedPayment {
        ChainedPayment {
            priority_fee: U256::from(1),
            nonce: U256::from(100),
            priority_flag: true,
            signature: "0xabcdef".to_string(),
        }
    }

    fn dispatch_params() -> DispatchOrderParams {
        DispatchOrderParams {
            user: None,
            nonce: U256::from(4),
            token_a: TOKEN_A.parse().unwrap(),
            token_b: TOKEN_B.parse().unwrap(),
            order_id: U256::from(12),
            amount_of_token_b_to_fill: U256::from(500),
            payment: deposit(),
        }
    }

    #[tokio::test]
    async fn test_make_order() {
        let signer = Arc::new(FakeSigner::new(1));
        let action = swap(signer.clone())
            .make_order(MakeOrderParams {
                user: None,
                nonce: U256::from(3),
                token_a: TOKEN_A.parse().unwrap(),
                token_b: TOKEN_B.parse().unwrap(),
                amount_a: U256::from(1000),
                amount_b: U256::from(2000),
                payment: deposit(),
            })
            .await
            .unwrap();

        let expected = "777,makeOrder,3,0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa,\
                        0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb,1000,2000";
        assert_eq!(signer.signed_messages(), vec![expected.to_string()]);
        assert_eq!(action.data().user, DEV_ADDRESS.parse::<Address>().unwrap());
        assert_eq!(action.data().signature, fake_signature(expected));

        let metadata = &action.args()[1];
        assert_eq!(metadata["amountA"], json!("1000"));
        assert_eq!(action.args()[3], json!("1"));
        assert_eq!(action.args()[6], json!("0xabcdef"));

        execute(signer.as_ref(), &action, ExecuteOptions::default()).await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_order_without_payment() {
        let signer = Arc::new(FakeSigner::new(1));
        let action = swap(signer.clone())
            .cancel_order(CancelOrderParams {
                user: None,
                nonce: U256::from(5),
                token_a: TOKEN_A.parse().unwrap(),
                token_b: TOKEN_B.parse().unwrap(),
                order_id: U256::from(12),
                payment: None,
            })
            .await
            .unwrap();

        assert!(signer.signed_messages()[0].starts_with("777,cancelOrder,5,"));
        assert!(signer.signed_messages()[0].ends_with(",12"));
        assert_eq!(action.args()[1]["signature"], json!(action.data().metadata.signature));
        for arg in &action.args()[2..] {
            assert_eq!(*arg, Value::Null);
        }

        execute(signer.as_ref(), &action, ExecuteOptions::default()).await.unwrap();
    }

    #[tokio::test]
    async fn test_dispatch_variants_sign_the_same_message() {
        let signer = Arc::new(FakeSigner::new(1));
        let service = swap(signer.clone());

        let proportional = service
            .dispatch_order_fill_propotional_fee(dispatch_params())
            .await
            .unwrap();
        let fixed = service
            .dispatch_order_fill_fixed_fee(dispatch_params(), U256::from(50))
            .await
            .unwrap();

        let messages = signer.signed_messages();
        assert_eq!(messages[0], messages[1]);
        assert!(messages[0].starts_with("777,dispatchOrder,4,"));

        assert_eq!(proportional.function_name(), "dispatchOrder_fillPropotionalFee");
        assert_eq!(fixed.function_name(), "dispatchOrder_fillFixedFee");
        assert_eq!(fixed.args().len(), 7);
        assert_eq!(fixed.args()[6], json!("50"));
        assert_eq!(fixed.args()[1]["amountOfTokenBToFill"], json!("500"));

        execute(signer.as_ref(), &proportional, ExecuteOptions::default()).await.unwrap();
        execute(signer.as_ref(), &fixed, ExecuteOptions::default()).await.unwrap();
    }

    #[tokio::test]
    async fn test_nonce_available() {
        let signer = Arc::new(FakeSigner::new(1));
        assert!(swap(signer).is_nonce_available(U256::from(1)).await.unwrap());
    }
}
