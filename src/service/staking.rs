//! Staking module

use super::{ChainedPayment, EvvmPaymentFields, ServiceBinding};
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

#[derive(Debug, Clone, Default)]
pub struct PresaleStakingParams {
    pub user: Option<Address>,
    pub is_staking: bool,
    /// Signed as 0 when absent
    pub amount_of_staking: Option<U256>,
    pub nonce: U256,
    pub payment: Option<ChainedPayment>,
}

#[derive(Debug, Clone, Default)]
pub struct PublicStakingParams {
    pub user: Option<Address>,
    pub is_staking: bool,
    pub amount_of_staking: U256,
    pub nonce: U256,
    pub payment: Option<ChainedPayment>,
}

#[derive(Debug, Clone, Default)]
pub struct GoldenStakingParams {
    pub is_staking: bool,
    pub amount_of_staking: U256,
    pub payment: Option<ChainedPayment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresaleStakingData {
    pub user: Address,
    pub is_staking: bool,
    #[serde(with = "decimal")]
    pub amount_of_staking: U256,
    #[serde(with = "decimal")]
    pub nonce: U256,
    pub signature: String,
    #[serde(flatten)]
    pub payment: EvvmPaymentFields,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicStakingData {
    pub user: Address,
    pub is_staking: bool,
    #[serde(with = "decimal")]
    pub amount_of_staking: U256,
    #[serde(with = "decimal")]
    pub nonce: U256,
    pub signature: String,
    #[serde(flatten)]
    pub payment: EvvmPaymentFields,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoldenStakingData {
    pub is_staking: bool,
    #[serde(with = "decimal")]
    pub amount_of_staking: U256,
    #[serde(rename = "signature_EVVM")]
    pub signature_evvm: Option<String>,
}

#[derive(Clone)]
pub struct Staking {
    binding: ServiceBinding,
}

impl Staking {
    pub fn new(signer: Arc<dyn CapabilitySigner>, address: Address, chain_id: u64) -> Result<Self> {
        Ok(Self::from_binding(ServiceBinding::new(
            signer,
            address,
            contracts::staking()?,
            chain_id,
        )))
    }

    /// Bind to the `contracts.staking` deployment, reusing a configured EVVM id
    pub fn from_config(signer: Arc<dyn CapabilitySigner>, config: &Config) -> Result<Self> {
        let deployment = &config.contracts;
        let address = deployment.staking_address()?;
        let abi = contracts::staking()?;
        ServiceBinding::from_config(signer, abi, "staking", address, deployment).map(Self::from_binding)
    }

    pub fn from_binding(binding: ServiceBinding) -> Self {
        Self { binding }
    }

    pub fn binding(&self) -> &ServiceBinding {
        &self.binding
    }

    pub async fn amount_staked(&self, user: Address) -> Result<U256> {
        self.binding
            .view_as("getUserAmountStaked", vec![json!(user)])
            .await
    }

    pub async fn presale_staking(&self, params: PresaleStakingParams) -> Result<SignedAction<PresaleStakingData>> {
        let amount_of_staking = params.amount_of_staking.unwrap_or_default();
        let fields = CanonicalFields::new()
            .push(&params.is_staking)
            .push(&amount_of_staking)
            .push(&params.nonce)
            .render();

        let user = self.binding.user_or_signer(params.user);
        let payment = EvvmPaymentFields::from(params.payment.as_ref());

        self.binding
            .sign_action("presaleStaking", "presaleStaking", fields, |signature| {
                PresaleStakingData {
                    user,
                    is_staking: params.is_staking,
                    amount_of_staking,
                    nonce: params.nonce,
                    signature,
                    payment: payment.clone(),
                }
            })
            .await
    }

    pub async fn public_staking(&self, params: PublicStakingParams) -> Result<SignedAction<PublicStakingData>> {
        let fields = CanonicalFields::new()
            .push(&params.is_staking)
            .push(&params.amount_of_staking)
            .push(&params.nonce)
            .render();

        let user = self.binding.user_or_signer(params.user);
        let payment = EvvmPaymentFields::from(params.payment.as_ref());

        self.binding
            .sign_action("publicStaking", "publicStaking", fields, |signature| {
                PublicStakingData {
                    user,
                    is_staking: params.is_staking,
                    amount_of_staking: params.amount_of_staking,
                    nonce: params.nonce,
                    signature,
                    payment: payment.clone(),
                }
            })
            .await
    }

    /// Privileged staking path. Nothing is signed here; the contract only
    /// checks the chained payment's signature.
    pub async fn golden_staking(&self, params: GoldenStakingParams) -> Result<SignedAction<GoldenStakingData>> {
        let data = GoldenStakingData {
            is_staking: params.is_staking,
            amount_of_staking: params.amount_of_staking,
            signature_evvm: params.payment.map(|p| p.signature),
        };
        self.binding.unsigned_action("goldenStaking", data).await
    }
}
