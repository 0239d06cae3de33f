//! Name service module: usernames, offers and custom metadata
//!
//! Every action has the same envelope (user, nonce, signature and the
//! optional chained payment) around a small set of action fields, which are
//! also what the canonical message carries ahead of the nonce.

use super::{ChainedPayment, EvvmPaymentFields, ServiceBinding};
use crate::abi::contracts;
use crate::action::codec::decimal;
use crate::action::{CanonicalFields, SignedAction};
use crate::config::Config;
use crate::errors::Result;
use crate::signer::CapabilitySigner;
use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Action fields signed ahead of the nonce, in message order
pub trait NameServiceFields: Serialize + Clone {
    fn canonical(&self) -> CanonicalFields;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreRegistration {
    pub hash_pre_registered_username: H256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub username: String,
    #[serde(with = "decimal")]
    pub clow_number: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub username: String,
    #[serde(with = "decimal")]
    pub expire_date: U256,
    #[serde(with = "decimal")]
    pub amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferRef {
    pub username: String,
    #[serde(rename = "offerID", with = "decimal")]
    pub offer_id: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Username {
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomMetadata {
    pub identity: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomMetadataRef {
    pub identity: String,
    #[serde(with = "decimal")]
    pub key: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub identity: String,
}

impl NameServiceFields for PreRegistration {
    fn canonical(&self) -> CanonicalFields {
        CanonicalFields::new().push(&self.hash_pre_registered_username)
    }
}

impl NameServiceFields for Registration {
    fn canonical(&self) -> CanonicalFields {
        CanonicalFields::new().push(&self.username).push(&self.clow_number)
    }
}

impl NameServiceFields for Offer {
    fn canonical(&self) -> CanonicalFields {
        CanonicalFields::new()
            .push(&self.username)
            .push(&self.expire_date)
            .push(&self.amount)
    }
}

impl NameServiceFields for OfferRef {
    fn canonical(&self) -> CanonicalFields {
        CanonicalFields::new().push(&self.username).push(&self.offer_id)
    }
}

impl NameServiceFields for Username {
    fn canonical(&self) -> CanonicalFields {
        CanonicalFields::new().push(&self.username)
    }
}

impl NameServiceFields for CustomMetadata {
    fn canonical(&self) -> CanonicalFields {
        CanonicalFields::new().push(&self.identity).push(&self.value)
    }
}

impl NameServiceFields for CustomMetadataRef {
    fn canonical(&self) -> CanonicalFields {
        CanonicalFields::new().push(&self.identity).push(&self.key)
    }
}

impl NameServiceFields for Identity {
    fn canonical(&self) -> CanonicalFields {
        CanonicalFields::new().push(&self.identity)
    }
}

/// Envelope shared by every name service action
#[derive(Debug, Clone, Default)]
pub struct NameServiceParams {
    /// Defaults to the signer
    pub user: Option<Address>,
    pub nonce: U256,
    pub payment: Option<ChainedPayment>,
}

impl NameServiceParams {
    pub fn new(nonce: U256) -> Self {
        Self {
            nonce,
            ..Self::default()
        }
    }

    pub fn with_payment(mut self, payment: ChainedPayment) -> Self {
        self.payment = Some(payment);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameServiceData<F> {
    pub user: Address,
    #[serde(flatten)]
    pub fields: F,
    #[serde(with = "decimal")]
    pub nonce: U256,
    pub signature: String,
    #[serde(flatten)]
    pub payment: EvvmPaymentFields,
}

pub type NameServiceAction<F> = SignedAction<NameServiceData<F>>;

#[derive(Clone)]
pub struct NameService {
    binding: ServiceBinding,
}

impl NameService {
    pub fn new(signer: Arc<dyn CapabilitySigner>, address: Address, chain_id: u64) -> Result<Self> {
        Ok(Self::from_binding(ServiceBinding::new(
            signer,
            address,
            contracts::name_service()?,
            chain_id,
        )))
    }

    /// Bind to the `contracts.name_service` deployment, reusing a configured EVVM id
    pub fn from_config(signer: Arc<dyn CapabilitySigner>, config: &Config) -> Result<Self> {
        let deployment = &config.contracts;
        let address = deployment.name_service_address()?;
        let abi = contracts::name_service()?;
        ServiceBinding::from_config(signer, abi, "name_service", address, deployment).map(Self::from_binding)
    }

    pub fn from_binding(binding: ServiceBinding) -> Self {
        Self { binding }
    }

    pub fn binding(&self) -> &ServiceBinding {
        &self.binding
    }

    /// Owner of a registered username
    pub async fn owner_of(&self, username: &str) -> Result<Address> {
        self.binding
            .view_as("getOwnerOfIdentity", vec![json!(username)])
            .await
    }

    pub async fn pre_registration_username(
        &self,
        hash_pre_registered_username: H256,
        params: NameServiceParams,
    ) -> Result<NameServiceAction<PreRegistration>> {
        let fields = PreRegistration {
            hash_pre_registered_username,
        };
        self.sign("preRegistrationUsername", fields, params).await
    }

    pub async fn registration_username(
        &self,
        username: &str,
        clow_number: U256,
        params: NameServiceParams,
    ) -> Result<NameServiceAction<Registration>> {
        let fields = Registration {
            username: username.to_string(),
            clow_number,
        };
        self.sign("registrationUsername", fields, params).await
    }

    pub async fn make_offer(
        &self,
        username: &str,
        expire_date: U256,
        amount: U256,
        params: NameServiceParams,
    ) -> Result<NameServiceAction<Offer>> {
        let fields = Offer {
            username: username.to_string(),
            expire_date,
            amount,
        };
        self.sign("makeOffer", fields, params).await
    }

    pub async fn withdraw_offer(
        &self,
        username: &str,
        offer_id: U256,
        params: NameServiceParams,
    ) -> Result<NameServiceAction<OfferRef>> {
        let fields = OfferRef {
            username: username.to_string(),
            offer_id,
        };
        self.sign("withdrawOffer", fields, params).await
    }

    pub async fn accept_offer(
        &self,
        username: &str,
        offer_id: U256,
        params: NameServiceParams,
    ) -> Result<NameServiceAction<OfferRef>> {
        let fields = OfferRef {
            username: username.to_string(),
            offer_id,
        };
        self.sign("acceptOffer", fields, params).await
    }

    pub async fn renew_username(
        &self,
        username: &str,
        params: NameServiceParams,
    ) -> Result<NameServiceAction<Username>> {
        let fields = Username {
            username: username.to_string(),
        };
        self.sign("renewUsername", fields, params).await
    }

    pub async fn add_custom_metadata(
        &self,
        identity: &str,
        value: &str,
        params: NameServiceParams,
    ) -> Result<NameServiceAction<CustomMetadata>> {
        let fields = CustomMetadata {
            identity: identity.to_string(),
            value: value.to_string(),
        };
        self.sign("addCustomMetadata", fields, params).await
    }

    pub async fn remove_custom_metadata(
        &self,
        identity: &str,
        key: U256,
        params: NameServiceParams,
    ) -> Result<NameServiceAction<CustomMetadataRef>> {
        let fields = CustomMetadataRef {
            identity: identity.to_string(),
            key,
        };
        self.sign("removeCustomMetadata", fields, params).await
    }

    pub async fn flush_custom_metadata(
        &self,
        identity: &str,
        params: NameServiceParams,
    ) -> Result<NameServiceAction<Identity>> {
        let fields = Identity {
            identity: identity.to_string(),
        };
        self.sign("flushCustomMetadata", fields, params).await
    }

    pub async fn flush_username(
        &self,
        username: &str,
        params: NameServiceParams,
    ) -> Result<NameServiceAction<Username>> {
        let fields = Username {
            username: username.to_string(),
        };
        self.sign("flushUsername", fields, params).await
    }

    async fn sign<F: NameServiceFields>(
        &self,
        function_name: &str,
        fields: F,
        params: NameServiceParams,
    ) -> Result<NameServiceAction<F>> {
        let message = fields.canonical().push(&params.nonce).render();
        let user = self.binding.user_or_signer(params.user);
        let payment = EvvmPaymentFields::from(params.payment.as_ref());

        self.binding
            .sign_action(function_name, function_name, message, |signature| NameServiceData {
                user,
                fields: fields.clone(),
                nonce: params.nonce,
                signature,
                payment: payment.clone(),
            })
            .await
    }
}
