//! Signed actions and their transport form
//!
//! A [`SignedAction`] binds a signed payload to one function of a contract
//! interface description. The ordered argument list and the function
//! descriptor are derived once, at construction, and carried unchanged into
//! the [`SerializedSignedAction`] that crosses process boundaries.

pub mod canonical;
pub mod codec;

use crate::abi::{Abi, AbiItem};
use crate::errors::{EvvmError, Result};
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use canonical::{CanonicalField, CanonicalFields};

/// The deployed contract an action targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractRef {
    pub address: Address,
    pub chain_id: u64,
}

/// Signed protocol action, ready to be executed by anyone holding it
#[derive(Debug, Clone)]
pub struct SignedAction<T> {
    contract: ContractRef,
    evvm_id: U256,
    function_name: String,
    data: T,
    function_abi: AbiItem,
    args: Vec<Value>,
}

impl<T: Serialize> SignedAction<T> {
    /// Bind `data` to `function_name` of `abi`.
    ///
    /// Fails with `NoSuchFunction` if the function is missing or has an
    /// unnamed input, and with `MissingField` if the payload has no key for
    /// one of the inputs. Keys holding `null` count as present.
    pub fn new(
        contract: ContractRef,
        abi: &Abi,
        evvm_id: U256,
        function_name: &str,
        data: T,
    ) -> Result<Self> {
        let function_abi = resolve_function(abi, function_name)?.clone();
        let serialized = serialize_payload(&data)?;
        let args = derive_args(&function_abi, &serialized)?;

        Ok(Self {
            contract,
            evvm_id,
            function_name: function_name.to_string(),
            data,
            function_abi,
            args,
        })
    }

    /// Payload with every big integer rendered as a decimal string
    pub fn serialized_data(&self) -> Result<Value> {
        serialize_payload(&self.data)
    }

    /// Portable form, executable without the typed payload
    pub fn to_transport_form(&self) -> Result<SerializedSignedAction> {
        Ok(SerializedSignedAction {
            chain_id: self.contract.chain_id,
            evvm_id: self.evvm_id.to_string(),
            function_name: self.function_name.clone(),
            function_abi: self.function_abi.clone(),
            contract_address: self.contract.address,
            data: self.serialized_data()?,
            args: self.args.clone(),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        self.to_transport_form()?.to_json()
    }
}

impl<T> SignedAction<T> {
    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn function_abi(&self) -> &AbiItem {
        &self.function_abi
    }

    pub fn evvm_id(&self) -> U256 {
        self.evvm_id
    }

    pub fn contract(&self) -> ContractRef {
        self.contract
    }
}

/// Transport form of a [`SignedAction`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedSignedAction {
    pub chain_id: u64,
    #[serde(default)]
    pub evvm_id: String,
    pub function_name: String,
    pub function_abi: AbiItem,
    pub contract_address: Address,
    pub data: Value,
    pub args: Vec<Value>,
}

impl SerializedSignedAction {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Domain id the action was signed for
    pub fn evvm_id(&self) -> Result<U256> {
        codec::decimal::parse(&self.evvm_id)
            .map_err(|e| EvvmError::Serialization(format!("invalid evvmId '{}': {}", self.evvm_id, e)))
    }
}

/// Find a function descriptor by exact name, rejecting unnamed inputs
pub fn resolve_function<'a>(abi: &'a Abi, function_name: &str) -> Result<&'a AbiItem> {
    let function = abi.function(function_name).ok_or_else(|| {
        EvvmError::NoSuchFunction(format!("no function signature with name {}", function_name))
    })?;

    if let Some(index) = function.inputs.iter().position(|input| input.name.is_empty()) {
        return Err(EvvmError::NoSuchFunction(format!(
            "ABI input at index {} for function {} has empty name",
            index, function_name
        )));
    }

    Ok(function)
}

/// Serialize a payload into its transport representation (a JSON object)
pub fn serialize_payload<T: Serialize>(data: &T) -> Result<Value> {
    match serde_json::to_value(data)? {
        value @ Value::Object(_) => Ok(value),
        other => Err(EvvmError::Serialization(format!(
            "action payload must serialize to an object, got {}",
            other
        ))),
    }
}

fn derive_args(function: &AbiItem, serialized: &Value) -> Result<Vec<Value>> {
    let fields = serialized
        .as_object()
        .ok_or_else(|| EvvmError::Serialization("action payload is not an object".into()))?;

    function
        .inputs
        .iter()
        .map(|input| {
            fields
                .get(&input.name)
                .cloned()
                .ok_or_else(|| EvvmError::MissingField {
                    field: input.name.clone(),
                    function: function.name.clone(),
                })
        })
        .collect()
}
