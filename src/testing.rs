//! Recording signer for unit tests

use crate::errors::{EvvmError, Result};
use crate::signer::{CallDescriptor, CapabilitySigner, Coercion, TxHash};
use async_trait::async_trait;
use ethers::abi::Token;
use ethers::types::{Address, U256};
use std::sync::Mutex;

/// Anvil's first development account
pub const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const DEV_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

pub const FAKE_EVVM_ID: u64 = 777;
pub const FAKE_SYNC_NONCE: u64 = 5;
/// The only async nonce the fake reports as used
pub const USED_ASYNC_NONCE: &str = "3";

/// What [`FakeSigner`] returns for `message`: its bytes as `0x` hex
pub fn fake_signature(message: &str) -> String {
    format!("0x{}", hex::encode(message.as_bytes()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SwitchBehaviour {
    Comply,
    Reject,
    Ignore,
}

/// Records every signing request, network switch and submission.
///
/// Arguments of calls and submissions are ABI encoded before being
/// recorded, so a payload that would not encode fails here too.
pub struct FakeSigner {
    address: Address,
    chain_id: Mutex<u64>,
    switch: SwitchBehaviour,
    signed: Mutex<Vec<String>>,
    switches: Mutex<Vec<u64>>,
    calls: Mutex<Vec<CallDescriptor>>,
    submitted: Mutex<Vec<CallDescriptor>>,
}

impl FakeSigner {
    pub fn new(chain_id: u64) -> Self {
        Self {
            address: DEV_ADDRESS.parse().unwrap(),
            chain_id: Mutex::new(chain_id),
            switch: SwitchBehaviour::Comply,
            signed: Mutex::new(Vec::new()),
            switches: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
        }
    }

    /// Every `switch_network` call fails, as if the user declined
    pub fn rejecting_switch(mut self) -> Self {
        self.switch = SwitchBehaviour::Reject;
        self
    }

    /// `switch_network` reports success but the chain stays the same
    pub fn ignoring_switch(mut self) -> Self {
        self.switch = SwitchBehaviour::Ignore;
        self
    }

    pub fn signed_messages(&self) -> Vec<String> {
        self.signed.lock().unwrap().clone()
    }

    pub fn switch_calls(&self) -> Vec<u64> {
        self.switches.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<CallDescriptor> {
        self.calls.lock().unwrap().clone()
    }

    pub fn submissions(&self) -> Vec<CallDescriptor> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl CapabilitySigner for FakeSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn active_network(&self) -> Result<u64> {
        Ok(*self.chain_id.lock().unwrap())
    }

    async fn switch_network(&self, chain_id: u64) -> Result<()> {
        self.switches.lock().unwrap().push(chain_id);
        match self.switch {
            SwitchBehaviour::Comply => {
                *self.chain_id.lock().unwrap() = chain_id;
                Ok(())
            }
            SwitchBehaviour::Reject => Err(EvvmError::SigningFailed(
                "user rejected the request".to_string(),
            )),
            SwitchBehaviour::Ignore => Ok(()),
        }
    }

    async fn sign_message(&self, message: &str) -> Result<String> {
        self.signed.lock().unwrap().push(message.to_string());
        Ok(fake_signature(message))
    }

    async fn call(&self, descriptor: &CallDescriptor) -> Result<Vec<Token>> {
        descriptor.calldata(Coercion::Typed)?;
        self.calls.lock().unwrap().push(descriptor.clone());

        let tokens = match descriptor.function_name.as_str() {
            "getEvvmID" => vec![Token::Uint(U256::from(FAKE_EVVM_ID))],
            "getNextCurrentSyncNonce" => vec![Token::Uint(U256::from(FAKE_SYNC_NONCE))],
            "getIfUsedAsyncNonce" => {
                let used = descriptor.args.get(1).and_then(|v| v.as_str()) == Some(USED_ASYNC_NONCE);
                vec![Token::Bool(used)]
            }
            "checkIfNonceIsAvailable" => vec![Token::Bool(true)],
            "getBalance" => vec![Token::Uint(U256::from(1_000_000u64))],
            "getUserAmountStaked" => vec![Token::Uint(U256::from(2))],
            "getOwnerOfIdentity" => vec![Token::Address(self.address)],
            other => return Err(EvvmError::UnknownFunction(other.to_string())),
        };
        Ok(tokens)
    }

    async fn submit(&self, descriptor: &CallDescriptor) -> Result<TxHash> {
        descriptor.calldata(Coercion::Typed)?;
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(descriptor.clone());
        Ok(TxHash::from_low_u64_be(submitted.len() as u64))
    }
}
