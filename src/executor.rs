//! Chain-aware dispatch
//!
//! Every signing and every submission happens on the chain the target
//! contract lives on. [`on_network`] moves the signer there first and
//! refuses to run the operation if it cannot.

use crate::abi::Abi;
use crate::action::{SerializedSignedAction, SignedAction};
use crate::errors::{EvvmError, Result};
use crate::signer::{CallDescriptor, CapabilitySigner, TxHash};
use ethers::types::U256;
use serde::Serialize;
use std::borrow::Cow;
use std::future::Future;
use tracing::{debug, info};

/// Per-execution overrides
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOptions {
    /// Gas limit, estimated by the back end when absent
    pub gas: Option<U256>,
}

impl ExecuteOptions {
    pub fn with_gas(gas: U256) -> Self {
        Self { gas: Some(gas) }
    }
}

/// Anything [`execute`] can dispatch
pub trait Dispatchable {
    fn transport_form(&self) -> Result<Cow<'_, SerializedSignedAction>>;
}

impl<T: Serialize> Dispatchable for SignedAction<T> {
    fn transport_form(&self) -> Result<Cow<'_, SerializedSignedAction>> {
        Ok(Cow::Owned(self.to_transport_form()?))
    }
}

impl Dispatchable for SerializedSignedAction {
    fn transport_form(&self) -> Result<Cow<'_, SerializedSignedAction>> {
        Ok(Cow::Borrowed(self))
    }
}

/// Bring `signer` onto `required`, switching at most once
pub async fn ensure_network(signer: &dyn CapabilitySigner, required: u64) -> Result<()> {
    let active = signer.active_network().await?;
    if active == required {
        return Ok(());
    }

    info!("Switching signer from chain {} to {}", active, required);
    signer
        .switch_network(required)
        .await
        .map_err(|e| EvvmError::NetworkSwitchFailed {
            chain_id: required,
            reason: e.to_string(),
        })?;

    let actual = signer.active_network().await?;
    if actual != required {
        return Err(EvvmError::NetworkMismatch {
            expected: required,
            actual,
        });
    }
    Ok(())
}

/// Run `op` only once the signer is on `required`
pub async fn on_network<F, Fut, R>(signer: &dyn CapabilitySigner, required: u64, op: F) -> Result<R>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<R>>,
{
    ensure_network(signer, required).await?;
    op().await
}

/// Submit a signed action through `signer` on the action's chain
pub async fn execute<A>(signer: &dyn CapabilitySigner, action: &A, opts: ExecuteOptions) -> Result<TxHash>
where
    A: Dispatchable + ?Sized,
{
    let form = action.transport_form()?;

    on_network(signer, form.chain_id, move || async move {
        let descriptor = CallDescriptor {
            contract_address: form.contract_address,
            interface: Abi::new(vec![form.function_abi.clone()]),
            function_name: form.function_name.clone(),
            args: form.args.clone(),
            gas: opts.gas,
        };

        debug!(
            "Executing {} on {:?} (chain {})",
            form.function_name, form.contract_address, form.chain_id
        );
        let tx_hash = signer.submit(&descriptor).await?;
        info!("Executed {}: {:?}", form.function_name, tx_hash);
        Ok(tx_hash)
    })
    .await
}
