//! evvm-actions - build, sign and dispatch EVVM protocol actions
//!
//! Every EVVM module (payments, staking, name service, P2P swap) authorizes
//! state changes with an EIP-191 signature over a comma-separated message:
//!
//! ```text
//! {evvmId},{actionName},{field1},{field2},...
//! ```
//!
//! This crate renders those messages, gets them signed by a
//! [`CapabilitySigner`], binds the signature and payload to the contract
//! function as a [`SignedAction`], and submits it on the right chain.
//!
//! # Usage
//!
//! ```no_run
//! use evvm_actions::{connect_signer, execute, Config, Evvm, ExecuteOptions};
//! use evvm_actions::service::evvm::PayParams;
//! use ethers::types::{Address, U256};
//!
//! # async fn run() -> evvm_actions::Result<()> {
//! let config = Config::load(Some("evvm.toml"))?;
//! let key = config.private_key()?;
//! let signer = connect_signer(&config, &key)?;
//!
//! let evvm = Evvm::new(signer.clone(), Address::repeat_byte(0x99), config.contracts.chain_id)?;
//! let pay = evvm
//!     .pay(PayParams {
//!         to: "alice".parse()?,
//!         token: Address::zero(),
//!         amount: U256::from(100),
//!         priority_fee: U256::zero(),
//!         nonce: evvm.sync_nonce().await?,
//!         priority_flag: false,
//!         executor: None,
//!     })
//!     .await?;
//!
//! let tx = execute(signer.as_ref(), &pay, ExecuteOptions::default()).await?;
//! tracing::info!("submitted {:?}", tx);
//! # Ok(())
//! # }
//! ```

pub mod abi;
pub mod action;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod executor;
pub mod logging;
pub mod security;
pub mod service;
pub mod signer;

#[cfg(test)]
pub(crate) mod testing;

pub use action::{ContractRef, SerializedSignedAction, SignedAction};
pub use crate::config::Config;
pub use errors::{EvvmError, Result};
pub use executor::{ensure_network, execute, on_network, Dispatchable, ExecuteOptions};
pub use logging::init_logging;
pub use service::{ChainedPayment, Evvm, NameService, P2PSwap, ServiceBinding, Staking};
pub use signer::{connect_signer, CallDescriptor, CapabilitySigner, EthersSigner, LocalKeySigner, TxHash};
