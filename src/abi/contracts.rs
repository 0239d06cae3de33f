//! Interface descriptions of the EVVM protocol modules

use super::Abi;
use crate::errors::Result;

const EVVM_JSON: &str = include_str!("json/evvm.json");
const STAKING_JSON: &str = include_str!("json/staking.json");
const NAME_SERVICE_JSON: &str = include_str!("json/name_service.json");
const P2P_SWAP_JSON: &str = include_str!("json/p2p_swap.json");

/// Core EVVM contract (payments and nonces)
pub fn evvm() -> Result<Abi> {
    Abi::from_json(EVVM_JSON)
}

/// Staking module
pub fn staking() -> Result<Abi> {
    Abi::from_json(STAKING_JSON)
}

/// Name service module (usernames, offers, custom metadata)
pub fn name_service() -> Result<Abi> {
    Abi::from_json(NAME_SERVICE_JSON)
}

/// Peer-to-peer swap module
pub fn p2p_swap() -> Result<Abi> {
    Abi::from_json(P2P_SWAP_JSON)
}
