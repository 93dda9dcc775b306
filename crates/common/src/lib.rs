//! Shared types and utilities for the drip faucet workspace.

pub mod config_loader;
pub mod logging;
pub mod types;

pub use config_loader::load_config;
pub use types::{is_evm_network, Balance, NetworkDenomPair, NodeStatus, TxInfo};
