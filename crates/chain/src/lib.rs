//! Chain client capability set.
//!
//! The faucet core never talks to a blockchain node directly; it goes
//! through [`NetworkClient`], with one concrete implementation per
//! chain family. Selection happens at configuration time via
//! [`ClientKind`].

pub mod cosmos;
pub mod error;
pub mod substrate;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use drip_common::{Balance, NetworkDenomPair, NodeStatus, TxInfo};

pub use cosmos::{CosmosClient, CosmosConfig};
pub use error::{ChainError, ChainResult};
pub use substrate::{SubstrateClient, SubstrateConfig};

/// Which chain family a configured environment talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientKind {
    Cosmos,
    Substrate,
}

/// Capability set the faucet core consumes.
#[async_trait]
pub trait NetworkClient: Send + Sync {
    /// Balance of `address` for one denom.
    async fn get_balance(&self, address: &str, denom: &str) -> ChainResult<Balance>;

    /// All balances held by `address`.
    async fn get_balances(&self, address: &str) -> ChainResult<Vec<Balance>>;

    /// Node status summary.
    async fn get_node_status(&self) -> ChainResult<NodeStatus>;

    /// Details of a confirmed transfer transaction.
    async fn get_tx_info(&self, hash: &str) -> ChainResult<TxInfo>;

    /// Submit a transfer; returns the transaction hash.
    async fn send(&self, sender: &str, recipient: &str, amount: &str, fee: u64)
        -> ChainResult<String>;

    /// Fails with [`ChainError::InvalidAddress`] when `address` does
    /// not parse for this chain family.
    async fn check_address(&self, address: &str) -> ChainResult<()>;

    /// Normalizes one address encoding to the chain's canonical form
    /// (e.g. `0x...` to bech32). Already-canonical addresses pass
    /// through unchanged.
    async fn resolve_display_address(&self, address: &str) -> ChainResult<String>;

    /// The denomination directory: which denom the faucet dispenses
    /// for each known network id. With `include_original`, bridged
    /// denoms are traced back to their base form.
    async fn list_denominations(&self, include_original: bool)
        -> ChainResult<Vec<NetworkDenomPair>>;
}
