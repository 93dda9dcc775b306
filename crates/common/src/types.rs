//! Chain-facing data types shared across the workspace.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single token balance as reported by a chain node.
///
/// `amount` is kept as the node's decimal string; callers that need
/// arithmetic parse it on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub denom: String,
    pub amount: String,
    /// The on-chain denom before resolving a bridged (`ibc/...`)
    /// representation back to its base form. Equal to `denom` for
    /// native assets.
    #[serde(default)]
    pub original_denom: Option<String>,
}

impl Balance {
    pub fn new(denom: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            denom: denom.into(),
            amount: amount.into(),
            original_denom: None,
        }
    }

    /// The denom to use when talking to the node.
    pub fn original_denom(&self) -> &str {
        self.original_denom.as_deref().unwrap_or(&self.denom)
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Node status summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStatus {
    pub moniker: String,
    pub chain: String,
    pub last_block: u64,
    pub syncing: bool,
}

/// One entry of the faucet's denomination directory: which denom is
/// dispensed for requests targeting `network_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDenomPair {
    pub network_id: String,
    pub denom: String,
    #[serde(default)]
    pub original_denom: Option<String>,
}

impl NetworkDenomPair {
    pub fn original_denom(&self) -> &str {
        self.original_denom.as_deref().unwrap_or(&self.denom)
    }
}

/// Decoded transfer transaction details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxInfo {
    pub height: u64,
    pub sender: String,
    pub receiver: String,
    pub amount: String,
}

static EVM_NETWORK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[^_-]+_[0-9]+[_-][0-9]+$").expect("static regex"));

/// Whether a network id follows the EVM rollapp naming scheme
/// (`name_EIP155-id[_-]revision`).
pub fn is_evm_network(network_id: &str) -> bool {
    EVM_NETWORK_RE.is_match(network_id)
}
