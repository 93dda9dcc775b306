//! Faucet configuration model.
//!
//! One [`EnvConfig`] per chain environment; immutable after load.

use serde::Deserialize;

use drip_chain::cosmos::{BridgedDenom, CosmosConfig};
use drip_chain::substrate::SubstrateConfig;
use drip_chain::ClientKind;
use drip_common::is_evm_network;

/// Top-level service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FaucetConfig {
    /// Bind address of the chat-webhook server.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Outbound webhook that receives asynchronous worker replies.
    /// When unset, replies are only logged.
    #[serde(default)]
    pub outbound_webhook: Option<String>,

    /// Path of the append-only transfer audit log.
    #[serde(default = "default_audit_log")]
    pub audit_log: String,

    /// Requester identities that bypass the rate-limit gate. They
    /// still consume the daily cap.
    #[serde(default)]
    pub privileged_requesters: Vec<String>,

    /// Configured chain environments.
    pub envs: Vec<EnvConfig>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_audit_log() -> String {
    "transactions.csv".to_string()
}

/// One chain environment the faucet serves.
#[derive(Debug, Clone, Deserialize)]
pub struct EnvConfig {
    /// Short key identifying this env in logs and status output.
    pub key: String,
    pub network_name: String,
    /// Chain id of the hub this env's node runs.
    pub chain_id: String,
    pub client: ClientKind,

    pub faucet_address: String,
    pub address_prefix: String,

    pub node_rpc: String,
    #[serde(default)]
    pub node_executable: String,
    pub node_denom: String,

    pub amount_to_send: u128,
    #[serde(default)]
    pub amount_to_send_evm: u128,
    pub daily_cap: u128,
    #[serde(default)]
    pub daily_cap_evm: u128,
    pub tx_fees: u64,

    #[serde(default)]
    pub block_explorer_tx: String,

    /// Window cap for requests targeting the hub chain itself.
    pub token_requests_cap: u32,
    /// Window cap for requests targeting bridged networks; falls back
    /// to `token_requests_cap` when zero.
    #[serde(default)]
    pub ibc_token_requests_cap: u32,

    /// Admission window length in seconds.
    pub request_timeout_secs: u64,

    /// Chat channels this env listens on.
    pub channels_to_listen: Vec<String>,

    #[serde(default)]
    pub bridged_denoms: Vec<BridgedDenom>,
}

impl EnvConfig {
    /// Whether `network_id` is an EVM rollapp from this env's point of
    /// view. The hub chain itself is never treated as EVM even when
    /// its id matches the naming scheme.
    pub fn is_evm(&self, network_id: &str) -> bool {
        network_id != self.chain_id && is_evm_network(network_id)
    }

    /// Amount dispensed per request on `network_id`.
    pub fn amount_for(&self, network_id: &str) -> u128 {
        if self.is_evm(network_id) && self.amount_to_send_evm != 0 {
            self.amount_to_send_evm
        } else {
            self.amount_to_send
        }
    }

    /// Daily issuance cap for `network_id`.
    pub fn daily_cap_for(&self, network_id: &str) -> u128 {
        if self.is_evm(network_id) && self.daily_cap_evm != 0 {
            self.daily_cap_evm
        } else {
            self.daily_cap
        }
    }

    /// Per-principal window cap for `network_id`: the native cap on
    /// the hub chain, the bridged cap elsewhere.
    pub fn requests_cap_for(&self, network_id: &str) -> u32 {
        if network_id == self.chain_id || self.ibc_token_requests_cap == 0 {
            self.token_requests_cap
        } else {
            self.ibc_token_requests_cap
        }
    }

    pub fn request_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.request_timeout_secs as i64)
    }

    pub fn cosmos_config(&self) -> CosmosConfig {
        CosmosConfig {
            executable: self.node_executable.clone(),
            node_rpc: self.node_rpc.clone(),
            chain_id: self.chain_id.clone(),
            denom: self.node_denom.clone(),
            bridged_denoms: self.bridged_denoms.clone(),
        }
    }

    pub fn substrate_config(&self) -> SubstrateConfig {
        SubstrateConfig {
            rpc_url: self.node_rpc.clone(),
            moniker: self.network_name.clone(),
        }
    }
}
