//! Substrate-family chain client.
//!
//! Talks JSON-RPC to the node over HTTP. Only the status capability is
//! implemented; the remaining operations report
//! [`ChainError::Unsupported`] until a Substrate faucet environment
//! needs them.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use drip_common::{Balance, NetworkDenomPair, NodeStatus, TxInfo};

use crate::error::{ChainError, ChainResult};
use crate::NetworkClient;

/// Settings for one Substrate node connection.
#[derive(Debug, Clone, Deserialize)]
pub struct SubstrateConfig {
    /// HTTP JSON-RPC endpoint.
    pub rpc_url: String,
    /// Node moniker to report in status replies; Substrate nodes do
    /// not expose one over RPC.
    #[serde(default)]
    pub moniker: String,
}

pub struct SubstrateClient {
    config: SubstrateConfig,
    client: reqwest::Client,
}

impl SubstrateClient {
    pub fn new(config: SubstrateConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    async fn call(&self, method: &str, params: Value) -> ChainResult<Value> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        debug!(method, "substrate rpc call");
        let response = self
            .client
            .post(&self.config.rpc_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ChainError::Rpc(format!("request failed: {e}")))?;

        let json: Value = response
            .json()
            .await
            .map_err(|e| ChainError::Rpc(format!("invalid response: {e}")))?;

        if let Some(error) = json.get("error") {
            return Err(ChainError::Rpc(error.to_string()));
        }

        Ok(json.get("result").cloned().unwrap_or(Value::Null))
    }
}

#[async_trait::async_trait]
impl NetworkClient for SubstrateClient {
    async fn get_balance(&self, _address: &str, _denom: &str) -> ChainResult<Balance> {
        Err(ChainError::Unsupported("get_balance"))
    }

    async fn get_balances(&self, _address: &str) -> ChainResult<Vec<Balance>> {
        Err(ChainError::Unsupported("get_balances"))
    }

    async fn get_node_status(&self) -> ChainResult<NodeStatus> {
        let chain = self.call("system_chain", serde_json::json!([])).await?;
        let health = self.call("system_health", serde_json::json!([])).await?;
        let header = self.call("chain_getHeader", serde_json::json!([])).await?;

        let last_block = header["number"]
            .as_str()
            .and_then(|n| u64::from_str_radix(n.trim_start_matches("0x"), 16).ok())
            .ok_or_else(|| ChainError::Parse("missing block number in header".to_string()))?;

        Ok(NodeStatus {
            moniker: self.config.moniker.clone(),
            chain: chain.as_str().unwrap_or_default().to_string(),
            last_block,
            syncing: health["isSyncing"].as_bool().unwrap_or(false),
        })
    }

    async fn get_tx_info(&self, _hash: &str) -> ChainResult<TxInfo> {
        Err(ChainError::Unsupported("get_tx_info"))
    }

    async fn send(
        &self,
        _sender: &str,
        _recipient: &str,
        _amount: &str,
        _fee: u64,
    ) -> ChainResult<String> {
        Err(ChainError::Unsupported("send"))
    }

    async fn check_address(&self, address: &str) -> ChainResult<()> {
        // SS58 addresses are base58 and between 46 and 48 characters
        // for the common network prefixes.
        if address.len() < 46 || address.len() > 48 {
            return Err(ChainError::InvalidAddress(format!(
                "unexpected SS58 length {}",
                address.len()
            )));
        }
        Ok(())
    }

    async fn resolve_display_address(&self, address: &str) -> ChainResult<String> {
        Ok(address.to_string())
    }

    async fn list_denominations(
        &self,
        _include_original: bool,
    ) -> ChainResult<Vec<NetworkDenomPair>> {
        Err(ChainError::Unsupported("list_denominations"))
    }
}
