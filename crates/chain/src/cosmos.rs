//! Cosmos-family chain client.
//!
//! Drives the chain's CLI binary (`dymd`, `gaiad`, ...) as an async
//! subprocess with `--output=json` and parses the responses. Each call
//! is one short-lived process; the client itself holds no connection
//! state.

use moka::future::Cache;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, warn};

use drip_common::{Balance, NetworkDenomPair, NodeStatus, TxInfo};

use crate::error::{ChainError, ChainResult};
use crate::NetworkClient;

const SEND_ATTEMPTS: usize = 5;
const DENOM_CACHE_CAPACITY: u64 = 16;

/// Settings for one Cosmos node connection.
#[derive(Debug, Clone, Deserialize)]
pub struct CosmosConfig {
    /// Path to the chain CLI binary.
    pub executable: String,
    /// Tendermint RPC endpoint passed as `--node`.
    pub node_rpc: String,
    /// Chain id passed as `--chain-id`.
    pub chain_id: String,
    /// Base denomination of the chain; also used for fees.
    pub denom: String,
    /// Denoms routed in from other networks, keyed by the network id
    /// requesters use. The denom here is the on-chain (`ibc/...`)
    /// form.
    #[serde(default)]
    pub bridged_denoms: Vec<BridgedDenom>,
}

/// One bridged-asset entry of the denomination directory.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgedDenom {
    pub network_id: String,
    pub denom: String,
}

#[derive(Debug, Clone, Copy)]
struct ExecOpts {
    node: bool,
    chain_id: bool,
    json_output: bool,
}

impl Default for ExecOpts {
    fn default() -> Self {
        Self {
            node: true,
            chain_id: true,
            json_output: true,
        }
    }
}

pub struct CosmosClient {
    config: CosmosConfig,
    denom_cache: Cache<bool, Arc<Vec<NetworkDenomPair>>>,
}

impl CosmosClient {
    pub fn new(config: CosmosConfig) -> Self {
        Self {
            config,
            denom_cache: Cache::new(DENOM_CACHE_CAPACITY),
        }
    }

    /// Run one CLI invocation and return its stdout (stderr when the
    /// command writes its payload there, as `status` does on older
    /// SDKs).
    async fn execute(&self, args: &[&str], opts: ExecOpts) -> ChainResult<String> {
        let mut cmd = Command::new(&self.config.executable);
        cmd.args(args);
        if opts.node {
            cmd.arg(format!("--node={}", self.config.node_rpc));
        }
        if opts.chain_id {
            cmd.arg(format!("--chain-id={}", self.config.chain_id));
        }
        if opts.json_output {
            cmd.arg("--output=json");
        }

        debug!(executable = %self.config.executable, ?args, "executing node command");
        let output = cmd.output().await?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let first_line = stderr.lines().next().unwrap_or_default().to_string();
            warn!(code, stderr = %first_line, "node command failed");
            return Err(ChainError::Subprocess {
                code,
                stderr: first_line,
            });
        }

        if stdout.trim().is_empty() {
            Ok(stderr)
        } else {
            Ok(stdout)
        }
    }

    async fn execute_json(&self, args: &[&str], opts: ExecOpts) -> ChainResult<Value> {
        let raw = self.execute(args, opts).await?;
        serde_json::from_str(raw.trim()).map_err(|e| ChainError::Parse(e.to_string()))
    }

    /// Resolve an `ibc/...` denom back to its base form via the
    /// transfer module's denom trace.
    async fn trace_base_denom(&self, denom: &str) -> ChainResult<String> {
        let response = self
            .execute_json(
                &["query", "ibc-transfer", "denom-trace", denom],
                ExecOpts::default(),
            )
            .await?;
        response["denom_trace"]["base_denom"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ChainError::Parse(format!("no denom trace for {denom}")))
    }

    async fn fix_bridged_denom(&self, mut balance: Balance) -> ChainResult<Balance> {
        if balance.denom.starts_with("ibc/") {
            let base = self.trace_base_denom(&balance.denom).await?;
            balance.original_denom = Some(std::mem::replace(&mut balance.denom, base));
        }
        Ok(balance)
    }

    async fn build_denom_directory(
        &self,
        include_original: bool,
    ) -> ChainResult<Vec<NetworkDenomPair>> {
        let mut pairs = vec![NetworkDenomPair {
            network_id: self.config.chain_id.clone(),
            denom: self.config.denom.clone(),
            original_denom: None,
        }];

        for bridged in &self.config.bridged_denoms {
            let mut pair = NetworkDenomPair {
                network_id: bridged.network_id.clone(),
                denom: bridged.denom.clone(),
                original_denom: None,
            };
            if bridged.denom.starts_with("ibc/") {
                pair.denom = self.trace_base_denom(&bridged.denom).await?;
                if include_original {
                    pair.original_denom = Some(bridged.denom.clone());
                }
            }
            pairs.push(pair);
        }

        Ok(pairs)
    }
}

#[async_trait::async_trait]
impl NetworkClient for CosmosClient {
    async fn get_balance(&self, address: &str, denom: &str) -> ChainResult<Balance> {
        let denom_flag = format!("--denom={denom}");
        let response = self
            .execute_json(
                &["query", "bank", "balances", address, denom_flag.as_str()],
                ExecOpts {
                    chain_id: false,
                    ..ExecOpts::default()
                },
            )
            .await?;
        let balance: Balance =
            serde_json::from_value(response).map_err(|e| ChainError::Parse(e.to_string()))?;
        self.fix_bridged_denom(balance).await
    }

    async fn get_balances(&self, address: &str) -> ChainResult<Vec<Balance>> {
        let response = self
            .execute_json(
                &["query", "bank", "balances", address],
                ExecOpts {
                    chain_id: false,
                    ..ExecOpts::default()
                },
            )
            .await?;
        let balances = parse_balances(&response)?;
        let mut fixed = Vec::with_capacity(balances.len());
        for balance in balances {
            fixed.push(self.fix_bridged_denom(balance).await?);
        }
        Ok(fixed)
    }

    async fn get_node_status(&self) -> ChainResult<NodeStatus> {
        let raw = self
            .execute(
                &["status"],
                ExecOpts {
                    chain_id: false,
                    json_output: false,
                    ..ExecOpts::default()
                },
            )
            .await?;
        let value: Value =
            serde_json::from_str(raw.trim()).map_err(|e| ChainError::Parse(e.to_string()))?;
        parse_node_status(&value)
    }

    async fn get_tx_info(&self, hash: &str) -> ChainResult<TxInfo> {
        let response = self
            .execute_json(&["query", "tx", "--type=hash", hash], ExecOpts::default())
            .await?;
        parse_tx_info(&response)
    }

    async fn send(
        &self,
        sender: &str,
        recipient: &str,
        amount: &str,
        fee: u64,
    ) -> ChainResult<String> {
        let fees_flag = format!("--fees={}{}", fee, self.config.denom);
        for attempt in 1..=SEND_ATTEMPTS {
            let response = self
                .execute_json(
                    &[
                        "tx",
                        "bank",
                        "send",
                        sender,
                        recipient,
                        amount,
                        fees_flag.as_str(),
                        "--broadcast-mode=sync",
                        "--keyring-backend=test",
                        "-y",
                    ],
                    ExecOpts::default(),
                )
                .await;

            match response {
                Ok(value) => {
                    debug!(?value, "tx send response");
                    if value["code"].as_i64() == Some(0) {
                        if let Some(hash) = value["txhash"].as_str() {
                            return Ok(hash.to_string());
                        }
                    }
                    warn!(attempt, code = ?value["code"], "tx send rejected by node");
                }
                Err(error) => warn!(attempt, %error, "tx send attempt failed"),
            }
        }

        Err(ChainError::SubmissionFailed(format!(
            "no successful broadcast after {SEND_ATTEMPTS} attempts"
        )))
    }

    async fn check_address(&self, address: &str) -> ChainResult<()> {
        self.execute(
            &["keys", "parse", address],
            ExecOpts {
                node: false,
                chain_id: false,
                ..ExecOpts::default()
            },
        )
        .await
        .map_err(|e| ChainError::InvalidAddress(e.to_string()))?;
        Ok(())
    }

    async fn resolve_display_address(&self, address: &str) -> ChainResult<String> {
        static BECH32_ACC_RE: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"Bech32 Acc: ([^\s]+)").expect("static regex"));

        let Some(hex_part) = address.strip_prefix("0x") else {
            return Ok(address.to_string());
        };

        let response = self
            .execute(
                &["debug", "addr", hex_part],
                ExecOpts {
                    node: false,
                    chain_id: false,
                    json_output: false,
                },
            )
            .await?;

        match BECH32_ACC_RE.captures(&response) {
            Some(captures) => Ok(captures[1].to_string()),
            None => Err(ChainError::InvalidAddress(format!(
                "could not derive bech32 form of {address}"
            ))),
        }
    }

    async fn list_denominations(
        &self,
        include_original: bool,
    ) -> ChainResult<Vec<NetworkDenomPair>> {
        if let Some(cached) = self.denom_cache.get(&include_original).await {
            return Ok(cached.as_ref().clone());
        }
        let pairs = self.build_denom_directory(include_original).await?;
        self.denom_cache
            .insert(include_original, Arc::new(pairs.clone()))
            .await;
        Ok(pairs)
    }
}

fn parse_balances(response: &Value) -> ChainResult<Vec<Balance>> {
    let entries = response["balances"]
        .as_array()
        .ok_or_else(|| ChainError::Parse("missing balances array".to_string()))?;
    entries
        .iter()
        .map(|entry| {
            serde_json::from_value(entry.clone()).map_err(|e| ChainError::Parse(e.to_string()))
        })
        .collect()
}

fn parse_node_status(status: &Value) -> ChainResult<NodeStatus> {
    let field = |path: &[&str]| -> ChainResult<&Value> {
        let mut current = status;
        for key in path {
            current = current
                .get(key)
                .ok_or_else(|| ChainError::Parse(format!("missing {} in node status", key)))?;
        }
        Ok(current)
    };

    let last_block = field(&["SyncInfo", "latest_block_height"])?;
    let last_block = match last_block {
        Value::String(s) => s
            .parse()
            .map_err(|_| ChainError::Parse("bad latest_block_height".to_string()))?,
        Value::Number(n) => n.as_u64().unwrap_or(0),
        _ => return Err(ChainError::Parse("bad latest_block_height".to_string())),
    };

    Ok(NodeStatus {
        moniker: field(&["NodeInfo", "moniker"])?
            .as_str()
            .unwrap_or_default()
            .to_string(),
        chain: field(&["NodeInfo", "network"])?
            .as_str()
            .unwrap_or_default()
            .to_string(),
        last_block,
        syncing: field(&["SyncInfo", "catching_up"])?
            .as_bool()
            .unwrap_or(false),
    })
}

/// Bank sends and IBC transfers carry the payload under different
/// keys; both shapes are accepted.
fn parse_tx_info(response: &Value) -> ChainResult<TxInfo> {
    let height = response["height"]
        .as_str()
        .and_then(|h| h.parse().ok())
        .or_else(|| response["height"].as_u64())
        .ok_or_else(|| ChainError::Parse("missing tx height".to_string()))?;

    let body = &response["tx"]["body"]["messages"][0];

    if body.get("from_address").is_some() {
        let coin = &body["amount"][0];
        return Ok(TxInfo {
            height,
            sender: body["from_address"].as_str().unwrap_or_default().to_string(),
            receiver: body["to_address"].as_str().unwrap_or_default().to_string(),
            amount: format!(
                "{}{}",
                coin["amount"].as_str().unwrap_or_default(),
                coin["denom"].as_str().unwrap_or_default()
            ),
        });
    }

    if body.get("sender").is_some() {
        let token = &body["token"];
        return Ok(TxInfo {
            height,
            sender: body["sender"].as_str().unwrap_or_default().to_string(),
            receiver: body["receiver"].as_str().unwrap_or_default().to_string(),
            amount: format!(
                "{}{}",
                token["amount"].as_str().unwrap_or_default(),
                token["denom"].as_str().unwrap_or_default()
            ),
        });
    }

    Err(ChainError::Parse(
        "neither from_address nor sender found in tx body".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_balances() {
        let response = json!({
            "balances": [
                { "denom": "adym", "amount": "250000" },
                { "denom": "ibc/ABC", "amount": "7" }
            ]
        });
        let balances = parse_balances(&response).unwrap();
        assert_eq!(balances.len(), 2);
        assert_eq!(balances[0].denom, "adym");
        assert_eq!(balances[1].amount, "7");
    }

    #[test]
    fn test_parse_balances_missing_array() {
        assert!(parse_balances(&json!({})).is_err());
    }

    #[test]
    fn test_parse_node_status() {
        let status = json!({
            "NodeInfo": { "moniker": "faucet-node", "network": "dymension_devnet" },
            "SyncInfo": { "latest_block_height": "12345", "catching_up": false }
        });
        let parsed = parse_node_status(&status).unwrap();
        assert_eq!(parsed.moniker, "faucet-node");
        assert_eq!(parsed.chain, "dymension_devnet");
        assert_eq!(parsed.last_block, 12345);
        assert!(!parsed.syncing);
    }

    #[test]
    fn test_parse_tx_info_bank_send() {
        let response = json!({
            "height": "42",
            "tx": { "body": { "messages": [{
                "from_address": "dym1aaa",
                "to_address": "dym1bbb",
                "amount": [{ "amount": "100", "denom": "adym" }]
            }]}}
        });
        let info = parse_tx_info(&response).unwrap();
        assert_eq!(info.height, 42);
        assert_eq!(info.sender, "dym1aaa");
        assert_eq!(info.receiver, "dym1bbb");
        assert_eq!(info.amount, "100adym");
    }

    #[test]
    fn test_parse_tx_info_ibc_transfer() {
        let response = json!({
            "height": "7",
            "tx": { "body": { "messages": [{
                "sender": "dym1aaa",
                "receiver": "rol1bbb",
                "token": { "amount": "5", "denom": "ibc/ABC" }
            }]}}
        });
        let info = parse_tx_info(&response).unwrap();
        assert_eq!(info.amount, "5ibc/ABC");
    }

    #[test]
    fn test_parse_tx_info_unknown_shape() {
        let response = json!({
            "height": "7",
            "tx": { "body": { "messages": [{ "validator": "x" }] } }
        });
        assert!(parse_tx_info(&response).is_err());
    }
}
