//! Chat command surface.
//!
//! Commands are `$`-prefixed lines. Every invocation produces exactly
//! one immediate reply; transfer outcomes arrive later through the
//! request's sink. Upstream error details never reach the requester.

use std::sync::Arc;
use tracing::error;

use crate::error::FaucetError;
use crate::orchestrator::FaucetOrchestrator;
use crate::queue::ReplySink;

pub const HELP_REPLY: &str = "**List of available commands:**\n\
    1. Request tokens through the faucet:\n\
    `$request [address] [network-id]`\n\n\
    2. Request the faucet and node status:\n\
    `$faucet_status`\n\n\
    3. Request the faucet address: \n\
    `$faucet_address`\n\n\
    4. Request information for a specific transaction:\n\
    `$tx_info [transaction hash ID]`\n\n\
    5. Request the address balance:\n\
    `$balances [address]`\n\n\
    6. Request all the optional networks:\n\
    `$request_networks`\n";

/// Fetch the n-th parameter after the command name.
fn param(content: &str, index: usize) -> Option<&str> {
    content.split_whitespace().nth(index + 1)
}

/// Handle one chat command and return the reply.
pub async fn handle_command(
    orchestrator: &Arc<FaucetOrchestrator>,
    requester: &str,
    content: &str,
    sink: Arc<dyn ReplySink>,
) -> String {
    let command = content.split_whitespace().next().unwrap_or_default();

    let result = match command {
        "$faucet_address" => Ok(orchestrator.faucet_address().to_string()),
        "$balances" => balances_reply(orchestrator, content).await,
        "$faucet_status" => status_reply(orchestrator).await,
        "$tx_info" => tx_info_reply(orchestrator, content).await,
        "$request_networks" => networks_reply(orchestrator).await,
        "$request" => request_reply(orchestrator, requester, content, sink).await,
        _ => Ok(HELP_REPLY.to_string()),
    };

    result.unwrap_or_else(|failure| {
        if let FaucetError::Upstream(upstream) = &failure {
            error!(%upstream, command, "command failed");
        }
        failure.user_reply()
    })
}

async fn request_reply(
    orchestrator: &Arc<FaucetOrchestrator>,
    requester: &str,
    content: &str,
    sink: Arc<dyn ReplySink>,
) -> Result<String, FaucetError> {
    let address = param(content, 0).unwrap_or_default();
    let network_id = param(content, 1);
    orchestrator
        .request_tokens(requester, address, network_id, sink)
        .await
}

async fn balances_reply(
    orchestrator: &Arc<FaucetOrchestrator>,
    content: &str,
) -> Result<String, FaucetError> {
    let address = param(content, 0).unwrap_or_default();
    let balances = orchestrator.balance_query(address).await?;
    if balances.is_empty() {
        return Ok(format!("No balances for address `{address}`"));
    }

    let rows = balances
        .iter()
        .map(|balance| format!("{:<24} {}", balance.denom, balance.amount))
        .collect::<Vec<_>>()
        .join("\n");
    Ok(format!("Balance for address `{address}`:\n```{rows}\n```\n"))
}

async fn status_reply(orchestrator: &Arc<FaucetOrchestrator>) -> Result<String, FaucetError> {
    let status = orchestrator.status_query().await?;
    Ok(format!(
        "```\n\
         Node moniker:      {}\n\
         Node last block:   {}\n\
         Faucet address:    {}\n\
         ```",
        status.moniker,
        status.last_block,
        orchestrator.faucet_address()
    ))
}

async fn tx_info_reply(
    orchestrator: &Arc<FaucetOrchestrator>,
    content: &str,
) -> Result<String, FaucetError> {
    let hash = param(content, 0)
        .ok_or_else(|| FaucetError::Validation("Missing transaction hash ID".to_string()))?;
    let info = orchestrator.tx_info_query(hash).await?;
    Ok(format!(
        "```From:    {}\nTo:      {}\nAmount:  {}\nHeight:  {}\n```",
        info.sender, info.receiver, info.amount, info.height
    ))
}

async fn networks_reply(orchestrator: &Arc<FaucetOrchestrator>) -> Result<String, FaucetError> {
    let pairs = orchestrator.networks_query().await?;
    if pairs.is_empty() {
        return Ok("No available networks".to_string());
    }

    let rows = pairs
        .iter()
        .map(|pair| format!("{:<32} {}", pair.network_id, pair.denom))
        .collect::<Vec<_>>()
        .join("\n");
    Ok(format!("```network_id                       denom\n{rows}```"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_extraction() {
        assert_eq!(param("$request dym1abc devnet", 0), Some("dym1abc"));
        assert_eq!(param("$request dym1abc devnet", 1), Some("devnet"));
        assert_eq!(param("$request dym1abc", 1), None);
        assert_eq!(param("$request", 0), None);
        assert_eq!(param("$request   dym1abc ", 0), Some("dym1abc"));
    }

    #[test]
    fn test_help_lists_every_command() {
        for command in [
            "$request",
            "$faucet_status",
            "$faucet_address",
            "$tx_info",
            "$balances",
            "$request_networks",
        ] {
            assert!(HELP_REPLY.contains(command), "help misses {command}");
        }
    }
}
