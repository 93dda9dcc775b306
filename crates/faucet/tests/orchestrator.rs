//! End-to-end orchestrator behaviour against a scripted chain client.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use drip_chain::{ChainError, ChainResult, ClientKind, NetworkClient};
use drip_common::{Balance, NetworkDenomPair, NodeStatus, TxInfo};
use drip_faucet::commands::{handle_command, HELP_REPLY};
use drip_faucet::{
    AuditLog, EnvConfig, FaucetError, FaucetOrchestrator, ReplySink,
};

const HUB: &str = "dymension_100-1";
const ROLLAPP: &str = "rollapp_2-1";
const AMOUNT: u128 = 300;

#[derive(Default)]
struct MockClient {
    /// (recipient, coins) per attempted send, including failing ones.
    sends: Mutex<Vec<(String, String)>>,
    failing_recipients: Mutex<HashSet<String>>,
    balance: Mutex<u128>,
}

impl MockClient {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            balance: Mutex::new(1_000_000),
            ..Self::default()
        })
    }

    fn sends(&self) -> Vec<(String, String)> {
        self.sends.lock().unwrap().clone()
    }

    fn fail_sends_to(&self, recipient: &str) {
        self.failing_recipients
            .lock()
            .unwrap()
            .insert(recipient.to_string());
    }

    fn set_balance(&self, amount: u128) {
        *self.balance.lock().unwrap() = amount;
    }
}

#[async_trait]
impl NetworkClient for MockClient {
    async fn get_balance(&self, _address: &str, denom: &str) -> ChainResult<Balance> {
        Ok(Balance::new(denom, self.balance.lock().unwrap().to_string()))
    }

    async fn get_balances(&self, _address: &str) -> ChainResult<Vec<Balance>> {
        Ok(vec![Balance::new(
            "adym",
            self.balance.lock().unwrap().to_string(),
        )])
    }

    async fn get_node_status(&self) -> ChainResult<NodeStatus> {
        Ok(NodeStatus {
            moniker: "mock-node".to_string(),
            chain: HUB.to_string(),
            last_block: 7,
            syncing: false,
        })
    }

    async fn get_tx_info(&self, hash: &str) -> ChainResult<TxInfo> {
        Ok(TxInfo {
            height: 42,
            sender: "dym1faucet".to_string(),
            receiver: hash[..4].to_string(),
            amount: "300adym".to_string(),
        })
    }

    async fn send(
        &self,
        _sender: &str,
        recipient: &str,
        amount: &str,
        _fee: u64,
    ) -> ChainResult<String> {
        self.sends
            .lock()
            .unwrap()
            .push((recipient.to_string(), amount.to_string()));
        if self.failing_recipients.lock().unwrap().contains(recipient) {
            return Err(ChainError::SubmissionFailed("node rejected tx".to_string()));
        }
        Ok("A".repeat(64))
    }

    async fn check_address(&self, address: &str) -> ChainResult<()> {
        if address.starts_with("dym1") {
            Ok(())
        } else {
            Err(ChainError::InvalidAddress(address.to_string()))
        }
    }

    async fn resolve_display_address(&self, address: &str) -> ChainResult<String> {
        match address.strip_prefix("0x") {
            Some(hex_part) => Ok(format!("dym1{hex_part}")),
            None => Ok(address.to_string()),
        }
    }

    async fn list_denominations(
        &self,
        include_original: bool,
    ) -> ChainResult<Vec<NetworkDenomPair>> {
        Ok(vec![
            NetworkDenomPair {
                network_id: HUB.to_string(),
                denom: "adym".to_string(),
                original_denom: None,
            },
            NetworkDenomPair {
                network_id: ROLLAPP.to_string(),
                denom: "uroll".to_string(),
                original_denom: include_original.then(|| "ibc/ROLL".to_string()),
            },
        ])
    }
}

#[derive(Default)]
struct CollectSink {
    replies: Mutex<Vec<String>>,
}

impl CollectSink {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn replies(&self) -> Vec<String> {
        self.replies.lock().unwrap().clone()
    }
}

impl ReplySink for CollectSink {
    fn post(&self, text: String) {
        self.replies.lock().unwrap().push(text);
    }
}

fn test_env() -> EnvConfig {
    EnvConfig {
        key: "devnet".to_string(),
        network_name: "Dymension Devnet".to_string(),
        chain_id: HUB.to_string(),
        client: ClientKind::Cosmos,
        faucet_address: "dym1faucet".to_string(),
        address_prefix: "dym".to_string(),
        node_rpc: "http://localhost:26657".to_string(),
        node_executable: "dymd".to_string(),
        node_denom: "adym".to_string(),
        amount_to_send: AMOUNT,
        amount_to_send_evm: 0,
        daily_cap: 1000,
        daily_cap_evm: 0,
        tx_fees: 1,
        block_explorer_tx: String::new(),
        token_requests_cap: 2,
        ibc_token_requests_cap: 2,
        request_timeout_secs: 21600,
        channels_to_listen: vec!["faucet".to_string()],
        bridged_denoms: vec![],
    }
}

fn setup(
    client: Arc<MockClient>,
    privileged: &[&str],
) -> (Arc<FaucetOrchestrator>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let audit = AuditLog::new(dir.path().join("transactions.csv"));
    let privileged = privileged.iter().map(|p| p.to_string()).collect();
    let orchestrator = FaucetOrchestrator::new(test_env(), client, audit, privileged);
    (orchestrator, dir)
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}

#[tokio::test]
async fn test_accepted_request_completes_transfer() {
    let client = MockClient::new();
    let (orchestrator, dir) = setup(client.clone(), &[]);
    let sink = CollectSink::new();

    let reply = orchestrator
        .request_tokens("alice", "dym1aaa", None, sink.clone())
        .await
        .unwrap();
    assert!(reply.contains("queued"));

    wait_until(|| client.sends().len() == 1).await;
    assert_eq!(client.sends()[0], ("dym1aaa".to_string(), "300adym".to_string()));

    wait_until(|| !sink.replies().is_empty()).await;
    assert!(sink.replies()[0].contains("$tx_info"));

    // Reservation stands after a completed transfer.
    assert_eq!(orchestrator.day_tally(HUB), Some(AMOUNT));

    // And the transfer was audited.
    let audit_path = dir.path().join("transactions.csv");
    wait_until(|| {
        std::fs::read_to_string(&audit_path)
            .map(|contents| contents.contains("dym1aaa"))
            .unwrap_or(false)
    })
    .await;
    let line = std::fs::read_to_string(&audit_path).unwrap();
    assert!(line.contains(&format!("{HUB},dym1aaa,300adym")));
}

#[tokio::test]
async fn test_fifo_order_and_fault_isolation() {
    let client = MockClient::new();
    client.fail_sends_to("dym1bbb");
    let (orchestrator, _dir) = setup(client.clone(), &[]);

    let sinks: Vec<_> = (0..3).map(|_| CollectSink::new()).collect();
    for (requester, address, sink) in [
        ("alice", "dym1aaa", &sinks[0]),
        ("bob", "dym1bbb", &sinks[1]),
        ("carol", "dym1ccc", &sinks[2]),
    ] {
        orchestrator
            .request_tokens(requester, address, None, sink.clone())
            .await
            .unwrap();
    }

    // All three submissions are attempted, strictly in FIFO order,
    // and bob's failure does not stop carol's transfer.
    wait_until(|| client.sends().len() == 3).await;
    let recipients: Vec<_> = client.sends().into_iter().map(|(to, _)| to).collect();
    assert_eq!(recipients, ["dym1aaa", "dym1bbb", "dym1ccc"]);

    wait_until(|| !sinks[1].replies().is_empty()).await;
    assert!(sinks[1].replies()[0].contains("could not handle"));
    assert!(!sinks[1].replies()[0].contains("node rejected"));

    wait_until(|| !sinks[2].replies().is_empty()).await;
    assert!(sinks[2].replies()[0].contains("$tx_info"));

    // bob's cap reservation was rolled back.
    wait_until(|| orchestrator.day_tally(HUB) == Some(2 * AMOUNT)).await;

    // And his admission entries too: an immediate retry is admitted.
    let retry = orchestrator
        .request_tokens("bob", "dym1bbb", None, CollectSink::new())
        .await;
    assert!(retry.is_ok());
}

#[tokio::test]
async fn test_drained_rolls_back_reservation() {
    let client = MockClient::new();
    client.set_balance(AMOUNT - 1);
    let (orchestrator, _dir) = setup(client.clone(), &[]);
    let sink = CollectSink::new();

    orchestrator
        .request_tokens("alice", "dym1aaa", None, sink.clone())
        .await
        .unwrap();

    wait_until(|| !sink.replies().is_empty()).await;
    assert!(sink.replies()[0].contains("drained"));
    // No submission was attempted.
    assert!(client.sends().is_empty());
    assert_eq!(orchestrator.day_tally(HUB), Some(0));

    // The admission was rolled back as well: refilling the faucet
    // lets the same requester through immediately.
    client.set_balance(1_000_000);
    let retry = orchestrator
        .request_tokens("alice", "dym1aaa", None, CollectSink::new())
        .await;
    assert!(retry.is_ok());
}

#[tokio::test]
async fn test_daily_cap_scenario() {
    let client = MockClient::new();
    let (orchestrator, _dir) = setup(client.clone(), &[]);

    for (requester, address) in [
        ("alice", "dym1aaa"),
        ("bob", "dym1bbb"),
        ("carol", "dym1ccc"),
    ] {
        orchestrator
            .request_tokens(requester, address, None, CollectSink::new())
            .await
            .unwrap();
    }
    assert_eq!(orchestrator.day_tally(HUB), Some(900));

    // 900 + 300 > 1000: the fourth request is refused without
    // consuming an admission window.
    let refused = orchestrator
        .request_tokens("dave", "dym1ddd", None, CollectSink::new())
        .await;
    match refused {
        Err(FaucetError::CapReached) => {}
        other => panic!("expected CapReached, got {other:?}"),
    }
    assert_eq!(orchestrator.day_tally(HUB), Some(900));

    wait_until(|| client.sends().len() == 3).await;
}

#[tokio::test]
async fn test_rate_limit_scenario() {
    let client = MockClient::new();
    let (orchestrator, _dir) = setup(client.clone(), &[]);

    for _ in 0..2 {
        orchestrator
            .request_tokens("alice", "dym1aaa", None, CollectSink::new())
            .await
            .unwrap();
    }

    let rejected = orchestrator
        .request_tokens("alice", "dym1aaa", None, CollectSink::new())
        .await;
    match rejected {
        Err(FaucetError::AdmissionRejected { reply, .. }) => {
            assert!(reply.contains("twice"));
            assert!(reply.contains("6 hours"));
        }
        other => panic!("expected AdmissionRejected, got {other:?}"),
    }

    // The cap reservation made just before the rejection was undone.
    assert_eq!(orchestrator.day_tally(HUB), Some(2 * AMOUNT));
}

#[tokio::test]
async fn test_privileged_bypass_still_consumes_daily_cap() {
    let client = MockClient::new();
    let (orchestrator, _dir) = setup(client.clone(), &["operator"]);

    // Three requests from one privileged identity sail past the
    // 2-per-window gate but each consumes budget.
    for _ in 0..3 {
        orchestrator
            .request_tokens("operator", "dym1ops", None, CollectSink::new())
            .await
            .unwrap();
    }
    assert_eq!(orchestrator.day_tally(HUB), Some(3 * AMOUNT));

    // The next one breaks the 1000 budget.
    let refused = orchestrator
        .request_tokens("operator", "dym1ops", None, CollectSink::new())
        .await;
    assert!(matches!(refused, Err(FaucetError::CapReached)));
}

#[tokio::test]
async fn test_bridged_network_sends_original_denom() {
    let client = MockClient::new();
    let (orchestrator, _dir) = setup(client.clone(), &[]);

    orchestrator
        .request_tokens("alice", "dym1aaa", Some(ROLLAPP), CollectSink::new())
        .await
        .unwrap();

    wait_until(|| client.sends().len() == 1).await;
    assert_eq!(
        client.sends()[0],
        ("dym1aaa".to_string(), "300ibc/ROLL".to_string())
    );
}

#[tokio::test]
async fn test_unsupported_network_is_refused() {
    let client = MockClient::new();
    let (orchestrator, _dir) = setup(client.clone(), &[]);

    let refused = orchestrator
        .request_tokens("alice", "dym1aaa", Some("nope_9-9"), CollectSink::new())
        .await;
    match refused {
        Err(failure @ FaucetError::UnsupportedNetwork(_)) => {
            assert!(failure.user_reply().contains("not supported"));
        }
        other => panic!("expected UnsupportedNetwork, got {other:?}"),
    }
    assert_eq!(orchestrator.day_tally("nope_9-9"), None);
}

#[tokio::test]
async fn test_address_validation() {
    let client = MockClient::new();
    let (orchestrator, _dir) = setup(client.clone(), &[]);

    let missing = orchestrator
        .request_tokens("alice", "", None, CollectSink::new())
        .await;
    assert!(matches!(missing, Err(FaucetError::Validation(_))));

    let wrong_prefix = orchestrator
        .request_tokens("alice", "cosmos1xyz", None, CollectSink::new())
        .await;
    match wrong_prefix {
        Err(FaucetError::Validation(msg)) => assert!(msg.contains("`dym` prefix")),
        other => panic!("expected Validation, got {other:?}"),
    }

    // Hex addresses resolve to the native encoding first.
    let resolved = orchestrator
        .request_tokens("alice", "0xabc", None, CollectSink::new())
        .await;
    assert!(resolved.is_ok());
    wait_until(|| client.sends().len() == 1).await;
    assert_eq!(client.sends()[0].0, "dym1abc");
}

#[tokio::test]
async fn test_tx_hash_length_gate() {
    let client = MockClient::new();
    let (orchestrator, _dir) = setup(client.clone(), &[]);

    let short = orchestrator.tx_info_query("deadbeef").await;
    match short {
        Err(FaucetError::Validation(msg)) => {
            assert!(msg.contains("64 characters"));
            assert!(msg.contains("`8`"));
        }
        other => panic!("expected Validation, got {other:?}"),
    }

    let info = orchestrator.tx_info_query(&"B".repeat(64)).await.unwrap();
    assert_eq!(info.height, 42);
}

#[tokio::test]
async fn test_command_surface() {
    let client = MockClient::new();
    let (orchestrator, _dir) = setup(client.clone(), &[]);
    let sink = CollectSink::new();

    let reply = handle_command(&orchestrator, "alice", "$faucet_address", sink.clone()).await;
    assert_eq!(reply, "dym1faucet");

    let reply = handle_command(&orchestrator, "alice", "$faucet_status", sink.clone()).await;
    assert!(reply.contains("mock-node"));
    assert!(reply.contains("dym1faucet"));

    let reply = handle_command(&orchestrator, "alice", "$balances dym1aaa", sink.clone()).await;
    assert!(reply.contains("adym"));

    let reply = handle_command(&orchestrator, "alice", "$tx_info", sink.clone()).await;
    assert!(reply.contains("Missing transaction hash"));

    let reply = handle_command(&orchestrator, "alice", "$request_networks", sink.clone()).await;
    assert!(reply.contains(HUB));
    assert!(reply.contains("uroll"));

    let reply =
        handle_command(&orchestrator, "alice", "$request dym1aaa", sink.clone()).await;
    assert!(reply.contains("queued"));

    let reply = handle_command(&orchestrator, "alice", "$halp", sink.clone()).await;
    assert_eq!(reply, HELP_REPLY);
}
