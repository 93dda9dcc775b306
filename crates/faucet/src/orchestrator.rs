//! Request orchestration.
//!
//! Composes the admission ledger, the daily cap tracker and the
//! dispatch queue. A request is validated, reserved (cap first, then
//! the rate-limit gate), queued, and finally dispatched by its
//! network's worker; any failure after the reservation rolls both
//! reservations back.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info, warn};

use drip_chain::{ChainError, NetworkClient};
use drip_common::{Balance, NetworkDenomPair, NodeStatus, TxInfo};

use crate::admission::{Admission, AdmissionLedger};
use crate::audit::{format_record, AuditLog};
use crate::config::EnvConfig;
use crate::error::{FaucetError, FaucetResult};
use crate::metrics;
use crate::queue::{DispatchQueue, QueuedRequest, ReplySink, RequestProcessor};
use crate::tally::DailyCapTracker;
use crate::APPROVE_EMOJI;

const TX_HASH_LEN: usize = 64;

/// Ledger and tally live behind one lock so the check-then-mutate
/// sequences stay atomic; the lock is never held across an await.
struct AdmissionState {
    ledger: AdmissionLedger,
    tally: DailyCapTracker,
}

pub struct FaucetOrchestrator {
    env: EnvConfig,
    client: Arc<dyn NetworkClient>,
    state: Mutex<AdmissionState>,
    queue: DispatchQueue,
    audit: AuditLog,
    privileged: HashSet<String>,
}

impl FaucetOrchestrator {
    pub fn new(
        env: EnvConfig,
        client: Arc<dyn NetworkClient>,
        audit: AuditLog,
        privileged: HashSet<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            env,
            client,
            state: Mutex::new(AdmissionState {
                ledger: AdmissionLedger::new(),
                tally: DailyCapTracker::new(),
            }),
            queue: DispatchQueue::new(),
            audit,
            privileged,
        })
    }

    fn state(&self) -> MutexGuard<'_, AdmissionState> {
        self.state.lock().expect("admission state lock poisoned")
    }

    pub fn env(&self) -> &EnvConfig {
        &self.env
    }

    pub fn faucet_address(&self) -> &str {
        &self.env.faucet_address
    }

    /// Today's reserved amount for a network.
    pub fn day_tally(&self, network_id: &str) -> Option<u128> {
        self.state().tally.day_tally(network_id)
    }

    /// Admit a token request and queue it for dispatch. On success the
    /// returned reply acknowledges the requester immediately; the
    /// transfer outcome arrives later through the request's sink.
    pub async fn request_tokens(
        self: &Arc<Self>,
        requester: &str,
        raw_address: &str,
        network_id: Option<&str>,
        sink: Arc<dyn ReplySink>,
    ) -> FaucetResult<String> {
        let address = self.validate_address(raw_address).await?;
        let network_id = match network_id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => self.env.chain_id.clone(),
        };

        let pair = self
            .client
            .list_denominations(true)
            .await?
            .into_iter()
            .find(|pair| pair.network_id == network_id)
            .ok_or_else(|| FaucetError::UnsupportedNetwork(network_id.clone()))?;

        let amount = self.env.amount_for(&network_id);
        let bypass = self.privileged.contains(requester);
        let now = Utc::now();

        {
            let mut state = self.state();

            // Daily cap is always reserved first; a privileged bypass
            // skips only the rate-limit gate.
            if !state.tally.try_reserve(
                &network_id,
                amount,
                self.env.daily_cap_for(&network_id),
                now.date_naive(),
            ) {
                info!(requester, %network_id, %address, "daily cap reached");
                metrics::REQUESTS_TOTAL
                    .with_label_values(&[network_id.as_str(), "cap_reached"])
                    .inc();
                return Err(FaucetError::CapReached);
            }

            if !bypass {
                match state.ledger.check_and_reserve(
                    &network_id,
                    requester,
                    &address,
                    self.env.requests_cap_for(&network_id),
                    self.env.request_timeout(),
                    now,
                ) {
                    Admission::Admitted => {}
                    Admission::Rejected { retry_after, reply } => {
                        state.tally.rollback(&network_id, amount);
                        info!(requester, %network_id, %address, "rate limited");
                        metrics::REQUESTS_TOTAL
                            .with_label_values(&[network_id.as_str(), "rate_limited"])
                            .inc();
                        return Err(FaucetError::AdmissionRejected { retry_after, reply });
                    }
                }
            }
        }

        let request = QueuedRequest {
            network_id: network_id.clone(),
            requester: requester.to_string(),
            address,
            denom: pair.denom.clone(),
            original_denom: pair.original_denom().to_string(),
            amount,
            fee: self.env.tx_fees,
            bypass,
            sink,
        };
        info!(?request, "token request queued");
        metrics::REQUESTS_TOTAL
            .with_label_values(&[network_id.as_str(), "accepted"])
            .inc();
        self.queue
            .enqueue(request, self.clone() as Arc<dyn RequestProcessor>);

        Ok(format!(
            "{APPROVE_EMOJI} Request accepted, your transfer is queued"
        ))
    }

    /// Balances of an address. Pure read.
    pub async fn balance_query(&self, raw_address: &str) -> FaucetResult<Vec<Balance>> {
        let address = self.validate_address(raw_address).await?;
        Ok(self.client.get_balances(&address).await?)
    }

    /// Node status. Pure read.
    pub async fn status_query(&self) -> FaucetResult<NodeStatus> {
        Ok(self.client.get_node_status().await?)
    }

    /// Transaction details. The hash length is gated before the chain
    /// is queried.
    pub async fn tx_info_query(&self, hash: &str) -> FaucetResult<TxInfo> {
        let len = hash.chars().count();
        if len != TX_HASH_LEN {
            return Err(FaucetError::Validation(format!(
                "Hash ID must be {TX_HASH_LEN} characters long, received `{len}`"
            )));
        }
        Ok(self.client.get_tx_info(hash).await?)
    }

    /// The networks this faucet can serve.
    pub async fn networks_query(&self) -> FaucetResult<Vec<NetworkDenomPair>> {
        Ok(self.client.list_denominations(false).await?)
    }

    async fn validate_address(&self, raw_address: &str) -> FaucetResult<String> {
        if raw_address.is_empty() {
            return Err(FaucetError::Validation("Missing address".to_string()));
        }

        let address = if raw_address.starts_with("0x") {
            self.client
                .resolve_display_address(raw_address)
                .await
                .map_err(|error| match error {
                    ChainError::InvalidAddress(msg) => {
                        FaucetError::Validation(format!("Invalid address: {msg}"))
                    }
                    other => FaucetError::Upstream(other),
                })?
        } else {
            raw_address.to_string()
        };

        if !address.starts_with(&self.env.address_prefix) {
            return Err(FaucetError::Validation(format!(
                "Expected `{}` prefix",
                self.env.address_prefix
            )));
        }

        if let Err(error) = self.client.check_address(&address).await {
            warn!(%address, %error, "address check failed");
            return Err(FaucetError::Validation(format!(
                "Invalid address `{address}`"
            )));
        }

        Ok(address)
    }

    /// Perform the transfer for one dequeued request.
    async fn dispatch(&self, request: &QueuedRequest) -> FaucetResult<()> {
        let balance = self
            .client
            .get_balance(&self.env.faucet_address, &request.original_denom)
            .await?;
        let available: u128 = balance.amount.parse().unwrap_or(0);
        if available < request.amount {
            return Err(FaucetError::Drained {
                denom: request.denom.clone(),
            });
        }

        let coins = format!("{}{}", request.amount, request.original_denom);
        let tx_hash = self
            .client
            .send(
                &self.env.faucet_address,
                &request.address,
                &coins,
                request.fee,
            )
            .await?;

        info!(
            requester = %request.requester,
            network = %request.network_id,
            address = %request.address,
            %tx_hash,
            "transfer completed"
        );
        metrics::TRANSFERS_TOTAL
            .with_label_values(&[request.network_id.as_str()])
            .inc();

        let reply = if self.env.block_explorer_tx.is_empty() {
            format!(
                "{APPROVE_EMOJI} Your tx is approved. To view your tx status, \
                 type `$tx_info {tx_hash}`"
            )
        } else {
            format!("{APPROVE_EMOJI}  <{}{}>", self.env.block_explorer_tx, tx_hash)
        };
        request.sink.post(reply);

        // The transfer already happened: audit problems are logged,
        // never rolled back.
        match self.client.get_balances(&self.env.faucet_address).await {
            Ok(balances) => {
                let line = format_record(
                    Utc::now(),
                    &request.network_id,
                    &request.address,
                    request.amount,
                    &request.denom,
                    &tx_hash,
                    &balances,
                );
                if let Err(error) = self.audit.append(&line).await {
                    warn!(%error, "audit log append failed");
                }
            }
            Err(error) => warn!(%error, "balance snapshot for audit log failed"),
        }

        Ok(())
    }

    fn rollback_reservation(&self, request: &QueuedRequest) {
        let mut state = self.state();
        if !request.bypass {
            state
                .ledger
                .rollback(&request.network_id, &request.requester, &request.address);
        }
        state.tally.rollback(&request.network_id, request.amount);
    }
}

#[async_trait]
impl RequestProcessor for FaucetOrchestrator {
    /// One item's failure must never escape: the worker loop keeps
    /// serving subsequent items, and the request's reservations are
    /// rolled back so it counts as never having happened.
    async fn process(&self, request: QueuedRequest) {
        if let Err(failure) = self.dispatch(&request).await {
            self.rollback_reservation(&request);
            match &failure {
                FaucetError::Drained { denom } => {
                    warn!(network = %request.network_id, %denom, "faucet drained");
                    metrics::DISPATCH_FAILURES_TOTAL
                        .with_label_values(&[request.network_id.as_str(), "drained"])
                        .inc();
                }
                other => {
                    error!(network = %request.network_id, error = %other, "dispatch failed");
                    metrics::DISPATCH_FAILURES_TOTAL
                        .with_label_values(&[request.network_id.as_str(), "transfer"])
                        .inc();
                }
            }
            request.sink.post(failure.user_reply());
        }
    }
}
