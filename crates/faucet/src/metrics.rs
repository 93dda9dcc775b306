//! Prometheus counters for the faucet core.

use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, IntCounterVec};

/// Token requests received, by network and outcome
/// (`accepted`, `rate_limited`, `cap_reached`, `rejected`).
pub static REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "drip_requests_total",
        "Token requests received by network and outcome",
        &["network", "outcome"]
    )
    .expect("metric registration")
});

/// Completed transfers by network.
pub static TRANSFERS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "drip_transfers_total",
        "Completed transfers by network",
        &["network"]
    )
    .expect("metric registration")
});

/// Dispatch-stage failures by network and kind (`drained`, `transfer`).
pub static DISPATCH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "drip_dispatch_failures_total",
        "Dispatch-stage failures by network and kind",
        &["network", "kind"]
    )
    .expect("metric registration")
});
