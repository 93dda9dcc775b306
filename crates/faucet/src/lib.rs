//! Request-admission and rate-limiting core of the drip faucet.
//!
//! The orchestrator decides, under concurrent access from many chat
//! messages, whether a (requester, address, network) triple may
//! receive funds right now, tracks a rolling daily issuance budget per
//! network, and serializes transfer submission through a per-network
//! dispatch queue.

pub mod admission;
pub mod audit;
pub mod commands;
pub mod config;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod queue;
pub mod tally;

pub use admission::{Admission, AdmissionLedger, RateLimitEntry};
pub use audit::AuditLog;
pub use config::{EnvConfig, FaucetConfig};
pub use error::{FaucetError, FaucetResult};
pub use orchestrator::FaucetOrchestrator;
pub use queue::{DispatchQueue, QueuedRequest, ReplySink, RequestProcessor};
pub use tally::DailyCapTracker;

pub const APPROVE_EMOJI: &str = "✅";
pub const REJECT_EMOJI: &str = "🚫";
pub const WARNING_EMOJI: &str = "❗";

/// Reply shown when an internal failure must not leak details.
pub const GENERIC_ERROR_REPLY: &str = "❗ the faucet could not handle your request";
