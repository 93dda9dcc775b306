//! Error types for the faucet core.

use chrono::Duration;
use drip_chain::ChainError;
use thiserror::Error;

use crate::{GENERIC_ERROR_REPLY, WARNING_EMOJI};

/// Faucet request errors.
///
/// Validation and admission errors are resolved synchronously and
/// reported to the requester; upstream and drained errors can only
/// occur inside the dispatch worker, after a reservation was made.
#[derive(Error, Debug)]
pub enum FaucetError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("rate limited, retry in {}s", retry_after.num_seconds())]
    AdmissionRejected {
        retry_after: Duration,
        /// Pre-formatted reply for the requester.
        reply: String,
    },

    #[error("daily cap reached")]
    CapReached,

    #[error("network {0} has no denomination mapping")]
    UnsupportedNetwork(String),

    #[error("chain client error: {0}")]
    Upstream(#[from] ChainError),

    #[error("faucet balance insufficient for {denom}")]
    Drained { denom: String },
}

impl FaucetError {
    /// The reply shown to the requester. Upstream details are never
    /// surfaced here; they go to the log.
    pub fn user_reply(&self) -> String {
        match self {
            FaucetError::Validation(msg) => format!("{WARNING_EMOJI} {msg}"),
            FaucetError::AdmissionRejected { reply, .. } => reply.clone(),
            FaucetError::CapReached => {
                "Sorry, the daily cap for this faucet has been reached".to_string()
            }
            FaucetError::UnsupportedNetwork(network_id) => {
                format!("Network `{network_id}` is not supported by the faucet")
            }
            FaucetError::Upstream(_) => GENERIC_ERROR_REPLY.to_string(),
            FaucetError::Drained { denom } => {
                format!("{WARNING_EMOJI} the faucet is drained for `{denom}`, please try again later")
            }
        }
    }
}

pub type FaucetResult<T> = Result<T, FaucetError>;
