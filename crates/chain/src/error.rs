//! Error types for chain clients.

use thiserror::Error;

/// Chain client errors.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("node command exited with code {code}: {stderr}")]
    Subprocess { code: i32, stderr: String },

    #[error("failed to spawn node command: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("could not parse node response: {0}")]
    Parse(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transaction submission failed: {0}")]
    SubmissionFailed(String),

    #[error("operation not supported by this chain client: {0}")]
    Unsupported(&'static str),
}

pub type ChainResult<T> = Result<T, ChainError>;
