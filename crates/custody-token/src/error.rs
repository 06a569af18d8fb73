//! Error types for the token lifecycle.

use thiserror::Error;

use custody_store::StoreError;

/// Errors that can occur while requesting, signing, or redeeming a token.
#[derive(Debug, Error)]
pub enum TokenError {
    /// A read token must name at least one record.
    ///
    /// Rejected before the ledger is touched; no token is minted.
    #[error("token request carries no records")]
    EmptyRecordSet,

    /// The token sat unsigned past the client's sign timeout.
    ///
    /// The token is abandoned, never presented, and left for the ledger's
    /// expiry sweep.
    #[error("token abandoned: unsigned after {waited_ms}ms (timeout {timeout_ms}ms)")]
    Abandoned { waited_ms: u64, timeout_ms: u64 },

    /// The ledger stayed unreachable through every retry.
    #[error("ledger unavailable after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },

    /// The ledger refused the operation.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for token operations.
pub type Result<T> = std::result::Result<T, TokenError>;
