//! Error types for the ledger and object store contracts.

use thiserror::Error;

/// Errors that can occur against the ledger oracle or object store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The ledger could not be reached.
    ///
    /// Transient: callers retry with backoff, because the ledger is the
    /// sole source of truth and no local fallback decision is permitted.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// Principal has no on-ledger registration.
    #[error("unknown principal: {0}")]
    UnknownPrincipal(String),

    /// Token hash does not match any minted token.
    #[error("unknown token: {0}")]
    UnknownToken(String),

    /// Token validated after its expiry timestamp.
    #[error("token expired")]
    TokenExpired,

    /// Token was already consumed by a successful validation.
    #[error("token already consumed")]
    TokenConsumed,

    /// The presented record set exceeds what the grant authorized.
    ///
    /// Fatal; surfaced to the caller and logged as a potential abuse signal.
    #[error("unauthorized record access: {0}")]
    UnauthorizedRecord(String),

    /// No active grant covers the requested operation.
    #[error("no active grant: {0}")]
    NoActiveGrant(String),

    /// Grant deadline is not in the future.
    #[error("invalid deadline {deadline}: not after now ({now})")]
    InvalidDeadline { deadline: i64, now: i64 },

    /// Signature does not verify against the claimed requester.
    #[error("signature does not match requester")]
    BadSignature,

    /// A read token must cover at least one record.
    #[error("token request carries no records")]
    EmptyRecordSet,

    /// Object store has no payload for the key.
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// Payload failed to parse.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Core key error.
    #[error("core error: {0}")]
    Core(#[from] custody_core::CoreError),
}

impl StoreError {
    /// Whether the error is transient and worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
