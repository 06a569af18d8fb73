//! Error types for the permissions module.

use thiserror::Error;

/// Errors that can occur during grant and mirror operations.
#[derive(Debug, Error)]
pub enum PermsError {
    /// Grant deadline is not in the future.
    #[error("grant deadline {deadline} is not after now ({now})")]
    DeadlineNotFuture { deadline: i64, now: i64 },

    /// A read grant must name at least one record.
    #[error("read grant carries no records")]
    EmptyRecordSet,

    /// Grant not found.
    #[error("grant not found: {0}")]
    GrantNotFound(String),

    /// The mirror disagrees with the ledger.
    ///
    /// Non-fatal: callers resync from the ledger and proceed with the
    /// ledger's answer.
    #[error("mirror inconsistency: {0}")]
    MirrorInconsistency(String),

    /// Mirror backend failure.
    #[error("mirror error: {0}")]
    MirrorBackend(String),
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
