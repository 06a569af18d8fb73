//! Error types for the vault.

use thiserror::Error;

use custody_core::{CoreError, RecordId};
use custody_crypto::CryptoError;
use custody_perms::PermsError;
use custody_store::StoreError;
use custody_token::TokenError;

/// Errors that can occur during vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Key or signature error.
    #[error("key error: {0}")]
    Core(#[from] CoreError),

    /// Encryption or wrapping error.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Grant or mirror error.
    #[error("permission error: {0}")]
    Perms(#[from] PermsError),

    /// Ledger or object store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Token lifecycle error.
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    /// The caller's role does not permit the operation.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// A fetched payload does not hash to its record id.
    ///
    /// The envelope authenticated, so the stored object was swapped or the
    /// registration was wrong; either way the plaintext is not returned.
    #[error("integrity mismatch for record {record}")]
    IntegrityMismatch { record: RecordId },
}

/// Result type for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
