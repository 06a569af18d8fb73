//! Error types for the crypto module.

use thiserror::Error;

/// Errors that can occur during sealing and key wrapping.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// GCM tag mismatch: wrong key, wrong recipient, or tampered data.
    ///
    /// Always fatal. No plaintext is released when this is returned.
    #[error("authentication failed: tag mismatch")]
    Authentication,

    /// Key material has the wrong length.
    #[error("invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    /// Cipher construction or encryption failed.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Envelope serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Core key error.
    #[error("core error: {0}")]
    Core(#[from] custody_core::CoreError),
}

/// Result type for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
