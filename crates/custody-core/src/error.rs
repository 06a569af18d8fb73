//! Error types for core primitives.

use thiserror::Error;

/// Errors that can occur in core key and identity operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Public key bytes do not encode a curve point.
    #[error("invalid secp256k1 public key")]
    InvalidPublicKey,

    /// Secret key bytes do not encode a valid scalar.
    #[error("invalid secp256k1 secret key")]
    InvalidSecretKey,

    /// Signature failed to parse or verify.
    #[error("invalid ECDSA signature")]
    InvalidSignature,

    /// Input was not valid hex.
    #[error("invalid hex encoding")]
    InvalidHex,

    /// Byte length mismatch.
    #[error("invalid length: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
