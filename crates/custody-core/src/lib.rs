//! # Custody Kernel Core
//!
//! Pure primitives for the custody kernel: principal identities, secp256k1
//! keys, SHA-256 digests, and ledger references.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over cryptographic data structures.
//!
//! ## Key Types
//!
//! - [`Keypair`] - A principal's secp256k1 key pair (ECDSA + ECDH)
//! - [`PrincipalId`] - Ledger address derived from a public key
//! - [`RecordId`] - Content address (SHA-256 of record plaintext)
//! - [`TokenHash`] - Ledger-minted access-token identifier
//! - [`LedgerTxRef`] - Monotonic ledger transaction reference

pub mod crypto;
pub mod error;
pub mod types;

pub use crypto::{EcdsaSignature, Keypair, Secp256k1PublicKey, Sha256Digest};
pub use error::CoreError;
pub use types::{
    now_millis, AccessKind, LedgerTxRef, Principal, PrincipalId, RecordId, Role, TokenHash,
};
