//! # Custody Kernel Crypto
//!
//! Record sealing and envelope key wrapping.
//!
//! ## Encryption Model
//!
//! Every record uses a two-layer envelope:
//!
//! 1. **Record key**: a fresh AES-256-GCM key seals the record payload
//! 2. **Wrapped keys**: the record key is wrapped per recipient via
//!    ephemeral secp256k1 ECDH + SHA-256 derivation + AES-256-GCM
//!
//! Delegating access means the current holder unwraps with its own private
//! key and re-wraps for the new recipient. The holder is a trusted
//! intermediary for each delegation; this is deliberate (see module docs in
//! [`wrap`]).

pub mod cipher;
pub mod envelope;
pub mod error;
pub mod wrap;

pub use cipher::{GcmIv, GcmTag, SymmetricKey, TAG_LEN};
pub use envelope::SealedRecord;
pub use error::{CryptoError, Result};
pub use wrap::WrappedKey;
