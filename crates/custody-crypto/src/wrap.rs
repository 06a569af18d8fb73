//! Envelope key wrapping via secp256k1 ECDH.
//!
//! A per-record symmetric key is wrapped for exactly one recipient: generate
//! an ephemeral key pair, agree on a shared secret with the recipient's
//! public key, hash the shared secret into a wrapping key, and encrypt the
//! record key under it with AES-256-GCM.
//!
//! Delegation is decrypt-then-re-encrypt by the current holder. This is a
//! deliberate trade-off: the holder is a trusted intermediary for every
//! delegation it performs, and there is no non-interactive proxy
//! re-encryption here.

use serde::{Deserialize, Serialize};

use custody_core::{Keypair, Secp256k1PublicKey, Sha256Digest};

use crate::cipher::{GcmIv, GcmTag, SymmetricKey};
use crate::error::{CryptoError, Result};

/// A symmetric record key encrypted for one specific recipient.
///
/// Decryptable only with the private key paired with the public key that was
/// presented at wrap time. One WrappedKey exists per (record, principal with
/// access) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKey {
    /// Sender's ephemeral public key (the other half of the ECDH).
    pub ephemeral_public: Secp256k1PublicKey,

    /// IV for the key-wrapping encryption.
    pub iv: GcmIv,

    /// The record key, encrypted under the derived wrapping key.
    #[serde(with = "hex::serde")]
    pub ciphertext: Vec<u8>,

    /// Detached GCM authentication tag.
    pub tag: GcmTag,
}

impl WrappedKey {
    /// Wrap a symmetric key for a recipient's public key.
    pub fn wrap(key: &SymmetricKey, recipient: &Secp256k1PublicKey) -> Result<Self> {
        let ephemeral = Keypair::generate();
        let ephemeral_public = ephemeral.public_key();

        let shared = ephemeral.diffie_hellman(recipient)?;
        let wrapping_key = derive_wrapping_key(&shared);

        let (iv, ciphertext, tag) = wrapping_key.encrypt(key.as_bytes())?;
        // The ephemeral secret drops here; only the public half survives.

        Ok(Self {
            ephemeral_public,
            iv,
            ciphertext,
            tag,
        })
    }

    /// Unwrap with the recipient's key pair.
    ///
    /// Fails with [`CryptoError::Authentication`] if this key was wrapped
    /// for a different recipient or the payload was tampered with.
    pub fn unwrap_key(&self, recipient: &Keypair) -> Result<SymmetricKey> {
        let shared = recipient.diffie_hellman(&self.ephemeral_public)?;
        let wrapping_key = derive_wrapping_key(&shared);

        let key_bytes = wrapping_key.decrypt(&self.iv, &self.ciphertext, &self.tag)?;
        SymmetricKey::from_slice(&key_bytes)
    }

    /// Serialize to JSON bytes (the form registered on the ledger).
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("wrapped key serialization failed")
    }

    /// Deserialize from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| CryptoError::Serialization(e.to_string()))
    }

    /// Digest of the serialized wrapped key.
    ///
    /// Presented to the ledger at validation time so it can confirm the
    /// caller is referencing the key material the grant actually carried.
    pub fn digest(&self) -> Sha256Digest {
        Sha256Digest::hash(&self.to_bytes())
    }
}

/// Derive the wrapping key: SHA-256 over the ECDH shared-secret x-coordinate.
fn derive_wrapping_key(shared: &[u8; 32]) -> SymmetricKey {
    SymmetricKey::from_bytes(*Sha256Digest::hash(shared).as_bytes())
}
