//! Sealed record envelope.
//!
//! The object store never sees plaintext: every stored record is a
//! SealedRecord, serialized as JSON with hex-encoded byte fields. The store
//! treats the envelope as an opaque byte payload.

use serde::{Deserialize, Serialize};

use crate::cipher::{GcmIv, GcmTag, SymmetricKey};
use crate::error::{CryptoError, Result};

/// An encrypted record as stored in the object store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedRecord {
    /// IV used for this record (unique per seal).
    pub iv: GcmIv,

    /// The encrypted record payload.
    #[serde(with = "hex::serde")]
    pub ciphertext: Vec<u8>,

    /// Detached GCM authentication tag.
    pub tag: GcmTag,
}

impl SealedRecord {
    /// Seal a plaintext under the given per-record key.
    pub fn seal(plaintext: &[u8], key: &SymmetricKey) -> Result<Self> {
        let (iv, ciphertext, tag) = key.encrypt(plaintext)?;
        Ok(Self {
            iv,
            ciphertext,
            tag,
        })
    }

    /// Seal a plaintext under a freshly generated key.
    ///
    /// Returns the envelope and the key; the caller is responsible for
    /// wrapping the key before it crosses any boundary.
    pub fn seal_fresh(plaintext: &[u8]) -> Result<(Self, SymmetricKey)> {
        let key = SymmetricKey::generate();
        let sealed = Self::seal(plaintext, &key)?;
        Ok((sealed, key))
    }

    /// Open the envelope with the record key.
    ///
    /// Fails with [`CryptoError::Authentication`] if the tag does not verify.
    pub fn open(&self, key: &SymmetricKey) -> Result<Vec<u8>> {
        key.decrypt(&self.iv, &self.ciphertext, &self.tag)
    }

    /// Serialize to the JSON byte payload handed to the object store.
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("envelope serialization failed")
    }

    /// Deserialize from stored bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| CryptoError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let (sealed, key) = SealedRecord::seal_fresh(b"bloodwork 2024-11").unwrap();
        let opened = sealed.open(&key).unwrap();
        assert_eq!(opened, b"bloodwork 2024-11");
    }

    #[test]
    fn test_envelope_bytes_roundtrip() {
        let (sealed, _) = SealedRecord::seal_fresh(b"x-ray").unwrap();
        let bytes = sealed.to_bytes();
        let recovered = SealedRecord::from_bytes(&bytes).unwrap();
        assert_eq!(sealed, recovered);
    }

    #[test]
    fn test_envelope_json_fields_are_hex() {
        let (sealed, _) = SealedRecord::seal_fresh(b"mri").unwrap();
        let json: serde_json::Value = serde_json::from_slice(&sealed.to_bytes()).unwrap();
        assert!(json["iv"].as_str().unwrap().len() == 24);
        assert!(json["ciphertext"].is_string());
        assert!(json["tag"].as_str().unwrap().len() == 32);
    }

    #[test]
    fn test_bit_flip_anywhere_fails_closed() {
        let plaintext = b"four bytes of truth";
        let (sealed, key) = SealedRecord::seal_fresh(plaintext).unwrap();

        // Flip one bit in each component in turn.
        let mut iv = sealed.clone();
        iv.iv.0[3] ^= 0x80;
        assert!(matches!(iv.open(&key), Err(CryptoError::Authentication)));

        let mut ct = sealed.clone();
        ct.ciphertext[0] ^= 0x01;
        assert!(matches!(ct.open(&key), Err(CryptoError::Authentication)));

        let mut tag = sealed.clone();
        tag.tag.0[15] ^= 0x10;
        assert!(matches!(tag.open(&key), Err(CryptoError::Authentication)));
    }
}
