//! Symmetric record encryption.
//!
//! AES-256-GCM with a fresh random 96-bit IV per call. The IV always comes
//! from the CSPRNG; there is no counter to share (or collide) across
//! processes.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CryptoError, Result};

/// Length of the GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// A 256-bit symmetric key for AES-256-GCM.
///
/// Generated per record at creation time. Never persisted in the clear;
/// it only leaves the process wrapped inside a [`crate::WrappedKey`].
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey([u8; 32]);

impl SymmetricKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, checking the length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength {
                expected: 32,
                got: bytes.len(),
            })?;
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encrypt a plaintext under a fresh random IV.
    ///
    /// Returns the IV, the ciphertext, and the detached authentication tag.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<(GcmIv, Vec<u8>, GcmTag)> {
        let iv = GcmIv::generate();
        let cipher = Aes256Gcm::new_from_slice(&self.0)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;

        let nonce = Nonce::from_slice(&iv.0);
        let mut combined = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;

        // aes-gcm appends the tag to the ciphertext; detach it so the
        // envelope carries the two separately.
        let split = combined.len() - TAG_LEN;
        let tag_bytes = combined.split_off(split);
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&tag_bytes);

        Ok((iv, combined, GcmTag(tag)))
    }

    /// Decrypt a ciphertext, verifying the authentication tag first.
    ///
    /// Fails with [`CryptoError::Authentication`] on any mismatch; no
    /// plaintext is released in that case.
    pub fn decrypt(&self, iv: &GcmIv, ciphertext: &[u8], tag: &GcmTag) -> Result<Vec<u8>> {
        let cipher = Aes256Gcm::new_from_slice(&self.0)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;

        let mut combined = Vec::with_capacity(ciphertext.len() + TAG_LEN);
        combined.extend_from_slice(ciphertext);
        combined.extend_from_slice(&tag.0);

        let nonce = Nonce::from_slice(&iv.0);
        cipher
            .decrypt(nonce, combined.as_slice())
            .map_err(|_| CryptoError::Authentication)
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material.
        write!(f, "SymmetricKey(..)")
    }
}

/// A 96-bit IV for AES-256-GCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcmIv(#[serde(with = "hex::serde")] pub [u8; 12]);

impl GcmIv {
    /// Generate a new random IV.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; 12];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }
}

/// A 128-bit GCM authentication tag, stored detached from the ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcmTag(#[serde(with = "hex::serde")] pub [u8; 16]);

impl GcmTag {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}
