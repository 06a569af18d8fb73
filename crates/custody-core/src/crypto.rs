//! Cryptographic primitives for the custody kernel.
//!
//! Wraps secp256k1 signing/key-agreement and SHA-256 hashing with strong types.
//! A single secp256k1 key pair serves both roles a principal needs: ECDSA
//! signatures over access-token hashes and ECDH agreement for key wrapping.

use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{PublicKey, SecretKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::CoreError;

/// A 32-byte SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sha256Digest(pub [u8; 32]);

impl Sha256Digest {
    /// Compute the SHA-256 digest of the given data.
    pub fn hash(data: &[u8]) -> Self {
        use sha2::{Digest, Sha256};
        let out = Sha256::digest(data);
        Self(out.into())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s).map_err(|_| CoreError::InvalidHex)?;
        let arr: [u8; 32] = bytes.try_into().map_err(|_| CoreError::InvalidLength {
            expected: 32,
            got: s.len() / 2,
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha256({})", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Sha256Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Sha256Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// A secp256k1 public key in 33-byte SEC1 compressed form.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Secp256k1PublicKey(pub [u8; 33]);

impl Secp256k1PublicKey {
    /// Create from raw SEC1 compressed bytes, validating the curve point.
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let pk = PublicKey::from_sec1_bytes(bytes).map_err(|_| CoreError::InvalidPublicKey)?;
        let point = pk.to_encoded_point(true);
        let mut arr = [0u8; 33];
        arr.copy_from_slice(point.as_bytes());
        Ok(Self(arr))
    }

    /// Get the raw SEC1 compressed bytes.
    pub const fn as_bytes(&self) -> &[u8; 33] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s).map_err(|_| CoreError::InvalidHex)?;
        Self::from_sec1_bytes(&bytes)
    }

    /// Convert to a k256 public key for ECDH.
    pub fn to_k256(&self) -> Result<PublicKey, CoreError> {
        PublicKey::from_sec1_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)
    }

    /// Verify an ECDSA signature over a message.
    ///
    /// The message is the exact byte sequence that was signed; it must not
    /// be re-encoded between signing and verification.
    pub fn verify(&self, message: &[u8], signature: &EcdsaSignature) -> Result<(), CoreError> {
        let verifying_key =
            VerifyingKey::from_sec1_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)?;

        let sig =
            Signature::from_slice(&signature.0).map_err(|_| CoreError::InvalidSignature)?;

        verifying_key
            .verify(message, &sig)
            .map_err(|_| CoreError::InvalidSignature)
    }
}

impl fmt::Debug for Secp256k1PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secp256k1Pub({})", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Secp256k1PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// Hex-string serde: the key crosses JSON boundaries in the same format the
// ledger and envelope use.
impl Serialize for Secp256k1PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Secp256k1PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A 64-byte ECDSA signature in fixed (r || s) form.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct EcdsaSignature(pub [u8; 64]);

impl EcdsaSignature {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for EcdsaSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EcdsaSig({}...)", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for EcdsaSignature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for EcdsaSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for EcdsaSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        let arr: [u8; 64] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("signature must be 64 bytes"))?;
        Ok(Self(arr))
    }
}

/// A principal's secp256k1 key pair.
///
/// The secret scalar never leaves this struct except via [`Keypair::seed`],
/// which exists for deterministic test setups.
#[derive(Clone)]
pub struct Keypair {
    secret: SecretKey,
}

impl Keypair {
    /// Generate a new random key pair.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let secret = SecretKey::random(&mut rng);
        Self { secret }
    }

    /// Create from a 32-byte scalar seed.
    ///
    /// Fails on the zero scalar and values >= the curve order.
    pub fn from_seed(seed: &[u8; 32]) -> Result<Self, CoreError> {
        let secret = SecretKey::from_slice(seed).map_err(|_| CoreError::InvalidSecretKey)?;
        Ok(Self { secret })
    }

    /// Get the public key.
    pub fn public_key(&self) -> Secp256k1PublicKey {
        let point = self.secret.public_key().to_encoded_point(true);
        let mut arr = [0u8; 33];
        arr.copy_from_slice(point.as_bytes());
        Secp256k1PublicKey(arr)
    }

    /// Sign a message with ECDSA.
    pub fn sign(&self, message: &[u8]) -> EcdsaSignature {
        let signing_key = SigningKey::from(&self.secret);
        let sig: Signature = signing_key.sign(message);
        let mut arr = [0u8; 64];
        arr.copy_from_slice(sig.to_bytes().as_slice());
        EcdsaSignature(arr)
    }

    /// Perform ECDH key agreement with a peer's public key.
    ///
    /// Returns the 32-byte x-coordinate of the shared point. Callers derive
    /// encryption keys from it; the raw secret is never used as a key directly.
    pub fn diffie_hellman(&self, peer: &Secp256k1PublicKey) -> Result<[u8; 32], CoreError> {
        let peer_key = peer.to_k256()?;
        let shared =
            k256::ecdh::diffie_hellman(self.secret.to_nonzero_scalar(), peer_key.as_affine());
        let mut out = [0u8; 32];
        out.copy_from_slice(shared.raw_secret_bytes().as_slice());
        Ok(out)
    }

    /// Get the raw scalar bytes (secret key material).
    pub fn seed(&self) -> [u8; 32] {
        self.secret.to_bytes().into()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({:?})", self.public_key())
    }
}
