//! Identity and reference types shared across the custody kernel.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::{Secp256k1PublicKey, Sha256Digest};
use crate::error::CoreError;

/// A principal's 20-byte ledger address.
///
/// Derived from the public key, so it is stable and publicly recomputable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrincipalId(pub [u8; 20]);

impl PrincipalId {
    /// Derive the address from a public key: the last 20 bytes of the
    /// SHA-256 digest of the compressed SEC1 encoding.
    pub fn derive(public_key: &Secp256k1PublicKey) -> Self {
        let digest = Sha256Digest::hash(public_key.as_bytes());
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&digest.as_bytes()[12..]);
        Self(arr)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s).map_err(|_| CoreError::InvalidHex)?;
        let arr: [u8; 20] = bytes.try_into().map_err(|_| CoreError::InvalidLength {
            expected: 20,
            got: s.len() / 2,
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Principal({})", &self.to_hex()[..12])
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// The role a principal plays in a sharing relationship.
///
/// A closed enum rather than a string field: behavior dispatches on the
/// variant, and there is no third state to mistype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Creates records and grants access to them.
    Owner,
    /// Receives time-bounded access from an owner.
    Custodian,
}

/// Public descriptor of a principal: identity, key, role.
///
/// The private key stays in [`crate::Keypair`] inside the principal's own
/// process; this struct is what other parties see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Ledger address.
    pub id: PrincipalId,
    /// Public half of the key pair.
    pub public_key: Secp256k1PublicKey,
    /// Owner or custodian.
    pub role: Role,
}

impl Principal {
    /// Build a descriptor from a public key and role.
    pub fn new(public_key: Secp256k1PublicKey, role: Role) -> Self {
        Self {
            id: PrincipalId::derive(&public_key),
            public_key,
            role,
        }
    }
}

/// Content address of a record: the SHA-256 digest of its plaintext.
///
/// Doubles as the object-store key, so identical plaintexts collapse to one
/// stored object per owner namespace.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub [u8; 32]);

impl RecordId {
    /// Compute the content address of a plaintext.
    pub fn for_plaintext(plaintext: &[u8]) -> Self {
        Self(*Sha256Digest::hash(plaintext).as_bytes())
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
        Ok(Self(*Sha256Digest::from_hex(s)?.as_bytes()))
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Record({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Hash identifying a minted access token.
///
/// The ledger is the sole source of token hashes; the client never derives
/// one locally.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenHash(pub [u8; 32]);

impl TokenHash {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    ///
    /// Signatures are computed over exactly these bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for TokenHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", &self.to_hex()[..16])
    }
}

/// What a token or grant authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessKind {
    /// Fetch specific records.
    Read,
    /// Store or delete records (record-set-agnostic at grant time).
    Write,
}

/// Monotonic reference to a ledger transaction.
///
/// Assigned by the ledger; later writes carry strictly greater values, which
/// the permission mirror uses for last-writer-wins ordering.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct LedgerTxRef(pub u64);

impl fmt::Display for LedgerTxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx:{}", self.0)
    }
}

/// Current time in Unix milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}
