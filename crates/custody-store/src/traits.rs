//! Abstract contracts for the external collaborators.
//!
//! The ledger oracle and the object store are systems the core does not
//! own: the ledger records grants, revocations, and token state with
//! single-writer semantics per token; the object store holds opaque
//! encrypted envelopes keyed by owner namespace and content address. These
//! traits let the core stay agnostic of how either is reached.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use custody_core::{
    AccessKind, EcdsaSignature, LedgerTxRef, Principal, PrincipalId, RecordId, Sha256Digest,
    TokenHash,
};
use custody_crypto::WrappedKey;
use custody_perms::{AccessGrant, GrantScope};

use crate::error::Result;

/// A token freshly minted by the ledger.
///
/// The ledger is the sole source of both fields; the client never derives
/// a token hash or an expiry locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintedToken {
    /// Hash identifying the token. Signed as-is, byte for byte.
    pub token_hash: TokenHash,
    /// Ledger-side expiry (Unix ms), independent of any client timeout.
    pub expiry: i64,
}

/// A grant submission: what the owner asks the ledger to record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantRequest {
    /// The owner extending access.
    pub owner: PrincipalId,
    /// The principal receiving it.
    pub grantee: PrincipalId,
    /// Read (specific records) or write (relationship-scoped).
    pub scope: GrantScope,
    /// Keys re-wrapped for the grantee, one per granted record.
    ///
    /// Empty for write grants, which carry no key material.
    pub wrapped_keys: Vec<(RecordId, WrappedKey)>,
    /// Absolute expiry (Unix ms). Must be in the future.
    pub deadline: i64,
}

/// An event the ledger emits, observed by the sync layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// The transaction that produced the event.
    pub tx_ref: LedgerTxRef,
    /// What happened.
    pub kind: LedgerEventKind,
}

/// The kinds of event the mirror cares about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LedgerEventKind {
    /// A grant was recorded (or re-recorded with a new deadline).
    Granted(AccessGrant),
    /// Specific read leases were revoked.
    Revoked {
        owner: PrincipalId,
        grantee: PrincipalId,
        record_ids: Vec<RecordId>,
    },
    /// Every lease between the pair was revoked.
    RevokedAll {
        owner: PrincipalId,
        grantee: PrincipalId,
    },
    /// A record was deleted, along with every lease and key on it.
    RecordRemoved {
        owner: PrincipalId,
        record_id: RecordId,
    },
    /// A token was minted.
    TokenMinted {
        token_hash: TokenHash,
        requester: PrincipalId,
        kind: AccessKind,
        expiry: i64,
    },
}

/// The ledger oracle: the authoritative record of grants and token state.
///
/// # Semantics
///
/// - **Mint refusal**: a token request without a live covering grant is
///   refused outright; no token is issued.
/// - **Single consumption**: `validate` consumes the token exactly once.
///   Concurrent validations of one token hash resolve so that exactly one
///   observes success.
/// - **Monotonic tx refs**: every state change carries a strictly
///   increasing [`LedgerTxRef`].
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Register a principal's public identity on the ledger.
    async fn register_principal(&self, principal: Principal) -> Result<LedgerTxRef>;

    /// Register a record and the owner's own wrapped copy of its key.
    async fn register_record(
        &self,
        owner: &PrincipalId,
        record_id: RecordId,
        wrapped_key: WrappedKey,
    ) -> Result<LedgerTxRef>;

    /// Unregister a record: drop every wrapped key and read lease on it.
    ///
    /// Deleting a record must not leave dangling leases that let grantees
    /// keep minting tokens for it. Unregistering an unknown record is not
    /// an error.
    async fn unregister_record(
        &self,
        owner: &PrincipalId,
        record_id: &RecordId,
    ) -> Result<LedgerTxRef>;

    /// Fetch the wrapped keys a holder has for the given records.
    ///
    /// Ordered to match `record_ids`. Fails if any key is missing.
    async fn wrapped_keys(
        &self,
        owner: &PrincipalId,
        holder: &PrincipalId,
        record_ids: &[RecordId],
    ) -> Result<Vec<WrappedKey>>;

    /// Record a grant. Returns the grant with its assigned tx reference.
    ///
    /// Re-granting the same (grantee, record) is an upsert on the ledger
    /// side: one lease, latest deadline.
    async fn grant(&self, request: GrantRequest) -> Result<AccessGrant>;

    /// Revoke specific read leases.
    async fn revoke(
        &self,
        owner: &PrincipalId,
        grantee: &PrincipalId,
        record_ids: &[RecordId],
    ) -> Result<LedgerTxRef>;

    /// Revoke every lease (read and write) between the pair.
    async fn revoke_all(&self, owner: &PrincipalId, grantee: &PrincipalId)
        -> Result<LedgerTxRef>;

    /// Mint a read token bound to a specific record set.
    ///
    /// Refused when the requester holds no live read lease covering every
    /// requested record (owners implicitly cover their own records).
    async fn mint_read_token(
        &self,
        requester: &PrincipalId,
        owner: &PrincipalId,
        record_ids: &[RecordId],
    ) -> Result<MintedToken>;

    /// Mint a write token for the requester's write surface with `owner`.
    async fn mint_write_token(
        &self,
        requester: &PrincipalId,
        owner: &PrincipalId,
    ) -> Result<MintedToken>;

    /// Validate and consume a token. The authoritative access decision.
    ///
    /// Verifies, in order: the token exists; the signature is authentic for
    /// the requester that minted it, over the exact token-hash bytes; the
    /// token is not expired and not consumed; the presented record set is a
    /// subset of what the token was minted for; the wrapped-key digests
    /// match what the grant carried. On success the token is consumed —
    /// a second call fails with `TokenConsumed`.
    async fn validate(
        &self,
        token_hash: &TokenHash,
        signature: &EcdsaSignature,
        kind: AccessKind,
        record_ids: &[RecordId],
        wrapped_key_refs: &[Sha256Digest],
    ) -> Result<()>;

    /// Drop expired, unconsumed tokens. Returns the number dropped.
    ///
    /// Idempotent; safe to run concurrently with itself.
    async fn cleanup_expired_tokens(&self, now: i64) -> Result<usize>;

    /// Events after the given tx reference, in tx order.
    async fn events_since(&self, after: LedgerTxRef) -> Result<Vec<LedgerEvent>>;
}

/// Content-addressable store for encrypted envelopes.
///
/// Keys are (owner namespace, record id); payloads are opaque bytes — the
/// store has no crypto awareness.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store a payload. Overwrites any existing object at the key.
    async fn put(&self, owner: &PrincipalId, record_id: &RecordId, payload: Vec<u8>)
        -> Result<()>;

    /// Fetch a payload.
    async fn get(&self, owner: &PrincipalId, record_id: &RecordId) -> Result<Vec<u8>>;

    /// Delete a payload. Deleting a missing object is not an error.
    async fn delete(&self, owner: &PrincipalId, record_id: &RecordId) -> Result<()>;
}
