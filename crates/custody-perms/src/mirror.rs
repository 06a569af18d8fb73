//! The local permission mirror.
//!
//! A denormalized, queryable copy of the ledger's active grants, used for
//! fast authorization pre-checks and UI-level filtering. The mirror is a
//! best-effort cache: its writes and the ledger's writes are independent
//! operations with no shared transaction, so every mutation here is
//! idempotent and safe to retry, and the final access decision always
//! re-checks the ledger.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use custody_core::{AccessKind, LedgerTxRef, PrincipalId, RecordId};

use crate::error::Result;
use crate::grant::{AccessGrant, GrantScope};

/// Key for one mirror lease: (grantee, owner, record | *).
///
/// Read leases carry the record; the single write lease per relationship
/// has `record: None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MirrorKey {
    pub grantee: PrincipalId,
    pub owner: PrincipalId,
    pub record: Option<RecordId>,
}

/// One denormalized lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorEntry {
    /// The record owner.
    pub owner: PrincipalId,
    /// The principal holding the lease.
    pub grantee: PrincipalId,
    /// Read or write.
    pub kind: AccessKind,
    /// The covered record; `None` for relationship-scoped write leases.
    pub record: Option<RecordId>,
    /// Absolute expiry (Unix ms).
    pub deadline: i64,
    /// Ledger transaction that produced this lease state.
    pub tx_ref: LedgerTxRef,
}

impl MirrorEntry {
    /// The mirror key for this entry.
    pub fn key(&self) -> MirrorKey {
        MirrorKey {
            grantee: self.grantee,
            owner: self.owner,
            record: self.record,
        }
    }

    /// Explode a grant into its mirror entries: one per record for read
    /// grants, a single relationship entry for write grants.
    pub fn from_grant(grant: &AccessGrant) -> Vec<Self> {
        match &grant.scope {
            GrantScope::Read { record_ids } => record_ids
                .iter()
                .map(|record_id| Self {
                    owner: grant.owner,
                    grantee: grant.grantee,
                    kind: AccessKind::Read,
                    record: Some(*record_id),
                    deadline: grant.deadline,
                    tx_ref: grant.tx_ref,
                })
                .collect(),
            GrantScope::Write => vec![Self {
                owner: grant.owner,
                grantee: grant.grantee,
                kind: AccessKind::Write,
                record: None,
                deadline: grant.deadline,
                tx_ref: grant.tx_ref,
            }],
        }
    }

    /// Whether the lease is live at `now`.
    pub fn is_active(&self, now: i64) -> bool {
        self.deadline > now
    }
}

/// Outcome of a mirror upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No lease existed for this key.
    Inserted,
    /// An older lease was replaced.
    Replaced,
    /// The incoming lease was older than the stored one; nothing changed.
    /// Only a delayed out-of-date write lands here — an exact retry (same
    /// tx_ref, same deadline) re-applies and reports `Replaced`.
    Stale,
}

/// The mirror store: async interface over the shared lease cache.
///
/// Implementations must resolve concurrent upserts on the same key with
/// last-writer-wins on `(tx_ref, deadline)` — never a blind overwrite.
#[async_trait]
pub trait Mirror: Send + Sync {
    /// Insert or update a lease.
    ///
    /// Applies only if the incoming entry carries a newer tx_ref, or the
    /// same tx_ref with a later-or-equal deadline.
    async fn upsert(&self, entry: MirrorEntry) -> Result<UpsertOutcome>;

    /// Remove a single lease. Returns whether it existed.
    async fn remove(&self, key: &MirrorKey) -> Result<bool>;

    /// Remove every lease a grantee holds from one owner.
    async fn remove_relationship(
        &self,
        grantee: &PrincipalId,
        owner: &PrincipalId,
    ) -> Result<usize>;

    /// Remove every lease a grantee holds, from any owner.
    async fn remove_all(&self, grantee: &PrincipalId) -> Result<usize>;

    /// Remove every lease on one record, whoever holds it.
    ///
    /// Used when the record itself is deleted.
    async fn remove_record(&self, owner: &PrincipalId, record_id: &RecordId) -> Result<usize>;

    /// All leases a grantee holds with `deadline > now`.
    async fn active_grants(&self, grantee: &PrincipalId, now: i64) -> Result<Vec<MirrorEntry>>;

    /// Purge leases whose deadline has passed. Returns the purge count.
    ///
    /// Idempotent and safe to run concurrently with itself.
    async fn sweep_expired(&self, now: i64) -> Result<usize>;

    /// Drop every lease. Used when rebuilding from the ledger.
    async fn clear(&self) -> Result<()>;
}

/// In-memory mirror implementation.
///
/// Thread-safe via RwLock; all mutations take the write lock so concurrent
/// upserts on one key serialize through the LWW check.
pub struct MemoryMirror {
    entries: RwLock<HashMap<MirrorKey, MirrorEntry>>,
}

impl MemoryMirror {
    /// Create an empty mirror.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of leases currently held (including expired, pre-sweep).
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Whether the mirror holds no leases.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryMirror {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Mirror for MemoryMirror {
    async fn upsert(&self, entry: MirrorEntry) -> Result<UpsertOutcome> {
        let mut entries = self.entries.write().unwrap();
        let key = entry.key();

        match entries.get(&key) {
            None => {
                entries.insert(key, entry);
                Ok(UpsertOutcome::Inserted)
            }
            Some(existing) => {
                let newer = entry.tx_ref > existing.tx_ref
                    || (entry.tx_ref == existing.tx_ref && entry.deadline >= existing.deadline);
                if newer {
                    entries.insert(key, entry);
                    Ok(UpsertOutcome::Replaced)
                } else {
                    Ok(UpsertOutcome::Stale)
                }
            }
        }
    }

    async fn remove(&self, key: &MirrorKey) -> Result<bool> {
        let mut entries = self.entries.write().unwrap();
        Ok(entries.remove(key).is_some())
    }

    async fn remove_relationship(
        &self,
        grantee: &PrincipalId,
        owner: &PrincipalId,
    ) -> Result<usize> {
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|key, _| !(key.grantee == *grantee && key.owner == *owner));
        Ok(before - entries.len())
    }

    async fn remove_all(&self, grantee: &PrincipalId) -> Result<usize> {
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|key, _| key.grantee != *grantee);
        Ok(before - entries.len())
    }

    async fn remove_record(&self, owner: &PrincipalId, record_id: &RecordId) -> Result<usize> {
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|key, _| !(key.owner == *owner && key.record == Some(*record_id)));
        Ok(before - entries.len())
    }

    async fn active_grants(&self, grantee: &PrincipalId, now: i64) -> Result<Vec<MirrorEntry>> {
        let entries = self.entries.read().unwrap();
        Ok(entries
            .values()
            .filter(|e| e.grantee == *grantee && e.is_active(now))
            .cloned()
            .collect())
    }

    async fn sweep_expired(&self, now: i64) -> Result<usize> {
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|_, e| e.is_active(now));
        let purged = before - entries.len();
        if purged > 0 {
            tracing::debug!(purged, "swept expired mirror leases");
        }
        Ok(purged)
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().unwrap().clear();
        Ok(())
    }
}
