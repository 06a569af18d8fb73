//! Access grants: the leases an owner extends to a custodian.
//!
//! Read grants name specific records; write grants are relationship-scoped
//! and carry no record list. The scope enum makes the difference structural
//! rather than a nullable field.

use serde::{Deserialize, Serialize};

use custody_core::{AccessKind, LedgerTxRef, PrincipalId, RecordId};

/// What an access grant covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrantScope {
    /// Read access to a specific set of records.
    Read {
        /// The records the grantee may fetch.
        record_ids: Vec<RecordId>,
    },

    /// Blanket future-write capability for the relationship.
    ///
    /// No record list: the records don't exist yet.
    Write,
}

impl GrantScope {
    /// The access kind this scope corresponds to.
    pub fn kind(&self) -> AccessKind {
        match self {
            GrantScope::Read { .. } => AccessKind::Read,
            GrantScope::Write => AccessKind::Write,
        }
    }

    /// Whether this scope covers a given record.
    ///
    /// Write scopes cover any record the grantee will create.
    pub fn covers(&self, record_id: &RecordId) -> bool {
        match self {
            GrantScope::Read { record_ids } => record_ids.contains(record_id),
            GrantScope::Write => true,
        }
    }

    /// Whether every requested record is within this scope.
    pub fn covers_all(&self, requested: &[RecordId]) -> bool {
        match self {
            GrantScope::Read { record_ids } => requested.iter().all(|r| record_ids.contains(r)),
            GrantScope::Write => true,
        }
    }
}

/// A time-bounded lease from an owner to a grantee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    /// The record owner extending the lease.
    pub owner: PrincipalId,

    /// The principal receiving access.
    pub grantee: PrincipalId,

    /// What is covered.
    pub scope: GrantScope,

    /// Absolute expiry (Unix ms). Past this instant the grant is logically
    /// revoked even if not yet purged anywhere.
    pub deadline: i64,

    /// The ledger transaction that recorded this grant.
    pub tx_ref: LedgerTxRef,
}

impl AccessGrant {
    /// Create a read grant over specific records.
    pub fn read(
        owner: PrincipalId,
        grantee: PrincipalId,
        record_ids: Vec<RecordId>,
        deadline: i64,
        tx_ref: LedgerTxRef,
    ) -> Self {
        Self {
            owner,
            grantee,
            scope: GrantScope::Read { record_ids },
            deadline,
            tx_ref,
        }
    }

    /// Create a relationship-scoped write grant.
    pub fn write(
        owner: PrincipalId,
        grantee: PrincipalId,
        deadline: i64,
        tx_ref: LedgerTxRef,
    ) -> Self {
        Self {
            owner,
            grantee,
            scope: GrantScope::Write,
            deadline,
            tx_ref,
        }
    }

    /// Whether the lease is still live at `now`.
    pub fn is_active(&self, now: i64) -> bool {
        self.deadline > now
    }
}
