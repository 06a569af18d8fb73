//! # Custody Kernel Permissions
//!
//! Access grants and the local permission mirror.
//!
//! ## Overview
//!
//! The ledger is the authority on who may touch what; this crate holds the
//! grant model and a denormalized local mirror of active leases for fast
//! pre-checks. The mirror is eventually consistent with the ledger and is
//! never the final word on an access decision.
//!
//! ## Key Concepts
//!
//! - **AccessGrant**: a deadline-bounded lease from an owner to a grantee
//! - **GrantScope**: `Read { record_ids }` or record-set-agnostic `Write`
//! - **Mirror**: async trait over the shared lease cache, with idempotent
//!   last-writer-wins upserts ordered by ledger tx reference

pub mod error;
pub mod grant;
pub mod mirror;

pub use error::{PermsError, Result};
pub use grant::{AccessGrant, GrantScope};
pub use mirror::{MemoryMirror, Mirror, MirrorEntry, MirrorKey, UpsertOutcome};
