//! # Custody Kernel Store
//!
//! Contracts for the two external systems the kernel leans on, plus
//! in-memory reference implementations for tests and embedding.
//!
//! ## Overview
//!
//! - [`Ledger`]: the authoritative oracle for grants, revocations, and
//!   single-use access tokens. Every access decision terminates here.
//! - [`ObjectStore`]: content-addressed storage for sealed envelopes,
//!   keyed by owner namespace and record id. Crypto-unaware.
//!
//! The in-memory implementations ([`MemoryLedger`], [`MemoryObjectStore`])
//! honor the same observable semantics a remote deployment must: mint
//! refusal without a live lease, atomic validate-and-consume, monotonic
//! transaction references.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::{MemoryLedger, MemoryObjectStore, DEFAULT_TOKEN_TTL_MS};
pub use traits::{GrantRequest, Ledger, LedgerEvent, LedgerEventKind, MintedToken, ObjectStore};
