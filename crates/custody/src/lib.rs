//! # Custody Kernel
//!
//! Envelope-encrypted record custody with ledger-anchored delegation.
//!
//! ## Overview
//!
//! Records are sealed under per-record symmetric keys; those keys travel
//! only inside recipient-specific wraps. A ledger oracle holds the grants
//! and mints the single-use tokens that gate every object operation, and a
//! local mirror caches active leases for fast pre-checks without ever
//! owning the decision.
//!
//! [`Vault`] ties the layers together for one principal:
//!
//! ```no_run
//! use std::sync::Arc;
//! use custody::{Vault, VaultConfig};
//! use custody_core::{Keypair, Role};
//! use custody_perms::MemoryMirror;
//! use custody_store::{MemoryLedger, MemoryObjectStore};
//!
//! # async fn demo() -> custody::Result<()> {
//! let ledger = Arc::new(MemoryLedger::new());
//! let objects = Arc::new(MemoryObjectStore::new());
//! let mirror = Arc::new(MemoryMirror::new());
//!
//! let owner = Vault::new(
//!     Keypair::generate(),
//!     Role::Owner,
//!     ledger,
//!     objects,
//!     mirror,
//!     VaultConfig::default(),
//! );
//! owner.register().await?;
//!
//! let record_id = owner.create_record(b"blood panel, 2026-08").await?;
//! let plaintexts = owner.read_records(&owner.id(), &[record_id]).await?;
//! assert_eq!(plaintexts[0], b"blood panel, 2026-08");
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod vault;

pub use error::{Result, VaultError};
pub use vault::{Vault, VaultConfig};

// Re-export the layer crates for single-dependency consumers.
pub use custody_core as core;
pub use custody_crypto as crypto;
pub use custody_perms as perms;
pub use custody_store as store;
pub use custody_token as token;
