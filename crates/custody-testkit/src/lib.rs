//! # Custody Kernel Testkit
//!
//! Shared fixtures and property generators for exercising the custody
//! kernel: deterministic parties wired to common in-memory backends, a
//! flaky-ledger decorator for retry paths, and proptest strategies over
//! the core value types.

pub mod fixtures;
pub mod generators;

pub use fixtures::{delegated_pair, keypair, FlakyLedger, TestFixture};
