//! # Custody Kernel Tokens
//!
//! Single-use access tokens, from request to consumption.
//!
//! ## Overview
//!
//! Every object-store operation is gated by a token the ledger mints,
//! the requester signs, and the ledger validates and consumes, all in one
//! atomic decision on the ledger side. This crate models that lifecycle as
//! a typestate machine: [`TokenClient`] requests, [`RequestedToken`] is
//! signed into a [`SignedToken`], and redeeming it yields a
//! [`StoragePermit`] that the storage layer requires.
//!
//! Transient ledger unavailability is retried with exponential backoff;
//! refusals are final.

pub mod error;
pub mod protocol;

pub use error::{Result, TokenError};
pub use protocol::{RequestedToken, SignedToken, StoragePermit, TokenClient, TokenConfig};
