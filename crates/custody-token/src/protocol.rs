//! Token lifecycle state machine.
//!
//! A token moves Requested -> Signed -> Consumed, with Expired and
//! Abandoned as terminal side exits. The states are separate types, so a
//! token cannot be presented unsigned or redeemed twice: `sign` and
//! `redeem` take `self` by value and each state exists at most once.
//!
//! The ledger stays authoritative throughout. The client never invents a
//! token hash, never decides expiry, and treats a refused mint as final.
//! Only transport-level unavailability is retried, with exponential
//! backoff, because no local fallback decision is permitted.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use custody_core::{now_millis, AccessKind, EcdsaSignature, Keypair, PrincipalId, RecordId,
    Sha256Digest, TokenHash};
use custody_store::{Ledger, MintedToken};

use crate::error::{Result, TokenError};

/// Configuration for token client behavior.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Retries against an unreachable ledger before giving up.
    pub max_retries: u32,
    /// First backoff delay; doubles per attempt.
    pub backoff_base: Duration,
    /// How long a requested token may sit unsigned before it is abandoned.
    pub sign_timeout: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_millis(200),
            sign_timeout: Duration::from_secs(30),
        }
    }
}

/// Retry loop for ledger calls. Only transient errors are retried;
/// refusals are final on the first answer.
async fn retrying<T, Fut>(
    config: &TokenConfig,
    what: &str,
    mut op: impl FnMut() -> Fut,
) -> Result<T>
where
    Fut: Future<Output = custody_store::Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => {
                attempt += 1;
                if attempt > config.max_retries {
                    return Err(TokenError::Exhausted {
                        attempts: attempt,
                        last: err.to_string(),
                    });
                }
                let delay = config.backoff_base * 2u32.pow(attempt - 1);
                warn!(what, attempt, delay_ms = delay.as_millis() as u64,
                    "ledger unreachable, backing off");
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Entry point for a principal's token operations against one ledger.
pub struct TokenClient<L> {
    ledger: Arc<L>,
    principal: PrincipalId,
    config: TokenConfig,
}

impl<L: Ledger> TokenClient<L> {
    /// Create a client for the given principal.
    pub fn new(ledger: Arc<L>, principal: PrincipalId, config: TokenConfig) -> Self {
        Self {
            ledger,
            principal,
            config,
        }
    }

    /// Request a read token for specific records owned by `owner`.
    ///
    /// An empty record set is rejected locally; the ledger is not asked to
    /// mint a token that could not authorize anything.
    pub async fn request_read(
        &self,
        owner: PrincipalId,
        record_ids: Vec<RecordId>,
    ) -> Result<RequestedToken<'_, L>> {
        if record_ids.is_empty() {
            return Err(TokenError::EmptyRecordSet);
        }
        let minted = retrying(&self.config, "mint_read_token", || {
            self.ledger
                .mint_read_token(&self.principal, &owner, &record_ids)
        })
        .await?;
        debug!(token = %minted.token_hash.to_hex(), "read token requested");
        Ok(RequestedToken {
            client: self,
            minted,
            kind: AccessKind::Read,
            owner,
            record_ids,
            requested_at: Instant::now(),
        })
    }

    /// Request a write token for the relationship with `owner`.
    pub async fn request_write(&self, owner: PrincipalId) -> Result<RequestedToken<'_, L>> {
        let minted = retrying(&self.config, "mint_write_token", || {
            self.ledger.mint_write_token(&self.principal, &owner)
        })
        .await?;
        debug!(token = %minted.token_hash.to_hex(), "write token requested");
        Ok(RequestedToken {
            client: self,
            minted,
            kind: AccessKind::Write,
            owner,
            record_ids: Vec::new(),
            requested_at: Instant::now(),
        })
    }
}

/// A minted token awaiting the requester's signature.
pub struct RequestedToken<'c, L> {
    client: &'c TokenClient<L>,
    minted: MintedToken,
    kind: AccessKind,
    owner: PrincipalId,
    record_ids: Vec<RecordId>,
    requested_at: Instant,
}

impl<L> std::fmt::Debug for RequestedToken<'_, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestedToken")
            .field("minted", &self.minted)
            .field("kind", &self.kind)
            .field("owner", &self.owner)
            .field("record_ids", &self.record_ids)
            .field("requested_at", &self.requested_at)
            .finish_non_exhaustive()
    }
}

impl<'c, L: Ledger> RequestedToken<'c, L> {
    /// The ledger-issued token hash.
    pub fn token_hash(&self) -> TokenHash {
        self.minted.token_hash
    }

    /// Ledger-side expiry (Unix ms).
    pub fn expiry(&self) -> i64 {
        self.minted.expiry
    }

    /// Sign the token hash, exactly as issued.
    ///
    /// The signature covers the raw 32 hash bytes with no framing, so the
    /// ledger can verify against the identical bytes it minted. A token
    /// that sat past the sign timeout is abandoned instead: never signed,
    /// never presented, left for the ledger's expiry sweep.
    pub fn sign(self, keypair: &Keypair) -> Result<SignedToken<'c, L>> {
        let waited = self.requested_at.elapsed();
        if waited >= self.client.config.sign_timeout {
            debug!(token = %self.minted.token_hash.to_hex(), "token abandoned unsigned");
            return Err(TokenError::Abandoned {
                waited_ms: waited.as_millis() as u64,
                timeout_ms: self.client.config.sign_timeout.as_millis() as u64,
            });
        }
        let signature = keypair.sign(self.minted.token_hash.as_bytes());
        Ok(SignedToken {
            client: self.client,
            minted: self.minted,
            signature,
            kind: self.kind,
            owner: self.owner,
            record_ids: self.record_ids,
        })
    }
}

/// A signed token ready to present for validation.
pub struct SignedToken<'c, L> {
    client: &'c TokenClient<L>,
    minted: MintedToken,
    signature: EcdsaSignature,
    kind: AccessKind,
    owner: PrincipalId,
    record_ids: Vec<RecordId>,
}

impl<L> std::fmt::Debug for SignedToken<'_, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedToken")
            .field("minted", &self.minted)
            .field("signature", &self.signature)
            .field("kind", &self.kind)
            .field("owner", &self.owner)
            .field("record_ids", &self.record_ids)
            .finish_non_exhaustive()
    }
}

impl<L: Ledger> SignedToken<'_, L> {
    /// The signature over the token hash.
    pub fn signature(&self) -> EcdsaSignature {
        self.signature
    }

    /// Present the token for validation and consumption.
    ///
    /// `wrapped_key_refs` are the digests of the wrapped keys the caller
    /// intends to use, ordered to match the record set; the ledger checks
    /// them against the grant. Consumes the token on the ledger: a second
    /// presentation of the same hash fails there, and this value is gone
    /// here.
    pub async fn redeem(self, wrapped_key_refs: &[Sha256Digest]) -> Result<StoragePermit> {
        retrying(&self.client.config, "validate", || {
            self.client.ledger.validate(
                &self.minted.token_hash,
                &self.signature,
                self.kind,
                &self.record_ids,
                wrapped_key_refs,
            )
        })
        .await?;
        debug!(token = %self.minted.token_hash.to_hex(), "token redeemed");
        Ok(StoragePermit {
            kind: self.kind,
            owner: self.owner,
            record_ids: self.record_ids,
            granted_at: now_millis(),
        })
    }
}

/// Proof that a token was validated and consumed.
///
/// The storage layer performs object operations only against one of these.
/// The fields are private and the only constructor is a successful
/// [`SignedToken::redeem`]; it is not `Clone`, so the storage path takes it
/// by value and one validation backs one storage call.
#[derive(Debug)]
pub struct StoragePermit {
    kind: AccessKind,
    owner: PrincipalId,
    record_ids: Vec<RecordId>,
    granted_at: i64,
}

impl StoragePermit {
    /// What the permit authorizes.
    pub fn kind(&self) -> AccessKind {
        self.kind
    }

    /// The owner whose namespace the operations target.
    pub fn owner(&self) -> PrincipalId {
        self.owner
    }

    /// The records covered (empty for write permits).
    pub fn record_ids(&self) -> &[RecordId] {
        &self.record_ids
    }

    /// When validation succeeded (Unix ms).
    pub fn granted_at(&self) -> i64 {
        self.granted_at
    }

    /// Whether the permit covers a read of the given record.
    pub fn covers_read(&self, record_id: &RecordId) -> bool {
        self.kind == AccessKind::Read && self.record_ids.contains(record_id)
    }

    /// Whether the permit authorizes writes.
    pub fn allows_write(&self) -> bool {
        self.kind == AccessKind::Write
    }
}
