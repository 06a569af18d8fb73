//! The Vault: unified API for the custody kernel.
//!
//! A `Vault` is one principal's view of the system: it seals records,
//! delegates and revokes access, and reads records back, with every object
//! operation gated by a single-use token the ledger validates. The ledger
//! stays authoritative for every access decision; the local mirror only
//! accelerates pre-checks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use custody_core::{
    now_millis, Keypair, LedgerTxRef, Principal, PrincipalId, RecordId, Role, Sha256Digest,
};
use custody_crypto::{SealedRecord, WrappedKey};
use custody_perms::{AccessGrant, GrantScope, Mirror, MirrorEntry, MirrorKey, PermsError};
use custody_store::{GrantRequest, Ledger, LedgerEvent, LedgerEventKind, ObjectStore};
use custody_token::{StoragePermit, TokenClient, TokenConfig};

use crate::error::{Result, VaultError};

/// Configuration for vault behavior.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Token client behavior (retries, backoff, sign timeout).
    pub token: TokenConfig,
    /// Concurrent mirror upserts per batch when fanning out a grant.
    pub mirror_concurrency: usize,
    /// Interval between background sweeps of expired tokens and leases.
    pub sweep_interval: Duration,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            token: TokenConfig::default(),
            mirror_concurrency: 8,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// One principal's handle on the custody system.
pub struct Vault<L, O, M> {
    keypair: Keypair,
    principal: Principal,
    ledger: Arc<L>,
    objects: Arc<O>,
    mirror: Arc<M>,
    tokens: TokenClient<L>,
    config: VaultConfig,
    /// Highest ledger tx applied to the mirror by this vault.
    last_seen_tx: AtomicU64,
}

impl<L, O, M> Vault<L, O, M>
where
    L: Ledger + 'static,
    O: ObjectStore,
    M: Mirror + 'static,
{
    /// Create a vault for the given identity.
    pub fn new(
        keypair: Keypair,
        role: Role,
        ledger: Arc<L>,
        objects: Arc<O>,
        mirror: Arc<M>,
        config: VaultConfig,
    ) -> Self {
        let principal = Principal::new(keypair.public_key(), role);
        let tokens = TokenClient::new(Arc::clone(&ledger), principal.id, config.token.clone());
        Self {
            keypair,
            principal,
            ledger,
            objects,
            mirror,
            tokens,
            config,
            last_seen_tx: AtomicU64::new(0),
        }
    }

    /// This vault's public descriptor.
    pub fn principal(&self) -> Principal {
        self.principal
    }

    /// This vault's ledger address.
    pub fn id(&self) -> PrincipalId {
        self.principal.id
    }

    /// Register this principal's public identity on the ledger.
    pub async fn register(&self) -> Result<()> {
        self.ledger.register_principal(self.principal).await?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Record Operations
    // ─────────────────────────────────────────────────────────────────────

    /// Seal a plaintext into the caller's own namespace.
    ///
    /// Returns the record's content address.
    pub async fn create_record(&self, plaintext: &[u8]) -> Result<RecordId> {
        let owner = self.principal;
        self.store_record_for(&owner, plaintext).await
    }

    /// Seal a plaintext into another owner's namespace.
    ///
    /// Requires a live write lease from that owner. The record key is
    /// wrapped to the owner, so the owner (not the writer) ends up able to
    /// read and re-delegate the record.
    pub async fn store_record_for(&self, owner: &Principal, plaintext: &[u8]) -> Result<RecordId> {
        let record_id = RecordId::for_plaintext(plaintext);
        let (sealed, key) = SealedRecord::seal_fresh(plaintext)?;
        let wrapped = WrappedKey::wrap(&key, &owner.public_key)?;

        let permit = self
            .tokens
            .request_write(owner.id)
            .await?
            .sign(&self.keypair)?
            .redeem(&[])
            .await?;

        self.ledger
            .register_record(&owner.id, record_id, wrapped)
            .await?;
        if let Err(err) = self
            .put_sealed(permit, &owner.id, &record_id, sealed.to_bytes())
            .await
        {
            // A registration with no object behind it is a dangling record;
            // roll it back rather than leave it for readers to trip over.
            if let Err(rollback) = self.ledger.unregister_record(&owner.id, &record_id).await {
                warn!(%rollback, record = %record_id, "record registration left dangling");
            }
            return Err(err);
        }
        info!(record = %record_id, owner = %owner.id, "record stored");
        Ok(record_id)
    }

    /// Fetch and decrypt records from an owner's namespace.
    ///
    /// Plaintexts come back in request order. The whole batch rides one
    /// token: the ledger checks the record set and the wrapped-key digests
    /// together, then consumes the token.
    pub async fn read_records(
        &self,
        owner: &PrincipalId,
        record_ids: &[RecordId],
    ) -> Result<Vec<Vec<u8>>> {
        self.precheck_read(owner, record_ids).await;

        // Mint before touching key material: an expired or revoked lease is
        // refused here, as the ledger's decision, not as a missing-key error.
        let requested = self.tokens.request_read(*owner, record_ids.to_vec()).await?;

        let wrapped = self
            .ledger
            .wrapped_keys(owner, &self.id(), record_ids)
            .await?;
        let key_refs: Vec<Sha256Digest> = wrapped.iter().map(WrappedKey::digest).collect();

        let permit = requested.sign(&self.keypair)?.redeem(&key_refs).await?;

        let mut plaintexts = Vec::with_capacity(record_ids.len());
        for (record_id, wrapped) in record_ids.iter().zip(&wrapped) {
            if !permit.covers_read(record_id) {
                return Err(VaultError::NotAuthorized(format!(
                    "permit does not cover record {}",
                    record_id
                )));
            }
            let payload = self.objects.get(owner, record_id).await?;
            let sealed = SealedRecord::from_bytes(&payload)?;
            let key = wrapped.unwrap_key(&self.keypair)?;
            let plaintext = sealed.open(&key)?;
            // The envelope authenticated, but the content address is the
            // record's identity: a mismatch means the stored object is not
            // the record the ledger registered.
            if RecordId::for_plaintext(&plaintext) != *record_id {
                return Err(VaultError::IntegrityMismatch { record: *record_id });
            }
            plaintexts.push(plaintext);
        }
        Ok(plaintexts)
    }

    /// Delete a record from an owner's namespace.
    ///
    /// Gated by a write permit, same as storing. Deletion takes the
    /// record's leases and wrapped keys with it, on the ledger and in the
    /// mirror: a grantee must not keep minting tokens for a void.
    pub async fn delete_record(&self, owner: &PrincipalId, record_id: &RecordId) -> Result<()> {
        let permit = self
            .tokens
            .request_write(*owner)
            .await?
            .sign(&self.keypair)?
            .redeem(&[])
            .await?;
        self.delete_sealed(permit, owner, record_id).await?;
        let tx = self.ledger.unregister_record(owner, record_id).await?;
        self.mirror.remove_record(owner, record_id).await?;
        self.last_seen_tx.fetch_max(tx.0, Ordering::AcqRel);
        info!(record = %record_id, owner = %owner, "record deleted");
        Ok(())
    }

    async fn put_sealed(
        &self,
        permit: StoragePermit,
        owner: &PrincipalId,
        record_id: &RecordId,
        payload: Vec<u8>,
    ) -> Result<()> {
        if !permit.allows_write() {
            return Err(VaultError::NotAuthorized("store requires a write permit".into()));
        }
        self.objects.put(owner, record_id, payload).await?;
        Ok(())
    }

    async fn delete_sealed(
        &self,
        permit: StoragePermit,
        owner: &PrincipalId,
        record_id: &RecordId,
    ) -> Result<()> {
        if !permit.allows_write() {
            return Err(VaultError::NotAuthorized("delete requires a write permit".into()));
        }
        self.objects.delete(owner, record_id).await?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Delegation
    // ─────────────────────────────────────────────────────────────────────

    /// Extend read access over specific records to a grantee.
    ///
    /// For each record the owner unwraps its key and immediately re-wraps
    /// it to the grantee, so the plaintext key exists only between those
    /// two calls and only in this process. The ledger records the grant in
    /// one transaction; the mirror is then brought up to date with a
    /// bounded concurrent batch whose failures are observed and logged,
    /// never silently dropped.
    pub async fn delegate_read(
        &self,
        grantee: &Principal,
        record_ids: Vec<RecordId>,
        deadline: i64,
    ) -> Result<AccessGrant> {
        self.require_owner("delegate_read")?;
        let now = now_millis();
        if deadline <= now {
            return Err(PermsError::DeadlineNotFuture { deadline, now }.into());
        }
        if record_ids.is_empty() {
            return Err(PermsError::EmptyRecordSet.into());
        }

        let own_keys = self
            .ledger
            .wrapped_keys(&self.id(), &self.id(), &record_ids)
            .await?;
        let mut rewrapped = Vec::with_capacity(record_ids.len());
        for (record_id, own) in record_ids.iter().zip(&own_keys) {
            let key = own.unwrap_key(&self.keypair)?;
            rewrapped.push((*record_id, WrappedKey::wrap(&key, &grantee.public_key)?));
        }

        let grant = self
            .ledger
            .grant(GrantRequest {
                owner: self.id(),
                grantee: grantee.id,
                scope: GrantScope::Read { record_ids },
                wrapped_keys: rewrapped,
                deadline,
            })
            .await?;

        let failures = self.mirror_apply(MirrorEntry::from_grant(&grant)).await;
        if failures > 0 {
            // Hold last_seen_tx back so the next resync replays this grant.
            warn!(failures, "mirror behind ledger after grant; resync will repair");
        } else {
            self.last_seen_tx.fetch_max(grant.tx_ref.0, Ordering::AcqRel);
        }
        info!(grantee = %grantee.id, tx = %grant.tx_ref, "read access delegated");
        Ok(grant)
    }

    /// Extend a relationship-scoped write lease to a grantee.
    pub async fn grant_write(&self, grantee: &Principal, deadline: i64) -> Result<AccessGrant> {
        self.require_owner("grant_write")?;
        let now = now_millis();
        if deadline <= now {
            return Err(PermsError::DeadlineNotFuture { deadline, now }.into());
        }

        let grant = self
            .ledger
            .grant(GrantRequest {
                owner: self.id(),
                grantee: grantee.id,
                scope: GrantScope::Write,
                wrapped_keys: Vec::new(),
                deadline,
            })
            .await?;

        let failures = self.mirror_apply(MirrorEntry::from_grant(&grant)).await;
        if failures > 0 {
            // Hold last_seen_tx back so the next resync replays this grant.
            warn!(failures, "mirror behind ledger after grant; resync will repair");
        } else {
            self.last_seen_tx.fetch_max(grant.tx_ref.0, Ordering::AcqRel);
        }
        info!(grantee = %grantee.id, tx = %grant.tx_ref, "write access granted");
        Ok(grant)
    }

    /// Revoke specific read leases from a grantee.
    pub async fn revoke_read(
        &self,
        grantee: &PrincipalId,
        record_ids: &[RecordId],
    ) -> Result<LedgerTxRef> {
        self.require_owner("revoke_read")?;
        let tx = self.ledger.revoke(&self.id(), grantee, record_ids).await?;
        for record_id in record_ids {
            self.mirror
                .remove(&MirrorKey {
                    grantee: *grantee,
                    owner: self.id(),
                    record: Some(*record_id),
                })
                .await?;
        }
        self.last_seen_tx.fetch_max(tx.0, Ordering::AcqRel);
        info!(grantee = %grantee, tx = %tx, "read access revoked");
        Ok(tx)
    }

    /// Revoke every lease a grantee holds from this owner.
    pub async fn revoke_all(&self, grantee: &PrincipalId) -> Result<LedgerTxRef> {
        self.require_owner("revoke_all")?;
        let tx = self.ledger.revoke_all(&self.id(), grantee).await?;
        self.mirror.remove_relationship(grantee, &self.id()).await?;
        self.last_seen_tx.fetch_max(tx.0, Ordering::AcqRel);
        info!(grantee = %grantee, tx = %tx, "all access revoked");
        Ok(tx)
    }

    fn require_owner(&self, op: &str) -> Result<()> {
        if self.principal.role != Role::Owner {
            return Err(VaultError::NotAuthorized(format!(
                "{} requires the owner role",
                op
            )));
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Mirror Maintenance
    // ─────────────────────────────────────────────────────────────────────

    /// Replay ledger events into the mirror.
    ///
    /// Idempotent: upserts are LWW-ordered by tx ref, so replaying an
    /// already-applied event lands as a no-op. If the mirror itself errors,
    /// the cache is dropped and rebuilt from the full event log — the
    /// ledger's answer always wins over a diverged mirror.
    pub async fn resync_mirror(&self) -> Result<usize> {
        let after = LedgerTxRef(self.last_seen_tx.load(Ordering::Acquire));
        let events = self.ledger.events_since(after).await?;
        match self.apply_events(&events).await {
            Ok(applied) => Ok(applied),
            Err(err) => {
                warn!(%err, "mirror diverged during resync, rebuilding from ledger");
                self.mirror.clear().await?;
                self.last_seen_tx.store(0, Ordering::Release);
                let events = self.ledger.events_since(LedgerTxRef(0)).await?;
                Ok(self.apply_events(&events).await?)
            }
        }
    }

    async fn apply_events(
        &self,
        events: &[LedgerEvent],
    ) -> std::result::Result<usize, PermsError> {
        let mut applied = 0;
        for event in events {
            match &event.kind {
                LedgerEventKind::Granted(grant) => {
                    for entry in MirrorEntry::from_grant(grant) {
                        self.mirror.upsert(entry).await?;
                        applied += 1;
                    }
                }
                LedgerEventKind::Revoked {
                    owner,
                    grantee,
                    record_ids,
                } => {
                    for record_id in record_ids {
                        self.mirror
                            .remove(&MirrorKey {
                                grantee: *grantee,
                                owner: *owner,
                                record: Some(*record_id),
                            })
                            .await?;
                        applied += 1;
                    }
                }
                LedgerEventKind::RevokedAll { owner, grantee } => {
                    applied += self.mirror.remove_relationship(grantee, owner).await?;
                }
                LedgerEventKind::RecordRemoved { owner, record_id } => {
                    applied += self.mirror.remove_record(owner, record_id).await?;
                }
                LedgerEventKind::TokenMinted { .. } => {}
            }
            self.last_seen_tx.fetch_max(event.tx_ref.0, Ordering::AcqRel);
        }
        Ok(applied)
    }

    /// Fan a set of mirror entries out concurrently, bounded by
    /// `mirror_concurrency`, and join every task before returning.
    ///
    /// Returns the number of failed upserts. Failures leave the mirror
    /// stale, not wrong: the ledger already holds the grant, and resync
    /// repairs the cache.
    async fn mirror_apply(&self, entries: Vec<MirrorEntry>) -> usize {
        let mut failures = 0;
        for chunk in entries.chunks(self.config.mirror_concurrency.max(1)) {
            let mut set = JoinSet::new();
            for entry in chunk {
                let mirror = Arc::clone(&self.mirror);
                let entry = entry.clone();
                set.spawn(async move { mirror.upsert(entry).await });
            }
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok(Ok(_)) => {}
                    Ok(Err(err)) => {
                        failures += 1;
                        warn!(%err, "mirror upsert failed");
                    }
                    Err(err) => {
                        failures += 1;
                        warn!(%err, "mirror upsert task failed to join");
                    }
                }
            }
        }
        failures
    }

    /// Fast-path read pre-check against the mirror.
    ///
    /// Advisory only. A miss is logged and the request proceeds to the
    /// ledger, which makes the real decision; a stale mirror must never
    /// turn into a false denial.
    async fn precheck_read(&self, owner: &PrincipalId, record_ids: &[RecordId]) {
        if *owner == self.id() {
            return;
        }
        match self.mirror.active_grants(&self.id(), now_millis()).await {
            Ok(grants) => {
                let covered = record_ids.iter().all(|record_id| {
                    grants
                        .iter()
                        .any(|g| g.owner == *owner && g.record == Some(*record_id))
                });
                if !covered {
                    debug!(owner = %owner, "mirror shows no covering lease; ledger will decide");
                }
            }
            Err(err) => warn!(%err, "mirror pre-check failed, deferring to ledger"),
        }
    }

    /// Start the background sweeper for expired tokens and mirror leases.
    ///
    /// Runs until the returned handle is aborted or dropped by the caller.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let ledger = Arc::clone(&self.ledger);
        let mirror = Arc::clone(&self.mirror);
        let interval = self.config.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let now = now_millis();
                match ledger.cleanup_expired_tokens(now).await {
                    Ok(swept) if swept > 0 => debug!(swept, "expired tokens swept"),
                    Ok(_) => {}
                    Err(err) => warn!(%err, "token sweep failed"),
                }
                if let Err(err) = mirror.sweep_expired(now).await {
                    warn!(%err, "mirror sweep failed");
                }
            }
        })
    }
}
