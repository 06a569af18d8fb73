//! Shared test fixtures: deterministic parties wired to one set of
//! in-memory backends.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use custody::{Vault, VaultConfig};
use custody_core::{now_millis, Keypair, RecordId, Role};
use custody_perms::MemoryMirror;
use custody_store::{
    GrantRequest, Ledger, LedgerEvent, MemoryLedger, MemoryObjectStore, MintedToken, StoreError,
};

/// Deterministic keypair for a test party. Same seed, same identity.
///
/// Panics on seed 0, which is not a valid scalar.
pub fn keypair(seed: u8) -> Keypair {
    Keypair::from_seed(&[seed; 32]).expect("nonzero fixture seed is a valid scalar")
}

type TestVault = Vault<MemoryLedger, MemoryObjectStore, MemoryMirror>;

/// One ledger, object store, and mirror shared by every party in a test.
pub struct TestFixture {
    pub ledger: Arc<MemoryLedger>,
    pub objects: Arc<MemoryObjectStore>,
    pub mirror: Arc<MemoryMirror>,
}

impl TestFixture {
    /// Fresh, empty backends.
    pub fn new() -> Self {
        Self {
            ledger: Arc::new(MemoryLedger::new()),
            objects: Arc::new(MemoryObjectStore::new()),
            mirror: Arc::new(MemoryMirror::new()),
        }
    }

    /// A registered owner vault with a deterministic identity.
    pub async fn owner(&self, seed: u8) -> TestVault {
        self.vault(seed, Role::Owner).await
    }

    /// A registered custodian vault with a deterministic identity.
    pub async fn custodian(&self, seed: u8) -> TestVault {
        self.vault(seed, Role::Custodian).await
    }

    async fn vault(&self, seed: u8, role: Role) -> TestVault {
        let vault = Vault::new(
            keypair(seed),
            role,
            Arc::clone(&self.ledger),
            Arc::clone(&self.objects),
            Arc::clone(&self.mirror),
            VaultConfig::default(),
        );
        vault
            .register()
            .await
            .expect("fixture registration failed");
        vault
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// An owner and a custodian with one record already delegated for a minute.
///
/// The common starting point for delegation scenarios.
pub async fn delegated_pair() -> (TestFixture, TestVault, TestVault, RecordId) {
    let fixture = TestFixture::new();
    let owner = fixture.owner(1).await;
    let custodian = fixture.custodian(2).await;

    let record_id = owner
        .create_record(b"fixture record")
        .await
        .expect("fixture record creation failed");
    owner
        .delegate_read(
            &custodian.principal(),
            vec![record_id],
            now_millis() + 60_000,
        )
        .await
        .expect("fixture delegation failed");

    (fixture, owner, custodian, record_id)
}

/// Ledger decorator that answers the first `fail` calls with
/// `Unavailable`, then delegates. Exercises retry paths.
pub struct FlakyLedger {
    inner: MemoryLedger,
    fail: AtomicU32,
}

impl FlakyLedger {
    pub fn new(inner: MemoryLedger, fail: u32) -> Self {
        Self {
            inner,
            fail: AtomicU32::new(fail),
        }
    }

    /// Calls remaining before the outage lifts.
    pub fn remaining_failures(&self) -> u32 {
        self.fail.load(Ordering::SeqCst)
    }

    fn outage(&self) -> custody_store::Result<()> {
        if self
            .fail
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            Err(StoreError::Unavailable("simulated outage".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Ledger for FlakyLedger {
    async fn register_principal(
        &self,
        principal: custody_core::Principal,
    ) -> custody_store::Result<custody_core::LedgerTxRef> {
        self.outage()?;
        self.inner.register_principal(principal).await
    }

    async fn register_record(
        &self,
        owner: &custody_core::PrincipalId,
        record_id: RecordId,
        wrapped_key: custody_crypto::WrappedKey,
    ) -> custody_store::Result<custody_core::LedgerTxRef> {
        self.outage()?;
        self.inner
            .register_record(owner, record_id, wrapped_key)
            .await
    }

    async fn unregister_record(
        &self,
        owner: &custody_core::PrincipalId,
        record_id: &RecordId,
    ) -> custody_store::Result<custody_core::LedgerTxRef> {
        self.outage()?;
        self.inner.unregister_record(owner, record_id).await
    }

    async fn wrapped_keys(
        &self,
        owner: &custody_core::PrincipalId,
        holder: &custody_core::PrincipalId,
        record_ids: &[RecordId],
    ) -> custody_store::Result<Vec<custody_crypto::WrappedKey>> {
        self.outage()?;
        self.inner.wrapped_keys(owner, holder, record_ids).await
    }

    async fn grant(
        &self,
        request: GrantRequest,
    ) -> custody_store::Result<custody_perms::AccessGrant> {
        self.outage()?;
        self.inner.grant(request).await
    }

    async fn revoke(
        &self,
        owner: &custody_core::PrincipalId,
        grantee: &custody_core::PrincipalId,
        record_ids: &[RecordId],
    ) -> custody_store::Result<custody_core::LedgerTxRef> {
        self.outage()?;
        self.inner.revoke(owner, grantee, record_ids).await
    }

    async fn revoke_all(
        &self,
        owner: &custody_core::PrincipalId,
        grantee: &custody_core::PrincipalId,
    ) -> custody_store::Result<custody_core::LedgerTxRef> {
        self.outage()?;
        self.inner.revoke_all(owner, grantee).await
    }

    async fn mint_read_token(
        &self,
        requester: &custody_core::PrincipalId,
        owner: &custody_core::PrincipalId,
        record_ids: &[RecordId],
    ) -> custody_store::Result<MintedToken> {
        self.outage()?;
        self.inner
            .mint_read_token(requester, owner, record_ids)
            .await
    }

    async fn mint_write_token(
        &self,
        requester: &custody_core::PrincipalId,
        owner: &custody_core::PrincipalId,
    ) -> custody_store::Result<MintedToken> {
        self.outage()?;
        self.inner.mint_write_token(requester, owner).await
    }

    async fn validate(
        &self,
        token_hash: &custody_core::TokenHash,
        signature: &custody_core::EcdsaSignature,
        kind: custody_core::AccessKind,
        record_ids: &[RecordId],
        wrapped_key_refs: &[custody_core::Sha256Digest],
    ) -> custody_store::Result<()> {
        self.outage()?;
        self.inner
            .validate(token_hash, signature, kind, record_ids, wrapped_key_refs)
            .await
    }

    async fn cleanup_expired_tokens(&self, now: i64) -> custody_store::Result<usize> {
        self.outage()?;
        self.inner.cleanup_expired_tokens(now).await
    }

    async fn events_since(
        &self,
        after: custody_core::LedgerTxRef,
    ) -> custody_store::Result<Vec<LedgerEvent>> {
        self.outage()?;
        self.inner.events_since(after).await
    }
}
