//! End-to-end delegation scenarios between an owner and a custodian
//! sharing one ledger, object store, and mirror.

use std::sync::Arc;
use std::time::Duration;

use custody::{Vault, VaultConfig, VaultError};
use custody_core::{now_millis, Keypair, Role};
use custody_crypto::SealedRecord;
use custody_perms::{MemoryMirror, Mirror};
use custody_store::{Ledger, MemoryLedger, MemoryObjectStore, ObjectStore, StoreError};
use custody_token::TokenError;

struct Harness {
    ledger: Arc<MemoryLedger>,
    objects: Arc<MemoryObjectStore>,
    mirror: Arc<MemoryMirror>,
}

impl Harness {
    fn new() -> Self {
        Self {
            ledger: Arc::new(MemoryLedger::new()),
            objects: Arc::new(MemoryObjectStore::new()),
            mirror: Arc::new(MemoryMirror::new()),
        }
    }

    async fn vault(
        &self,
        keypair: Keypair,
        role: Role,
    ) -> Vault<MemoryLedger, MemoryObjectStore, MemoryMirror> {
        let vault = Vault::new(
            keypair,
            role,
            Arc::clone(&self.ledger),
            Arc::clone(&self.objects),
            Arc::clone(&self.mirror),
            VaultConfig::default(),
        );
        vault.register().await.unwrap();
        vault
    }
}

fn is_no_active_grant(err: &VaultError) -> bool {
    matches!(
        err,
        VaultError::Token(TokenError::Store(StoreError::NoActiveGrant(_)))
    )
}

#[tokio::test]
async fn delegated_read_roundtrip() {
    let harness = Harness::new();
    let owner = harness.vault(Keypair::generate(), Role::Owner).await;
    let custodian = harness.vault(Keypair::generate(), Role::Custodian).await;

    let record_id = owner.create_record(b"mri scan, left knee").await.unwrap();
    owner
        .delegate_read(
            &custodian.principal(),
            vec![record_id],
            now_millis() + 60_000,
        )
        .await
        .unwrap();

    let plaintexts = custodian
        .read_records(&owner.id(), &[record_id])
        .await
        .unwrap();
    assert_eq!(plaintexts, vec![b"mri scan, left knee".to_vec()]);
}

#[tokio::test]
async fn expired_lease_refuses_mint() {
    let harness = Harness::new();
    let owner = harness.vault(Keypair::generate(), Role::Owner).await;
    let custodian = harness.vault(Keypair::generate(), Role::Custodian).await;

    let record_id = owner.create_record(b"vitals").await.unwrap();
    owner
        .delegate_read(&custodian.principal(), vec![record_id], now_millis() + 150)
        .await
        .unwrap();

    // Inside the lease window the read succeeds.
    custodian
        .read_records(&owner.id(), &[record_id])
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(250)).await;
    let err = custodian
        .read_records(&owner.id(), &[record_id])
        .await
        .unwrap_err();
    assert!(is_no_active_grant(&err), "got {err}");
}

#[tokio::test]
async fn revocation_refuses_later_reads() {
    let harness = Harness::new();
    let owner = harness.vault(Keypair::generate(), Role::Owner).await;
    let custodian = harness.vault(Keypair::generate(), Role::Custodian).await;

    let record_id = owner.create_record(b"lab panel").await.unwrap();
    owner
        .delegate_read(
            &custodian.principal(),
            vec![record_id],
            now_millis() + 60_000,
        )
        .await
        .unwrap();
    custodian
        .read_records(&owner.id(), &[record_id])
        .await
        .unwrap();

    owner
        .revoke_read(&custodian.id(), &[record_id])
        .await
        .unwrap();
    let err = custodian
        .read_records(&owner.id(), &[record_id])
        .await
        .unwrap_err();
    assert!(is_no_active_grant(&err), "got {err}");

    // Revocation cuts access, not data: the sealed object stays put and
    // the owner still reads it.
    owner.read_records(&owner.id(), &[record_id]).await.unwrap();
}

#[tokio::test]
async fn write_lease_lets_custodian_store_for_owner() {
    let harness = Harness::new();
    let owner = harness.vault(Keypair::generate(), Role::Owner).await;
    let custodian = harness.vault(Keypair::generate(), Role::Custodian).await;

    // Without a lease the store is refused before anything is written.
    let err = custodian
        .store_record_for(&owner.principal(), b"new prescription")
        .await
        .unwrap_err();
    assert!(is_no_active_grant(&err), "got {err}");
    assert!(harness.objects.is_empty().await);

    owner
        .grant_write(&custodian.principal(), now_millis() + 60_000)
        .await
        .unwrap();
    let record_id = custodian
        .store_record_for(&owner.principal(), b"new prescription")
        .await
        .unwrap();

    // The key was wrapped to the owner, so the owner can read it back.
    let plaintexts = owner.read_records(&owner.id(), &[record_id]).await.unwrap();
    assert_eq!(plaintexts, vec![b"new prescription".to_vec()]);
}

#[tokio::test]
async fn delete_requires_write_permit() {
    let harness = Harness::new();
    let owner = harness.vault(Keypair::generate(), Role::Owner).await;
    let custodian = harness.vault(Keypair::generate(), Role::Custodian).await;

    let record_id = owner.create_record(b"old referral").await.unwrap();

    let err = custodian
        .delete_record(&owner.id(), &record_id)
        .await
        .unwrap_err();
    assert!(is_no_active_grant(&err), "got {err}");

    owner.delete_record(&owner.id(), &record_id).await.unwrap();
    assert!(harness.objects.is_empty().await);
}

#[tokio::test]
async fn deletion_clears_leases_and_keys() {
    let harness = Harness::new();
    let owner = harness.vault(Keypair::generate(), Role::Owner).await;
    let custodian = harness.vault(Keypair::generate(), Role::Custodian).await;

    let record_id = owner.create_record(b"superseded scan").await.unwrap();
    owner
        .delegate_read(
            &custodian.principal(),
            vec![record_id],
            now_millis() + 60_000,
        )
        .await
        .unwrap();

    owner.delete_record(&owner.id(), &record_id).await.unwrap();
    assert!(harness.objects.is_empty().await);

    // The lease died with the record: the mint is refused outright rather
    // than burning a token on a missing object.
    let err = custodian
        .read_records(&owner.id(), &[record_id])
        .await
        .unwrap_err();
    assert!(is_no_active_grant(&err), "got {err}");

    // Key material and mirror leases are gone too.
    assert!(harness
        .ledger
        .wrapped_keys(&owner.id(), &custodian.id(), &[record_id])
        .await
        .is_err());
    let leases = harness
        .mirror
        .active_grants(&custodian.id(), now_millis())
        .await
        .unwrap();
    assert!(leases.iter().all(|l| l.record != Some(record_id)));
}

#[tokio::test]
async fn custodian_cannot_delegate() {
    let harness = Harness::new();
    let owner = harness.vault(Keypair::generate(), Role::Owner).await;
    let custodian = harness.vault(Keypair::generate(), Role::Custodian).await;

    let record_id = owner.create_record(b"summary").await.unwrap();
    let err = custodian
        .delegate_read(&owner.principal(), vec![record_id], now_millis() + 60_000)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::NotAuthorized(_)));
}

#[tokio::test]
async fn stale_mirror_never_denies() {
    let harness = Harness::new();
    let owner = harness.vault(Keypair::generate(), Role::Owner).await;
    let custodian = harness.vault(Keypair::generate(), Role::Custodian).await;

    let record_id = owner.create_record(b"imaging").await.unwrap();
    owner
        .delegate_read(
            &custodian.principal(),
            vec![record_id],
            now_millis() + 60_000,
        )
        .await
        .unwrap();

    // Wipe the cache. The ledger still holds the grant, so the read must
    // go through regardless of what the mirror thinks.
    harness.mirror.clear().await.unwrap();
    custodian
        .read_records(&owner.id(), &[record_id])
        .await
        .unwrap();

    // Resync repopulates the lease from the ledger's event log.
    let applied = custodian.resync_mirror().await.unwrap();
    assert!(applied >= 1);
    let leases = harness
        .mirror
        .active_grants(&custodian.id(), now_millis())
        .await
        .unwrap();
    assert!(leases.iter().any(|l| l.record == Some(record_id)));
}

#[tokio::test]
async fn grant_is_idempotent_across_replays() {
    let harness = Harness::new();
    let owner = harness.vault(Keypair::generate(), Role::Owner).await;
    let custodian = harness.vault(Keypair::generate(), Role::Custodian).await;

    let record_id = owner.create_record(b"notes").await.unwrap();
    owner
        .delegate_read(
            &custodian.principal(),
            vec![record_id],
            now_millis() + 30_000,
        )
        .await
        .unwrap();
    // Re-granting with a later deadline replaces, never duplicates.
    owner
        .delegate_read(
            &custodian.principal(),
            vec![record_id],
            now_millis() + 60_000,
        )
        .await
        .unwrap();
    custodian.resync_mirror().await.unwrap();

    let leases = harness
        .mirror
        .active_grants(&custodian.id(), now_millis())
        .await
        .unwrap();
    let matching: Vec<_> = leases
        .iter()
        .filter(|l| l.record == Some(record_id))
        .collect();
    assert_eq!(matching.len(), 1);
    assert!(matching[0].deadline >= now_millis() + 50_000);
}

#[tokio::test]
async fn swapped_object_fails_integrity_check() {
    let harness = Harness::new();
    let keypair = Keypair::generate();
    let owner = harness.vault(keypair.clone(), Role::Owner).await;

    let record_id = owner.create_record(b"original report").await.unwrap();

    // Swap the stored object for a different plaintext sealed under the
    // same record key. The envelope decrypts cleanly; the content address
    // does not match.
    let wrapped = harness
        .ledger
        .wrapped_keys(&owner.id(), &owner.id(), &[record_id])
        .await
        .unwrap();
    let key = wrapped[0].unwrap_key(&keypair).unwrap();
    let forged = SealedRecord::seal(b"doctored report", &key).unwrap();
    harness
        .objects
        .put(&owner.id(), &record_id, forged.to_bytes())
        .await
        .unwrap();

    let err = owner
        .read_records(&owner.id(), &[record_id])
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::IntegrityMismatch { .. }));
}
