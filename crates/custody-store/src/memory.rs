//! In-memory reference implementations of the ledger and object store.
//!
//! `MemoryLedger` reproduces the contract's observable semantics — grant
//! upserts, mint refusal, atomic single-use validation, monotonic tx refs —
//! behind one `RwLock`, so every validate runs under a write guard and
//! concurrent consumers of a token serialize naturally.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rand::RngCore;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use custody_core::{
    now_millis, AccessKind, EcdsaSignature, LedgerTxRef, Principal, PrincipalId, RecordId,
    Sha256Digest, TokenHash,
};
use custody_crypto::WrappedKey;
use custody_perms::{AccessGrant, GrantScope};

use crate::error::{Result, StoreError};
use crate::traits::{GrantRequest, Ledger, LedgerEvent, LedgerEventKind, MintedToken, ObjectStore};

/// Default ledger-side token lifetime: five minutes.
pub const DEFAULT_TOKEN_TTL_MS: i64 = 5 * 60 * 1000;

/// A minted token's ledger-side row.
#[derive(Debug, Clone)]
struct TokenRow {
    requester: PrincipalId,
    kind: AccessKind,
    /// Records the token was minted for. Empty for write tokens, which are
    /// record-set-agnostic.
    record_ids: Vec<RecordId>,
    expiry: i64,
    consumed: bool,
}

#[derive(Debug, Default)]
struct LedgerInner {
    principals: HashMap<PrincipalId, Principal>,
    /// Wrapped key per (owner, record, holder). The owner's own copy is
    /// registered alongside the record; grantee copies arrive with grants.
    keys: HashMap<(PrincipalId, RecordId, PrincipalId), WrappedKey>,
    /// Live read leases: (grantee, owner, record) -> (deadline, tx).
    read_grants: HashMap<(PrincipalId, PrincipalId, RecordId), (i64, LedgerTxRef)>,
    /// Live write leases: (grantee, owner) -> (deadline, tx).
    write_grants: HashMap<(PrincipalId, PrincipalId), (i64, LedgerTxRef)>,
    tokens: HashMap<TokenHash, TokenRow>,
    events: Vec<LedgerEvent>,
    next_tx: u64,
}

impl LedgerInner {
    fn advance_tx(&mut self) -> LedgerTxRef {
        self.next_tx += 1;
        LedgerTxRef(self.next_tx)
    }

    fn emit(&mut self, tx_ref: LedgerTxRef, kind: LedgerEventKind) {
        self.events.push(LedgerEvent { tx_ref, kind });
    }

    /// Whether the requester may mint a read token for the given records.
    ///
    /// Owners implicitly cover their own records; everyone else needs a live
    /// lease per record.
    fn read_covered(
        &self,
        requester: &PrincipalId,
        owner: &PrincipalId,
        record_ids: &[RecordId],
        now: i64,
    ) -> bool {
        if requester == owner {
            return record_ids
                .iter()
                .all(|r| self.keys.contains_key(&(*owner, *r, *owner)));
        }
        record_ids.iter().all(|r| {
            self.read_grants
                .get(&(*requester, *owner, *r))
                .is_some_and(|(deadline, _)| *deadline > now)
        })
    }

    fn write_covered(&self, requester: &PrincipalId, owner: &PrincipalId, now: i64) -> bool {
        if requester == owner {
            return true;
        }
        self.write_grants
            .get(&(*requester, *owner))
            .is_some_and(|(deadline, _)| *deadline > now)
    }
}

/// In-memory ledger oracle.
///
/// Clone-cheap via `Arc`; all clones share state.
#[derive(Debug, Clone)]
pub struct MemoryLedger {
    inner: Arc<RwLock<LedgerInner>>,
    token_ttl_ms: i64,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    /// Create an empty ledger with the default token lifetime.
    pub fn new() -> Self {
        Self::with_token_ttl(DEFAULT_TOKEN_TTL_MS)
    }

    /// Create an empty ledger with a custom token lifetime.
    pub fn with_token_ttl(token_ttl_ms: i64) -> Self {
        Self {
            inner: Arc::new(RwLock::new(LedgerInner::default())),
            token_ttl_ms,
        }
    }

    fn fresh_token_hash() -> TokenHash {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        TokenHash::from_bytes(bytes)
    }

    async fn mint(
        &self,
        requester: &PrincipalId,
        kind: AccessKind,
        record_ids: Vec<RecordId>,
        cover_check: impl FnOnce(&LedgerInner, i64) -> bool,
    ) -> Result<MintedToken> {
        let now = now_millis();
        let mut inner = self.inner.write().await;

        if !inner.principals.contains_key(requester) {
            return Err(StoreError::UnknownPrincipal(requester.to_hex()));
        }
        if !cover_check(&inner, now) {
            return Err(StoreError::NoActiveGrant(format!(
                "{} holds no live {:?} lease",
                requester, kind
            )));
        }

        let token_hash = Self::fresh_token_hash();
        let expiry = now + self.token_ttl_ms;
        inner.tokens.insert(
            token_hash,
            TokenRow {
                requester: *requester,
                kind,
                record_ids,
                expiry,
                consumed: false,
            },
        );
        let tx = inner.advance_tx();
        inner.emit(
            tx,
            LedgerEventKind::TokenMinted {
                token_hash,
                requester: *requester,
                kind,
                expiry,
            },
        );
        debug!(token = %token_hash.to_hex(), ?kind, "token minted");
        Ok(MintedToken { token_hash, expiry })
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn register_principal(&self, principal: Principal) -> Result<LedgerTxRef> {
        let mut inner = self.inner.write().await;
        inner.principals.insert(principal.id, principal);
        Ok(inner.advance_tx())
    }

    async fn register_record(
        &self,
        owner: &PrincipalId,
        record_id: RecordId,
        wrapped_key: WrappedKey,
    ) -> Result<LedgerTxRef> {
        let mut inner = self.inner.write().await;
        if !inner.principals.contains_key(owner) {
            return Err(StoreError::UnknownPrincipal(owner.to_hex()));
        }
        inner.keys.insert((*owner, record_id, *owner), wrapped_key);
        Ok(inner.advance_tx())
    }

    async fn unregister_record(
        &self,
        owner: &PrincipalId,
        record_id: &RecordId,
    ) -> Result<LedgerTxRef> {
        let mut inner = self.inner.write().await;
        inner
            .keys
            .retain(|(o, r, _), _| !(o == owner && r == record_id));
        inner
            .read_grants
            .retain(|(_, o, r), _| !(o == owner && r == record_id));
        let tx = inner.advance_tx();
        inner.emit(
            tx,
            LedgerEventKind::RecordRemoved {
                owner: *owner,
                record_id: *record_id,
            },
        );
        Ok(tx)
    }

    async fn wrapped_keys(
        &self,
        owner: &PrincipalId,
        holder: &PrincipalId,
        record_ids: &[RecordId],
    ) -> Result<Vec<WrappedKey>> {
        let inner = self.inner.read().await;
        record_ids
            .iter()
            .map(|r| {
                inner
                    .keys
                    .get(&(*owner, *r, *holder))
                    .cloned()
                    .ok_or_else(|| StoreError::ObjectNotFound(format!("wrapped key for {}", r)))
            })
            .collect()
    }

    async fn grant(&self, request: GrantRequest) -> Result<AccessGrant> {
        let now = now_millis();
        if request.deadline <= now {
            return Err(StoreError::InvalidDeadline {
                deadline: request.deadline,
                now,
            });
        }

        let mut inner = self.inner.write().await;
        if !inner.principals.contains_key(&request.grantee) {
            return Err(StoreError::UnknownPrincipal(request.grantee.to_hex()));
        }

        let tx = inner.advance_tx();
        match &request.scope {
            GrantScope::Read { record_ids } => {
                if record_ids.is_empty() {
                    return Err(StoreError::EmptyRecordSet);
                }
                for record_id in record_ids {
                    let key = request
                        .wrapped_keys
                        .iter()
                        .find(|(r, _)| r == record_id)
                        .map(|(_, k)| k.clone())
                        .ok_or_else(|| {
                            StoreError::InvalidData(format!("grant missing key for {}", record_id))
                        })?;
                    inner
                        .keys
                        .insert((request.owner, *record_id, request.grantee), key);
                    inner.read_grants.insert(
                        (request.grantee, request.owner, *record_id),
                        (request.deadline, tx),
                    );
                }
            }
            GrantScope::Write => {
                inner
                    .write_grants
                    .insert((request.grantee, request.owner), (request.deadline, tx));
            }
        }

        let grant = AccessGrant {
            owner: request.owner,
            grantee: request.grantee,
            scope: request.scope,
            deadline: request.deadline,
            tx_ref: tx,
        };
        inner.emit(tx, LedgerEventKind::Granted(grant.clone()));
        Ok(grant)
    }

    async fn revoke(
        &self,
        owner: &PrincipalId,
        grantee: &PrincipalId,
        record_ids: &[RecordId],
    ) -> Result<LedgerTxRef> {
        let mut inner = self.inner.write().await;
        for record_id in record_ids {
            inner.read_grants.remove(&(*grantee, *owner, *record_id));
            inner.keys.remove(&(*owner, *record_id, *grantee));
        }
        let tx = inner.advance_tx();
        inner.emit(
            tx,
            LedgerEventKind::Revoked {
                owner: *owner,
                grantee: *grantee,
                record_ids: record_ids.to_vec(),
            },
        );
        Ok(tx)
    }

    async fn revoke_all(
        &self,
        owner: &PrincipalId,
        grantee: &PrincipalId,
    ) -> Result<LedgerTxRef> {
        let mut inner = self.inner.write().await;
        inner
            .read_grants
            .retain(|(g, o, _), _| !(g == grantee && o == owner));
        inner.write_grants.remove(&(*grantee, *owner));
        inner
            .keys
            .retain(|(o, _, holder), _| !(o == owner && holder == grantee));
        let tx = inner.advance_tx();
        inner.emit(
            tx,
            LedgerEventKind::RevokedAll {
                owner: *owner,
                grantee: *grantee,
            },
        );
        Ok(tx)
    }

    async fn mint_read_token(
        &self,
        requester: &PrincipalId,
        owner: &PrincipalId,
        record_ids: &[RecordId],
    ) -> Result<MintedToken> {
        if record_ids.is_empty() {
            return Err(StoreError::EmptyRecordSet);
        }
        let records = record_ids.to_vec();
        self.mint(requester, AccessKind::Read, records.clone(), |inner, now| {
            inner.read_covered(requester, owner, &records, now)
        })
        .await
    }

    async fn mint_write_token(
        &self,
        requester: &PrincipalId,
        owner: &PrincipalId,
    ) -> Result<MintedToken> {
        self.mint(requester, AccessKind::Write, Vec::new(), |inner, now| {
            inner.write_covered(requester, owner, now)
        })
        .await
    }

    async fn validate(
        &self,
        token_hash: &TokenHash,
        signature: &EcdsaSignature,
        kind: AccessKind,
        record_ids: &[RecordId],
        wrapped_key_refs: &[Sha256Digest],
    ) -> Result<()> {
        let now = now_millis();
        // Write lock for the whole check-and-consume: two racing validations
        // of one token serialize here, and the loser sees `consumed`.
        let mut inner = self.inner.write().await;

        let row = inner
            .tokens
            .get(token_hash)
            .cloned()
            .ok_or_else(|| StoreError::UnknownToken(token_hash.to_hex()))?;

        let requester = inner
            .principals
            .get(&row.requester)
            .copied()
            .ok_or_else(|| StoreError::UnknownPrincipal(row.requester.to_hex()))?;
        requester
            .public_key
            .verify(token_hash.as_bytes(), signature)
            .map_err(|_| StoreError::BadSignature)?;

        if row.expiry <= now {
            return Err(StoreError::TokenExpired);
        }
        if row.consumed {
            return Err(StoreError::TokenConsumed);
        }
        if kind != row.kind {
            return Err(StoreError::UnauthorizedRecord(format!(
                "token minted for {:?}, presented for {:?}",
                row.kind, kind
            )));
        }
        if kind == AccessKind::Read {
            if let Some(outside) = record_ids.iter().find(|r| !row.record_ids.contains(r)) {
                warn!(
                    requester = %row.requester,
                    record = %outside,
                    "token presented for record outside its minted set"
                );
                return Err(StoreError::UnauthorizedRecord(outside.to_hex()));
            }
            if wrapped_key_refs.len() != record_ids.len() {
                return Err(StoreError::InvalidData(
                    "wrapped key refs do not match record count".into(),
                ));
            }
            for (record_id, key_ref) in record_ids.iter().zip(wrapped_key_refs) {
                let matches = inner
                    .keys
                    .iter()
                    .any(|((_, r, holder), key)| {
                        r == record_id && *holder == row.requester && key.digest() == *key_ref
                    });
                if !matches {
                    return Err(StoreError::UnauthorizedRecord(format!(
                        "wrapped key digest mismatch for {}",
                        record_id
                    )));
                }
            }
        }

        inner
            .tokens
            .get_mut(token_hash)
            .expect("row present under the same lock")
            .consumed = true;
        debug!(token = %token_hash.to_hex(), "token consumed");
        Ok(())
    }

    async fn cleanup_expired_tokens(&self, now: i64) -> Result<usize> {
        let mut inner = self.inner.write().await;
        let before = inner.tokens.len();
        inner
            .tokens
            .retain(|_, row| row.consumed || row.expiry > now);
        Ok(before - inner.tokens.len())
    }

    async fn events_since(&self, after: LedgerTxRef) -> Result<Vec<LedgerEvent>> {
        let inner = self.inner.read().await;
        Ok(inner
            .events
            .iter()
            .filter(|e| e.tx_ref > after)
            .cloned()
            .collect())
    }
}

/// In-memory object store keyed by (owner namespace, record id).
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<HashMap<(PrincipalId, RecordId), Vec<u8>>>>,
}

impl MemoryObjectStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(
        &self,
        owner: &PrincipalId,
        record_id: &RecordId,
        payload: Vec<u8>,
    ) -> Result<()> {
        self.objects
            .write()
            .await
            .insert((*owner, *record_id), payload);
        Ok(())
    }

    async fn get(&self, owner: &PrincipalId, record_id: &RecordId) -> Result<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(&(*owner, *record_id))
            .cloned()
            .ok_or_else(|| StoreError::ObjectNotFound(record_id.to_hex()))
    }

    async fn delete(&self, owner: &PrincipalId, record_id: &RecordId) -> Result<()> {
        self.objects.write().await.remove(&(*owner, *record_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use custody_core::{Keypair, Role};
    use custody_crypto::SymmetricKey;

    struct Party {
        keypair: Keypair,
        principal: Principal,
    }

    impl Party {
        fn new(role: Role) -> Self {
            let keypair = Keypair::generate();
            let principal = Principal::new(keypair.public_key(), role);
            Self { keypair, principal }
        }

        fn id(&self) -> PrincipalId {
            self.principal.id
        }
    }

    async fn seeded_record(
        ledger: &MemoryLedger,
        owner: &Party,
        plaintext: &[u8],
    ) -> (RecordId, SymmetricKey) {
        let key = SymmetricKey::generate();
        let record_id = RecordId::for_plaintext(plaintext);
        let wrapped = WrappedKey::wrap(&key, &owner.principal.public_key).unwrap();
        ledger
            .register_record(&owner.id(), record_id, wrapped)
            .await
            .unwrap();
        (record_id, key)
    }

    async fn grant_read(
        ledger: &MemoryLedger,
        owner: &Party,
        grantee: &Party,
        record_id: RecordId,
        key: &SymmetricKey,
        deadline: i64,
    ) -> AccessGrant {
        let rewrapped = WrappedKey::wrap(key, &grantee.principal.public_key).unwrap();
        ledger
            .grant(GrantRequest {
                owner: owner.id(),
                grantee: grantee.id(),
                scope: GrantScope::Read {
                    record_ids: vec![record_id],
                },
                wrapped_keys: vec![(record_id, rewrapped)],
                deadline,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_mint_refused_without_grant() {
        let ledger = MemoryLedger::new();
        let owner = Party::new(Role::Owner);
        let custodian = Party::new(Role::Custodian);
        ledger.register_principal(owner.principal).await.unwrap();
        ledger
            .register_principal(custodian.principal)
            .await
            .unwrap();
        let (record_id, _) = seeded_record(&ledger, &owner, b"scan").await;

        let err = ledger
            .mint_read_token(&custodian.id(), &owner.id(), &[record_id])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NoActiveGrant(_)));
    }

    #[tokio::test]
    async fn test_owner_mints_for_own_records() {
        let ledger = MemoryLedger::new();
        let owner = Party::new(Role::Owner);
        ledger.register_principal(owner.principal).await.unwrap();
        let (record_id, _) = seeded_record(&ledger, &owner, b"scan").await;

        let token = ledger
            .mint_read_token(&owner.id(), &owner.id(), &[record_id])
            .await
            .unwrap();
        assert!(token.expiry > now_millis());
    }

    #[tokio::test]
    async fn test_validate_consumes_exactly_once() {
        let ledger = MemoryLedger::new();
        let owner = Party::new(Role::Owner);
        let custodian = Party::new(Role::Custodian);
        ledger.register_principal(owner.principal).await.unwrap();
        ledger
            .register_principal(custodian.principal)
            .await
            .unwrap();
        let (record_id, key) = seeded_record(&ledger, &owner, b"scan").await;
        grant_read(
            &ledger,
            &owner,
            &custodian,
            record_id,
            &key,
            now_millis() + 60_000,
        )
        .await;

        let token = ledger
            .mint_read_token(&custodian.id(), &owner.id(), &[record_id])
            .await
            .unwrap();
        let sig = custodian.keypair.sign(token.token_hash.as_bytes());
        let key_ref = ledger
            .wrapped_keys(&owner.id(), &custodian.id(), &[record_id])
            .await
            .unwrap()[0]
            .digest();

        ledger
            .validate(
                &token.token_hash,
                &sig,
                AccessKind::Read,
                &[record_id],
                &[key_ref],
            )
            .await
            .unwrap();

        let err = ledger
            .validate(
                &token.token_hash,
                &sig,
                AccessKind::Read,
                &[record_id],
                &[key_ref],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TokenConsumed));
    }

    #[tokio::test]
    async fn test_concurrent_validate_single_winner() {
        let ledger = MemoryLedger::new();
        let owner = Party::new(Role::Owner);
        ledger.register_principal(owner.principal).await.unwrap();
        let (record_id, _) = seeded_record(&ledger, &owner, b"scan").await;

        let token = ledger
            .mint_read_token(&owner.id(), &owner.id(), &[record_id])
            .await
            .unwrap();
        let sig = owner.keypair.sign(token.token_hash.as_bytes());
        let key_ref = ledger
            .wrapped_keys(&owner.id(), &owner.id(), &[record_id])
            .await
            .unwrap()[0]
            .digest();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = ledger.clone();
            let token_hash = token.token_hash;
            handles.push(tokio::spawn(async move {
                ledger
                    .validate(&token_hash, &sig, AccessKind::Read, &[record_id], &[key_ref])
                    .await
                    .is_ok()
            }));
        }
        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn test_validate_rejects_record_outside_minted_set() {
        let ledger = MemoryLedger::new();
        let owner = Party::new(Role::Owner);
        ledger.register_principal(owner.principal).await.unwrap();
        let (record_a, _) = seeded_record(&ledger, &owner, b"a").await;
        let (record_b, _) = seeded_record(&ledger, &owner, b"b").await;

        let token = ledger
            .mint_read_token(&owner.id(), &owner.id(), &[record_a])
            .await
            .unwrap();
        let sig = owner.keypair.sign(token.token_hash.as_bytes());
        let key_ref = ledger
            .wrapped_keys(&owner.id(), &owner.id(), &[record_b])
            .await
            .unwrap()[0]
            .digest();

        let err = ledger
            .validate(
                &token.token_hash,
                &sig,
                AccessKind::Read,
                &[record_b],
                &[key_ref],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnauthorizedRecord(_)));
    }

    #[tokio::test]
    async fn test_validate_rejects_wrong_signer() {
        let ledger = MemoryLedger::new();
        let owner = Party::new(Role::Owner);
        let intruder = Party::new(Role::Custodian);
        ledger.register_principal(owner.principal).await.unwrap();
        let (record_id, _) = seeded_record(&ledger, &owner, b"scan").await;

        let token = ledger
            .mint_read_token(&owner.id(), &owner.id(), &[record_id])
            .await
            .unwrap();
        let sig = intruder.keypair.sign(token.token_hash.as_bytes());
        let key_ref = ledger
            .wrapped_keys(&owner.id(), &owner.id(), &[record_id])
            .await
            .unwrap()[0]
            .digest();

        let err = ledger
            .validate(
                &token.token_hash,
                &sig,
                AccessKind::Read,
                &[record_id],
                &[key_ref],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::BadSignature));
    }

    #[tokio::test]
    async fn test_expired_token_rejected_and_swept() {
        let ledger = MemoryLedger::with_token_ttl(-1);
        let owner = Party::new(Role::Owner);
        ledger.register_principal(owner.principal).await.unwrap();
        let (record_id, _) = seeded_record(&ledger, &owner, b"scan").await;

        let token = ledger
            .mint_read_token(&owner.id(), &owner.id(), &[record_id])
            .await
            .unwrap();
        let sig = owner.keypair.sign(token.token_hash.as_bytes());
        let err = ledger
            .validate(&token.token_hash, &sig, AccessKind::Read, &[record_id], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TokenExpired));

        let swept = ledger.cleanup_expired_tokens(now_millis()).await.unwrap();
        assert_eq!(swept, 1);
        let err = ledger
            .validate(&token.token_hash, &sig, AccessKind::Read, &[record_id], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownToken(_)));
    }

    #[tokio::test]
    async fn test_revoke_refuses_later_mint() {
        let ledger = MemoryLedger::new();
        let owner = Party::new(Role::Owner);
        let custodian = Party::new(Role::Custodian);
        ledger.register_principal(owner.principal).await.unwrap();
        ledger
            .register_principal(custodian.principal)
            .await
            .unwrap();
        let (record_id, key) = seeded_record(&ledger, &owner, b"scan").await;
        grant_read(
            &ledger,
            &owner,
            &custodian,
            record_id,
            &key,
            now_millis() + 60_000,
        )
        .await;

        ledger
            .mint_read_token(&custodian.id(), &owner.id(), &[record_id])
            .await
            .unwrap();

        ledger
            .revoke(&owner.id(), &custodian.id(), &[record_id])
            .await
            .unwrap();
        let err = ledger
            .mint_read_token(&custodian.id(), &owner.id(), &[record_id])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NoActiveGrant(_)));
    }

    #[tokio::test]
    async fn test_unregister_record_drops_keys_and_leases() {
        let ledger = MemoryLedger::new();
        let owner = Party::new(Role::Owner);
        let custodian = Party::new(Role::Custodian);
        ledger.register_principal(owner.principal).await.unwrap();
        ledger
            .register_principal(custodian.principal)
            .await
            .unwrap();
        let (record_id, key) = seeded_record(&ledger, &owner, b"scan").await;
        grant_read(
            &ledger,
            &owner,
            &custodian,
            record_id,
            &key,
            now_millis() + 60_000,
        )
        .await;

        ledger
            .unregister_record(&owner.id(), &record_id)
            .await
            .unwrap();

        // The lease died with the record: no more tokens for it.
        let err = ledger
            .mint_read_token(&custodian.id(), &owner.id(), &[record_id])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NoActiveGrant(_)));
        let err = ledger
            .mint_read_token(&owner.id(), &owner.id(), &[record_id])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NoActiveGrant(_)));

        // Key material is gone for every holder.
        assert!(ledger
            .wrapped_keys(&owner.id(), &custodian.id(), &[record_id])
            .await
            .is_err());
        assert!(ledger
            .wrapped_keys(&owner.id(), &owner.id(), &[record_id])
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_grant_rejects_past_deadline() {
        let ledger = MemoryLedger::new();
        let owner = Party::new(Role::Owner);
        let custodian = Party::new(Role::Custodian);
        ledger.register_principal(owner.principal).await.unwrap();
        ledger
            .register_principal(custodian.principal)
            .await
            .unwrap();

        let err = ledger
            .grant(GrantRequest {
                owner: owner.id(),
                grantee: custodian.id(),
                scope: GrantScope::Write,
                wrapped_keys: Vec::new(),
                deadline: now_millis() - 1,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidDeadline { .. }));
    }

    #[tokio::test]
    async fn test_write_grant_enables_write_mint() {
        let ledger = MemoryLedger::new();
        let owner = Party::new(Role::Owner);
        let custodian = Party::new(Role::Custodian);
        ledger.register_principal(owner.principal).await.unwrap();
        ledger
            .register_principal(custodian.principal)
            .await
            .unwrap();

        let err = ledger
            .mint_write_token(&custodian.id(), &owner.id())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NoActiveGrant(_)));

        ledger
            .grant(GrantRequest {
                owner: owner.id(),
                grantee: custodian.id(),
                scope: GrantScope::Write,
                wrapped_keys: Vec::new(),
                deadline: now_millis() + 60_000,
            })
            .await
            .unwrap();

        let token = ledger
            .mint_write_token(&custodian.id(), &owner.id())
            .await
            .unwrap();
        let sig = custodian.keypair.sign(token.token_hash.as_bytes());
        ledger
            .validate(&token.token_hash, &sig, AccessKind::Write, &[], &[])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_events_carry_monotonic_tx_refs() {
        let ledger = MemoryLedger::new();
        let owner = Party::new(Role::Owner);
        let custodian = Party::new(Role::Custodian);
        ledger.register_principal(owner.principal).await.unwrap();
        ledger
            .register_principal(custodian.principal)
            .await
            .unwrap();
        let (record_id, key) = seeded_record(&ledger, &owner, b"scan").await;
        grant_read(
            &ledger,
            &owner,
            &custodian,
            record_id,
            &key,
            now_millis() + 60_000,
        )
        .await;
        ledger
            .revoke_all(&owner.id(), &custodian.id())
            .await
            .unwrap();

        let events = ledger.events_since(LedgerTxRef(0)).await.unwrap();
        assert!(events.len() >= 2);
        for pair in events.windows(2) {
            assert!(pair[0].tx_ref < pair[1].tx_ref);
        }
    }

    #[tokio::test]
    async fn test_object_store_roundtrip_and_delete() {
        let store = MemoryObjectStore::new();
        let owner = PrincipalId::from_bytes([7; 20]);
        let record_id = RecordId::for_plaintext(b"payload");

        store
            .put(&owner, &record_id, b"sealed bytes".to_vec())
            .await
            .unwrap();
        assert_eq!(store.get(&owner, &record_id).await.unwrap(), b"sealed bytes");

        store.delete(&owner, &record_id).await.unwrap();
        assert!(matches!(
            store.get(&owner, &record_id).await,
            Err(StoreError::ObjectNotFound(_))
        ));
        // Deleting again is a no-op.
        store.delete(&owner, &record_id).await.unwrap();
    }
}
