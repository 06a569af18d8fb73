//! Proptest strategies and properties for the custody kernel.

use proptest::prelude::*;

use custody_core::{PrincipalId, RecordId};

/// Arbitrary record plaintexts, from one byte up to a few kilobytes.
pub fn plaintext() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..4096)
}

/// Arbitrary record ids (raw content addresses, not derived).
pub fn record_id() -> impl Strategy<Value = RecordId> {
    any::<[u8; 32]>().prop_map(RecordId::from_bytes)
}

/// Arbitrary principal ids.
pub fn principal_id() -> impl Strategy<Value = PrincipalId> {
    any::<[u8; 20]>().prop_map(PrincipalId::from_bytes)
}

/// Non-empty sets of distinct record ids.
pub fn record_set() -> impl Strategy<Value = Vec<RecordId>> {
    prop::collection::hash_set(any::<[u8; 32]>(), 1..8)
        .prop_map(|set| set.into_iter().map(RecordId::from_bytes).collect())
}

/// Seed bytes for deterministic keypairs.
pub fn key_seed() -> impl Strategy<Value = [u8; 32]> {
    any::<[u8; 32]>().prop_filter("zero seed is not a valid scalar", |s| s.iter().any(|b| *b != 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use custody_core::Keypair;
    use custody_crypto::{SealedRecord, SymmetricKey, WrappedKey};
    use custody_perms::GrantScope;

    proptest! {
        #[test]
        fn prop_sealed_roundtrip(plaintext in plaintext()) {
            let (sealed, key) = SealedRecord::seal_fresh(&plaintext).unwrap();
            prop_assert_eq!(sealed.open(&key).unwrap(), plaintext);
        }

        #[test]
        fn prop_wrap_transfers_key_to_recipient_only(
            seed_a in key_seed(),
            seed_b in key_seed(),
        ) {
            prop_assume!(seed_a != seed_b);
            let recipient = Keypair::from_seed(&seed_a);
            let other = Keypair::from_seed(&seed_b);
            prop_assume!(recipient.is_ok() && other.is_ok());
            let (recipient, other) = (recipient.unwrap(), other.unwrap());
            let key = SymmetricKey::generate();

            let wrapped = WrappedKey::wrap(&key, &recipient.public_key()).unwrap();
            let unwrapped = wrapped.unwrap_key(&recipient).unwrap();
            prop_assert_eq!(unwrapped.as_bytes(), key.as_bytes());
            prop_assert!(wrapped.unwrap_key(&other).is_err());
        }

        #[test]
        fn prop_content_address_is_deterministic(plaintext in plaintext()) {
            prop_assert_eq!(
                RecordId::for_plaintext(&plaintext),
                RecordId::for_plaintext(&plaintext)
            );
        }

        #[test]
        fn prop_read_scope_covers_exactly_its_records(
            granted in record_set(),
            probe in record_id(),
        ) {
            let scope = GrantScope::Read { record_ids: granted.clone() };
            prop_assert!(scope.covers_all(&granted));
            prop_assert_eq!(scope.covers(&probe), granted.contains(&probe));
        }

        #[test]
        fn prop_signature_binds_token_hash(seed in key_seed(), hash in any::<[u8; 32]>()) {
            let keypair = Keypair::from_seed(&seed);
            prop_assume!(keypair.is_ok());
            let keypair = keypair.unwrap();
            let signature = keypair.sign(&hash);
            prop_assert!(keypair.public_key().verify(&hash, &signature).is_ok());

            let mut other = hash;
            other[0] ^= 1;
            prop_assert!(keypair.public_key().verify(&other, &signature).is_err());
        }
    }
}
