//! `findKeyForResource` (spec.md §4.3): walk verified key-publish
//! records against locally held keys, in priority order, caching the
//! result.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex as AsyncMutex;

use ward_core::crypto::aead::{open, seal};
use ward_core::crypto::sealed::unseal;
use ward_core::crypto::{AeadKey, X25519PrivateKey};
use ward_core::{DeviceId, ResourceId, WardError};
use ward_store::{Group, KeyPublishRecord, KeySafeContents, Table};
use ward_verify::ChainState;

/// Resolves resource keys for one local device, caching successful
/// decrypts in `cache` (spec.md §4.3 "On successful decrypt, the
/// manager writes through to the cache").
pub struct ResourceKeyManager<T> {
    cache: T,
    /// Key the cache is encrypted under; derived once from the local
    /// user-secret (spec.md §5).
    cache_key: AeadKey,
    local_device_id: DeviceId,
    /// One lock per in-flight `resourceId`, so concurrent callers
    /// serialize on the same resolution rather than racing the
    /// transport/crypto work twice (spec.md §4.3 "at-most-one
    /// in-flight resolution per resourceId").
    in_flight: SyncMutex<HashMap<ResourceId, Arc<AsyncMutex<()>>>>,
}

impl<T> ResourceKeyManager<T>
where
    T: Table<ResourceId, Vec<u8>>,
{
    pub fn new(cache: T, cache_key: AeadKey, local_device_id: DeviceId) -> Self {
        Self {
            cache,
            cache_key,
            local_device_id,
            in_flight: SyncMutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, resource_id: ResourceId) -> Arc<AsyncMutex<()>> {
        self.in_flight
            .lock()
            .entry(resource_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Resolve `resource_id` to its symmetric key, in the priority
    /// order spec.md §4.3 defines: local cache, then device, user,
    /// group, and provisional-identity key-publishes in that order.
    #[tracing::instrument(skip(self, state, safe))]
    pub async fn find_key_for_resource(
        &self,
        resource_id: ResourceId,
        state: &ChainState,
        safe: &KeySafeContents,
    ) -> Result<AeadKey, WardError> {
        let lock = self.lock_for(resource_id);
        let _guard = lock.lock().await;

        if let Some(key) = self.read_cache(resource_id).await? {
            return Ok(key);
        }

        let key = self.resolve_uncached(resource_id, state, safe)?;
        self.write_cache(resource_id, &key).await?;
        Ok(key)
    }

    /// Seed the cache directly with a key this device just minted
    /// (spec.md §4.4 "if shareWithSelf, additionally cache the key
    /// locally"), without waiting for a key-publish round trip.
    pub async fn cache_key_locally(&self, resource_id: ResourceId, key: &AeadKey) -> Result<(), WardError> {
        self.write_cache(resource_id, key).await
    }

    async fn read_cache(&self, resource_id: ResourceId) -> Result<Option<AeadKey>, WardError> {
        let Some(ciphertext) = self
            .cache
            .get(&resource_id)
            .await
            .map_err(|err| WardError::internal(err.to_string()))?
        else {
            return Ok(None);
        };
        let plaintext = open(&self.cache_key, &ciphertext, resource_id.as_bytes())?;
        Ok(Some(AeadKey::try_from_slice(&plaintext)?))
    }

    async fn write_cache(&self, resource_id: ResourceId, key: &AeadKey) -> Result<(), WardError> {
        let ciphertext = seal(&self.cache_key, key.as_bytes(), resource_id.as_bytes())?;
        self.cache
            .put(resource_id, ciphertext)
            .await
            .map_err(|err| WardError::internal(err.to_string()))
    }

    fn resolve_uncached(
        &self,
        resource_id: ResourceId,
        state: &ChainState,
        safe: &KeySafeContents,
    ) -> Result<AeadKey, WardError> {
        let Some(records) = state.key_publishes.get(&resource_id) else {
            return Err(WardError::not_found(format!(
                "no key-publish for resource {resource_id}"
            )));
        };

        for record in records {
            if let Some(key) = self.try_decrypt(record, state, safe)? {
                return Ok(key);
            }
        }
        Err(WardError::not_found(format!(
            "resource {resource_id} has key-publishes but none decrypt locally"
        )))
    }

    fn try_decrypt(
        &self,
        record: &KeyPublishRecord,
        state: &ChainState,
        safe: &KeySafeContents,
    ) -> Result<Option<AeadKey>, WardError> {
        match record {
            KeyPublishRecord::ToDevice {
                recipient_device_id,
                encrypted_key,
                ..
            } => {
                if *recipient_device_id != self.local_device_id {
                    return Ok(None);
                }
                let private = X25519PrivateKey::from_bytes(safe.device_keys.encryption_private_key);
                Ok(Some(unseal_resource_key(&private, encrypted_key)?))
            }
            KeyPublishRecord::ToUser {
                recipient_public_key,
                encrypted_key,
                ..
            } => {
                for entry in &safe.user_key_history {
                    let private = X25519PrivateKey::from_bytes(entry.private_key);
                    if private.public_key() == *recipient_public_key {
                        return Ok(Some(unseal_resource_key(&private, encrypted_key)?));
                    }
                }
                Ok(None)
            }
            KeyPublishRecord::ToUserGroup {
                recipient_public_key,
                encrypted_key,
                ..
            } => {
                let internal = state.groups.values().find_map(|group| match group {
                    Group::Internal(g) if g.encryption_public_key == *recipient_public_key => Some(g),
                    _ => None,
                });
                match internal {
                    Some(group) => {
                        let private = X25519PrivateKey::from_bytes(group.encryption_private_key);
                        Ok(Some(unseal_resource_key(&private, encrypted_key)?))
                    }
                    // Recipient is a group this device has not decrypted
                    // into yet; not an error, just not resolvable here.
                    None => Ok(None),
                }
            }
            KeyPublishRecord::ToProvisionalUser {
                app_public_key,
                tanker_public_key,
                double_sealed_key,
                ..
            } => {
                let Some(identity) = safe
                    .provisional_identities
                    .iter()
                    .find(|p| p.public.app_encryption_public_key == *app_public_key
                        && p.public.tanker_encryption_public_key == *tanker_public_key)
                else {
                    return Ok(None);
                };
                let tanker_private = X25519PrivateKey::from_bytes(identity.tanker_private_key);
                let inner = unseal(&tanker_private, double_sealed_key)?;
                let app_private = X25519PrivateKey::from_bytes(identity.app_private_key);
                let plaintext = unseal(&app_private, &inner)?;
                Ok(Some(AeadKey::try_from_slice(&plaintext)?))
            }
        }
    }
}

fn unseal_resource_key(private: &X25519PrivateKey, sealed: &[u8]) -> Result<AeadKey, WardError> {
    let plaintext = unseal(private, sealed)?;
    AeadKey::try_from_slice(&plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ward_core::crypto::sealed::seal as box_seal;
    use ward_store::safe::ProvisionalIdentityKeyPair;
    use ward_store::{DeviceKeyPair, MemoryTable, ProvisionalIdentityKeys, UserKeyPairEntry};

    fn empty_safe() -> KeySafeContents {
        KeySafeContents {
            device_keys: DeviceKeyPair {
                signature_private_key: [0u8; 32],
                encryption_private_key: X25519PrivateKey::generate().to_bytes(),
            },
            user_key_history: Vec::new(),
            provisional_identities: Vec::new(),
        }
    }

    fn manager() -> ResourceKeyManager<MemoryTable<ResourceId, Vec<u8>>> {
        ResourceKeyManager::new(
            MemoryTable::new(),
            AeadKey::generate(),
            DeviceId::new([1u8; 32]),
        )
    }

    #[tokio::test]
    async fn resolves_via_user_key_publish_and_then_caches() {
        let manager = manager();
        let mut safe = empty_safe();
        let user_private = X25519PrivateKey::generate();
        safe.user_key_history.push(UserKeyPairEntry {
            private_key: user_private.to_bytes(),
            index: 0,
        });

        let resource_key = AeadKey::generate();
        let sealed = box_seal(&user_private.public_key(), resource_key.as_bytes()).expect("seal");
        let mut state = ChainState::new();
        state.record_key_publish(KeyPublishRecord::ToUser {
            resource_id: ResourceId::new([7u8; 16]),
            recipient_public_key: user_private.public_key(),
            encrypted_key: sealed.try_into().expect("80 bytes"),
        });

        let resolved = manager
            .find_key_for_resource(ResourceId::new([7u8; 16]), &state, &safe)
            .await
            .expect("resolve");
        assert_eq!(resolved.as_bytes(), resource_key.as_bytes());

        // Second call hits the cache; blank out state to prove it.
        let empty_state = ChainState::new();
        let cached = manager
            .find_key_for_resource(ResourceId::new([7u8; 16]), &empty_state, &safe)
            .await
            .expect("cached resolve");
        assert_eq!(cached.as_bytes(), resource_key.as_bytes());
    }

    #[tokio::test]
    async fn unknown_resource_is_not_found() {
        let manager = manager();
        let safe = empty_safe();
        let state = ChainState::new();
        let err = manager
            .find_key_for_resource(ResourceId::new([1u8; 16]), &state, &safe)
            .await
            .unwrap_err();
        assert!(matches!(err, WardError::NotFound { .. }));
    }

    #[tokio::test]
    async fn double_sealed_provisional_key_publish_resolves() {
        let manager = manager();
        let mut safe = empty_safe();
        let app_private = X25519PrivateKey::generate();
        let tanker_private = X25519PrivateKey::generate();
        safe.provisional_identities.push(ProvisionalIdentityKeyPair {
            public: ProvisionalIdentityKeys {
                app_encryption_public_key: app_private.public_key(),
                tanker_encryption_public_key: tanker_private.public_key(),
            },
            app_private_key: app_private.to_bytes(),
            tanker_private_key: tanker_private.to_bytes(),
        });

        let resource_key = AeadKey::generate();
        let inner = box_seal(&app_private.public_key(), resource_key.as_bytes()).expect("inner seal");
        let outer = box_seal(&tanker_private.public_key(), &inner).expect("outer seal");

        let mut state = ChainState::new();
        state.record_key_publish(KeyPublishRecord::ToProvisionalUser {
            resource_id: ResourceId::new([9u8; 16]),
            app_public_key: app_private.public_key(),
            tanker_public_key: tanker_private.public_key(),
            double_sealed_key: outer,
        });

        let resolved = manager
            .find_key_for_resource(ResourceId::new([9u8; 16]), &state, &safe)
            .await
            .expect("resolve");
        assert_eq!(resolved.as_bytes(), resource_key.as_bytes());
    }
}
