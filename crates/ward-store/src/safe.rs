//! The local encrypted key safe (spec.md §2 "Local key safe", §6
//! "Local safe envelope", §5 "process-singleton per user").
//!
//! Holds this device's signature/encryption keypairs, the ordered
//! history of user encryption keypairs, and provisional-identity
//! keypairs. The safe is serialized to JSON (byte fields base64), then
//! sealed with AEAD under the user-secret derived in
//! [`ward_core::crypto::kdf::derive_user_secret`], and stored as one
//! opaque record.

use serde::{Deserialize, Serialize};

use ward_core::crypto::aead::{open, seal, AeadKey};
use ward_core::encoding::{base64_array, base64_vec};
use ward_core::{TrustchainId, UserId, WardError};

use crate::models::ProvisionalIdentityKeys;

/// The device's own signing and encryption keypairs, serialized in
/// base64 form (spec.md §6 "Local safe envelope").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceKeyPair {
    #[serde(with = "base64_array")]
    pub signature_private_key: [u8; 32],
    #[serde(with = "base64_array")]
    pub encryption_private_key: [u8; 32],
}

/// One historical user encryption keypair (spec.md §3 "User" +
/// invariant 5: rotated every v2 revocation, superseded entries remain
/// queryable).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserKeyPairEntry {
    #[serde(with = "base64_array")]
    pub private_key: [u8; 32],
    pub index: u64,
}

/// A locally held provisional identity's private halves, keyed by the
/// identity's public halves for matching against pending group/key-publish
/// slots (spec.md GLOSSARY "Provisional identity").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionalIdentityKeyPair {
    pub public: ProvisionalIdentityKeys,
    #[serde(with = "base64_array")]
    pub app_private_key: [u8; 32],
    #[serde(with = "base64_array")]
    pub tanker_private_key: [u8; 32],
}

/// The full contents of the local key safe, before encryption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeySafeContents {
    pub device_keys: DeviceKeyPair,
    /// Ordered oldest-first; the last entry is the current user key.
    pub user_key_history: Vec<UserKeyPairEntry>,
    pub provisional_identities: Vec<ProvisionalIdentityKeyPair>,
}

impl KeySafeContents {
    /// The current user encryption private key, if any has been
    /// recorded yet (absent only before first device creation completes).
    pub fn current_user_key(&self) -> Option<&UserKeyPairEntry> {
        self.user_key_history.last()
    }
}

/// An opaque, at-rest-encrypted key safe record (spec.md §6 "stored as
/// a single opaque record").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedKeySafe {
    #[serde(with = "base64_vec")]
    ciphertext: Vec<u8>,
}

impl SealedKeySafe {
    /// Encrypt `contents` under the user-secret for `(trustchain_id, user_id)`.
    pub fn seal(
        contents: &KeySafeContents,
        trustchain_id: &TrustchainId,
        user_id: &UserId,
    ) -> Result<Self, WardError> {
        let key = ward_core::crypto::kdf::derive_user_secret(trustchain_id, user_id)?;
        Self::seal_with_key(contents, &key)
    }

    /// Encrypt `contents` under an already-derived user-secret key,
    /// avoiding a redundant HKDF expansion for callers that cache it.
    pub fn seal_with_key(contents: &KeySafeContents, key: &AeadKey) -> Result<Self, WardError> {
        let json = serde_json::to_vec(contents)?;
        let ciphertext = seal(key, &json, b"wardchain-key-safe")?;
        Ok(Self { ciphertext })
    }

    /// Decrypt and parse the safe. Fails with [`WardError::DecryptionFailed`]
    /// if the user-secret is wrong or the record was tampered with.
    pub fn unseal(
        &self,
        trustchain_id: &TrustchainId,
        user_id: &UserId,
    ) -> Result<KeySafeContents, WardError> {
        let key = ward_core::crypto::kdf::derive_user_secret(trustchain_id, user_id)?;
        self.unseal_with_key(&key)
    }

    /// Decrypt and parse the safe using an already-derived key.
    pub fn unseal_with_key(&self, key: &AeadKey) -> Result<KeySafeContents, WardError> {
        let json = open(key, &self.ciphertext, b"wardchain-key-safe")?;
        serde_json::from_slice(&json).map_err(WardError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_contents() -> KeySafeContents {
        KeySafeContents {
            device_keys: DeviceKeyPair {
                signature_private_key: [1u8; 32],
                encryption_private_key: [2u8; 32],
            },
            user_key_history: vec![UserKeyPairEntry {
                private_key: [3u8; 32],
                index: 0,
            }],
            provisional_identities: Vec::new(),
        }
    }

    #[test]
    fn seal_then_unseal_recovers_contents() {
        let trustchain_id = TrustchainId::new([9u8; 32]);
        let user_id = UserId::new([8u8; 32]);
        let contents = sample_contents();

        let sealed = SealedKeySafe::seal(&contents, &trustchain_id, &user_id).expect("seal");
        let recovered = sealed.unseal(&trustchain_id, &user_id).expect("unseal");

        assert_eq!(
            recovered.device_keys.signature_private_key,
            contents.device_keys.signature_private_key
        );
        assert_eq!(recovered.current_user_key().unwrap().index, 0);
    }

    #[test]
    fn unseal_fails_for_wrong_user() {
        let trustchain_id = TrustchainId::new([9u8; 32]);
        let user_id = UserId::new([8u8; 32]);
        let other_user_id = UserId::new([7u8; 32]);
        let sealed =
            SealedKeySafe::seal(&sample_contents(), &trustchain_id, &user_id).expect("seal");
        assert!(sealed.unseal(&trustchain_id, &other_user_id).is_err());
    }

    #[test]
    fn json_byte_fields_are_base64_strings() {
        let contents = sample_contents();
        let json = serde_json::to_string(&contents).expect("json");
        assert!(json.contains(&ward_core::encoding::encode_base64(&[1u8; 32])));
        assert!(!json.contains("[1,1,1"));
    }
}
