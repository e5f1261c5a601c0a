//! HKDF-based key derivation (spec.md §4.6 "key is derived as
//! `KDF(resourceKey, chunkIndex)`", §5 "user-secret... derived once
//! from `(trustchainId, userId)`").

use hkdf::Hkdf;
use sha2::Sha256;

use crate::crypto::aead::{AeadKey, AEAD_KEY_LEN};
use crate::errors::WardError;
use crate::identifiers::{TrustchainId, UserId};

/// Derive the per-chunk sub-key for the streaming encryptor
/// (spec.md §4.6). `chunk_index` starts at 0 and advances by one per
/// chunk of the stream.
pub fn derive_chunk_key(resource_key: &AeadKey, chunk_index: u64) -> Result<AeadKey, WardError> {
    derive_subkey(resource_key, b"wardchain-stream-chunk", &chunk_index.to_le_bytes())
}

/// Derive the local key-safe's symmetric encryption key (spec.md §5
/// "the user-secret for the safe is derived once at user creation from
/// `(trustchainId, userId)` and never transmitted").
pub fn derive_user_secret(
    trustchain_id: &TrustchainId,
    user_id: &UserId,
) -> Result<AeadKey, WardError> {
    let hk = Hkdf::<Sha256>::new(None, trustchain_id.as_bytes());
    let mut out = [0u8; AEAD_KEY_LEN];
    hk.expand(user_id.as_bytes(), &mut out)
        .map_err(|_| WardError::internal("hkdf expand failed for user secret"))?;
    Ok(AeadKey::new(out))
}

/// Generic HKDF-Expand over an existing key with a domain-separated
/// info string, used anywhere a sub-key needs to be derived from a
/// parent secret without a fresh random draw.
pub fn derive_subkey(parent: &AeadKey, info: &[u8], context: &[u8]) -> Result<AeadKey, WardError> {
    let hk = Hkdf::<Sha256>::new(None, parent.as_bytes());
    let mut full_info = Vec::with_capacity(info.len() + context.len());
    full_info.extend_from_slice(info);
    full_info.extend_from_slice(context);
    let mut out = [0u8; AEAD_KEY_LEN];
    hk.expand(&full_info, &mut out)
        .map_err(|_| WardError::internal("hkdf expand failed"))?;
    Ok(AeadKey::new(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_keys_differ_per_index() {
        let resource_key = AeadKey::generate();
        let k0 = derive_chunk_key(&resource_key, 0).expect("derive");
        let k1 = derive_chunk_key(&resource_key, 1).expect("derive");
        assert_ne!(k0.as_bytes(), k1.as_bytes());
    }

    #[test]
    fn chunk_key_is_deterministic() {
        let resource_key = AeadKey::generate();
        let a = derive_chunk_key(&resource_key, 7).expect("derive");
        let b = derive_chunk_key(&resource_key, 7).expect("derive");
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn user_secret_is_deterministic_per_pair() {
        let trustchain = TrustchainId::new([1u8; 32]);
        let user = UserId::new([2u8; 32]);
        let a = derive_user_secret(&trustchain, &user).expect("derive");
        let b = derive_user_secret(&trustchain, &user).expect("derive");
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn user_secret_differs_per_user() {
        let trustchain = TrustchainId::new([1u8; 32]);
        let a = derive_user_secret(&trustchain, &UserId::new([2u8; 32])).expect("derive");
        let b = derive_user_secret(&trustchain, &UserId::new([3u8; 32])).expect("derive");
        assert_ne!(a.as_bytes(), b.as_bytes());
    }
}
