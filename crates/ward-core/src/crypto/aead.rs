//! XChaCha20-Poly1305 authenticated encryption (spec.md §2 Primitives,
//! §8.7 "AEAD round-trip").

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::errors::WardError;

/// Size in bytes of an XChaCha20-Poly1305 key.
pub const AEAD_KEY_LEN: usize = 32;
/// Size in bytes of an XChaCha20-Poly1305 extended nonce.
pub const AEAD_NONCE_LEN: usize = 24;
/// Size in bytes of the Poly1305 authentication tag appended to ciphertext.
pub const AEAD_TAG_LEN: usize = 16;

/// A symmetric AEAD key: a resource key, a chunk sub-key, or a safe
/// encryption key. Zeroed on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct AeadKey([u8; AEAD_KEY_LEN]);

impl AeadKey {
    /// Wrap raw key bytes.
    pub fn new(bytes: [u8; AEAD_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh random key (used when issuing a new resource key).
    pub fn generate() -> Self {
        use rand_core::RngCore;
        let mut bytes = [0u8; AEAD_KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Raw byte view, e.g. to seal into a key-publish block.
    pub fn as_bytes(&self) -> &[u8; AEAD_KEY_LEN] {
        &self.0
    }

    /// Parse from a slice of exactly [`AEAD_KEY_LEN`] bytes.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, WardError> {
        let arr: [u8; AEAD_KEY_LEN] = bytes
            .try_into()
            .map_err(|_| WardError::invalid_format("aead key must be 32 bytes"))?;
        Ok(Self(arr))
    }
}

impl std::fmt::Debug for AeadKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AeadKey(..)")
    }
}

/// Encrypt `plaintext` under `key`, returning `nonce ‖ ciphertext ‖ tag`.
///
/// A fresh random nonce is drawn per call; `nonce` is prepended so
/// [`open`] is self-contained.
pub fn seal(key: &AeadKey, plaintext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>, WardError> {
    use rand_core::RngCore;
    let cipher = XChaCha20Poly1305::new(key.0.as_ref().into());
    let mut nonce_bytes = [0u8; AEAD_NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(
            nonce,
            chacha20poly1305::aead::Payload {
                msg: plaintext,
                aad: associated_data,
            },
        )
        .map_err(|_| WardError::internal("aead encryption failed"))?;
    let mut out = Vec::with_capacity(AEAD_NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a buffer produced by [`seal`]. Fails with [`WardError::DecryptionFailed`]
/// on any authentication failure (spec.md §4.6, §7 "Crypto failures").
pub fn open(key: &AeadKey, sealed: &[u8], associated_data: &[u8]) -> Result<Vec<u8>, WardError> {
    if sealed.len() < AEAD_NONCE_LEN + AEAD_TAG_LEN {
        return Err(WardError::decryption_failed("ciphertext too short"));
    }
    let (nonce_bytes, ciphertext) = sealed.split_at(AEAD_NONCE_LEN);
    let cipher = XChaCha20Poly1305::new(key.0.as_ref().into());
    let nonce = XNonce::from_slice(nonce_bytes);
    cipher
        .decrypt(
            nonce,
            chacha20poly1305::aead::Payload {
                msg: ciphertext,
                aad: associated_data,
            },
        )
        .map_err(|_| WardError::decryption_failed("authentication tag mismatch"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_recovers_plaintext() {
        let key = AeadKey::generate();
        let plaintext = b"Rivest Shamir Adleman";
        let sealed = seal(&key, plaintext, b"").expect("seal");
        let opened = open(&key, &sealed, b"").expect("open");
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn flipped_bit_fails_authentication() {
        let key = AeadKey::generate();
        let mut sealed = seal(&key, b"hello", b"").expect("seal");
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(matches!(
            open(&key, &sealed, b""),
            Err(WardError::DecryptionFailed { .. })
        ));
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let key = AeadKey::generate();
        let other = AeadKey::generate();
        let sealed = seal(&key, b"hello", b"").expect("seal");
        assert!(open(&other, &sealed, b"").is_err());
    }
}
