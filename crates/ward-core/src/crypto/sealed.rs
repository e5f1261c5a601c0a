//! X25519 sealed-box encryption (spec.md §2 Primitives "sealed boxes";
//! every `KeyPublish*` payload carries an `encKey` sealed to a
//! recipient's public encryption key, §6).
//!
//! A sealed box lets the sender encrypt to a recipient's public key
//! alone, with no prior key exchange and no sender identity revealed:
//! a fresh ephemeral X25519 keypair is generated per call, an XChaCha20-
//! Poly1305 key is derived from the ECDH shared secret, and the nonce
//! is derived from `blake3(ephemeralPub ‖ recipientPub)` rather than
//! transmitted, so the wire form is `ephemeralPub[32] ‖ ciphertext ‖ tag[16]`
//! — [`SEALED_OVERHEAD`] bytes larger than the plaintext.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::errors::WardError;

/// Bytes added to the plaintext by [`seal`]: a 32-byte ephemeral
/// public key plus a 16-byte Poly1305 tag.
pub const SEALED_OVERHEAD: usize = 32 + 16;

/// An X25519 public encryption key (a device, user, or group's
/// `encryptionPublicKey`, spec.md §3).
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct X25519PublicKey(#[serde(with = "serde_bytes")] pub [u8; 32]);

impl X25519PublicKey {
    /// Wrap raw key bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw byte view.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for X25519PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "X25519PublicKey({})", hex::encode(self.0))
    }
}

/// An X25519 private encryption key. Zeroed on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct X25519PrivateKey([u8; 32]);

impl X25519PrivateKey {
    /// Generate a fresh private key from a CSPRNG.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(rand::rngs::OsRng);
        Self(secret.to_bytes())
    }

    /// Wrap raw key bytes (e.g. unsealed from the local key safe).
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw byte view, for re-sealing into the key safe.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    /// Derive the corresponding public key.
    pub fn public_key(&self) -> X25519PublicKey {
        let secret = StaticSecret::from(self.0);
        X25519PublicKey(*PublicKey::from(&secret).as_bytes())
    }
}

impl std::fmt::Debug for X25519PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("X25519PrivateKey(..)")
    }
}

fn derive_box_key(shared_secret: &[u8; 32], ephemeral_pub: &[u8; 32], recipient_pub: &[u8; 32]) -> [u8; 32] {
    use hkdf::Hkdf;
    use sha2::Sha256;
    let hk = Hkdf::<Sha256>::new(None, shared_secret);
    let mut info = Vec::with_capacity(64);
    info.extend_from_slice(ephemeral_pub);
    info.extend_from_slice(recipient_pub);
    let mut out = [0u8; 32];
    hk.expand(&info, &mut out)
        .expect("32 is a valid HKDF-SHA256 output length");
    out
}

fn derive_nonce(ephemeral_pub: &[u8; 32], recipient_pub: &[u8; 32]) -> [u8; 24] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(ephemeral_pub);
    hasher.update(recipient_pub);
    let digest = hasher.finalize();
    let mut nonce = [0u8; 24];
    nonce.copy_from_slice(&digest.as_bytes()[..24]);
    nonce
}

/// Seal `plaintext` to `recipient`, producing `ephemeralPub[32] ‖ ciphertext ‖ tag[16]`.
/// Anyone holding the corresponding private key can [`unseal`] it; no
/// shared state or prior exchange with the sender is required.
pub fn seal(recipient: &X25519PublicKey, plaintext: &[u8]) -> Result<Vec<u8>, WardError> {
    let ephemeral = StaticSecret::random_from_rng(rand::rngs::OsRng);
    let ephemeral_pub = PublicKey::from(&ephemeral);
    let recipient_pub = PublicKey::from(recipient.0);
    let shared = ephemeral.diffie_hellman(&recipient_pub);

    let box_key = derive_box_key(shared.as_bytes(), ephemeral_pub.as_bytes(), &recipient.0);
    let nonce_bytes = derive_nonce(ephemeral_pub.as_bytes(), &recipient.0);

    let cipher = XChaCha20Poly1305::new((&box_key).into());
    let nonce = XNonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| WardError::internal("sealed box encryption failed"))?;

    let mut out = Vec::with_capacity(32 + ciphertext.len());
    out.extend_from_slice(ephemeral_pub.as_bytes());
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Unseal a buffer produced by [`seal`] using the matching private key.
/// Fails with [`WardError::DecryptionFailed`] on any authentication
/// failure (spec.md §4.3 "seal-decrypt").
pub fn unseal(recipient_private: &X25519PrivateKey, sealed: &[u8]) -> Result<Vec<u8>, WardError> {
    if sealed.len() < SEALED_OVERHEAD {
        return Err(WardError::decryption_failed("sealed box too short"));
    }
    let (ephemeral_pub_bytes, ciphertext) = sealed.split_at(32);
    let ephemeral_pub: [u8; 32] = ephemeral_pub_bytes
        .try_into()
        .map_err(|_| WardError::decryption_failed("malformed ephemeral public key"))?;

    let recipient_secret = StaticSecret::from(recipient_private.0);
    let recipient_pub = *PublicKey::from(&recipient_secret).as_bytes();
    let shared = recipient_secret.diffie_hellman(&PublicKey::from(ephemeral_pub));

    let box_key = derive_box_key(shared.as_bytes(), &ephemeral_pub, &recipient_pub);
    let nonce_bytes = derive_nonce(&ephemeral_pub, &recipient_pub);

    let cipher = XChaCha20Poly1305::new((&box_key).into());
    let nonce = XNonce::from_slice(&nonce_bytes);
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| WardError::decryption_failed("sealed box authentication failed"))
}

/// Expected total sealed length for a plaintext of `plaintext_len` bytes.
pub fn sealed_len(plaintext_len: usize) -> usize {
    plaintext_len + SEALED_OVERHEAD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_recovers_plaintext() {
        let private = X25519PrivateKey::generate();
        let public = private.public_key();
        let sealed = seal(&public, b"resource key material").expect("seal");
        assert_eq!(sealed.len(), sealed_len(b"resource key material".len()));
        let opened = unseal(&private, &sealed).expect("unseal");
        assert_eq!(opened, b"resource key material");
    }

    #[test]
    fn wrong_recipient_fails_to_unseal() {
        let private = X25519PrivateKey::generate();
        let public = private.public_key();
        let other = X25519PrivateKey::generate();
        let sealed = seal(&public, b"secret").expect("seal");
        assert!(unseal(&other, &sealed).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails_to_unseal() {
        let private = X25519PrivateKey::generate();
        let public = private.public_key();
        let mut sealed = seal(&public, b"secret").expect("seal");
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(unseal(&private, &sealed).is_err());
    }
}
