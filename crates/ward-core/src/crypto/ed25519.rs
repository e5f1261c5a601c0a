//! Ed25519 signing primitives (spec.md §4.1 "signature = 64B over the
//! block hash", §3 invariant 3 "delegation signature").

use ed25519_dalek::{Signer, Verifier};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::errors::WardError;

/// A detached Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ed25519Signature(#[serde(with = "serde_bytes")] pub [u8; 64]);

impl Ed25519Signature {
    /// Wrap raw signature bytes.
    pub fn new(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Raw byte view.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Parse from a slice of exactly 64 bytes.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, WardError> {
        let arr: [u8; 64] = bytes
            .try_into()
            .map_err(|_| WardError::invalid_format("ed25519 signature must be 64 bytes"))?;
        Ok(Self(arr))
    }
}

impl std::fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519Signature({})", hex::encode(self.0))
    }
}

/// An Ed25519 signing (private) key. Zeroed on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct Ed25519SigningKey([u8; 32]);

impl Ed25519SigningKey {
    /// Generate a fresh signing key from a CSPRNG.
    pub fn generate() -> Self {
        let signing = ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng);
        Self(signing.to_bytes())
    }

    /// Wrap raw key bytes (e.g. from the local key safe).
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive the corresponding public verifying key.
    pub fn verifying_key(&self) -> Ed25519VerifyingKey {
        let signing = ed25519_dalek::SigningKey::from_bytes(&self.0);
        Ed25519VerifyingKey(signing.verifying_key().to_bytes())
    }

    /// Sign an arbitrary message, producing a detached signature.
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        let signing = ed25519_dalek::SigningKey::from_bytes(&self.0);
        Ed25519Signature(signing.sign(message).to_bytes())
    }

    /// Raw seed bytes, for sealing into the key safe.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl std::fmt::Debug for Ed25519SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Ed25519SigningKey(..)")
    }
}

/// An Ed25519 verifying (public) key.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ed25519VerifyingKey(#[serde(with = "serde_bytes")] pub [u8; 32]);

impl Ed25519VerifyingKey {
    /// Wrap raw key bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw byte view.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Verify a detached signature over `message`.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<(), WardError> {
        let key = ed25519_dalek::VerifyingKey::from_bytes(&self.0)
            .map_err(|e| WardError::invalid_format(format!("malformed verifying key: {e}")))?;
        let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
        key.verify(message, &sig)
            .map_err(|_| WardError::invalid_block_signature())
    }
}

impl std::fmt::Debug for Ed25519VerifyingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519VerifyingKey({})", hex::encode(self.0))
    }
}

impl WardError {
    fn invalid_block_signature() -> Self {
        Self::invalid_block(
            crate::errors::InvalidBlockCode::InvalidSignature,
            "ed25519 signature verification failed",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let key = Ed25519SigningKey::generate();
        let verifying = key.verifying_key();
        let sig = key.sign(b"trust chain block");
        assert!(verifying.verify(b"trust chain block", &sig).is_ok());
    }

    #[test]
    fn tampered_message_fails_verification() {
        let key = Ed25519SigningKey::generate();
        let verifying = key.verifying_key();
        let sig = key.sign(b"original");
        assert!(verifying.verify(b"tampered", &sig).is_err());
    }

    #[test]
    fn signature_rejects_wrong_length() {
        assert!(Ed25519Signature::try_from_slice(&[0u8; 63]).is_err());
    }
}
