//! Cryptographic primitives (spec.md §2 "Primitives"): signing, AEAD,
//! sealed boxes, key derivation, and hashing. Nothing in this module
//! is aware of blocks, natures, or trust-chain state — it is the leaf
//! layer every other crate builds on.

pub mod aead;
pub mod ed25519;
pub mod hash;
pub mod kdf;
pub mod random;
pub mod sealed;

pub use aead::{AeadKey, AEAD_KEY_LEN, AEAD_NONCE_LEN, AEAD_TAG_LEN};
pub use ed25519::{Ed25519Signature, Ed25519SigningKey, Ed25519VerifyingKey};
pub use sealed::{X25519PrivateKey, X25519PublicKey, SEALED_OVERHEAD};
