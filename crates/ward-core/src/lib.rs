#![forbid(unsafe_code)]
//! Primitives shared by every other wardchain crate: signing, AEAD,
//! sealed boxes, key derivation, content hashing, identifiers, the
//! unified error type, and wire-level encoding helpers.
//!
//! This crate is deliberately unaware of blocks, natures, or verifier
//! state — see `ward-block` and `ward-verify` for those layers.

pub mod crypto;
pub mod encoding;
pub mod errors;
pub mod identifiers;

pub use crypto::{
    AeadKey, Ed25519Signature, Ed25519SigningKey, Ed25519VerifyingKey, X25519PrivateKey,
    X25519PublicKey,
};
pub use errors::{InvalidBlockCode, Result, WardError};
pub use identifiers::{Author, BlockHash, DeviceId, GroupId, ResourceId, TrustchainId, UserId};
