#![forbid(unsafe_code)]
//! Bit-exact (de)serialization of every block nature, dispatch on
//! nature, and the versioned outer envelope (spec.md §4.1).
//!
//! This crate knows how to turn bytes into a typed [`Block`] and back;
//! it has no opinion on whether a block is semantically valid against
//! prior state — that is `ward-verify`'s job.

pub mod block;
pub mod nature;
pub mod payload;

pub use block::{Block, BLOCK_VERSION_CURRENT};
pub use nature::Nature;
pub use payload::{
    DeviceCreationCore, DeviceCreationPayload, DeviceRevocationPayload,
    KeyPublishToDevicePayload, KeyPublishToProvisionalUserPayload,
    KeyPublishToRecipientPayload, Payload, PendingProvisionalSlot, SealedSlot,
    TrustchainCreationPayload, UserGroupAdditionPayload, UserGroupCreationPayload,
};
