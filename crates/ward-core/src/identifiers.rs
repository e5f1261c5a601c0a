//! Content-addressed identifier types used across the trust chain.
//!
//! Every identifier is a fixed-size byte array newtype (spec.md §3,
//! §9 "Cyclic references in state graphs"): users, devices, and groups
//! reference each other by id, never by pointer, so state can be
//! rebuilt by replaying the log from genesis (spec.md §8.2).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::WardError;

macro_rules! fixed_bytes_id {
    ($name:ident, $len:expr, $prefix:expr) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Wrap a fixed-size byte array.
            pub fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// The all-zero sentinel value (used for the genesis author field).
            pub fn zero() -> Self {
                Self([0u8; $len])
            }

            /// Raw byte view.
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Consume into the raw byte array.
            pub fn into_bytes(self) -> [u8; $len] {
                self.0
            }

            /// Parse from a slice of exactly the expected length.
            pub fn try_from_slice(bytes: &[u8]) -> Result<Self, WardError> {
                let arr: [u8; $len] = bytes.try_into().map_err(|_| {
                    WardError::invalid_argument(format!(
                        "{} must be exactly {} bytes, got {}",
                        stringify!($name),
                        $len,
                        bytes.len()
                    ))
                })?;
                Ok(Self(arr))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), hex::encode(self.0))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}:{}", $prefix, hex::encode(self.0))
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = WardError;

            fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
                Self::try_from_slice(bytes)
            }
        }
    };
}

fixed_bytes_id!(TrustchainId, 32, "trustchain");
fixed_bytes_id!(DeviceId, 32, "device");
fixed_bytes_id!(UserId, 32, "user");
fixed_bytes_id!(GroupId, 32, "group");
fixed_bytes_id!(BlockHash, 32, "block");
fixed_bytes_id!(ResourceId, 16, "resource");

impl GroupId {
    /// A group id is defined as its public signature key (spec.md §3 Group).
    pub fn from_signature_public_key(key: &[u8; 32]) -> Self {
        Self(*key)
    }
}

impl DeviceId {
    /// A device id is the hash of its device-creation block (spec.md §3 Device).
    pub fn from_block_hash(hash: &BlockHash) -> Self {
        Self(hash.0)
    }
}

/// Identifies the author of a block: either the trustchain root (for the
/// first device) or a previously verified device-creation block hash
/// (spec.md §3 Block, invariant 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Author {
    /// The root trustchain key authored this block directly.
    Trustchain(TrustchainId),
    /// An existing, verified device authored this block.
    Device(DeviceId),
}

impl Author {
    /// Raw 32-byte form as carried on the wire (spec.md §3 Block.author).
    pub fn as_bytes(&self) -> [u8; 32] {
        match self {
            Author::Trustchain(id) => id.0,
            Author::Device(id) => id.0,
        }
    }
}
