//! Domain models held by the local stores (spec.md §3 "Data model").

use serde::{Deserialize, Serialize};

use ward_core::crypto::{Ed25519VerifyingKey, X25519PublicKey};
use ward_core::{BlockHash, DeviceId, GroupId, ResourceId, UserId};

/// A device belonging to some user (spec.md §3 "Device").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub device_id: DeviceId,
    pub user_id: UserId,
    pub signature_public_key: Ed25519VerifyingKey,
    pub encryption_public_key: X25519PublicKey,
    pub is_ghost_device: bool,
    pub is_server_device: bool,
    pub created_index: u64,
    /// `None` until a valid revocation block sets it (spec.md §3
    /// "`revokedAt` is `∞` until a valid revocation block sets it").
    pub revoked_at: Option<u64>,
}

impl Device {
    /// Whether this device is revoked as of `at_index` (spec.md §4.2
    /// DeviceCreation rule (f): "author device must be non-revoked at
    /// this block's index").
    pub fn is_revoked_at(&self, at_index: u64) -> bool {
        self.revoked_at.is_some_and(|revoked| revoked <= at_index)
    }
}

/// A rotated user encryption public key entry (spec.md §3 "User").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPublicKeyEntry {
    pub public_key: X25519PublicKey,
    /// The block index at which this key became current.
    pub index: u64,
}

/// A user and its devices/key history (spec.md §3 "User").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    pub devices: Vec<DeviceId>,
    /// Append-only; rotated by every v2 revocation (spec.md invariant 5).
    pub user_public_keys: Vec<UserPublicKeyEntry>,
}

impl User {
    /// The current (most recently appended) user public key.
    pub fn current_public_key(&self) -> Option<&UserPublicKeyEntry> {
        self.user_public_keys.last()
    }

    /// Whether `key` is the current or a not-yet-superseded user key
    /// (spec.md §4.2 KeyPublish verification).
    pub fn has_public_key(&self, key: &X25519PublicKey) -> bool {
        self.user_public_keys.iter().any(|entry| &entry.public_key == key)
    }
}

/// A provisional identity's two keypairs, as known locally (app-side
/// half plus tanker-side half, spec.md GLOSSARY "Provisional identity").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionalIdentityKeys {
    pub app_encryption_public_key: X25519PublicKey,
    pub tanker_encryption_public_key: X25519PublicKey,
}

/// A group, in either of its two observable shapes (spec.md §3 "Group").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Group {
    /// Held when this device has the group's private keys.
    Internal(InternalGroup),
    /// Held when this device is not (yet) a member.
    External(ExternalGroup),
}

impl Group {
    pub fn group_id(&self) -> GroupId {
        match self {
            Group::Internal(g) => g.group_id,
            Group::External(g) => g.group_id,
        }
    }

    pub fn last_group_block_hash(&self) -> BlockHash {
        match self {
            Group::Internal(g) => g.last_group_block_hash,
            Group::External(g) => g.last_group_block_hash,
        }
    }

    pub fn index(&self) -> u64 {
        match self {
            Group::Internal(g) => g.index,
            Group::External(g) => g.index,
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Group::Internal(_))
    }

    pub fn public_signature_key(&self) -> Ed25519VerifyingKey {
        match self {
            Group::Internal(g) => g.signature_public_key,
            Group::External(g) => g.public_signature_key,
        }
    }

    pub fn public_encryption_key(&self) -> X25519PublicKey {
        match self {
            Group::Internal(g) => g.encryption_public_key,
            Group::External(g) => g.public_encryption_key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalGroup {
    pub group_id: GroupId,
    pub signature_public_key: Ed25519VerifyingKey,
    pub signature_private_key: [u8; 32],
    pub encryption_public_key: X25519PublicKey,
    pub encryption_private_key: [u8; 32],
    pub last_group_block_hash: BlockHash,
    pub index: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalGroup {
    pub group_id: GroupId,
    pub public_signature_key: Ed25519VerifyingKey,
    pub public_encryption_key: X25519PublicKey,
    /// Sealed to the group's own public encryption key; undecryptable
    /// until this device becomes internal (spec.md §4.5).
    pub encrypted_private_signature_key: Vec<u8>,
    /// One sealed slot per member, keyed by that member's user public
    /// encryption key (spec.md §6 `UserGroupCreation`/`UserGroupAddition`
    /// `member_slots`). A resolver with a matching local user key walks
    /// this list to unseal the group private key (spec.md §4.5).
    pub member_key_slots: Vec<GroupMemberSlot>,
    pub pending_provisional_members: Vec<PendingProvisionalMember>,
    pub last_group_block_hash: BlockHash,
    pub index: u64,
}

/// One member's sealed copy of the group private encryption key
/// (spec.md §6 `SealedSlot`, specialized to the group-membership case).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMemberSlot {
    pub recipient_public_key: X25519PublicKey,
    pub encrypted_group_private_encryption_key: Vec<u8>,
}

/// A provisional-member slot awaiting a matching claim (spec.md §4.5
/// "Pending slots are retained indefinitely").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingProvisionalMember {
    pub app_public_encryption_key: X25519PublicKey,
    pub tanker_public_encryption_key: X25519PublicKey,
    pub encrypted_group_private_encryption_key: Vec<u8>,
}

/// A verified key-publish, indexed by [`ResourceId`] so the
/// resource-key manager can walk all publishes for a resource against
/// the keys this device locally holds (spec.md §4.3 "resolves a
/// resource id to its symmetric key by walking key-publish blocks").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyPublishRecord {
    ToDevice {
        resource_id: ResourceId,
        recipient_device_id: DeviceId,
        encrypted_key: Vec<u8>,
    },
    ToUser {
        resource_id: ResourceId,
        recipient_public_key: X25519PublicKey,
        encrypted_key: [u8; 80],
    },
    ToUserGroup {
        resource_id: ResourceId,
        recipient_public_key: X25519PublicKey,
        encrypted_key: [u8; 80],
    },
    ToProvisionalUser {
        resource_id: ResourceId,
        app_public_key: X25519PublicKey,
        tanker_public_key: X25519PublicKey,
        double_sealed_key: Vec<u8>,
    },
}

impl KeyPublishRecord {
    pub fn resource_id(&self) -> ResourceId {
        match self {
            KeyPublishRecord::ToDevice { resource_id, .. }
            | KeyPublishRecord::ToUser { resource_id, .. }
            | KeyPublishRecord::ToUserGroup { resource_id, .. }
            | KeyPublishRecord::ToProvisionalUser { resource_id, .. } => *resource_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_device(revoked_at: Option<u64>) -> Device {
        Device {
            device_id: DeviceId::new([1u8; 32]),
            user_id: UserId::new([2u8; 32]),
            signature_public_key: Ed25519VerifyingKey::new([3u8; 32]),
            encryption_public_key: X25519PublicKey::new([4u8; 32]),
            is_ghost_device: false,
            is_server_device: false,
            created_index: 0,
            revoked_at,
        }
    }

    #[test]
    fn unrevoked_device_is_never_revoked() {
        let device = sample_device(None);
        assert!(!device.is_revoked_at(1_000_000));
    }

    #[test]
    fn device_is_revoked_from_its_revocation_index_onward() {
        let device = sample_device(Some(5));
        assert!(!device.is_revoked_at(4));
        assert!(device.is_revoked_at(5));
        assert!(device.is_revoked_at(6));
    }

    #[test]
    fn user_current_public_key_is_last_appended() {
        let user = User {
            user_id: UserId::new([1u8; 32]),
            devices: vec![],
            user_public_keys: vec![
                UserPublicKeyEntry {
                    public_key: X25519PublicKey::new([1u8; 32]),
                    index: 0,
                },
                UserPublicKeyEntry {
                    public_key: X25519PublicKey::new([2u8; 32]),
                    index: 3,
                },
            ],
        };
        assert_eq!(
            user.current_public_key().unwrap().public_key,
            X25519PublicKey::new([2u8; 32])
        );
        assert!(user.has_public_key(&X25519PublicKey::new([1u8; 32])));
    }
}
