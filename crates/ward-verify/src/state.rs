//! The verified chain state: everything a block can be checked
//! against, and is advanced into, on successful verification (spec.md
//! §4.2 "advances that state atomically on success").

use std::collections::HashMap;

use ward_core::crypto::{Ed25519VerifyingKey, X25519PublicKey};
use ward_core::{BlockHash, DeviceId, GroupId, ResourceId, TrustchainId, UserId, WardError};
use ward_store::{
    Device, ExternalGroup, Group, GroupMemberSlot, InternalGroup, KeyPublishRecord,
    PendingProvisionalMember, User, UserPublicKeyEntry,
};

/// The full set of verified state the verifier reads and mutates.
/// Owned by [`crate::verify::Verifier`] behind its lock (spec.md §5
/// "single logical lane").
#[derive(Debug, Default)]
pub struct ChainState {
    pub trustchain_id: Option<TrustchainId>,
    pub root_signature_key: Option<Ed25519VerifyingKey>,
    pub users: HashMap<UserId, User>,
    pub devices: HashMap<DeviceId, Device>,
    pub groups: HashMap<GroupId, Group>,
    /// Every verified key-publish, indexed by resource id (spec.md
    /// §4.3 "walking key-publish blocks against locally held keys").
    pub key_publishes: HashMap<ResourceId, Vec<KeyPublishRecord>>,
    /// Highest block index applied so far; used to detect replays and
    /// to report sync progress (spec.md §3 Block.index).
    pub verified_index: u64,
}

impl ChainState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The signature public key that authored `nature` at `author`, at
    /// the current point in verification. `None` if the author is
    /// unknown (caller should queue the block as unverified).
    pub fn author_signature_key(&self, author: &ward_core::Author) -> Option<Ed25519VerifyingKey> {
        match author {
            ward_core::Author::Trustchain(_) => self.root_signature_key,
            ward_core::Author::Device(device_id) => {
                self.devices.get(device_id).map(|d| d.signature_public_key)
            }
        }
    }

    /// The user id that owns `device_id`, if known.
    pub fn user_of_device(&self, device_id: &DeviceId) -> Option<UserId> {
        self.devices.get(device_id).map(|d| d.user_id)
    }

    pub fn user(&self, user_id: &UserId) -> Option<&User> {
        self.users.get(user_id)
    }

    pub fn user_mut(&mut self, user_id: &UserId) -> Option<&mut User> {
        self.users.get_mut(user_id)
    }

    pub fn device(&self, device_id: &DeviceId) -> Option<&Device> {
        self.devices.get(device_id)
    }

    pub fn group(&self, group_id: &GroupId) -> Option<&Group> {
        self.groups.get(group_id)
    }

    pub fn group_mut(&mut self, group_id: &GroupId) -> Option<&mut Group> {
        self.groups.get_mut(group_id)
    }

    /// Set the trustchain root once, at genesis (spec.md §4.2
    /// TrustchainCreation: "Sets the root public signature key").
    pub fn set_root(&mut self, trustchain_id: TrustchainId, root_key: Ed25519VerifyingKey) {
        self.trustchain_id = Some(trustchain_id);
        self.root_signature_key = Some(root_key);
    }

    /// Insert a newly-created device, creating its owning user record
    /// on first sight (spec.md §4.2 DeviceCreation).
    pub fn insert_device(&mut self, device: Device) {
        let user_id = device.user_id;
        let device_id = device.device_id;
        self.devices.insert(device_id, device);
        let user = self.users.entry(user_id).or_insert_with(|| User {
            user_id,
            devices: Vec::new(),
            user_public_keys: Vec::new(),
        });
        if !user.devices.contains(&device_id) {
            user.devices.push(device_id);
        }
    }

    /// Insert a newly-observed group (spec.md §4.5 "Unknown ->
    /// External/Internal").
    pub fn insert_group(&mut self, group: Group) {
        self.groups.insert(group.group_id(), group);
    }

    /// Append a new current user public key, implementing the rotation
    /// side of invariant 5 and testable property §8.4.
    pub fn rotate_user_public_key(
        &mut self,
        user_id: &UserId,
        new_key: X25519PublicKey,
        at_index: u64,
    ) -> Result<(), WardError> {
        let user = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| WardError::not_found(format!("unknown user {user_id}")))?;
        user.user_public_keys.push(UserPublicKeyEntry {
            public_key: new_key,
            index: at_index,
        });
        Ok(())
    }

    /// Record a device as revoked as of `at_index` (spec.md §4.2
    /// DeviceRevocation: "mark `target.revokedAt = index`").
    pub fn revoke_device(&mut self, device_id: &DeviceId, at_index: u64) -> Result<(), WardError> {
        let device = self
            .devices
            .get_mut(device_id)
            .ok_or_else(|| WardError::not_found(format!("unknown device {device_id}")))?;
        device.revoked_at = Some(at_index);
        Ok(())
    }

    /// Replace `lastGroupBlockHash`/`index` for a group after a
    /// verified addition (spec.md invariant 6).
    pub fn advance_group_head(
        &mut self,
        group_id: &GroupId,
        new_hash: BlockHash,
        at_index: u64,
    ) -> Result<(), WardError> {
        let group = self
            .groups
            .get_mut(group_id)
            .ok_or_else(|| WardError::not_found(format!("unknown group {group_id}")))?;
        match group {
            Group::Internal(InternalGroup {
                last_group_block_hash,
                index,
                ..
            })
            | Group::External(ExternalGroup {
                last_group_block_hash,
                index,
                ..
            }) => {
                *last_group_block_hash = new_hash;
                *index = at_index;
            }
        }
        Ok(())
    }

    /// Whether `nature` is one this state can currently verify given
    /// the author already being known (used by the unverified queue to
    /// decide whether to attempt promotion).
    pub fn knows_author(&self, author: &ward_core::Author) -> bool {
        self.author_signature_key(author).is_some()
    }

    /// Index a freshly-verified key-publish for later resolution.
    pub fn record_key_publish(&mut self, record: KeyPublishRecord) {
        self.key_publishes
            .entry(record.resource_id())
            .or_default()
            .push(record);
    }

    /// Append new member/pending-provisional slots to an external
    /// group's pending material (spec.md §4.5 "any verified addition
    /// updates the hash and merges new pending slots"). A no-op for
    /// internal groups, which have already decrypted their own key.
    pub fn merge_external_group_slots(
        &mut self,
        group_id: &GroupId,
        member_slots: Vec<GroupMemberSlot>,
        pending_provisional: Vec<PendingProvisionalMember>,
    ) -> Result<(), WardError> {
        let group = self
            .groups
            .get_mut(group_id)
            .ok_or_else(|| WardError::not_found(format!("unknown group {group_id}")))?;
        if let Group::External(ExternalGroup {
            member_key_slots,
            pending_provisional_members,
            ..
        }) = group
        {
            member_key_slots.extend(member_slots);
            pending_provisional_members.extend(pending_provisional);
        }
        Ok(())
    }
}
