//! Group private-key sealing helpers and the External -> Internal
//! promotion this device performs once one of its own keys unlocks a
//! group it has only observed from the outside (spec.md §4.5).
//!
//! `ward-verify` can only ever produce [`Group::External`] — it has no
//! access to local secrets. Promotion happens here, by directly
//! mutating [`ChainState::groups`], which is `pub` for exactly this
//! reason.

use ward_core::crypto::sealed::{seal, unseal, X25519PrivateKey, X25519PublicKey};
use ward_core::{GroupId, WardError};
use ward_store::safe::ProvisionalIdentityKeyPair;
use ward_store::{ExternalGroup, Group, InternalGroup, KeySafeContents};
use ward_verify::ChainState;

/// `encrypted_group_private_signature_key` is 96 bytes: the 32-byte
/// key zero-padded to 48 bytes, then sealed (48 + [`SEALED_OVERHEAD`]
/// = 96). Every other sealed-key field in the wire format seals a bare
/// 32-byte key (80 bytes total); this one is the one exception, so the
/// padding step lives here rather than in `ward-block`.
const PADDED_SIGNATURE_KEY_LEN: usize = 48;

/// Pad and seal a group's signature private key to the group's own
/// public encryption key, for embedding in a `UserGroupCreation` block.
pub fn seal_group_signature_key(
    group_encryption_public_key: &X25519PublicKey,
    signature_private_key: &[u8; 32],
) -> Result<[u8; 96], WardError> {
    let mut padded = [0u8; PADDED_SIGNATURE_KEY_LEN];
    padded[..32].copy_from_slice(signature_private_key);
    let sealed = seal(group_encryption_public_key, &padded)?;
    sealed
        .try_into()
        .map_err(|_| WardError::internal("padded group signature key seal must be 96 bytes"))
}

/// Unseal a group's signature private key, stripping the padding added
/// by [`seal_group_signature_key`].
fn unseal_group_signature_key(
    group_encryption_private_key: &X25519PrivateKey,
    encrypted: &[u8],
) -> Result<[u8; 32], WardError> {
    let padded = unseal(group_encryption_private_key, encrypted)?;
    if padded.len() != PADDED_SIGNATURE_KEY_LEN {
        return Err(WardError::invalid_format(
            "group private signature key must unseal to 48 padded bytes",
        ));
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&padded[..32]);
    Ok(key)
}

/// Look for a way into `external`'s private keys using the keys this
/// device already holds: its own user-key history, or a claimed
/// provisional identity. `None` if nothing currently unlocks it.
fn find_group_encryption_private_key(
    external: &ExternalGroup,
    safe: &KeySafeContents,
) -> Option<X25519PrivateKey> {
    for slot in &external.member_key_slots {
        for entry in &safe.user_key_history {
            let private = X25519PrivateKey::from_bytes(entry.private_key);
            if private.public_key() == slot.recipient_public_key {
                if let Ok(plaintext) = unseal(&private, &slot.encrypted_group_private_encryption_key) {
                    if let Ok(key) = <[u8; 32]>::try_from(plaintext.as_slice()) {
                        return Some(X25519PrivateKey::from_bytes(key));
                    }
                }
            }
        }
    }

    for pending in &external.pending_provisional_members {
        for identity in &safe.provisional_identities {
            if identity.public.app_encryption_public_key != pending.app_public_encryption_key
                || identity.public.tanker_encryption_public_key != pending.tanker_public_encryption_key
            {
                continue;
            }
            let app_private = X25519PrivateKey::from_bytes(identity.app_private_key);
            if let Ok(plaintext) = unseal(&app_private, &pending.encrypted_group_private_encryption_key) {
                if let Ok(key) = <[u8; 32]>::try_from(plaintext.as_slice()) {
                    return Some(X25519PrivateKey::from_bytes(key));
                }
            }
        }
    }

    None
}

/// Attempt to promote `group_id` from `External` to `Internal` using
/// the keys currently in `safe`. Returns `true` if promotion happened
/// (a no-op, returning `false`, if the group is unknown, already
/// internal, or still unreachable with the keys on hand).
pub fn try_promote_group(
    group_id: &GroupId,
    state: &mut ChainState,
    safe: &KeySafeContents,
) -> Result<bool, WardError> {
    let Some(Group::External(external)) = state.group(group_id) else {
        return Ok(false);
    };

    let Some(group_private_key) = find_group_encryption_private_key(external, safe) else {
        return Ok(false);
    };

    let signature_private_key =
        unseal_group_signature_key(&group_private_key, &external.encrypted_private_signature_key)?;

    let internal = InternalGroup {
        group_id: external.group_id,
        signature_public_key: external.public_signature_key,
        signature_private_key,
        encryption_public_key: external.public_encryption_key,
        encryption_private_key: group_private_key.to_bytes(),
        last_group_block_hash: external.last_group_block_hash,
        index: external.index,
    };

    state.groups.insert(*group_id, Group::Internal(internal));
    Ok(true)
}

/// Record a newly claimed provisional identity and re-scan every
/// external group for one it now unlocks (spec.md §4.5 "claiming a
/// provisional identity retroactively unlocks any group it was
/// invited to before the claim"). Returns the ids of groups promoted
/// to `Internal` as a result.
pub fn claim_provisional_identity(
    identity: ProvisionalIdentityKeyPair,
    safe: &mut KeySafeContents,
    state: &mut ChainState,
) -> Result<Vec<GroupId>, WardError> {
    safe.provisional_identities.push(identity);

    let external_ids: Vec<GroupId> = state
        .groups
        .values()
        .filter(|group| !group.is_internal())
        .map(|group| group.group_id())
        .collect();

    let mut promoted = Vec::new();
    for group_id in external_ids {
        if try_promote_group(&group_id, state, safe)? {
            promoted.push(group_id);
        }
    }
    Ok(promoted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ward_core::crypto::Ed25519SigningKey;
    use ward_core::BlockHash;
    use ward_store::{GroupMemberSlot, PendingProvisionalMember, ProvisionalIdentityKeys, UserKeyPairEntry};

    fn empty_safe() -> KeySafeContents {
        KeySafeContents {
            device_keys: ward_store::DeviceKeyPair {
                signature_private_key: [0u8; 32],
                encryption_private_key: X25519PrivateKey::generate().to_bytes(),
            },
            user_key_history: Vec::new(),
            provisional_identities: Vec::new(),
        }
    }

    fn sample_external_group(
        group_encryption_public: X25519PublicKey,
        member_slots: Vec<GroupMemberSlot>,
        pending: Vec<PendingProvisionalMember>,
    ) -> ExternalGroup {
        let group_signing_key = Ed25519SigningKey::generate();
        let signature_private_key = group_signing_key.to_bytes();
        let encrypted_private_signature_key =
            seal_group_signature_key(&group_encryption_public, &signature_private_key)
                .expect("seal")
                .to_vec();
        ExternalGroup {
            group_id: GroupId::from_signature_public_key(group_signing_key.verifying_key().as_bytes()),
            public_signature_key: group_signing_key.verifying_key(),
            public_encryption_key: group_encryption_public,
            encrypted_private_signature_key,
            member_key_slots: member_slots,
            pending_provisional_members: pending,
            last_group_block_hash: BlockHash::zero(),
            index: 0,
        }
    }

    #[test]
    fn promotes_via_member_key_slot() {
        let mut safe = empty_safe();
        let user_private = X25519PrivateKey::generate();
        safe.user_key_history.push(UserKeyPairEntry {
            private_key: user_private.to_bytes(),
            index: 0,
        });

        let group_private = X25519PrivateKey::generate();
        let sealed_group_key = seal(&user_private.public_key(), &group_private.to_bytes()).expect("seal");
        let slot = GroupMemberSlot {
            recipient_public_key: user_private.public_key(),
            encrypted_group_private_encryption_key: sealed_group_key,
        };
        let external = sample_external_group(group_private.public_key(), vec![slot], Vec::new());
        let group_id = external.group_id;

        let mut state = ChainState::new();
        state.insert_group(Group::External(external));

        let promoted = try_promote_group(&group_id, &mut state, &safe).expect("promote");
        assert!(promoted);
        assert!(state.group(&group_id).expect("group").is_internal());
    }

    #[test]
    fn unreachable_group_stays_external() {
        let safe = empty_safe();
        let group_private = X25519PrivateKey::generate();
        let external = sample_external_group(group_private.public_key(), Vec::new(), Vec::new());
        let group_id = external.group_id;

        let mut state = ChainState::new();
        state.insert_group(Group::External(external));

        let promoted = try_promote_group(&group_id, &mut state, &safe).expect("attempt");
        assert!(!promoted);
        assert!(!state.group(&group_id).expect("group").is_internal());
    }

    #[test]
    fn claiming_provisional_identity_promotes_pending_group() {
        let app_private = X25519PrivateKey::generate();
        let tanker_private = X25519PrivateKey::generate();
        let group_private = X25519PrivateKey::generate();

        let sealed_group_key = seal(&app_private.public_key(), &group_private.to_bytes()).expect("seal");
        let pending = PendingProvisionalMember {
            app_public_encryption_key: app_private.public_key(),
            tanker_public_encryption_key: tanker_private.public_key(),
            encrypted_group_private_encryption_key: sealed_group_key,
        };
        let external = sample_external_group(group_private.public_key(), Vec::new(), vec![pending]);
        let group_id = external.group_id;

        let mut state = ChainState::new();
        state.insert_group(Group::External(external));
        let mut safe = empty_safe();

        let identity = ProvisionalIdentityKeyPair {
            public: ProvisionalIdentityKeys {
                app_encryption_public_key: app_private.public_key(),
                tanker_encryption_public_key: tanker_private.public_key(),
            },
            app_private_key: app_private.to_bytes(),
            tanker_private_key: tanker_private.to_bytes(),
        };

        let promoted = claim_provisional_identity(identity, &mut safe, &mut state).expect("claim");
        assert_eq!(promoted, vec![group_id]);
        assert!(state.group(&group_id).expect("group").is_internal());
    }
}
