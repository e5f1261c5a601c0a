//! Per-nature verification and state application (spec.md §4.2).
//!
//! [`Verifier`] is the sole place that turns a parsed [`Block`] into a
//! verified state mutation. Every nature gets its own checking
//! function; each either mutates [`ChainState`] and returns `Ok`, or
//! returns a [`VerifyError`] without touching state — there is no
//! partially-applied block.

use ward_block::{
    Block, DeviceCreationCore, DeviceCreationPayload, DeviceRevocationPayload, Nature, Payload,
};
use ward_core::crypto::{Ed25519Signature, Ed25519VerifyingKey, X25519PublicKey};
use ward_core::{Author, DeviceId, GroupId, InvalidBlockCode, UserId, WardError};
use ward_store::{
    Device, ExternalGroup, Group, GroupMemberSlot, InternalGroup, KeyPublishRecord,
    PendingProvisionalMember,
};

use crate::state::ChainState;
use crate::unverified::{Subject, UnverifiedQueue};

/// Outcome of [`Verifier::ingest`] for one block.
#[derive(Debug)]
pub enum IngestOutcome {
    /// The block verified and its effects were applied to state.
    Verified,
    /// The block's author (or, for additions, its group) is not yet
    /// known; it was queued under `subject` for later promotion
    /// (spec.md §4.2 "Re-entrancy & ordering").
    Queued(Subject),
    /// The block failed a semantic invariant and was dropped
    /// (spec.md §7 "A failed block is *dropped*, not retried").
    Dropped(WardError),
}

/// Internal result of a per-nature check: either it mutated state and
/// tells the caller what (if anything) got unblocked, or it needs a
/// dependency that hasn't verified yet, or it is simply invalid.
enum VerifyError {
    Missing(Subject),
    Invalid(WardError),
}

type VResult<T> = Result<T, VerifyError>;

fn invalid<T>(code: InvalidBlockCode, message: impl Into<String>) -> VResult<T> {
    Err(VerifyError::Invalid(WardError::invalid_block(code, message)))
}

fn missing<T>(subject: Subject) -> VResult<T> {
    Err(VerifyError::Missing(subject))
}

/// Validates one block at a time against [`ChainState`] and advances
/// that state atomically on success, queuing blocks whose dependency
/// has not yet verified (spec.md §4.2).
pub struct Verifier {
    pub state: ChainState,
    queue: UnverifiedQueue,
}

impl Verifier {
    pub fn new(max_queue_per_subject: usize) -> Self {
        Self {
            state: ChainState::new(),
            queue: UnverifiedQueue::new(max_queue_per_subject),
        }
    }

    /// Build a fresh [`Verifier`] by ingesting `blocks` in order,
    /// implementing testable property §8.2 ("replaying the verified
    /// log from genesis yields state identical to incremental
    /// application") as a first-class API rather than a test helper
    /// (SPEC_FULL.md §4).
    pub fn replay(blocks: impl IntoIterator<Item = Block>, max_queue_per_subject: usize) -> Self {
        let mut verifier = Self::new(max_queue_per_subject);
        for block in blocks {
            verifier.ingest(block);
        }
        verifier
    }

    /// Verify and apply one block, queuing or dropping it as needed.
    /// Successful application recursively promotes any blocks that
    /// were waiting on this one.
    #[tracing::instrument(skip(self, block), fields(nature = ?block.nature, index = block.index))]
    pub fn ingest(&mut self, block: Block) -> IngestOutcome {
        match self.verify_and_apply(&block) {
            Ok(unblocked) => {
                self.promote(unblocked);
                IngestOutcome::Verified
            }
            Err(VerifyError::Missing(subject)) => {
                tracing::debug!(?subject, "queued block pending dependency");
                self.queue.push(subject, block);
                IngestOutcome::Queued(subject)
            }
            Err(VerifyError::Invalid(err)) => {
                tracing::warn!(error = %err, nature = ?block.nature, index = block.index, "dropped invalid block");
                IngestOutcome::Dropped(err)
            }
        }
    }

    /// Drain and recursively re-ingest every block waiting on `subject`.
    fn promote(&mut self, subject: Option<Subject>) {
        let Some(subject) = subject else { return };
        let drained = self.queue.drain(subject);
        for block in drained {
            self.ingest(block);
        }
    }

    /// Dispatch to the per-nature check. Returns the [`Subject`] (if
    /// any) newly-verified blocks may unblock.
    fn verify_and_apply(&mut self, block: &Block) -> VResult<Option<Subject>> {
        match block.nature {
            Nature::TrustchainCreation => {
                verify_trustchain_creation(block, &mut self.state)?;
                Ok(Some(Subject::Genesis))
            }
            Nature::DeviceCreationV1 | Nature::DeviceCreationV2 | Nature::DeviceCreationV3 => {
                let device_id = verify_device_creation(block, &mut self.state)?;
                Ok(Some(Subject::AuthorDevice(device_id)))
            }
            Nature::DeviceRevocationV1 | Nature::DeviceRevocationV2 => {
                verify_device_revocation(block, &mut self.state)?;
                Ok(None)
            }
            Nature::KeyPublishToDevice
            | Nature::KeyPublishToUser
            | Nature::KeyPublishToUserGroup
            | Nature::KeyPublishToProvisionalUser => {
                verify_key_publish(block, &mut self.state)?;
                Ok(None)
            }
            Nature::UserGroupCreation => {
                let group_id = verify_user_group_creation(block, &mut self.state)?;
                Ok(Some(Subject::Group(group_id)))
            }
            Nature::UserGroupAddition => {
                let group_id = verify_user_group_addition(block, &mut self.state)?;
                Ok(Some(Subject::Group(group_id)))
            }
        }
    }
}

/// Resolve the signature key that authored `block`, given it is
/// device-authored (every nature but `TrustchainCreation` and the
/// first device-creation of a user). Missing authors queue on
/// [`Subject::AuthorDevice`].
fn device_author(block: &Block, state: &ChainState) -> VResult<(DeviceId, Ed25519VerifyingKey)> {
    match block.author {
        Author::Device(device_id) => match state.device(&device_id) {
            Some(device) => Ok((device_id, device.signature_public_key)),
            None => missing(Subject::AuthorDevice(device_id)),
        },
        Author::Trustchain(_) => invalid(InvalidBlockCode::InvalidAuthor, "expected device author"),
    }
}

fn require_author_not_revoked(device_id: &DeviceId, at_index: u64, state: &ChainState) -> VResult<()> {
    if state
        .device(device_id)
        .is_some_and(|d| d.is_revoked_at(at_index))
    {
        return invalid(InvalidBlockCode::RevokedAuthor, "authoring device is revoked");
    }
    Ok(())
}

fn verify_trustchain_creation(block: &Block, state: &mut ChainState) -> VResult<()> {
    if state.trustchain_id.is_some() {
        return invalid(InvalidBlockCode::Forbidden, "trustchain already created");
    }
    if block.index != 0 {
        return invalid(InvalidBlockCode::Forbidden, "trustchain creation must be the first block");
    }
    if !matches!(block.author, Author::Trustchain(id) if id == ward_core::TrustchainId::zero()) {
        return invalid(InvalidBlockCode::InvalidAuthor, "trustchain creation author must be zero");
    }
    if block.signature != Ed25519Signature::new([0u8; 64]) {
        return invalid(InvalidBlockCode::InvalidSignature, "trustchain creation signature must be zero");
    }
    let payload = match block.decode_payload() {
        Ok(Payload::TrustchainCreation(p)) => p,
        Ok(_) => return invalid(InvalidBlockCode::InvalidNature, "nature/payload mismatch"),
        Err(err) => return Err(VerifyError::Invalid(err)),
    };
    let hash = block.hash();
    if block.trustchain_id.as_bytes() != hash.as_bytes() {
        return invalid(InvalidBlockCode::InvalidAuthor, "trustchain id must equal block hash");
    }
    state.set_root(block.trustchain_id, Ed25519VerifyingKey::new(payload.public_signature_key));
    Ok(())
}

fn verify_device_creation(block: &Block, state: &mut ChainState) -> VResult<DeviceId> {
    let payload = match block.decode_payload() {
        Ok(Payload::DeviceCreation(p)) => p,
        Ok(_) => return invalid(InvalidBlockCode::InvalidNature, "nature/payload mismatch"),
        Err(err) => return Err(VerifyError::Invalid(err)),
    };

    if let DeviceCreationPayload::V2 { last_reset, .. } = &payload {
        if *last_reset != [0u8; 32] {
            return invalid(InvalidBlockCode::Forbidden, "lastReset must be zero");
        }
    }

    let core: &DeviceCreationCore = match &payload {
        DeviceCreationPayload::V1(core) => core,
        DeviceCreationPayload::V2 { core, .. } => core,
        DeviceCreationPayload::V3 { core, .. } => core,
    };
    let user_id = UserId::new(core.user_id);
    let is_first_device_for_user = state.user(&user_id).is_none();
    let user_has_keys = state
        .user(&user_id)
        .is_some_and(|u| !u.user_public_keys.is_empty());
    let is_v3 = matches!(payload, DeviceCreationPayload::V3 { .. });

    if user_has_keys && !is_v3 {
        return invalid(InvalidBlockCode::VersionMismatch, "user holds user-keys; device-creation must be v3");
    }
    if !user_has_keys && !is_first_device_for_user && is_v3 {
        return invalid(InvalidBlockCode::MissingUserKeys, "user has no user-keys to re-announce");
    }

    let (author_device_id, author_key) = if is_first_device_for_user {
        let trustchain_id = match state.trustchain_id {
            Some(id) => id,
            None => return missing(Subject::Genesis),
        };
        if block.author.as_bytes() != *trustchain_id.as_bytes() {
            return invalid(InvalidBlockCode::InvalidAuthor, "first device must be trustchain-authored");
        }
        let root_key = match state.root_signature_key {
            Some(key) => key,
            None => return invalid(InvalidBlockCode::Forbidden, "trustchain root key unknown"),
        };
        (None, root_key)
    } else {
        let (device_id, key) = device_author(block, state)?;
        require_author_not_revoked(&device_id, block.index, state)?;
        let author_user = state.user_of_device(&device_id);
        if author_user != Some(user_id) {
            return invalid(InvalidBlockCode::InvalidAuthor, "author device belongs to a different user");
        }
        (Some(device_id), key)
    };
    let _ = author_device_id;

    let mut delegation_message = Vec::with_capacity(64);
    delegation_message.extend_from_slice(&core.ephemeral_public_key);
    delegation_message.extend_from_slice(&core.user_id);
    if author_key
        .verify(&delegation_message, &Ed25519Signature::new(core.delegation_signature))
        .is_err()
    {
        return invalid(InvalidBlockCode::InvalidDelegationSignature, "delegation signature did not verify");
    }

    let ephemeral_key = Ed25519VerifyingKey::new(core.ephemeral_public_key);
    if block.verify_signature(&ephemeral_key).is_err() {
        return invalid(InvalidBlockCode::InvalidSignature, "block signature did not verify under ephemeral key");
    }

    if is_v3 {
        if let DeviceCreationPayload::V3 { user_public_encryption_key, .. } = &payload {
            if user_has_keys {
                let current = state
                    .user(&user_id)
                    .and_then(|u| u.current_public_key())
                    .map(|e| e.public_key);
                if current != Some(X25519PublicKey::new(*user_public_encryption_key)) {
                    return invalid(InvalidBlockCode::InvalidUserPublicKey, "embedded user key does not match current key");
                }
            }
        }
    }

    let device_id = DeviceId::from_block_hash(&block.hash());
    let (is_ghost_device, is_server_device) = match &payload {
        DeviceCreationPayload::V3 { is_ghost_device, is_server_device, .. } => {
            (*is_ghost_device, *is_server_device)
        }
        _ => (false, false),
    };
    state.insert_device(Device {
        device_id,
        user_id,
        signature_public_key: Ed25519VerifyingKey::new(core.public_signature_key),
        encryption_public_key: X25519PublicKey::new(core.public_encryption_key),
        is_ghost_device,
        is_server_device,
        created_index: block.index,
        revoked_at: None,
    });

    if is_v3 && !user_has_keys {
        if let DeviceCreationPayload::V3 { user_public_encryption_key, .. } = &payload {
            state
                .rotate_user_public_key(&user_id, X25519PublicKey::new(*user_public_encryption_key), block.index)
                .map_err(VerifyError::Invalid)?;
        }
    }

    Ok(device_id)
}

fn verify_device_revocation(block: &Block, state: &mut ChainState) -> VResult<()> {
    let payload = match block.decode_payload() {
        Ok(Payload::DeviceRevocation(p)) => p,
        Ok(_) => return invalid(InvalidBlockCode::InvalidNature, "nature/payload mismatch"),
        Err(err) => return Err(VerifyError::Invalid(err)),
    };

    let (author_device_id, author_key) = device_author(block, state)?;
    require_author_not_revoked(&author_device_id, block.index, state)?;
    if block.verify_signature(&author_key).is_err() {
        return invalid(InvalidBlockCode::InvalidSignature, "revocation signature did not verify");
    }

    let target_bytes = match &payload {
        DeviceRevocationPayload::V1 { device_id } => *device_id,
        DeviceRevocationPayload::V2 { device_id, .. } => *device_id,
    };
    let target_id = DeviceId::new(target_bytes);
    let target = match state.device(&target_id) {
        Some(device) => device.clone(),
        None => return invalid(InvalidBlockCode::InvalidRevokedDevice, "unknown revocation target"),
    };
    if target.revoked_at.is_some() {
        return invalid(InvalidBlockCode::InvalidRevokedDevice, "device already revoked");
    }

    let author_user = state.user_of_device(&author_device_id);
    if author_user != Some(target.user_id) {
        return invalid(InvalidBlockCode::InvalidAuthor, "revocation author and target share no user");
    }
    let user_id = target.user_id;
    let user_has_keys = state
        .user(&user_id)
        .is_some_and(|u| !u.user_public_keys.is_empty());

    match &payload {
        DeviceRevocationPayload::V1 { .. } => {
            if user_has_keys {
                return invalid(InvalidBlockCode::VersionMismatch, "v1 revocation illegal once user holds user-keys");
            }
        }
        DeviceRevocationPayload::V2 {
            new_user_public_encryption_key,
            previous_user_public_encryption_key,
            recipients,
            ..
        } => {
            let current = state
                .user(&user_id)
                .and_then(|u| u.current_public_key())
                .map(|e| e.public_key);
            if current != Some(X25519PublicKey::new(*previous_user_public_encryption_key)) {
                return invalid(InvalidBlockCode::InvalidUserPublicKey, "previous user key does not match current");
            }

            let mut expected: Vec<X25519PublicKey> = state
                .users
                .get(&user_id)
                .into_iter()
                .flat_map(|u| u.devices.iter())
                .filter_map(|id| state.devices.get(id))
                .filter(|d| d.device_id != target_id && !d.is_revoked_at(block.index))
                .map(|d| d.encryption_public_key)
                .collect();
            let mut actual: Vec<X25519PublicKey> = recipients
                .iter()
                .map(|slot| X25519PublicKey::new(slot.recipient_public_key))
                .collect();
            expected.sort_by_key(|k| *k.as_bytes());
            actual.sort_by_key(|k| *k.as_bytes());
            if expected != actual {
                return invalid(InvalidBlockCode::Forbidden, "revocation recipient set does not match remaining devices");
            }
            let _ = new_user_public_encryption_key;
        }
    }

    state.revoke_device(&target_id, block.index).map_err(VerifyError::Invalid)?;
    if let DeviceRevocationPayload::V2 { new_user_public_encryption_key, .. } = &payload {
        state
            .rotate_user_public_key(&user_id, X25519PublicKey::new(*new_user_public_encryption_key), block.index)
            .map_err(VerifyError::Invalid)?;
    }
    Ok(())
}

fn verify_key_publish(block: &Block, state: &mut ChainState) -> VResult<()> {
    let (author_device_id, author_key) = device_author(block, state)?;
    require_author_not_revoked(&author_device_id, block.index, state)?;
    if block.verify_signature(&author_key).is_err() {
        return invalid(InvalidBlockCode::InvalidSignature, "key-publish signature did not verify");
    }

    let payload = block.decode_payload().map_err(VerifyError::Invalid)?;
    let record = match payload {
        Payload::KeyPublishToDevice(p) => {
            let recipient = DeviceId::new(p.recipient_device_id);
            if state.device(&recipient).is_none() {
                return invalid(InvalidBlockCode::Forbidden, "unknown key-publish-to-device recipient");
            }
            KeyPublishRecord::ToDevice {
                resource_id: ward_core::ResourceId::new(p.resource_id),
                recipient_device_id: recipient,
                encrypted_key: p.encrypted_key,
            }
        }
        Payload::KeyPublishToUser(p) => {
            let recipient_key = X25519PublicKey::new(p.recipient_public_key);
            let known = state.users.values().any(|u| u.has_public_key(&recipient_key));
            if !known {
                return invalid(InvalidBlockCode::InvalidUserPublicKey, "unknown key-publish-to-user recipient");
            }
            KeyPublishRecord::ToUser {
                resource_id: ward_core::ResourceId::new(p.resource_id),
                recipient_public_key: recipient_key,
                encrypted_key: p.encrypted_key,
            }
        }
        Payload::KeyPublishToUserGroup(p) => {
            let recipient_key = X25519PublicKey::new(p.recipient_public_key);
            let known = state
                .groups
                .values()
                .any(|g| g.public_encryption_key() == recipient_key);
            if !known {
                return invalid(InvalidBlockCode::Forbidden, "unknown key-publish-to-group recipient");
            }
            KeyPublishRecord::ToUserGroup {
                resource_id: ward_core::ResourceId::new(p.resource_id),
                recipient_public_key: recipient_key,
                encrypted_key: p.encrypted_key,
            }
        }
        Payload::KeyPublishToProvisionalUser(p) => KeyPublishRecord::ToProvisionalUser {
            resource_id: ward_core::ResourceId::new(p.resource_id),
            app_public_key: X25519PublicKey::new(p.app_public_encryption_key),
            tanker_public_key: X25519PublicKey::new(p.tanker_public_encryption_key),
            double_sealed_key: p.double_sealed_key,
        },
        _ => return invalid(InvalidBlockCode::InvalidNature, "nature/payload mismatch"),
    };
    state.record_key_publish(record);
    Ok(())
}

fn verify_user_group_creation(block: &Block, state: &mut ChainState) -> VResult<GroupId> {
    let (author_device_id, author_key) = device_author(block, state)?;
    require_author_not_revoked(&author_device_id, block.index, state)?;
    if block.verify_signature(&author_key).is_err() {
        return invalid(InvalidBlockCode::InvalidSignature, "group creation signature did not verify");
    }

    let payload = match block.decode_payload() {
        Ok(Payload::UserGroupCreation(p)) => p,
        Ok(_) => return invalid(InvalidBlockCode::InvalidNature, "nature/payload mismatch"),
        Err(err) => return Err(VerifyError::Invalid(err)),
    };

    let group_signature_key = Ed25519VerifyingKey::new(payload.public_signature_key);
    if group_signature_key
        .verify(&payload.canonical_bytes(), &Ed25519Signature::new(payload.self_signature))
        .is_err()
    {
        return invalid(InvalidBlockCode::InvalidSelfSignature, "group self-signature did not verify");
    }

    let group_id = GroupId::from_signature_public_key(&payload.public_signature_key);
    if let Some(existing) = state.group(&group_id) {
        if existing.public_encryption_key() != X25519PublicKey::new(payload.public_encryption_key) {
            return invalid(InvalidBlockCode::GroupAlreadyExists, "group id already bound to a different key");
        }
        return Ok(group_id);
    }

    let member_key_slots = payload
        .member_slots
        .iter()
        .map(|slot| GroupMemberSlot {
            recipient_public_key: X25519PublicKey::new(slot.recipient_public_key),
            encrypted_group_private_encryption_key: slot.encrypted_key.clone(),
        })
        .collect();

    state.insert_group(Group::External(ExternalGroup {
        group_id,
        public_signature_key: group_signature_key,
        public_encryption_key: X25519PublicKey::new(payload.public_encryption_key),
        encrypted_private_signature_key: payload.encrypted_group_private_signature_key.to_vec(),
        member_key_slots,
        pending_provisional_members: Vec::new(),
        last_group_block_hash: block.hash(),
        index: block.index,
    }));
    Ok(group_id)
}

fn verify_user_group_addition(block: &Block, state: &mut ChainState) -> VResult<GroupId> {
    let (author_device_id, author_key) = device_author(block, state)?;
    require_author_not_revoked(&author_device_id, block.index, state)?;
    if block.verify_signature(&author_key).is_err() {
        return invalid(InvalidBlockCode::InvalidSignature, "group addition signature did not verify");
    }

    let payload = match block.decode_payload() {
        Ok(Payload::UserGroupAddition(p)) => p,
        Ok(_) => return invalid(InvalidBlockCode::InvalidNature, "nature/payload mismatch"),
        Err(err) => return Err(VerifyError::Invalid(err)),
    };

    let group_id = GroupId::new(payload.group_id);
    let group = match state.group(&group_id) {
        Some(group) => group.clone(),
        None => return missing(Subject::Group(group_id)),
    };

    if payload.previous_group_block != *group.last_group_block_hash().as_bytes() {
        return invalid(InvalidBlockCode::InvalidPreviousGroupBlock, "previousGroupBlock does not match group head");
    }
    if group
        .public_signature_key()
        .verify(&payload.canonical_bytes(), &Ed25519Signature::new(payload.self_signature))
        .is_err()
    {
        return invalid(InvalidBlockCode::InvalidSelfSignature, "group addition self-signature did not verify");
    }

    if let Group::External(_) = &group {
        let member_slots = payload
            .member_slots
            .iter()
            .map(|slot| GroupMemberSlot {
                recipient_public_key: X25519PublicKey::new(slot.recipient_public_key),
                encrypted_group_private_encryption_key: slot.encrypted_key.clone(),
            })
            .collect();
        let pending = payload
            .pending_provisional_slots
            .iter()
            .map(|slot| PendingProvisionalMember {
                app_public_encryption_key: X25519PublicKey::new(slot.app_public_encryption_key),
                tanker_public_encryption_key: X25519PublicKey::new(slot.tanker_public_encryption_key),
                encrypted_group_private_encryption_key: slot.encrypted_group_private_encryption_key.to_vec(),
            })
            .collect();
        state
            .merge_external_group_slots(&group_id, member_slots, pending)
            .map_err(VerifyError::Invalid)?;
    }
    state
        .advance_group_head(&group_id, block.hash(), block.index)
        .map_err(VerifyError::Invalid)?;
    Ok(group_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ward_block::TrustchainCreationPayload;
    use ward_core::crypto::{Ed25519SigningKey, X25519PrivateKey};
    use ward_core::TrustchainId;

    struct Trustchain {
        id: TrustchainId,
        signing_key: Ed25519SigningKey,
    }

    fn genesis() -> (Trustchain, Block) {
        let signing_key = Ed25519SigningKey::generate();
        let payload = Payload::TrustchainCreation(TrustchainCreationPayload {
            public_signature_key: *signing_key.verifying_key().as_bytes(),
        })
        .encode();
        let unsigned_hash = ward_core::crypto::hash::hash_concat(&[
            &[Nature::TrustchainCreation.as_u8()],
            &ward_core::TrustchainId::zero().into_bytes()[..],
            &payload[..],
        ]);
        let trustchain_id = TrustchainId::new(*unsigned_hash.as_bytes());
        let block = Block {
            index: 0,
            trustchain_id,
            nature: Nature::TrustchainCreation,
            payload,
            author: Author::Trustchain(TrustchainId::zero()),
            signature: Ed25519Signature::new([0u8; 64]),
        };
        (
            Trustchain {
                id: trustchain_id,
                signing_key,
            },
            block,
        )
    }

    fn first_device(
        chain: &Trustchain,
        user_id: [u8; 32],
    ) -> (Block, Ed25519SigningKey, X25519PrivateKey) {
        let ephemeral = Ed25519SigningKey::generate();
        let device_sig = Ed25519SigningKey::generate();
        let device_enc = X25519PrivateKey::generate();

        let mut delegation_message = Vec::new();
        delegation_message.extend_from_slice(ephemeral.verifying_key().as_bytes());
        delegation_message.extend_from_slice(&user_id);
        let delegation_signature = chain.signing_key.sign(&delegation_message);

        let core = DeviceCreationCore {
            ephemeral_public_key: *ephemeral.verifying_key().as_bytes(),
            user_id,
            delegation_signature: *delegation_signature.as_bytes(),
            public_signature_key: *device_sig.verifying_key().as_bytes(),
            public_encryption_key: *device_enc.public_key().as_bytes(),
        };
        let payload = Payload::DeviceCreation(DeviceCreationPayload::V1(core)).encode();
        let block = Block::sign(
            1,
            chain.id,
            Nature::DeviceCreationV1,
            payload,
            Author::Device(DeviceId::new(chain.id.into_bytes())),
            &ephemeral,
        );
        (block, device_sig, device_enc)
    }

    #[test]
    fn genesis_then_first_device_verifies() {
        let (chain, genesis_block) = genesis();
        let mut verifier = Verifier::new(16);
        assert!(matches!(verifier.ingest(genesis_block), IngestOutcome::Verified));

        let (device_block, ..) = first_device(&chain, [7u8; 32]);
        let outcome = verifier.ingest(device_block);
        assert!(matches!(outcome, IngestOutcome::Verified), "{outcome:?}");
        assert_eq!(verifier.state.users.len(), 1);
        assert_eq!(verifier.state.devices.len(), 1);
    }

    #[test]
    fn device_creation_before_genesis_is_queued_then_promoted() {
        let (chain, genesis_block) = genesis();
        let mut verifier = Verifier::new(16);
        let (device_block, ..) = first_device(&chain, [7u8; 32]);

        let outcome = verifier.ingest(device_block);
        assert!(matches!(outcome, IngestOutcome::Queued(Subject::Genesis)), "{outcome:?}");
        assert_eq!(verifier.state.users.len(), 0);

        let outcome = verifier.ingest(genesis_block);
        assert!(matches!(outcome, IngestOutcome::Verified), "{outcome:?}");
        assert_eq!(verifier.state.users.len(), 1);
        assert_eq!(verifier.state.devices.len(), 1);
    }

    #[test]
    fn tampered_self_signature_is_rejected() {
        let (chain, genesis_block) = genesis();
        let mut verifier = Verifier::new(16);
        verifier.ingest(genesis_block);
        let (device_block, device_sig, _device_enc) = first_device(&chain, [1u8; 32]);
        verifier.ingest(device_block.clone());

        let group_sig = Ed25519SigningKey::generate();
        let group_enc = X25519PrivateKey::generate();
        let canonical = ward_block::UserGroupCreationPayload {
            public_signature_key: *group_sig.verifying_key().as_bytes(),
            public_encryption_key: *group_enc.public_key().as_bytes(),
            encrypted_group_private_signature_key: [0u8; 96],
            member_slots: Vec::new(),
            self_signature: [0u8; 64],
        };
        let good_sig = group_sig.sign(&canonical.canonical_bytes());
        let mut payload = canonical;
        payload.self_signature = *good_sig.as_bytes();
        payload.self_signature[0] ^= 0xFF;

        let device_id = DeviceId::from_block_hash(&device_block.hash());
        let block = Block::sign(
            2,
            chain.id,
            Nature::UserGroupCreation,
            Payload::UserGroupCreation(payload).encode(),
            Author::Device(device_id),
            &device_sig,
        );
        let outcome = verifier.ingest(block);
        assert!(matches!(
            outcome,
            IngestOutcome::Dropped(WardError::InvalidBlock {
                code: InvalidBlockCode::InvalidSelfSignature,
                ..
            })
        ));
        assert!(verifier.state.groups.is_empty());
    }
}
