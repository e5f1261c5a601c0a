//! Per-nature payload layouts (spec.md §6 "Block wire format").
//!
//! Every struct here owns exactly the fields its nature carries on the
//! wire, in field order, and implements `encode`/`decode` against that
//! exact layout. [`Payload::decode`] dispatches on [`Nature`] and
//! returns the matching variant (spec.md §9 "model as a tagged variant").

use serde::{Deserialize, Serialize};

use ward_core::encoding::{read_varint, take_fixed, take_length_prefixed, write_varint};
use ward_core::WardError;

use crate::nature::Nature;

/// A recipient keyed by public key, with a resource-key entry sealed
/// to it (spec.md §3 "KeyPublish entry").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedSlot {
    pub recipient_public_key: [u8; 32],
    #[serde(with = "serde_bytes")]
    pub encrypted_key: Vec<u8>,
}

impl SealedSlot {
    fn encode_fixed(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.recipient_public_key);
        out.extend_from_slice(&self.encrypted_key);
    }

    fn decode_fixed(input: &[u8], sealed_len: usize) -> Result<(Self, &[u8]), WardError> {
        let (recipient, rest) = take_fixed(input, 32)?;
        let (sealed, rest) = take_fixed(rest, sealed_len)?;
        Ok((
            Self {
                recipient_public_key: recipient.try_into().expect("take_fixed(32) yields 32 bytes"),
                encrypted_key: sealed.to_vec(),
            },
            rest,
        ))
    }
}

/// `TrustchainCreation` payload: `publicSignatureKey[32]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustchainCreationPayload {
    pub public_signature_key: [u8; 32],
}

/// Shared fields across every `DeviceCreation` version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCreationCore {
    pub ephemeral_public_key: [u8; 32],
    pub user_id: [u8; 32],
    pub delegation_signature: [u8; 64],
    pub public_signature_key: [u8; 32],
    pub public_encryption_key: [u8; 32],
}

/// `DeviceCreation` payload, tagged by version (spec.md §6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceCreationPayload {
    V1(DeviceCreationCore),
    /// `lastReset[32]` is historical and must be all-zero (spec.md §4.2 (a)).
    V2 {
        last_reset: [u8; 32],
        core: DeviceCreationCore,
    },
    V3 {
        core: DeviceCreationCore,
        user_public_encryption_key: [u8; 32],
        encrypted_user_private_encryption_key: Vec<u8>,
        is_ghost_device: bool,
        is_server_device: bool,
    },
}

/// `DeviceRevocation` payload, tagged by version (spec.md §6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceRevocationPayload {
    V1 { device_id: [u8; 32] },
    V2 {
        device_id: [u8; 32],
        new_user_public_encryption_key: [u8; 32],
        previous_user_public_encryption_key: [u8; 32],
        encrypted_previous_user_private_key: Vec<u8>,
        recipients: Vec<SealedSlot>,
    },
}

/// `KeyPublishToDevice` payload: variable-length encrypted key (the
/// only key-publish nature without a fixed 80-byte sealed slot, since
/// device keys predate the user-key sealing convention).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPublishToDevicePayload {
    pub recipient_device_id: [u8; 32],
    pub resource_id: [u8; 16],
    #[serde(with = "serde_bytes")]
    pub encrypted_key: Vec<u8>,
}

/// `KeyPublishToUser` / `KeyPublishToUserGroup` payload (identical
/// shape; the recipient's meaning differs per nature).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPublishToRecipientPayload {
    pub recipient_public_key: [u8; 32],
    pub resource_id: [u8; 16],
    pub encrypted_key: [u8; 80],
}

/// `KeyPublishToProvisionalUser` payload: double-sealed (tanker-side
/// key outer, app-side key inner, spec.md §4.4).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPublishToProvisionalUserPayload {
    pub app_public_encryption_key: [u8; 32],
    pub tanker_public_encryption_key: [u8; 32],
    pub resource_id: [u8; 16],
    #[serde(with = "serde_bytes")]
    pub double_sealed_key: Vec<u8>,
}

/// Pending provisional-member slot carried by group-creation/addition
/// blocks (SPEC_FULL.md §6 decision 3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingProvisionalSlot {
    pub app_public_encryption_key: [u8; 32],
    pub tanker_public_encryption_key: [u8; 32],
    pub encrypted_group_private_encryption_key: [u8; 80],
}

/// `UserGroupCreation` payload (spec.md §6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGroupCreationPayload {
    pub public_signature_key: [u8; 32],
    pub public_encryption_key: [u8; 32],
    pub encrypted_group_private_signature_key: [u8; 96],
    pub member_slots: Vec<SealedSlot>,
    pub self_signature: [u8; 64],
}

impl UserGroupCreationPayload {
    /// Canonical bytes the self-signature is computed over: every
    /// field except the signature itself (spec.md §4.2 "a
    /// self-signature over a canonical byte concatenation of the group
    /// payload under the group's signature public key").
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.public_signature_key);
        out.extend_from_slice(&self.public_encryption_key);
        out.extend_from_slice(&self.encrypted_group_private_signature_key);
        write_varint(self.member_slots.len() as u64, &mut out);
        for slot in &self.member_slots {
            slot.encode_fixed(&mut out);
        }
        out
    }
}

/// `UserGroupAddition` payload (spec.md §6, with the optional trailing
/// pending-provisional list per SPEC_FULL.md §6 decision 3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGroupAdditionPayload {
    pub group_id: [u8; 32],
    pub previous_group_block: [u8; 32],
    pub member_slots: Vec<SealedSlot>,
    pub self_signature: [u8; 64],
    pub pending_provisional_slots: Vec<PendingProvisionalSlot>,
}

impl UserGroupAdditionPayload {
    /// Canonical bytes the self-signature (under the group's *current*
    /// signature key) is computed over (spec.md §4.2). Pending
    /// provisional slots are announced alongside the addition but are
    /// not part of the signed membership change.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.group_id);
        out.extend_from_slice(&self.previous_group_block);
        write_varint(self.member_slots.len() as u64, &mut out);
        for slot in &self.member_slots {
            slot.encode_fixed(&mut out);
        }
        out
    }
}

/// A fully decoded block payload, tagged by [`Nature`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    TrustchainCreation(TrustchainCreationPayload),
    DeviceCreation(DeviceCreationPayload),
    DeviceRevocation(DeviceRevocationPayload),
    KeyPublishToDevice(KeyPublishToDevicePayload),
    KeyPublishToUser(KeyPublishToRecipientPayload),
    KeyPublishToUserGroup(KeyPublishToRecipientPayload),
    KeyPublishToProvisionalUser(KeyPublishToProvisionalUserPayload),
    UserGroupCreation(UserGroupCreationPayload),
    UserGroupAddition(UserGroupAdditionPayload),
}

impl Payload {
    /// The nature this payload was built for.
    pub fn nature(&self) -> Nature {
        match self {
            Payload::TrustchainCreation(_) => Nature::TrustchainCreation,
            Payload::DeviceCreation(p) => match p {
                DeviceCreationPayload::V1(_) => Nature::DeviceCreationV1,
                DeviceCreationPayload::V2 { .. } => Nature::DeviceCreationV2,
                DeviceCreationPayload::V3 { .. } => Nature::DeviceCreationV3,
            },
            Payload::DeviceRevocation(p) => match p {
                DeviceRevocationPayload::V1 { .. } => Nature::DeviceRevocationV1,
                DeviceRevocationPayload::V2 { .. } => Nature::DeviceRevocationV2,
            },
            Payload::KeyPublishToDevice(_) => Nature::KeyPublishToDevice,
            Payload::KeyPublishToUser(_) => Nature::KeyPublishToUser,
            Payload::KeyPublishToUserGroup(_) => Nature::KeyPublishToUserGroup,
            Payload::KeyPublishToProvisionalUser(_) => Nature::KeyPublishToProvisionalUser,
            Payload::UserGroupCreation(_) => Nature::UserGroupCreation,
            Payload::UserGroupAddition(_) => Nature::UserGroupAddition,
        }
    }

    /// Encode this payload's fields (without the outer envelope).
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Payload::TrustchainCreation(p) => {
                out.extend_from_slice(&p.public_signature_key);
            }
            Payload::DeviceCreation(p) => encode_device_creation(p, &mut out),
            Payload::DeviceRevocation(p) => encode_device_revocation(p, &mut out),
            Payload::KeyPublishToDevice(p) => {
                out.extend_from_slice(&p.recipient_device_id);
                out.extend_from_slice(&p.resource_id);
                write_varint(p.encrypted_key.len() as u64, &mut out);
                out.extend_from_slice(&p.encrypted_key);
            }
            Payload::KeyPublishToUser(p) | Payload::KeyPublishToUserGroup(p) => {
                out.extend_from_slice(&p.recipient_public_key);
                out.extend_from_slice(&p.resource_id);
                out.extend_from_slice(&p.encrypted_key);
            }
            Payload::KeyPublishToProvisionalUser(p) => {
                out.extend_from_slice(&p.app_public_encryption_key);
                out.extend_from_slice(&p.tanker_public_encryption_key);
                out.extend_from_slice(&p.resource_id);
                write_varint(p.double_sealed_key.len() as u64, &mut out);
                out.extend_from_slice(&p.double_sealed_key);
            }
            Payload::UserGroupCreation(p) => {
                out.extend_from_slice(&p.public_signature_key);
                out.extend_from_slice(&p.public_encryption_key);
                out.extend_from_slice(&p.encrypted_group_private_signature_key);
                write_varint(p.member_slots.len() as u64, &mut out);
                for slot in &p.member_slots {
                    slot.encode_fixed(&mut out);
                }
                out.extend_from_slice(&p.self_signature);
            }
            Payload::UserGroupAddition(p) => {
                out.extend_from_slice(&p.group_id);
                out.extend_from_slice(&p.previous_group_block);
                write_varint(p.member_slots.len() as u64, &mut out);
                for slot in &p.member_slots {
                    slot.encode_fixed(&mut out);
                }
                out.extend_from_slice(&p.self_signature);
                write_varint(p.pending_provisional_slots.len() as u64, &mut out);
                for slot in &p.pending_provisional_slots {
                    out.extend_from_slice(&slot.app_public_encryption_key);
                    out.extend_from_slice(&slot.tanker_public_encryption_key);
                    out.extend_from_slice(&slot.encrypted_group_private_encryption_key);
                }
            }
        }
        out
    }

    /// Decode the payload bytes of a block whose nature is already known.
    pub fn decode(nature: Nature, bytes: &[u8]) -> Result<Self, WardError> {
        match nature {
            Nature::TrustchainCreation => {
                let (key, rest) = take_fixed(bytes, 32)?;
                require_exhausted(rest)?;
                Ok(Payload::TrustchainCreation(TrustchainCreationPayload {
                    public_signature_key: key.try_into().expect("32 bytes"),
                }))
            }
            Nature::DeviceCreationV1 => {
                let (core, rest) = decode_device_creation_core(bytes)?;
                require_exhausted(rest)?;
                Ok(Payload::DeviceCreation(DeviceCreationPayload::V1(core)))
            }
            Nature::DeviceCreationV2 => {
                let (last_reset, rest) = take_fixed(bytes, 32)?;
                let (core, rest) = decode_device_creation_core(rest)?;
                require_exhausted(rest)?;
                Ok(Payload::DeviceCreation(DeviceCreationPayload::V2 {
                    last_reset: last_reset.try_into().expect("32 bytes"),
                    core,
                }))
            }
            Nature::DeviceCreationV3 => {
                let (core, rest) = decode_device_creation_core(bytes)?;
                let (user_pub_enc, rest) = take_fixed(rest, 32)?;
                let (enc_user_priv, rest) = take_fixed(rest, 80)?;
                let (flags, rest) = take_fixed(rest, 1)?;
                require_exhausted(rest)?;
                Ok(Payload::DeviceCreation(DeviceCreationPayload::V3 {
                    core,
                    user_public_encryption_key: user_pub_enc.try_into().expect("32 bytes"),
                    encrypted_user_private_encryption_key: enc_user_priv.to_vec(),
                    is_ghost_device: flags[0] & 0b01 != 0,
                    is_server_device: flags[0] & 0b10 != 0,
                }))
            }
            Nature::DeviceRevocationV1 => {
                let (device_id, rest) = take_fixed(bytes, 32)?;
                require_exhausted(rest)?;
                Ok(Payload::DeviceRevocation(DeviceRevocationPayload::V1 {
                    device_id: device_id.try_into().expect("32 bytes"),
                }))
            }
            Nature::DeviceRevocationV2 => {
                let (device_id, rest) = take_fixed(bytes, 32)?;
                let (new_key, rest) = take_fixed(rest, 32)?;
                let (prev_key, rest) = take_fixed(rest, 32)?;
                let (enc_prev_priv, rest) = take_fixed(rest, 80)?;
                let (count, rest) = read_varint(rest)?;
                let mut recipients = Vec::with_capacity(count as usize);
                let mut cursor = rest;
                for _ in 0..count {
                    let (slot, remainder) = SealedSlot::decode_fixed(cursor, 80)?;
                    recipients.push(slot);
                    cursor = remainder;
                }
                require_exhausted(cursor)?;
                Ok(Payload::DeviceRevocation(DeviceRevocationPayload::V2 {
                    device_id: device_id.try_into().expect("32 bytes"),
                    new_user_public_encryption_key: new_key.try_into().expect("32 bytes"),
                    previous_user_public_encryption_key: prev_key.try_into().expect("32 bytes"),
                    encrypted_previous_user_private_key: enc_prev_priv.to_vec(),
                    recipients,
                }))
            }
            Nature::KeyPublishToDevice => {
                let (recipient, rest) = take_fixed(bytes, 32)?;
                let (resource_id, rest) = take_fixed(rest, 16)?;
                let (key, rest) = take_length_prefixed(rest)?;
                require_exhausted(rest)?;
                Ok(Payload::KeyPublishToDevice(KeyPublishToDevicePayload {
                    recipient_device_id: recipient.try_into().expect("32 bytes"),
                    resource_id: resource_id.try_into().expect("16 bytes"),
                    encrypted_key: key.to_vec(),
                }))
            }
            Nature::KeyPublishToUser | Nature::KeyPublishToUserGroup => {
                let (recipient, rest) = take_fixed(bytes, 32)?;
                let (resource_id, rest) = take_fixed(rest, 16)?;
                let (key, rest) = take_fixed(rest, 80)?;
                require_exhausted(rest)?;
                let payload = KeyPublishToRecipientPayload {
                    recipient_public_key: recipient.try_into().expect("32 bytes"),
                    resource_id: resource_id.try_into().expect("16 bytes"),
                    encrypted_key: key.try_into().expect("80 bytes"),
                };
                Ok(if nature == Nature::KeyPublishToUser {
                    Payload::KeyPublishToUser(payload)
                } else {
                    Payload::KeyPublishToUserGroup(payload)
                })
            }
            Nature::KeyPublishToProvisionalUser => {
                let (app_key, rest) = take_fixed(bytes, 32)?;
                let (tanker_key, rest) = take_fixed(rest, 32)?;
                let (resource_id, rest) = take_fixed(rest, 16)?;
                let (key, rest) = take_length_prefixed(rest)?;
                require_exhausted(rest)?;
                Ok(Payload::KeyPublishToProvisionalUser(
                    KeyPublishToProvisionalUserPayload {
                        app_public_encryption_key: app_key.try_into().expect("32 bytes"),
                        tanker_public_encryption_key: tanker_key.try_into().expect("32 bytes"),
                        resource_id: resource_id.try_into().expect("16 bytes"),
                        double_sealed_key: key.to_vec(),
                    },
                ))
            }
            Nature::UserGroupCreation => {
                let (pub_sig, rest) = take_fixed(bytes, 32)?;
                let (pub_enc, rest) = take_fixed(rest, 32)?;
                let (enc_group_priv_sig, rest) = take_fixed(rest, 96)?;
                let (count, rest) = read_varint(rest)?;
                let mut slots = Vec::with_capacity(count as usize);
                let mut cursor = rest;
                for _ in 0..count {
                    let (slot, remainder) = SealedSlot::decode_fixed(cursor, 80)?;
                    slots.push(slot);
                    cursor = remainder;
                }
                let (self_sig, rest) = take_fixed(cursor, 64)?;
                require_exhausted(rest)?;
                Ok(Payload::UserGroupCreation(UserGroupCreationPayload {
                    public_signature_key: pub_sig.try_into().expect("32 bytes"),
                    public_encryption_key: pub_enc.try_into().expect("32 bytes"),
                    encrypted_group_private_signature_key: enc_group_priv_sig
                        .try_into()
                        .expect("96 bytes"),
                    member_slots: slots,
                    self_signature: self_sig.try_into().expect("64 bytes"),
                }))
            }
            Nature::UserGroupAddition => {
                let (group_id, rest) = take_fixed(bytes, 32)?;
                let (prev_block, rest) = take_fixed(rest, 32)?;
                let (count, rest) = read_varint(rest)?;
                let mut slots = Vec::with_capacity(count as usize);
                let mut cursor = rest;
                for _ in 0..count {
                    let (slot, remainder) = SealedSlot::decode_fixed(cursor, 80)?;
                    slots.push(slot);
                    cursor = remainder;
                }
                let (self_sig, rest) = take_fixed(cursor, 64)?;
                // Optional trailing pending-provisional list (SPEC_FULL.md §6 decision 3).
                let pending = if rest.is_empty() {
                    Vec::new()
                } else {
                    let (pending_count, rest) = read_varint(rest)?;
                    let mut pending = Vec::with_capacity(pending_count as usize);
                    let mut cursor = rest;
                    for _ in 0..pending_count {
                        let (app_key, r) = take_fixed(cursor, 32)?;
                        let (tanker_key, r) = take_fixed(r, 32)?;
                        let (enc_key, r) = take_fixed(r, 80)?;
                        pending.push(PendingProvisionalSlot {
                            app_public_encryption_key: app_key.try_into().expect("32 bytes"),
                            tanker_public_encryption_key: tanker_key.try_into().expect("32 bytes"),
                            encrypted_group_private_encryption_key: enc_key
                                .try_into()
                                .expect("80 bytes"),
                        });
                        cursor = r;
                    }
                    require_exhausted(cursor)?;
                    pending
                };
                Ok(Payload::UserGroupAddition(UserGroupAdditionPayload {
                    group_id: group_id.try_into().expect("32 bytes"),
                    previous_group_block: prev_block.try_into().expect("32 bytes"),
                    member_slots: slots,
                    self_signature: self_sig.try_into().expect("64 bytes"),
                    pending_provisional_slots: pending,
                }))
            }
        }
    }
}

fn encode_device_creation(payload: &DeviceCreationPayload, out: &mut Vec<u8>) {
    match payload {
        DeviceCreationPayload::V1(core) => encode_device_creation_core(core, out),
        DeviceCreationPayload::V2 { last_reset, core } => {
            out.extend_from_slice(last_reset);
            encode_device_creation_core(core, out);
        }
        DeviceCreationPayload::V3 {
            core,
            user_public_encryption_key,
            encrypted_user_private_encryption_key,
            is_ghost_device,
            is_server_device,
        } => {
            encode_device_creation_core(core, out);
            out.extend_from_slice(user_public_encryption_key);
            out.extend_from_slice(encrypted_user_private_encryption_key);
            let mut flags = 0u8;
            if *is_ghost_device {
                flags |= 0b01;
            }
            if *is_server_device {
                flags |= 0b10;
            }
            out.push(flags);
        }
    }
}

fn encode_device_creation_core(core: &DeviceCreationCore, out: &mut Vec<u8>) {
    out.extend_from_slice(&core.ephemeral_public_key);
    out.extend_from_slice(&core.user_id);
    out.extend_from_slice(&core.delegation_signature);
    out.extend_from_slice(&core.public_signature_key);
    out.extend_from_slice(&core.public_encryption_key);
}

fn decode_device_creation_core(bytes: &[u8]) -> Result<(DeviceCreationCore, &[u8]), WardError> {
    let (ephemeral, rest) = take_fixed(bytes, 32)?;
    let (user_id, rest) = take_fixed(rest, 32)?;
    let (delegation_sig, rest) = take_fixed(rest, 64)?;
    let (pub_sig, rest) = take_fixed(rest, 32)?;
    let (pub_enc, rest) = take_fixed(rest, 32)?;
    Ok((
        DeviceCreationCore {
            ephemeral_public_key: ephemeral.try_into().expect("32 bytes"),
            user_id: user_id.try_into().expect("32 bytes"),
            delegation_signature: delegation_sig.try_into().expect("64 bytes"),
            public_signature_key: pub_sig.try_into().expect("32 bytes"),
            public_encryption_key: pub_enc.try_into().expect("32 bytes"),
        },
        rest,
    ))
}

fn encode_device_revocation(payload: &DeviceRevocationPayload, out: &mut Vec<u8>) {
    match payload {
        DeviceRevocationPayload::V1 { device_id } => out.extend_from_slice(device_id),
        DeviceRevocationPayload::V2 {
            device_id,
            new_user_public_encryption_key,
            previous_user_public_encryption_key,
            encrypted_previous_user_private_key,
            recipients,
        } => {
            out.extend_from_slice(device_id);
            out.extend_from_slice(new_user_public_encryption_key);
            out.extend_from_slice(previous_user_public_encryption_key);
            out.extend_from_slice(encrypted_previous_user_private_key);
            write_varint(recipients.len() as u64, out);
            for slot in recipients {
                slot.encode_fixed(out);
            }
        }
    }
}

fn require_exhausted(rest: &[u8]) -> Result<(), WardError> {
    if rest.is_empty() {
        Ok(())
    } else {
        Err(WardError::invalid_format(format!(
            "{} trailing bytes after payload",
            rest.len()
        )))
    }
}
