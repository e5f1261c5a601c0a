//! Builds the key-publish blocks a share operation must emit (spec.md
//! §4.4). One call seals `resourceKey` to every recipient and returns
//! one block per recipient, all authored by the local device.
//!
//! Deliberately has no `Recipient::Device` variant (SPEC_FULL.md §6
//! decision 1): this planner only ever targets users, user groups, and
//! provisional identities. A caller wanting to share directly with one
//! of its own other devices does so through the existing user-key
//! channel instead of minting a new `KeyPublishToDevice` block.

use ward_core::crypto::sealed::seal;
use ward_core::crypto::{AeadKey, Ed25519SigningKey, X25519PublicKey};
use ward_core::{Author, DeviceId, ResourceId, TrustchainId, WardError};
use ward_block::{
    Block, KeyPublishToProvisionalUserPayload, KeyPublishToRecipientPayload, Nature, Payload,
};

/// A recipient of a freshly-minted resource key.
#[derive(Debug, Clone)]
pub enum Recipient {
    /// A user, addressed by their current public encryption key.
    User { public_key: X25519PublicKey },
    /// An internal group, addressed by its public encryption key.
    Group { public_key: X25519PublicKey },
    /// A provisional identity, addressed by its two public halves
    /// (spec.md GLOSSARY "Provisional identity").
    Provisional {
        app_public_key: X25519PublicKey,
        tanker_public_key: X25519PublicKey,
    },
}

/// Build one signed key-publish block per recipient. `index` on every
/// returned block is a placeholder; the server assigns the real index
/// on push, and neither the hash nor the signature covers it (spec.md
/// §3 invariant 1).
pub fn plan_key_publish(
    resource_id: ResourceId,
    resource_key: &AeadKey,
    recipients: &[Recipient],
    trustchain_id: TrustchainId,
    author_device_id: DeviceId,
    author_signing_key: &Ed25519SigningKey,
) -> Result<Vec<Block>, WardError> {
    let author = Author::Device(author_device_id);
    let mut blocks = Vec::with_capacity(recipients.len());

    for recipient in recipients {
        let (nature, payload) = match recipient {
            Recipient::User { public_key } => (
                Nature::KeyPublishToUser,
                Payload::KeyPublishToUser(recipient_payload(resource_id, public_key, resource_key)?),
            ),
            Recipient::Group { public_key } => (
                Nature::KeyPublishToUserGroup,
                Payload::KeyPublishToUserGroup(recipient_payload(resource_id, public_key, resource_key)?),
            ),
            Recipient::Provisional {
                app_public_key,
                tanker_public_key,
            } => {
                let inner = seal(app_public_key, resource_key.as_bytes())?;
                let double_sealed_key = seal(tanker_public_key, &inner)?;
                (
                    Nature::KeyPublishToProvisionalUser,
                    Payload::KeyPublishToProvisionalUser(KeyPublishToProvisionalUserPayload {
                        app_public_encryption_key: *app_public_key.as_bytes(),
                        tanker_public_encryption_key: *tanker_public_key.as_bytes(),
                        resource_id: *resource_id.as_bytes(),
                        double_sealed_key,
                    }),
                )
            }
        };

        blocks.push(Block::sign(
            0,
            trustchain_id,
            nature,
            payload.encode(),
            author,
            author_signing_key,
        ));
    }

    Ok(blocks)
}

fn recipient_payload(
    resource_id: ResourceId,
    public_key: &X25519PublicKey,
    resource_key: &AeadKey,
) -> Result<KeyPublishToRecipientPayload, WardError> {
    let sealed = seal(public_key, resource_key.as_bytes())?;
    let encrypted_key: [u8; 80] = sealed
        .try_into()
        .map_err(|_| WardError::internal("sealed resource key must be 80 bytes"))?;
    Ok(KeyPublishToRecipientPayload {
        recipient_public_key: *public_key.as_bytes(),
        resource_id: *resource_id.as_bytes(),
        encrypted_key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ward_core::crypto::sealed::{unseal, X25519PrivateKey};

    #[test]
    fn plans_one_block_per_recipient() {
        let trustchain_id = TrustchainId::new([1u8; 32]);
        let author_device_id = DeviceId::new([2u8; 32]);
        let signing_key = Ed25519SigningKey::generate();
        let resource_id = ResourceId::new([3u8; 16]);
        let resource_key = AeadKey::generate();

        let user_private = X25519PrivateKey::generate();
        let group_private = X25519PrivateKey::generate();
        let app_private = X25519PrivateKey::generate();
        let tanker_private = X25519PrivateKey::generate();

        let recipients = vec![
            Recipient::User {
                public_key: user_private.public_key(),
            },
            Recipient::Group {
                public_key: group_private.public_key(),
            },
            Recipient::Provisional {
                app_public_key: app_private.public_key(),
                tanker_public_key: tanker_private.public_key(),
            },
        ];

        let blocks = plan_key_publish(
            resource_id,
            &resource_key,
            &recipients,
            trustchain_id,
            author_device_id,
            &signing_key,
        )
        .expect("plan");

        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].nature, Nature::KeyPublishToUser);
        assert_eq!(blocks[1].nature, Nature::KeyPublishToUserGroup);
        assert_eq!(blocks[2].nature, Nature::KeyPublishToProvisionalUser);
        for block in &blocks {
            assert_eq!(block.author, Author::Device(author_device_id));
            assert!(block.verify_signature(&signing_key.verifying_key()).is_ok());
        }

        let Payload::KeyPublishToUser(user_payload) = blocks[0].decode_payload().expect("decode") else {
            panic!("expected KeyPublishToUser payload");
        };
        let opened = unseal(&user_private, &user_payload.encrypted_key).expect("unseal");
        assert_eq!(opened, resource_key.as_bytes());

        let Payload::KeyPublishToProvisionalUser(provisional_payload) =
            blocks[2].decode_payload().expect("decode")
        else {
            panic!("expected KeyPublishToProvisionalUser payload");
        };
        let inner = unseal(&tanker_private, &provisional_payload.double_sealed_key).expect("outer unseal");
        let opened = unseal(&app_private, &inner).expect("inner unseal");
        assert_eq!(opened, resource_key.as_bytes());
    }
}
