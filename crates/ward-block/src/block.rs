//! The block envelope: outer framing plus the author/signature fields
//! shared by every nature (spec.md §3 "Block", §4.1 "Block codec").

use serde::{Deserialize, Serialize};

use ward_core::crypto::{Ed25519Signature, Ed25519SigningKey, Ed25519VerifyingKey};
use ward_core::encoding::{read_varint, take_fixed, write_varint};
use ward_core::{crypto::hash::hash_concat, Author, BlockHash, TrustchainId, WardError};

use crate::nature::Nature;
use crate::payload::Payload;

/// Current envelope version. Parsers reject any other value with
/// [`WardError::UpgradeRequired`] (spec.md §4.1).
pub const BLOCK_VERSION_CURRENT: u8 = 1;

/// One signed, versioned event on the trust chain (spec.md §3 "Block").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Monotonic index assigned by the server; used for ordering and
    /// revocation-window checks.
    pub index: u64,
    pub trustchain_id: TrustchainId,
    pub nature: Nature,
    /// Opaque nature-specific payload bytes, already encoded.
    pub payload: Vec<u8>,
    /// Either the trustchain id (root-authored blocks) or the hash of
    /// the authoring device-creation block.
    pub author: Author,
    pub signature: Ed25519Signature,
}

impl Block {
    /// Compute this block's content hash: `H(nature ‖ author ‖ payload)`
    /// (spec.md §3 invariant 1).
    pub fn hash(&self) -> BlockHash {
        let nature_byte = [self.nature.as_u8()];
        let author_bytes = self.author.as_bytes();
        hash_concat(&[&nature_byte[..], &author_bytes[..], &self.payload[..]])
    }

    /// Build and sign a new block. The caller supplies the already-encoded
    /// payload (see [`Payload::encode`]).
    pub fn sign(
        index: u64,
        trustchain_id: TrustchainId,
        nature: Nature,
        payload: Vec<u8>,
        author: Author,
        signing_key: &Ed25519SigningKey,
    ) -> Self {
        let unsigned = Block {
            index,
            trustchain_id,
            nature,
            payload,
            author,
            signature: Ed25519Signature::new([0u8; 64]),
        };
        let hash = unsigned.hash();
        let signature = signing_key.sign(hash.as_bytes());
        Block {
            signature,
            ..unsigned
        }
    }

    /// Verify this block's signature under `verifying_key`. This checks
    /// only the cryptographic signature over the block hash — nature-
    /// specific semantic rules live in the verifier crate (spec.md §4.2).
    pub fn verify_signature(&self, verifying_key: &Ed25519VerifyingKey) -> Result<(), WardError> {
        let hash = self.hash();
        verifying_key.verify(hash.as_bytes(), &self.signature)
    }

    /// Decode this block's payload into a typed [`Payload`].
    pub fn decode_payload(&self) -> Result<Payload, WardError> {
        Payload::decode(self.nature, &self.payload)
    }

    /// Serialize the full envelope: version, index, trustchain id,
    /// nature, length-prefixed payload, author, signature (spec.md §4.1).
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(BLOCK_VERSION_CURRENT);
        write_varint(self.index, &mut out);
        out.extend_from_slice(self.trustchain_id.as_bytes());
        write_varint(u64::from(self.nature.as_u8()), &mut out);
        write_varint(self.payload.len() as u64, &mut out);
        out.extend_from_slice(&self.payload);
        out.extend_from_slice(&self.author.as_bytes());
        out.extend_from_slice(self.signature.as_bytes());
        out
    }

    /// Parse a full envelope produced by [`Block::encode`].
    ///
    /// The `author` field is ambiguous on the wire (trustchain id vs.
    /// device-creation-block hash are both 32 bytes): callers resolve
    /// it against verified state. This parses it as `Author::Trustchain`
    /// when `nature == Nature::TrustchainCreation` and as
    /// `Author::Device` otherwise, by the same nature check inline
    /// below.
    pub fn decode(bytes: &[u8]) -> Result<Self, WardError> {
        let (version, rest) = take_fixed(bytes, 1)?;
        if version[0] != BLOCK_VERSION_CURRENT {
            return Err(WardError::upgrade_required(format!(
                "unsupported block envelope version {}",
                version[0]
            )));
        }
        let (index, rest) = read_varint(rest)?;
        let (trustchain_bytes, rest) = take_fixed(rest, 32)?;
        let (nature_raw, rest) = read_varint(rest)?;
        let nature = Nature::from_u8(
            u8::try_from(nature_raw).map_err(|_| WardError::invalid_format("nature out of range"))?,
        )?;
        let (payload_len, rest) = read_varint(rest)?;
        let payload_len =
            usize::try_from(payload_len).map_err(|_| WardError::invalid_format("payload length overflow"))?;
        let (payload, rest) = take_fixed(rest, payload_len)?;
        let (author_bytes, rest) = take_fixed(rest, 32)?;
        let (signature_bytes, rest) = take_fixed(rest, 64)?;
        if !rest.is_empty() {
            return Err(WardError::invalid_format("trailing bytes after block envelope"));
        }

        let author = if nature == Nature::TrustchainCreation {
            Author::Trustchain(TrustchainId::try_from_slice(author_bytes)?)
        } else {
            Author::Device(ward_core::DeviceId::try_from_slice(author_bytes)?)
        };

        Ok(Block {
            index,
            trustchain_id: TrustchainId::try_from_slice(trustchain_bytes)?,
            nature,
            payload: payload.to_vec(),
            author,
            signature: Ed25519Signature::try_from_slice(signature_bytes)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{Payload, TrustchainCreationPayload};

    #[test]
    fn encode_decode_round_trips() {
        let signing_key = Ed25519SigningKey::generate();
        let trustchain_id = TrustchainId::new([7u8; 32]);
        let payload = Payload::TrustchainCreation(TrustchainCreationPayload {
            public_signature_key: *signing_key.verifying_key().as_bytes(),
        })
        .encode();

        let block = Block::sign(
            0,
            trustchain_id,
            Nature::TrustchainCreation,
            payload,
            Author::Trustchain(trustchain_id),
            &signing_key,
        );

        let encoded = block.encode();
        let decoded = Block::decode(&encoded).expect("decode");
        assert_eq!(decoded, block);
    }

    #[test]
    fn signature_verifies_under_correct_key() {
        let signing_key = Ed25519SigningKey::generate();
        let trustchain_id = TrustchainId::new([1u8; 32]);
        let block = Block::sign(
            0,
            trustchain_id,
            Nature::TrustchainCreation,
            vec![0u8; 32],
            Author::Trustchain(trustchain_id),
            &signing_key,
        );
        assert!(block.verify_signature(&signing_key.verifying_key()).is_ok());
    }

    #[test]
    fn signature_rejects_under_wrong_key() {
        let signing_key = Ed25519SigningKey::generate();
        let other_key = Ed25519SigningKey::generate();
        let trustchain_id = TrustchainId::new([1u8; 32]);
        let block = Block::sign(
            0,
            trustchain_id,
            Nature::TrustchainCreation,
            vec![0u8; 32],
            Author::Trustchain(trustchain_id),
            &signing_key,
        );
        assert!(block
            .verify_signature(&other_key.verifying_key())
            .is_err());
    }

    #[test]
    fn unknown_version_is_upgrade_required() {
        let mut bytes = vec![99u8];
        bytes.extend_from_slice(&[0u8; 40]);
        assert!(matches!(
            Block::decode(&bytes),
            Err(WardError::UpgradeRequired { .. })
        ));
    }

    #[test]
    fn truncated_envelope_is_invalid_format() {
        let bytes = vec![BLOCK_VERSION_CURRENT, 0];
        assert!(Block::decode(&bytes).is_err());
    }
}
