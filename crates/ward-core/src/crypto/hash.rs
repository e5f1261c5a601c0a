//! Generic content hashing (spec.md §2 Primitives "generic hash",
//! §3 invariant 1 "blockHash = H(nature ‖ author ‖ payload)").

use crate::identifiers::BlockHash;

/// Hash arbitrary bytes with the algorithm used throughout the trust
/// chain for content addressing (block hashes, the trustchain id,
/// device ids derived from their creation block).
pub fn hash(bytes: &[u8]) -> BlockHash {
    BlockHash::new(*blake3::hash(bytes).as_bytes())
}

/// Hash the concatenation of several byte slices without an
/// intermediate allocation, matching the block-hash definition
/// `H(nature ‖ author ‖ payload)`.
pub fn hash_concat(parts: &[&[u8]]) -> BlockHash {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    BlockHash::new(*hasher.finalize().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash(b"abc"), hash(b"abc"));
    }

    #[test]
    fn hash_concat_matches_manual_concatenation() {
        let manual = hash(b"ab" as &[u8]);
        let concat = hash_concat(&[b"a", b"b"]);
        assert_eq!(manual, concat);
    }

    #[test]
    fn different_input_different_hash() {
        assert_ne!(hash(b"abc"), hash(b"abd"));
    }
}
