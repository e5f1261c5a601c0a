//! CSPRNG helpers (spec.md §2 Primitives "random").

use rand_core::RngCore;

/// Fill `out` with cryptographically secure random bytes.
pub fn fill(out: &mut [u8]) {
    rand::rngs::OsRng.fill_bytes(out);
}

/// Generate a fresh array of random bytes of length `N`.
pub fn bytes<const N: usize>() -> [u8; N] {
    let mut out = [0u8; N];
    fill(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_calls_are_not_all_zero() {
        let a: [u8; 32] = bytes();
        assert_ne!(a, [0u8; 32]);
    }

    #[test]
    fn two_draws_differ() {
        let a: [u8; 32] = bytes();
        let b: [u8; 32] = bytes();
        assert_ne!(a, b);
    }
}
