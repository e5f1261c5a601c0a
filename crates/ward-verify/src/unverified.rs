//! The unverified-block queue (spec.md §4.2 "Re-entrancy & ordering":
//! "Out-of-order blocks are queued in an *unverified store* keyed by
//! the nature's subject (user-id, group-id)").
//!
//! A block is queued, rather than dropped, exactly when its failure to
//! verify is caused by a missing *dependency* rather than an actual
//! invariant violation: an author device that has not yet been
//! verified, a group that has not yet been created (for
//! `UserGroupAddition`), or the trustchain's own genesis block (for a
//! first device-creation that races ahead of it). Once that dependency
//! resolves, [`crate::Verifier`] promotes the queued block and retries
//! it — recursively, since the newly-promoted block may itself unblock
//! further entries.

use std::collections::{HashMap, VecDeque};

use ward_block::Block;
use ward_core::{DeviceId, GroupId};

/// What a queued block is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subject {
    /// Waiting on a user's device-creation chain (an author device id
    /// that has not yet verified).
    AuthorDevice(DeviceId),
    /// Waiting on a group's creation or prior addition.
    Group(GroupId),
    /// Waiting on the trustchain's own genesis (`TrustchainCreation`)
    /// block, for a first-device-creation that arrived before it.
    Genesis,
}

/// FIFO-per-subject queue of blocks that failed verification only
/// because a dependency was missing (spec.md §4.2, §5 "Verification
/// of incoming blocks is FIFO per subject").
#[derive(Debug, Default)]
pub struct UnverifiedQueue {
    by_subject: HashMap<Subject, VecDeque<Block>>,
    /// Soft cap per subject (SPEC_FULL.md §3 `SessionConfig`); beyond
    /// this the oldest entry is evicted to bound memory under a
    /// pathological or malicious sender.
    max_per_subject: usize,
}

impl UnverifiedQueue {
    pub fn new(max_per_subject: usize) -> Self {
        Self {
            by_subject: HashMap::new(),
            max_per_subject,
        }
    }

    /// Enqueue `block` under `subject`, evicting the oldest entry for
    /// that subject if the queue is at capacity.
    pub fn push(&mut self, subject: Subject, block: Block) {
        let queue = self.by_subject.entry(subject).or_default();
        if queue.len() >= self.max_per_subject {
            queue.pop_front();
        }
        queue.push_back(block);
    }

    /// Drain every block queued under `subject`, FIFO order, for the
    /// caller to retry now that the dependency has resolved.
    pub fn drain(&mut self, subject: Subject) -> VecDeque<Block> {
        self.by_subject.remove(&subject).unwrap_or_default()
    }

    /// Total number of queued blocks across every subject, for
    /// diagnostics and tests.
    pub fn len(&self) -> usize {
        self.by_subject.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ward_block::Nature;
    use ward_core::crypto::{Ed25519Signature, Ed25519SigningKey};
    use ward_core::{Author, TrustchainId};

    fn sample_block(index: u64) -> Block {
        let signing_key = Ed25519SigningKey::generate();
        Block::sign(
            index,
            TrustchainId::new([1u8; 32]),
            Nature::TrustchainCreation,
            vec![0u8; 32],
            Author::Trustchain(TrustchainId::new([1u8; 32])),
            &signing_key,
        )
    }

    #[test]
    fn drain_returns_blocks_fifo() {
        let mut queue = UnverifiedQueue::new(10);
        let subject = Subject::AuthorDevice(DeviceId::new([9u8; 32]));
        queue.push(subject, sample_block(1));
        queue.push(subject, sample_block(2));

        let drained = queue.drain(subject);
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].index, 1);
        assert_eq!(drained[1].index, 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut queue = UnverifiedQueue::new(2);
        let subject = Subject::Group(GroupId::new([1u8; 32]));
        queue.push(subject, sample_block(1));
        queue.push(subject, sample_block(2));
        queue.push(subject, sample_block(3));

        let drained = queue.drain(subject);
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].index, 2);
        assert_eq!(drained[1].index, 3);
    }

    #[test]
    fn distinct_subjects_do_not_interfere() {
        let mut queue = UnverifiedQueue::new(10);
        let device_subject = Subject::AuthorDevice(DeviceId::new([1u8; 32]));
        let group_subject = Subject::Group(GroupId::new([2u8; 32]));
        queue.push(device_subject, sample_block(1));
        queue.push(group_subject, sample_block(2));
        assert_eq!(queue.drain(device_subject).len(), 1);
        assert_eq!(queue.len(), 1);
    }
}
