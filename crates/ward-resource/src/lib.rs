#![forbid(unsafe_code)]
//! Turns verified key-publish records plus the local key safe into
//! usable resource keys (spec.md §4.3), plans the blocks a share
//! operation must emit (spec.md §4.4), and promotes groups from
//! *External* to *Internal* once a local secret unlocks them
//! (spec.md §4.5).
//!
//! This crate never talks to a transport; callers (`ward-session`)
//! supply the current [`ward_verify::ChainState`] and
//! [`ward_store::KeySafeContents`] and persist whatever this crate
//! returns.

pub mod group;
pub mod planner;
pub mod resolver;

pub use group::{claim_provisional_identity, try_promote_group};
pub use planner::{plan_key_publish, Recipient};
pub use resolver::ResourceKeyManager;
