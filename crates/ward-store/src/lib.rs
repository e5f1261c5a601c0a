#![forbid(unsafe_code)]
//! The local encrypted key safe, the persistent-table abstraction
//! required of a storage backend (spec.md §6), an in-memory reference
//! implementation of it, and the User/Device/Group domain models that
//! the tables hold.

pub mod memory;
pub mod models;
pub mod safe;
pub mod table;

pub use memory::MemoryTable;
pub use models::{
    Device, ExternalGroup, Group, GroupMemberSlot, InternalGroup, KeyPublishRecord,
    PendingProvisionalMember, ProvisionalIdentityKeys, User, UserPublicKeyEntry,
};
pub use safe::{DeviceKeyPair, KeySafeContents, SealedKeySafe, UserKeyPairEntry};
pub use table::{Query, SortOrder, StoreError, Table};
