// SPDX-License-Identifier: MIT OR Apache-2.0

//! `groups-v2` keeps end-to-end encrypted group state in sync with a server which stores it
//! without being able to read it.
//!
//! The server only ever sees the encrypted records of the [`proto`] module: a [`Group`](proto::Group)
//! snapshot and the signed [`GroupChange`](proto::GroupChange)s which moved it from one revision
//! to the next. Members hold the group's [`GroupSecretParams`](groups_zk::GroupSecretParams) and
//! work on the decrypted counterparts.
//!
//! ## Building and reading changes
//!
//! [`GroupOperations`] turns intents ("add these people", "change the title") into encrypted
//! [`Actions`](proto::group_change::Actions) for the server, and decrypts group snapshots and
//! changes coming back from it. Identifiers and profile keys are proven with presentations of
//! server-issued credentials, see `groups-zk`.
//!
//! ## Following the group
//!
//! A decrypted change is applied to the decrypted group with [`apply`]. When the server only
//! hands out snapshots, [`reconstruct_group_change`] infers the change between two of them so
//! it can still be shown to the user.
//!
//! ## Concurrent changes
//!
//! Every change targets exactly one revision. If another member got there first the server
//! rejects ours, and [`resolve_conflict`] rebases it onto the newer state by dropping whatever
//! already happened. When nothing is left, [`resolve::change_is_empty`] tells us so and the
//! change doesn't need to be sent again.
mod apply;
mod config;
mod error;
pub mod identifiers;
mod operations;
pub mod proto;
mod reconstruct;
pub mod resolve;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use apply::{
    apply, apply_next, change_is_empty,
    change_is_empty_except_for_ban_changes_and_optional_profile_key_changes,
    change_is_empty_except_for_profile_key_changes, change_is_silent, remove_member,
};
pub use config::{
    DEFAULT_MAX_BANNED_MEMBERS, DEFAULT_MAX_GROUP_SIZE, GroupsV2Config, HIGHEST_KNOWN_EPOCH,
};
pub use error::{ApplyChangeError, GroupOperationsError};
pub use operations::{GroupCandidate, GroupOperations, GroupsV2Operations, NewGroup};
pub use reconstruct::reconstruct_group_change;
pub use resolve::{ChangeSetModifier, resolve_conflict, resolve_conflict_decrypted};
