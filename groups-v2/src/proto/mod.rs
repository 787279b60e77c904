// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire records of group state and group changes.
//!
//! Messages are declared by hand with stable numeric field tags. New fields are only ever
//! appended, and the tests of every part of the engine check that it knows about all of them.
//!
//! The encrypted records ([`Group`], [`GroupChange`], [`GroupJoinInfo`]) are what the server
//! stores and relays. Their plaintext counterparts ([`DecryptedGroup`],
//! [`DecryptedGroupChange`], [`DecryptedGroupJoinInfo`]) only ever exist on member devices.
mod decrypted;
mod groups;

pub use decrypted::*;
pub use groups::*;
