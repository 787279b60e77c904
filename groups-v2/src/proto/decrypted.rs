// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plaintext group records, only ever held by group members.
//!
//! Identifiers are stored in their binary service id form. An identifier which could not be
//! decrypted is stored as empty bytes next to its ciphertext, callers parse identifiers with the
//! helpers in `identifiers` and decide per entry what to do with the ones which fail.
use crate::proto::{AccessControl, AccessRequired, Role};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum EnabledState {
    Unknown = 0,
    Enabled = 1,
    Disabled = 2,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DecryptedMember {
    #[prost(bytes = "vec", tag = "1")]
    pub aci_bytes: Vec<u8>,
    #[prost(enumeration = "Role", tag = "2")]
    pub role: i32,
    #[prost(bytes = "vec", tag = "3")]
    pub profile_key: Vec<u8>,
    #[prost(uint32, tag = "4")]
    pub joined_at_revision: u32,
    /// Phone number identity the member was invited under, set on promotions of such invites.
    #[prost(bytes = "vec", tag = "5")]
    pub pni_bytes: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DecryptedPendingMember {
    #[prost(bytes = "vec", tag = "1")]
    pub service_id_bytes: Vec<u8>,
    #[prost(enumeration = "Role", tag = "2")]
    pub role: i32,
    #[prost(bytes = "vec", tag = "3")]
    pub added_by_aci: Vec<u8>,
    #[prost(uint64, tag = "4")]
    pub timestamp: u64,
    #[prost(bytes = "vec", tag = "5")]
    pub service_id_cipher_text: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DecryptedPendingMemberRemoval {
    #[prost(bytes = "vec", tag = "1")]
    pub service_id_bytes: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub service_id_cipher_text: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DecryptedRequestingMember {
    #[prost(bytes = "vec", tag = "1")]
    pub aci_bytes: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub profile_key: Vec<u8>,
    #[prost(uint64, tag = "3")]
    pub timestamp: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DecryptedBannedMember {
    #[prost(bytes = "vec", tag = "1")]
    pub service_id_bytes: Vec<u8>,
    #[prost(uint64, tag = "2")]
    pub timestamp: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DecryptedModifyMemberRole {
    #[prost(bytes = "vec", tag = "1")]
    pub aci_bytes: Vec<u8>,
    #[prost(enumeration = "Role", tag = "2")]
    pub role: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DecryptedApproveMember {
    #[prost(bytes = "vec", tag = "1")]
    pub aci_bytes: Vec<u8>,
    #[prost(enumeration = "Role", tag = "2")]
    pub role: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DecryptedString {
    #[prost(string, tag = "1")]
    pub value: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DecryptedTimer {
    #[prost(uint32, tag = "1")]
    pub duration: u32,
}

/// Full plaintext group state at one revision.
#[derive(Clone, PartialEq, prost::Message)]
pub struct DecryptedGroup {
    #[prost(string, tag = "1")]
    pub title: String,
    #[prost(string, tag = "2")]
    pub avatar: String,
    #[prost(message, optional, tag = "3")]
    pub disappearing_messages_timer: Option<DecryptedTimer>,
    #[prost(message, optional, tag = "4")]
    pub access_control: Option<AccessControl>,
    #[prost(uint32, tag = "5")]
    pub revision: u32,
    #[prost(message, repeated, tag = "6")]
    pub members: Vec<DecryptedMember>,
    #[prost(message, repeated, tag = "7")]
    pub pending_members: Vec<DecryptedPendingMember>,
    #[prost(message, repeated, tag = "8")]
    pub requesting_members: Vec<DecryptedRequestingMember>,
    #[prost(bytes = "vec", tag = "9")]
    pub invite_link_password: Vec<u8>,
    #[prost(string, tag = "10")]
    pub description: String,
    #[prost(enumeration = "EnabledState", tag = "11")]
    pub is_announcement_group: i32,
    #[prost(message, repeated, tag = "12")]
    pub banned_members: Vec<DecryptedBannedMember>,
}

/// Plaintext of one state transition.
///
/// Slot numbers match [`group_change::Actions`](crate::proto::group_change::Actions): a
/// decrypted change lists its entries in the same order as the encrypted actions it came
/// from.
#[derive(Clone, PartialEq, prost::Message)]
pub struct DecryptedGroupChange {
    #[prost(bytes = "vec", tag = "1")]
    pub editor_service_id_bytes: Vec<u8>,
    #[prost(uint32, tag = "2")]
    pub revision: u32,
    #[prost(message, repeated, tag = "3")]
    pub new_members: Vec<DecryptedMember>,
    #[prost(bytes = "vec", repeated, tag = "4")]
    pub delete_members: Vec<Vec<u8>>,
    #[prost(message, repeated, tag = "5")]
    pub modify_member_roles: Vec<DecryptedModifyMemberRole>,
    #[prost(message, repeated, tag = "6")]
    pub modified_profile_keys: Vec<DecryptedMember>,
    #[prost(message, repeated, tag = "7")]
    pub new_pending_members: Vec<DecryptedPendingMember>,
    #[prost(message, repeated, tag = "8")]
    pub delete_pending_members: Vec<DecryptedPendingMemberRemoval>,
    #[prost(message, repeated, tag = "9")]
    pub promote_pending_members: Vec<DecryptedMember>,
    #[prost(message, optional, tag = "10")]
    pub new_title: Option<DecryptedString>,
    #[prost(message, optional, tag = "11")]
    pub new_avatar: Option<DecryptedString>,
    #[prost(message, optional, tag = "12")]
    pub new_timer: Option<DecryptedTimer>,
    #[prost(enumeration = "AccessRequired", tag = "13")]
    pub new_attribute_access: i32,
    #[prost(enumeration = "AccessRequired", tag = "14")]
    pub new_member_access: i32,
    #[prost(enumeration = "AccessRequired", tag = "15")]
    pub new_invite_link_access: i32,
    #[prost(message, repeated, tag = "16")]
    pub new_requesting_members: Vec<DecryptedRequestingMember>,
    #[prost(bytes = "vec", repeated, tag = "17")]
    pub delete_requesting_members: Vec<Vec<u8>>,
    #[prost(message, repeated, tag = "18")]
    pub promote_requesting_members: Vec<DecryptedApproveMember>,
    #[prost(bytes = "vec", tag = "19")]
    pub new_invite_link_password: Vec<u8>,
    #[prost(message, optional, tag = "20")]
    pub new_description: Option<DecryptedString>,
    #[prost(enumeration = "EnabledState", tag = "21")]
    pub new_is_announcement_group: i32,
    #[prost(message, repeated, tag = "22")]
    pub new_banned_members: Vec<DecryptedBannedMember>,
    #[prost(message, repeated, tag = "23")]
    pub delete_banned_members: Vec<DecryptedBannedMember>,
    #[prost(message, repeated, tag = "24")]
    pub promote_pending_pni_aci_members: Vec<DecryptedMember>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DecryptedGroupJoinInfo {
    #[prost(string, tag = "1")]
    pub title: String,
    #[prost(string, tag = "2")]
    pub avatar: String,
    #[prost(uint32, tag = "3")]
    pub member_count: u32,
    #[prost(enumeration = "AccessRequired", tag = "4")]
    pub add_from_invite_link: i32,
    #[prost(uint32, tag = "5")]
    pub revision: u32,
    #[prost(bool, tag = "6")]
    pub pending_admin_approval: bool,
    #[prost(string, tag = "7")]
    pub description: String,
}
