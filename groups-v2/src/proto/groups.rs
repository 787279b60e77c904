// SPDX-License-Identifier: MIT OR Apache-2.0

//! Encrypted group records as stored on the server.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum AccessRequired {
    Unknown = 0,
    Any = 1,
    Member = 2,
    Administrator = 3,
    Unsatisfiable = 4,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum Role {
    Unknown = 0,
    Default = 1,
    Administrator = 2,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AccessControl {
    #[prost(enumeration = "AccessRequired", tag = "1")]
    pub attributes: i32,
    #[prost(enumeration = "AccessRequired", tag = "2")]
    pub members: i32,
    #[prost(enumeration = "AccessRequired", tag = "3")]
    pub add_from_invite_link: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Member {
    #[prost(bytes = "vec", tag = "1")]
    pub user_id: Vec<u8>,
    #[prost(enumeration = "Role", tag = "2")]
    pub role: i32,
    #[prost(bytes = "vec", tag = "3")]
    pub profile_key: Vec<u8>,
    #[prost(bytes = "vec", tag = "4")]
    pub presentation: Vec<u8>,
    #[prost(uint32, tag = "5")]
    pub joined_at_revision: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PendingMember {
    #[prost(message, optional, tag = "1")]
    pub member: Option<Member>,
    #[prost(bytes = "vec", tag = "2")]
    pub added_by_user_id: Vec<u8>,
    #[prost(uint64, tag = "3")]
    pub timestamp: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RequestingMember {
    #[prost(bytes = "vec", tag = "1")]
    pub user_id: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub profile_key: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub presentation: Vec<u8>,
    #[prost(uint64, tag = "4")]
    pub timestamp: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BannedMember {
    #[prost(bytes = "vec", tag = "1")]
    pub user_id: Vec<u8>,
    #[prost(uint64, tag = "2")]
    pub timestamp: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Group {
    #[prost(bytes = "vec", tag = "1")]
    pub public_key: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub title: Vec<u8>,
    #[prost(string, tag = "3")]
    pub avatar: String,
    #[prost(bytes = "vec", tag = "4")]
    pub disappearing_messages_timer: Vec<u8>,
    #[prost(message, optional, tag = "5")]
    pub access_control: Option<AccessControl>,
    #[prost(uint32, tag = "6")]
    pub revision: u32,
    #[prost(message, repeated, tag = "7")]
    pub members: Vec<Member>,
    #[prost(message, repeated, tag = "8")]
    pub pending_members: Vec<PendingMember>,
    #[prost(message, repeated, tag = "9")]
    pub requesting_members: Vec<RequestingMember>,
    #[prost(bytes = "vec", tag = "10")]
    pub invite_link_password: Vec<u8>,
    #[prost(bytes = "vec", tag = "11")]
    pub description: Vec<u8>,
    #[prost(bool, tag = "12")]
    pub announcements_only: bool,
    #[prost(message, repeated, tag = "13")]
    pub banned_members: Vec<BannedMember>,
}

/// Encoded [`group_change::Actions`] notarised by the server.
#[derive(Clone, PartialEq, prost::Message)]
pub struct GroupChange {
    #[prost(bytes = "vec", tag = "1")]
    pub actions: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub server_signature: Vec<u8>,
    #[prost(uint32, tag = "3")]
    pub change_epoch: u32,
}

pub mod group_change {
    /// One encrypted state transition. Fields 3 to 23 are the change slots.
    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Actions {
        #[prost(bytes = "vec", tag = "1")]
        pub source_service_id: Vec<u8>,
        #[prost(uint32, tag = "2")]
        pub revision: u32,
        #[prost(message, repeated, tag = "3")]
        pub add_members: Vec<actions::AddMemberAction>,
        #[prost(message, repeated, tag = "4")]
        pub delete_members: Vec<actions::DeleteMemberAction>,
        #[prost(message, repeated, tag = "5")]
        pub modify_member_roles: Vec<actions::ModifyMemberRoleAction>,
        #[prost(message, repeated, tag = "6")]
        pub modify_member_profile_keys: Vec<actions::ModifyMemberProfileKeyAction>,
        #[prost(message, repeated, tag = "7")]
        pub add_pending_members: Vec<actions::AddPendingMemberAction>,
        #[prost(message, repeated, tag = "8")]
        pub delete_pending_members: Vec<actions::DeletePendingMemberAction>,
        #[prost(message, repeated, tag = "9")]
        pub promote_pending_members: Vec<actions::PromotePendingMemberAction>,
        #[prost(message, optional, tag = "10")]
        pub modify_title: Option<actions::ModifyTitleAction>,
        #[prost(message, optional, tag = "11")]
        pub modify_avatar: Option<actions::ModifyAvatarAction>,
        #[prost(message, optional, tag = "12")]
        pub modify_disappearing_messages_timer:
            Option<actions::ModifyDisappearingMessagesTimerAction>,
        #[prost(message, optional, tag = "13")]
        pub modify_attributes_access: Option<actions::ModifyAttributesAccessControlAction>,
        #[prost(message, optional, tag = "14")]
        pub modify_member_access: Option<actions::ModifyMembersAccessControlAction>,
        #[prost(message, optional, tag = "15")]
        pub modify_add_from_invite_link_access:
            Option<actions::ModifyAddFromInviteLinkAccessControlAction>,
        #[prost(message, repeated, tag = "16")]
        pub add_requesting_members: Vec<actions::AddRequestingMemberAction>,
        #[prost(message, repeated, tag = "17")]
        pub delete_requesting_members: Vec<actions::DeleteRequestingMemberAction>,
        #[prost(message, repeated, tag = "18")]
        pub promote_requesting_members: Vec<actions::PromoteRequestingMemberAction>,
        #[prost(message, optional, tag = "19")]
        pub modify_invite_link_password: Option<actions::ModifyInviteLinkPasswordAction>,
        #[prost(message, optional, tag = "20")]
        pub modify_description: Option<actions::ModifyDescriptionAction>,
        #[prost(message, optional, tag = "21")]
        pub modify_announcements_only: Option<actions::ModifyAnnouncementsOnlyAction>,
        #[prost(message, repeated, tag = "22")]
        pub add_banned_members: Vec<actions::AddBannedMemberAction>,
        #[prost(message, repeated, tag = "23")]
        pub delete_banned_members: Vec<actions::DeleteBannedMemberAction>,
        #[prost(message, repeated, tag = "24")]
        pub promote_pending_pni_aci_members: Vec<actions::PromotePendingPniAciMemberProfileKeyAction>,
    }

    pub mod actions {
        use crate::proto::{
            AccessRequired, BannedMember, Member, PendingMember, RequestingMember, Role,
        };

        #[derive(Clone, PartialEq, prost::Message)]
        pub struct AddMemberAction {
            #[prost(message, optional, tag = "1")]
            pub added: Option<Member>,
            #[prost(bool, tag = "2")]
            pub join_from_invite_link: bool,
        }

        #[derive(Clone, PartialEq, prost::Message)]
        pub struct DeleteMemberAction {
            #[prost(bytes = "vec", tag = "1")]
            pub deleted_user_id: Vec<u8>,
        }

        #[derive(Clone, PartialEq, prost::Message)]
        pub struct ModifyMemberRoleAction {
            #[prost(bytes = "vec", tag = "1")]
            pub user_id: Vec<u8>,
            #[prost(enumeration = "Role", tag = "2")]
            pub role: i32,
        }

        #[derive(Clone, PartialEq, prost::Message)]
        pub struct ModifyMemberProfileKeyAction {
            #[prost(bytes = "vec", tag = "1")]
            pub presentation: Vec<u8>,
            #[prost(bytes = "vec", tag = "2")]
            pub user_id: Vec<u8>,
            #[prost(bytes = "vec", tag = "3")]
            pub profile_key: Vec<u8>,
        }

        #[derive(Clone, PartialEq, prost::Message)]
        pub struct AddPendingMemberAction {
            #[prost(message, optional, tag = "1")]
            pub added: Option<PendingMember>,
        }

        #[derive(Clone, PartialEq, prost::Message)]
        pub struct DeletePendingMemberAction {
            #[prost(bytes = "vec", tag = "1")]
            pub deleted_user_id: Vec<u8>,
        }

        #[derive(Clone, PartialEq, prost::Message)]
        pub struct PromotePendingMemberAction {
            #[prost(bytes = "vec", tag = "1")]
            pub presentation: Vec<u8>,
            #[prost(bytes = "vec", tag = "2")]
            pub user_id: Vec<u8>,
            #[prost(bytes = "vec", tag = "3")]
            pub profile_key: Vec<u8>,
        }

        /// Accepts an invite sent to the phone number identity under the account identity.
        ///
        /// Clients only send the presentation, the server fills in the ciphertexts.
        #[derive(Clone, PartialEq, prost::Message)]
        pub struct PromotePendingPniAciMemberProfileKeyAction {
            #[prost(bytes = "vec", tag = "1")]
            pub presentation: Vec<u8>,
            #[prost(bytes = "vec", tag = "2")]
            pub user_id: Vec<u8>,
            #[prost(bytes = "vec", tag = "3")]
            pub pni: Vec<u8>,
            #[prost(bytes = "vec", tag = "4")]
            pub profile_key: Vec<u8>,
        }

        #[derive(Clone, PartialEq, prost::Message)]
        pub struct ModifyTitleAction {
            #[prost(bytes = "vec", tag = "1")]
            pub title: Vec<u8>,
        }

        #[derive(Clone, PartialEq, prost::Message)]
        pub struct ModifyAvatarAction {
            #[prost(string, tag = "1")]
            pub avatar: String,
        }

        #[derive(Clone, PartialEq, prost::Message)]
        pub struct ModifyDisappearingMessagesTimerAction {
            #[prost(bytes = "vec", tag = "1")]
            pub timer: Vec<u8>,
        }

        #[derive(Clone, PartialEq, prost::Message)]
        pub struct ModifyAttributesAccessControlAction {
            #[prost(enumeration = "AccessRequired", tag = "1")]
            pub attributes_access: i32,
        }

        #[derive(Clone, PartialEq, prost::Message)]
        pub struct ModifyMembersAccessControlAction {
            #[prost(enumeration = "AccessRequired", tag = "1")]
            pub members_access: i32,
        }

        #[derive(Clone, PartialEq, prost::Message)]
        pub struct ModifyAddFromInviteLinkAccessControlAction {
            #[prost(enumeration = "AccessRequired", tag = "1")]
            pub add_from_invite_link_access: i32,
        }

        #[derive(Clone, PartialEq, prost::Message)]
        pub struct AddRequestingMemberAction {
            #[prost(message, optional, tag = "1")]
            pub added: Option<RequestingMember>,
        }

        #[derive(Clone, PartialEq, prost::Message)]
        pub struct DeleteRequestingMemberAction {
            #[prost(bytes = "vec", tag = "1")]
            pub deleted_user_id: Vec<u8>,
        }

        #[derive(Clone, PartialEq, prost::Message)]
        pub struct PromoteRequestingMemberAction {
            #[prost(bytes = "vec", tag = "1")]
            pub user_id: Vec<u8>,
            #[prost(enumeration = "Role", tag = "2")]
            pub role: i32,
        }

        #[derive(Clone, PartialEq, prost::Message)]
        pub struct ModifyInviteLinkPasswordAction {
            #[prost(bytes = "vec", tag = "1")]
            pub invite_link_password: Vec<u8>,
        }

        #[derive(Clone, PartialEq, prost::Message)]
        pub struct ModifyDescriptionAction {
            #[prost(bytes = "vec", tag = "1")]
            pub description: Vec<u8>,
        }

        #[derive(Clone, PartialEq, prost::Message)]
        pub struct ModifyAnnouncementsOnlyAction {
            #[prost(bool, tag = "1")]
            pub announcements_only: bool,
        }

        #[derive(Clone, PartialEq, prost::Message)]
        pub struct AddBannedMemberAction {
            #[prost(message, optional, tag = "1")]
            pub added: Option<BannedMember>,
        }

        #[derive(Clone, PartialEq, prost::Message)]
        pub struct DeleteBannedMemberAction {
            #[prost(bytes = "vec", tag = "1")]
            pub deleted_user_id: Vec<u8>,
        }
    }
}

/// Subset of group state visible to someone holding an invite link.
#[derive(Clone, PartialEq, prost::Message)]
pub struct GroupJoinInfo {
    #[prost(bytes = "vec", tag = "1")]
    pub public_key: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub title: Vec<u8>,
    #[prost(string, tag = "3")]
    pub avatar: String,
    #[prost(uint32, tag = "4")]
    pub member_count: u32,
    #[prost(enumeration = "AccessRequired", tag = "5")]
    pub add_from_invite_link: i32,
    #[prost(uint32, tag = "6")]
    pub revision: u32,
    #[prost(bool, tag = "7")]
    pub pending_admin_approval: bool,
    #[prost(bytes = "vec", tag = "8")]
    pub description: Vec<u8>,
}

/// Plaintext of an encrypted group attribute.
#[derive(Clone, PartialEq, prost::Message)]
pub struct GroupAttributeBlob {
    #[prost(oneof = "group_attribute_blob::Content", tags = "1, 2, 3, 4")]
    pub content: Option<group_attribute_blob::Content>,
}

pub mod group_attribute_blob {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Content {
        #[prost(string, tag = "1")]
        Title(String),
        #[prost(bytes = "vec", tag = "2")]
        Avatar(Vec<u8>),
        #[prost(uint32, tag = "3")]
        DisappearingMessagesDuration(u32),
        #[prost(string, tag = "4")]
        DescriptionText(String),
    }
}
