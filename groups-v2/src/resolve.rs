// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rebasing a change onto a group which moved on since the change was made.
//!
//! A client builds its change against the revision it knows. When the server rejects it because
//! someone else changed the group first, the client fetches the new group state and resolves its
//! change against it: entries which already happened or can't happen anymore are dropped, adds
//! of invited members become promotions. Whatever remains is still necessary and can be sent
//! again, and if nothing remains (see [`change_is_empty`]) there is nothing left to do.
//!
//! Resolution works on the decrypted change to tell who an entry is about, and edits the change
//! through [`ChangeSetModifier`]: either the encrypted actions the decrypted change was made
//! from, which must list their entries in the same order, or a copy of the decrypted change
//! itself.
use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::proto::group_change::Actions;
use crate::proto::group_change::actions::PromotePendingMemberAction;
use crate::proto::{
    AccessRequired, DecryptedGroup, DecryptedGroupChange, DecryptedMember, EnabledState, Role,
};

/// Edits to a change, addressed by the position of entries in the decrypted change.
///
/// Positions are always removed from the back, so a position stays valid until it is used.
pub trait ChangeSetModifier {
    fn remove_add_members(&mut self, index: usize);

    /// Turns an add into the promotion of an invited member.
    fn move_add_to_promote(&mut self, index: usize);

    fn remove_delete_members(&mut self, index: usize);

    fn remove_modify_member_roles(&mut self, index: usize);

    fn remove_modify_member_profile_keys(&mut self, index: usize);

    fn remove_add_pending_members(&mut self, index: usize);

    fn remove_delete_pending_members(&mut self, index: usize);

    fn remove_promote_pending_members(&mut self, index: usize);

    fn clear_modify_title(&mut self);

    fn clear_modify_avatar(&mut self);

    fn clear_modify_disappearing_messages_timer(&mut self);

    fn clear_modify_attributes_access(&mut self);

    fn clear_modify_member_access(&mut self);

    fn clear_modify_add_from_invite_link_access(&mut self);

    fn remove_add_requesting_members(&mut self, index: usize);

    /// Turns a join request into the promotion of an invited member.
    fn move_add_requesting_members_to_promote(&mut self, index: usize);

    fn remove_delete_requesting_members(&mut self, index: usize);

    fn remove_promote_requesting_members(&mut self, index: usize);

    fn clear_modify_description(&mut self);

    fn clear_modify_announcements_only(&mut self);

    fn remove_add_banned_members(&mut self, index: usize);

    fn remove_delete_banned_members(&mut self, index: usize);

    fn remove_promote_pending_pni_aci_members(&mut self, index: usize);
}

fn remove_index<T>(entries: &mut Vec<T>, index: usize) -> Option<T> {
    (index < entries.len()).then(|| entries.remove(index))
}

impl ChangeSetModifier for Actions {
    fn remove_add_members(&mut self, index: usize) {
        remove_index(&mut self.add_members, index);
    }

    fn move_add_to_promote(&mut self, index: usize) {
        if let Some(add_member) = remove_index(&mut self.add_members, index) {
            self.promote_pending_members.push(PromotePendingMemberAction {
                presentation: add_member.added.unwrap_or_default().presentation,
                ..Default::default()
            });
        }
    }

    fn remove_delete_members(&mut self, index: usize) {
        remove_index(&mut self.delete_members, index);
    }

    fn remove_modify_member_roles(&mut self, index: usize) {
        remove_index(&mut self.modify_member_roles, index);
    }

    fn remove_modify_member_profile_keys(&mut self, index: usize) {
        remove_index(&mut self.modify_member_profile_keys, index);
    }

    fn remove_add_pending_members(&mut self, index: usize) {
        remove_index(&mut self.add_pending_members, index);
    }

    fn remove_delete_pending_members(&mut self, index: usize) {
        remove_index(&mut self.delete_pending_members, index);
    }

    fn remove_promote_pending_members(&mut self, index: usize) {
        remove_index(&mut self.promote_pending_members, index);
    }

    fn clear_modify_title(&mut self) {
        self.modify_title = None;
    }

    fn clear_modify_avatar(&mut self) {
        self.modify_avatar = None;
    }

    fn clear_modify_disappearing_messages_timer(&mut self) {
        self.modify_disappearing_messages_timer = None;
    }

    fn clear_modify_attributes_access(&mut self) {
        self.modify_attributes_access = None;
    }

    fn clear_modify_member_access(&mut self) {
        self.modify_member_access = None;
    }

    fn clear_modify_add_from_invite_link_access(&mut self) {
        self.modify_add_from_invite_link_access = None;
    }

    fn remove_add_requesting_members(&mut self, index: usize) {
        remove_index(&mut self.add_requesting_members, index);
    }

    fn move_add_requesting_members_to_promote(&mut self, index: usize) {
        if let Some(add_requesting) = remove_index(&mut self.add_requesting_members, index) {
            self.promote_pending_members.push(PromotePendingMemberAction {
                presentation: add_requesting.added.unwrap_or_default().presentation,
                ..Default::default()
            });
        }
    }

    fn remove_delete_requesting_members(&mut self, index: usize) {
        remove_index(&mut self.delete_requesting_members, index);
    }

    fn remove_promote_requesting_members(&mut self, index: usize) {
        remove_index(&mut self.promote_requesting_members, index);
    }

    fn clear_modify_description(&mut self) {
        self.modify_description = None;
    }

    fn clear_modify_announcements_only(&mut self) {
        self.modify_announcements_only = None;
    }

    fn remove_add_banned_members(&mut self, index: usize) {
        remove_index(&mut self.add_banned_members, index);
    }

    fn remove_delete_banned_members(&mut self, index: usize) {
        remove_index(&mut self.delete_banned_members, index);
    }

    fn remove_promote_pending_pni_aci_members(&mut self, index: usize) {
        remove_index(&mut self.promote_pending_pni_aci_members, index);
    }
}

impl ChangeSetModifier for DecryptedGroupChange {
    fn remove_add_members(&mut self, index: usize) {
        remove_index(&mut self.new_members, index);
    }

    fn move_add_to_promote(&mut self, index: usize) {
        if let Some(member) = remove_index(&mut self.new_members, index) {
            self.promote_pending_members.push(member);
        }
    }

    fn remove_delete_members(&mut self, index: usize) {
        remove_index(&mut self.delete_members, index);
    }

    fn remove_modify_member_roles(&mut self, index: usize) {
        remove_index(&mut self.modify_member_roles, index);
    }

    fn remove_modify_member_profile_keys(&mut self, index: usize) {
        remove_index(&mut self.modified_profile_keys, index);
    }

    fn remove_add_pending_members(&mut self, index: usize) {
        remove_index(&mut self.new_pending_members, index);
    }

    fn remove_delete_pending_members(&mut self, index: usize) {
        remove_index(&mut self.delete_pending_members, index);
    }

    fn remove_promote_pending_members(&mut self, index: usize) {
        remove_index(&mut self.promote_pending_members, index);
    }

    fn clear_modify_title(&mut self) {
        self.new_title = None;
    }

    fn clear_modify_avatar(&mut self) {
        self.new_avatar = None;
    }

    fn clear_modify_disappearing_messages_timer(&mut self) {
        self.new_timer = None;
    }

    fn clear_modify_attributes_access(&mut self) {
        self.set_new_attribute_access(AccessRequired::Unknown);
    }

    fn clear_modify_member_access(&mut self) {
        self.set_new_member_access(AccessRequired::Unknown);
    }

    fn clear_modify_add_from_invite_link_access(&mut self) {
        self.set_new_invite_link_access(AccessRequired::Unknown);
    }

    fn remove_add_requesting_members(&mut self, index: usize) {
        remove_index(&mut self.new_requesting_members, index);
    }

    fn move_add_requesting_members_to_promote(&mut self, index: usize) {
        if let Some(requesting) = remove_index(&mut self.new_requesting_members, index) {
            let mut member = DecryptedMember {
                aci_bytes: requesting.aci_bytes,
                profile_key: requesting.profile_key,
                joined_at_revision: self.revision,
                ..Default::default()
            };
            member.set_role(Role::Default);
            self.promote_pending_members.push(member);
        }
    }

    fn remove_delete_requesting_members(&mut self, index: usize) {
        remove_index(&mut self.delete_requesting_members, index);
    }

    fn remove_promote_requesting_members(&mut self, index: usize) {
        remove_index(&mut self.promote_requesting_members, index);
    }

    fn clear_modify_description(&mut self) {
        self.new_description = None;
    }

    fn clear_modify_announcements_only(&mut self) {
        self.set_new_is_announcement_group(EnabledState::Unknown);
    }

    fn remove_add_banned_members(&mut self, index: usize) {
        remove_index(&mut self.new_banned_members, index);
    }

    fn remove_delete_banned_members(&mut self, index: usize) {
        remove_index(&mut self.delete_banned_members, index);
    }

    fn remove_promote_pending_pni_aci_members(&mut self, index: usize) {
        remove_index(&mut self.promote_pending_pni_aci_members, index);
    }
}

/// Resolves encrypted actions against the current group state.
///
/// `decrypted_change` is the decryption of `encrypted_change` and tells whom each entry is
/// about.
pub fn resolve_conflict(
    group_state: &DecryptedGroup,
    decrypted_change: &DecryptedGroupChange,
    encrypted_change: &Actions,
) -> Actions {
    let mut result = encrypted_change.clone();
    resolve(group_state, decrypted_change, &mut result);
    result
}

/// Resolves a decrypted change against the current group state.
pub fn resolve_conflict_decrypted(
    group_state: &DecryptedGroup,
    decrypted_change: &DecryptedGroupChange,
) -> DecryptedGroupChange {
    let mut result = decrypted_change.clone();
    resolve(group_state, decrypted_change, &mut result);
    result
}

/// Identifiers of the current group state, looked up by their binary form.
struct GroupIndex<'a> {
    members: HashMap<&'a [u8], &'a DecryptedMember>,
    pending: HashSet<&'a [u8]>,
    pending_ciphertexts: HashSet<&'a [u8]>,
    requesting: HashSet<&'a [u8]>,
    banned: HashSet<&'a [u8]>,
}

impl<'a> GroupIndex<'a> {
    fn new(group: &'a DecryptedGroup) -> Self {
        Self {
            members: group
                .members
                .iter()
                .map(|member| (member.aci_bytes.as_slice(), member))
                .collect(),
            pending: group
                .pending_members
                .iter()
                .map(|pending| pending.service_id_bytes.as_slice())
                .filter(|service_id| !service_id.is_empty())
                .collect(),
            pending_ciphertexts: group
                .pending_members
                .iter()
                .map(|pending| pending.service_id_cipher_text.as_slice())
                .collect(),
            requesting: group
                .requesting_members
                .iter()
                .map(|requesting| requesting.aci_bytes.as_slice())
                .collect(),
            banned: group
                .banned_members
                .iter()
                .map(|banned| banned.service_id_bytes.as_slice())
                .collect(),
        }
    }

    fn is_member(&self, id: &[u8]) -> bool {
        self.members.contains_key(id)
    }

    fn is_pending(&self, id: &[u8]) -> bool {
        self.pending.contains(id)
    }
}

fn resolve(
    group: &DecryptedGroup,
    change: &DecryptedGroupChange,
    result: &mut impl ChangeSetModifier,
) {
    let index = GroupIndex::new(group);

    resolve_field3_add_members(change, &index, result);
    resolve_field4_delete_members(change, &index, result);
    resolve_field5_modify_member_roles(change, &index, result);
    resolve_field6_modify_profile_keys(change, &index, result);
    resolve_field7_add_pending_members(change, &index, result);
    resolve_field8_delete_pending_members(change, &index, result);
    resolve_field9_promote_pending_members(change, &index, result);
    resolve_field10_modify_title(group, change, result);
    resolve_field11_modify_avatar(group, change, result);
    resolve_field12_modify_disappearing_messages_timer(group, change, result);
    resolve_field13_modify_attributes_access(group, change, result);
    resolve_field14_modify_member_access(group, change, result);
    resolve_field15_modify_add_from_invite_link_access(group, change, result);
    resolve_field16_add_requesting_members(change, &index, result);
    resolve_field17_delete_requesting_members(change, &index, result);
    resolve_field18_promote_requesting_members(change, &index, result);
    // Field 19, a new invite link password, is always sent again.
    resolve_field20_modify_description(group, change, result);
    resolve_field21_modify_announcements_only(group, change, result);
    resolve_field22_add_banned_members(change, &index, result);
    resolve_field23_delete_banned_members(change, &index, result);
    resolve_field24_promote_pending_pni_aci_members(change, &index, result);
}

fn resolve_field3_add_members(
    change: &DecryptedGroupChange,
    group: &GroupIndex<'_>,
    result: &mut impl ChangeSetModifier,
) {
    for (i, member) in change.new_members.iter().enumerate().rev() {
        let is_member = group.is_member(&member.aci_bytes);
        let is_pending = group.is_pending(&member.aci_bytes);

        if is_member && is_pending {
            warn!(index = i, "added member is both member and invited, dropping the add");
            result.remove_add_members(i);
        } else if is_member {
            debug!(index = i, "dropping add of existing member");
            result.remove_add_members(i);
        } else if is_pending {
            debug!(index = i, "turning add of invited member into promotion");
            result.move_add_to_promote(i);
        }
    }
}

fn resolve_field4_delete_members(
    change: &DecryptedGroupChange,
    group: &GroupIndex<'_>,
    result: &mut impl ChangeSetModifier,
) {
    for (i, aci_bytes) in change.delete_members.iter().enumerate().rev() {
        if !group.is_member(aci_bytes) {
            debug!(index = i, "dropping delete of non-member");
            result.remove_delete_members(i);
        }
    }
}

fn resolve_field5_modify_member_roles(
    change: &DecryptedGroupChange,
    group: &GroupIndex<'_>,
    result: &mut impl ChangeSetModifier,
) {
    for (i, modify) in change.modify_member_roles.iter().enumerate().rev() {
        let unchanged = group
            .members
            .get(modify.aci_bytes.as_slice())
            .is_none_or(|member| member.role == modify.role);
        if unchanged {
            debug!(index = i, "dropping role change");
            result.remove_modify_member_roles(i);
        }
    }
}

fn resolve_field6_modify_profile_keys(
    change: &DecryptedGroupChange,
    group: &GroupIndex<'_>,
    result: &mut impl ChangeSetModifier,
) {
    for (i, modified) in change.modified_profile_keys.iter().enumerate().rev() {
        let unchanged = group
            .members
            .get(modified.aci_bytes.as_slice())
            .is_none_or(|member| member.profile_key == modified.profile_key);
        if unchanged {
            debug!(index = i, "dropping profile key change");
            result.remove_modify_member_profile_keys(i);
        }
    }
}

fn resolve_field7_add_pending_members(
    change: &DecryptedGroupChange,
    group: &GroupIndex<'_>,
    result: &mut impl ChangeSetModifier,
) {
    for (i, pending) in change.new_pending_members.iter().enumerate().rev() {
        if group.is_member(&pending.service_id_bytes) || group.is_pending(&pending.service_id_bytes)
        {
            debug!(index = i, "dropping invite of member or invitee");
            result.remove_add_pending_members(i);
        }
    }
}

fn resolve_field8_delete_pending_members(
    change: &DecryptedGroupChange,
    group: &GroupIndex<'_>,
    result: &mut impl ChangeSetModifier,
) {
    for (i, removal) in change.delete_pending_members.iter().enumerate().rev() {
        let is_pending = group
            .pending_ciphertexts
            .contains(removal.service_id_cipher_text.as_slice())
            || group.is_pending(&removal.service_id_bytes);
        if !is_pending {
            debug!(index = i, "dropping delete of non-invitee");
            result.remove_delete_pending_members(i);
        }
    }
}

fn resolve_field9_promote_pending_members(
    change: &DecryptedGroupChange,
    group: &GroupIndex<'_>,
    result: &mut impl ChangeSetModifier,
) {
    for (i, member) in change.promote_pending_members.iter().enumerate().rev() {
        if !group.is_pending(&member.aci_bytes) {
            debug!(index = i, "dropping promotion of non-invitee");
            result.remove_promote_pending_members(i);
        }
    }
}

fn resolve_field10_modify_title(
    group: &DecryptedGroup,
    change: &DecryptedGroupChange,
    result: &mut impl ChangeSetModifier,
) {
    if change
        .new_title
        .as_ref()
        .is_some_and(|title| title.value == group.title)
    {
        result.clear_modify_title();
    }
}

fn resolve_field11_modify_avatar(
    group: &DecryptedGroup,
    change: &DecryptedGroupChange,
    result: &mut impl ChangeSetModifier,
) {
    if change
        .new_avatar
        .as_ref()
        .is_some_and(|avatar| avatar.value == group.avatar)
    {
        result.clear_modify_avatar();
    }
}

fn resolve_field12_modify_disappearing_messages_timer(
    group: &DecryptedGroup,
    change: &DecryptedGroupChange,
    result: &mut impl ChangeSetModifier,
) {
    let current = group
        .disappearing_messages_timer
        .as_ref()
        .map(|timer| timer.duration)
        .unwrap_or_default();
    if change
        .new_timer
        .as_ref()
        .is_some_and(|timer| timer.duration == current)
    {
        result.clear_modify_disappearing_messages_timer();
    }
}

fn resolve_field13_modify_attributes_access(
    group: &DecryptedGroup,
    change: &DecryptedGroupChange,
    result: &mut impl ChangeSetModifier,
) {
    let current = group.access_control.clone().unwrap_or_default();
    if change.new_attribute_access == current.attributes {
        result.clear_modify_attributes_access();
    }
}

fn resolve_field14_modify_member_access(
    group: &DecryptedGroup,
    change: &DecryptedGroupChange,
    result: &mut impl ChangeSetModifier,
) {
    let current = group.access_control.clone().unwrap_or_default();
    if change.new_member_access == current.members {
        result.clear_modify_member_access();
    }
}

fn resolve_field15_modify_add_from_invite_link_access(
    group: &DecryptedGroup,
    change: &DecryptedGroupChange,
    result: &mut impl ChangeSetModifier,
) {
    let current = group.access_control.clone().unwrap_or_default();
    if change.new_invite_link_access == current.add_from_invite_link {
        result.clear_modify_add_from_invite_link_access();
    }
}

fn resolve_field16_add_requesting_members(
    change: &DecryptedGroupChange,
    group: &GroupIndex<'_>,
    result: &mut impl ChangeSetModifier,
) {
    for (i, requesting) in change.new_requesting_members.iter().enumerate().rev() {
        if group.is_member(&requesting.aci_bytes)
            || group.requesting.contains(requesting.aci_bytes.as_slice())
        {
            debug!(index = i, "dropping join request of member or requester");
            result.remove_add_requesting_members(i);
        } else if group.is_pending(&requesting.aci_bytes) {
            debug!(index = i, "turning join request of invitee into promotion");
            result.move_add_requesting_members_to_promote(i);
        }
    }
}

fn resolve_field17_delete_requesting_members(
    change: &DecryptedGroupChange,
    group: &GroupIndex<'_>,
    result: &mut impl ChangeSetModifier,
) {
    for (i, aci_bytes) in change.delete_requesting_members.iter().enumerate().rev() {
        if !group.requesting.contains(aci_bytes.as_slice()) {
            debug!(index = i, "dropping refusal of non-requester");
            result.remove_delete_requesting_members(i);
        }
    }
}

fn resolve_field18_promote_requesting_members(
    change: &DecryptedGroupChange,
    group: &GroupIndex<'_>,
    result: &mut impl ChangeSetModifier,
) {
    for (i, approve) in change.promote_requesting_members.iter().enumerate().rev() {
        if !group.requesting.contains(approve.aci_bytes.as_slice()) {
            debug!(index = i, "dropping approval of non-requester");
            result.remove_promote_requesting_members(i);
        }
    }
}

fn resolve_field20_modify_description(
    group: &DecryptedGroup,
    change: &DecryptedGroupChange,
    result: &mut impl ChangeSetModifier,
) {
    if change
        .new_description
        .as_ref()
        .is_some_and(|description| description.value == group.description)
    {
        result.clear_modify_description();
    }
}

fn resolve_field21_modify_announcements_only(
    group: &DecryptedGroup,
    change: &DecryptedGroupChange,
    result: &mut impl ChangeSetModifier,
) {
    if change.new_is_announcement_group == group.is_announcement_group {
        result.clear_modify_announcements_only();
    }
}

fn resolve_field22_add_banned_members(
    change: &DecryptedGroupChange,
    group: &GroupIndex<'_>,
    result: &mut impl ChangeSetModifier,
) {
    for (i, banned) in change.new_banned_members.iter().enumerate().rev() {
        if group.banned.contains(banned.service_id_bytes.as_slice()) {
            debug!(index = i, "dropping ban of banned member");
            result.remove_add_banned_members(i);
        }
    }
}

fn resolve_field23_delete_banned_members(
    change: &DecryptedGroupChange,
    group: &GroupIndex<'_>,
    result: &mut impl ChangeSetModifier,
) {
    for (i, unbanned) in change.delete_banned_members.iter().enumerate().rev() {
        if !group.banned.contains(unbanned.service_id_bytes.as_slice()) {
            debug!(index = i, "dropping unban of non-banned member");
            result.remove_delete_banned_members(i);
        }
    }
}

fn resolve_field24_promote_pending_pni_aci_members(
    change: &DecryptedGroupChange,
    group: &GroupIndex<'_>,
    result: &mut impl ChangeSetModifier,
) {
    for (i, member) in change.promote_pending_pni_aci_members.iter().enumerate().rev() {
        if group.is_member(&member.aci_bytes) {
            debug!(index = i, "dropping invite acceptance of existing member");
            result.remove_promote_pending_pni_aci_members(i);
        }
    }
}

/// True when none of the actions' slots is set. Source and revision don't count.
pub fn change_is_empty(actions: &Actions) -> bool {
    actions.add_members.is_empty()
        && actions.delete_members.is_empty()
        && actions.modify_member_roles.is_empty()
        && actions.modify_member_profile_keys.is_empty()
        && actions.add_pending_members.is_empty()
        && actions.delete_pending_members.is_empty()
        && actions.promote_pending_members.is_empty()
        && actions.modify_title.is_none()
        && actions.modify_avatar.is_none()
        && actions.modify_disappearing_messages_timer.is_none()
        && actions.modify_attributes_access.is_none()
        && actions.modify_member_access.is_none()
        && actions.modify_add_from_invite_link_access.is_none()
        && actions.add_requesting_members.is_empty()
        && actions.delete_requesting_members.is_empty()
        && actions.promote_requesting_members.is_empty()
        && actions.modify_invite_link_password.is_none()
        && actions.modify_description.is_none()
        && actions.modify_announcements_only.is_none()
        && actions.add_banned_members.is_empty()
        && actions.delete_banned_members.is_empty()
        && actions.promote_pending_pni_aci_members.is_empty()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rstest::rstest;

    use groups_zk::ServiceId;

    use crate::apply::{self, apply};
    use crate::proto::group_change::actions::{
        AddBannedMemberAction, AddMemberAction, AddPendingMemberAction,
        AddRequestingMemberAction, DeleteBannedMemberAction, DeleteMemberAction,
        DeletePendingMemberAction, DeleteRequestingMemberAction,
        ModifyAddFromInviteLinkAccessControlAction, ModifyAnnouncementsOnlyAction,
        ModifyAttributesAccessControlAction, ModifyAvatarAction, ModifyDescriptionAction,
        ModifyDisappearingMessagesTimerAction, ModifyInviteLinkPasswordAction,
        ModifyMemberProfileKeyAction, ModifyMemberRoleAction, ModifyMembersAccessControlAction,
        ModifyTitleAction, PromotePendingPniAciMemberProfileKeyAction,
        PromoteRequestingMemberAction,
    };
    use crate::proto::{
        AccessControl, AccessRequired, DecryptedBannedMember, DecryptedGroup,
        DecryptedGroupChange, DecryptedMember, DecryptedString, DecryptedTimer, EnabledState,
        Role,
    };
    use crate::test_utils::{
        TestServer, admin, aci_bytes, approve_member, banned_member, demote_admin,
        max_declared_field_tag, member, member_with_profile_key, pending_member,
        pending_member_removal, pending_pni_member, pni_aci_member, profile_key, promote_admin,
        requesting_member, uuid,
    };

    use super::*;

    const ACTION_FIELDS: u32 = 24;
    const CHANGE_FIELDS: u32 = 24;
    const SNAPSHOT_FIELDS: u32 = 12;

    #[test]
    fn every_field_is_resolved() {
        assert_eq!(max_declared_field_tag::<Actions>(), ACTION_FIELDS);
        assert_eq!(max_declared_field_tag::<DecryptedGroupChange>(), CHANGE_FIELDS);
        assert_eq!(max_declared_field_tag::<DecryptedGroup>(), SNAPSHOT_FIELDS);
    }

    fn group() -> DecryptedGroup {
        DecryptedGroup {
            title: "Bouldering".into(),
            avatar: "avatars/1".into(),
            disappearing_messages_timer: Some(DecryptedTimer { duration: 60 }),
            access_control: Some(AccessControl {
                attributes: AccessRequired::Member.into(),
                members: AccessRequired::Member.into(),
                add_from_invite_link: AccessRequired::Unsatisfiable.into(),
            }),
            revision: 5,
            members: vec![admin(uuid(1)), member(uuid(2))],
            pending_members: vec![pending_member(uuid(3))],
            requesting_members: vec![requesting_member(uuid(4))],
            description: "Mondays".into(),
            is_announcement_group: EnabledState::Disabled.into(),
            banned_members: vec![banned_member(uuid(5), 100)],
            ..Default::default()
        }
    }

    fn change() -> DecryptedGroupChange {
        DecryptedGroupChange {
            editor_service_id_bytes: aci_bytes(uuid(1)),
            revision: 6,
            ..Default::default()
        }
    }

    #[test]
    fn unrelated_change_is_kept() {
        let change = DecryptedGroupChange {
            new_members: vec![member(uuid(10))],
            delete_members: vec![aci_bytes(uuid(2))],
            modify_member_roles: vec![promote_admin(uuid(2))],
            modified_profile_keys: vec![member_with_profile_key(uuid(2), vec![9; 32])],
            new_pending_members: vec![pending_member(uuid(11))],
            delete_pending_members: vec![pending_member_removal(uuid(3))],
            promote_pending_members: vec![member(uuid(3))],
            new_title: Some(DecryptedString {
                value: "Climbing".into(),
            }),
            new_timer: Some(DecryptedTimer { duration: 0 }),
            new_attribute_access: AccessRequired::Administrator.into(),
            new_requesting_members: vec![requesting_member(uuid(12))],
            delete_requesting_members: vec![aci_bytes(uuid(4))],
            promote_requesting_members: vec![approve_member(uuid(4))],
            new_invite_link_password: vec![1; 16],
            new_description: Some(DecryptedString {
                value: "Tuesdays".into(),
            }),
            new_is_announcement_group: EnabledState::Enabled.into(),
            new_banned_members: vec![banned_member(uuid(13), 0)],
            delete_banned_members: vec![banned_member(uuid(5), 0)],
            ..change()
        };

        assert_eq!(resolve_conflict_decrypted(&group(), &change), change);
    }

    #[test]
    fn field_3_add_existing_member_is_dropped() {
        let change = DecryptedGroupChange {
            new_members: vec![member(uuid(2)), member(uuid(10))],
            ..change()
        };

        let resolved = resolve_conflict_decrypted(&group(), &change);
        assert_eq!(resolved.new_members, vec![member(uuid(10))]);
    }

    #[test]
    fn field_3_add_of_invitee_becomes_promotion() {
        let change = DecryptedGroupChange {
            new_members: vec![member(uuid(3)), member(uuid(10))],
            ..change()
        };

        let resolved = resolve_conflict_decrypted(&group(), &change);
        assert_eq!(resolved.new_members, vec![member(uuid(10))]);
        assert_eq!(resolved.promote_pending_members, vec![member(uuid(3))]);
    }

    #[test]
    fn field_3_member_and_invitee_at_once_is_dropped() {
        let mut group = group();
        group.pending_members.push(pending_member(uuid(2)));
        let change = DecryptedGroupChange {
            new_members: vec![member(uuid(2))],
            ..change()
        };

        let resolved = resolve_conflict_decrypted(&group, &change);
        assert!(apply::change_is_empty(&resolved));
    }

    #[test]
    fn field_4_delete_of_non_member_is_dropped() {
        let change = DecryptedGroupChange {
            delete_members: vec![aci_bytes(uuid(10)), aci_bytes(uuid(2)), aci_bytes(uuid(3))],
            ..change()
        };

        let resolved = resolve_conflict_decrypted(&group(), &change);
        assert_eq!(resolved.delete_members, vec![aci_bytes(uuid(2))]);
    }

    #[test]
    fn field_5_role_changes() {
        let change = DecryptedGroupChange {
            modify_member_roles: vec![
                // Already admin.
                promote_admin(uuid(1)),
                demote_admin(uuid(2)),
                // Gone.
                promote_admin(uuid(10)),
                promote_admin(uuid(2)),
            ],
            ..change()
        };

        let resolved = resolve_conflict_decrypted(&group(), &change);
        assert_eq!(resolved.modify_member_roles, vec![promote_admin(uuid(2))]);
    }

    #[test]
    fn field_6_profile_keys() {
        let change = DecryptedGroupChange {
            modified_profile_keys: vec![
                member(uuid(1)),
                member_with_profile_key(uuid(2), vec![9; 32]),
                member_with_profile_key(uuid(10), vec![9; 32]),
            ],
            ..change()
        };

        let resolved = resolve_conflict_decrypted(&group(), &change);
        assert_eq!(
            resolved.modified_profile_keys,
            vec![member_with_profile_key(uuid(2), vec![9; 32])]
        );
    }

    #[test]
    fn field_7_invites() {
        let change = DecryptedGroupChange {
            new_pending_members: vec![
                pending_member(uuid(2)),
                pending_member(uuid(3)),
                pending_member(uuid(10)),
            ],
            ..change()
        };

        let resolved = resolve_conflict_decrypted(&group(), &change);
        assert_eq!(resolved.new_pending_members, vec![pending_member(uuid(10))]);
    }

    #[test]
    fn field_8_and_9_need_an_invite() {
        let change = DecryptedGroupChange {
            delete_pending_members: vec![pending_member_removal(uuid(10)), pending_member_removal(uuid(3))],
            promote_pending_members: vec![member(uuid(3)), member(uuid(11))],
            ..change()
        };

        let resolved = resolve_conflict_decrypted(&group(), &change);
        assert_eq!(resolved.delete_pending_members, vec![pending_member_removal(uuid(3))]);
        assert_eq!(resolved.promote_pending_members, vec![member(uuid(3))]);
    }

    #[test]
    fn field_8_matches_undecryptable_invites_by_ciphertext() {
        let mut group = group();
        group.pending_members[0].service_id_bytes.clear();
        let mut removal = pending_member_removal(uuid(3));
        removal.service_id_bytes.clear();
        let change = DecryptedGroupChange {
            delete_pending_members: vec![removal.clone()],
            ..change()
        };

        let resolved = resolve_conflict_decrypted(&group, &change);
        assert_eq!(resolved.delete_pending_members, vec![removal]);
    }

    #[test]
    fn attributes_equal_to_current_are_dropped() {
        let group = group();
        let change = DecryptedGroupChange {
            new_title: Some(DecryptedString {
                value: group.title.clone(),
            }),
            new_avatar: Some(DecryptedString {
                value: group.avatar.clone(),
            }),
            new_timer: group.disappearing_messages_timer.clone(),
            new_attribute_access: AccessRequired::Member.into(),
            new_member_access: AccessRequired::Member.into(),
            new_invite_link_access: AccessRequired::Unsatisfiable.into(),
            new_description: Some(DecryptedString {
                value: group.description.clone(),
            }),
            new_is_announcement_group: EnabledState::Disabled.into(),
            ..change()
        };

        let resolved = resolve_conflict_decrypted(&group, &change);
        assert!(apply::change_is_empty(&resolved));
    }

    #[test]
    fn field_16_join_requests() {
        let change = DecryptedGroupChange {
            new_requesting_members: vec![
                requesting_member(uuid(2)),
                requesting_member(uuid(3)),
                requesting_member(uuid(4)),
                requesting_member(uuid(10)),
            ],
            ..change()
        };

        let resolved = resolve_conflict_decrypted(&group(), &change);
        assert_eq!(resolved.new_requesting_members, vec![requesting_member(uuid(10))]);

        let mut promoted = member(uuid(3));
        promoted.joined_at_revision = 6;
        assert_eq!(resolved.promote_pending_members, vec![promoted]);
    }

    #[test]
    fn field_17_and_18_need_a_request() {
        let change = DecryptedGroupChange {
            delete_requesting_members: vec![aci_bytes(uuid(4)), aci_bytes(uuid(10))],
            promote_requesting_members: vec![approve_member(uuid(10)), approve_member(uuid(4))],
            ..change()
        };

        let resolved = resolve_conflict_decrypted(&group(), &change);
        assert_eq!(resolved.delete_requesting_members, vec![aci_bytes(uuid(4))]);
        assert_eq!(resolved.promote_requesting_members, vec![approve_member(uuid(4))]);
    }

    #[test]
    fn field_19_password_is_always_kept() {
        let mut group = group();
        group.invite_link_password = vec![1; 16];
        let change = DecryptedGroupChange {
            new_invite_link_password: vec![1; 16],
            ..change()
        };

        let resolved = resolve_conflict_decrypted(&group, &change);
        assert_eq!(resolved.new_invite_link_password, vec![1; 16]);
    }

    #[test]
    fn field_22_and_23_bans() {
        let change = DecryptedGroupChange {
            new_banned_members: vec![banned_member(uuid(5), 0), banned_member(uuid(10), 0)],
            delete_banned_members: vec![banned_member(uuid(11), 0), banned_member(uuid(5), 0)],
            ..change()
        };

        let resolved = resolve_conflict_decrypted(&group(), &change);
        assert_eq!(resolved.new_banned_members, vec![banned_member(uuid(10), 0)]);
        assert_eq!(resolved.delete_banned_members, vec![banned_member(uuid(5), 0)]);
    }

    #[test]
    fn field_24_accepted_pni_invite_of_existing_member_is_dropped() {
        let group = DecryptedGroup {
            pending_members: vec![pending_pni_member(uuid(12))],
            ..group()
        };
        let change = DecryptedGroupChange {
            promote_pending_pni_aci_members: vec![
                pni_aci_member(uuid(2), uuid(13)),
                pni_aci_member(uuid(10), uuid(12)),
            ],
            ..change()
        };

        let resolved = resolve_conflict_decrypted(&group, &change);
        assert_eq!(
            resolved.promote_pending_pni_aci_members,
            vec![pni_aci_member(uuid(10), uuid(12))]
        );
    }

    #[test]
    fn applied_change_resolves_to_nothing() {
        let group = group();
        let change = DecryptedGroupChange {
            new_members: vec![member(uuid(10))],
            delete_members: vec![aci_bytes(uuid(2))],
            modify_member_roles: vec![demote_admin(uuid(1))],
            modified_profile_keys: vec![member_with_profile_key(uuid(1), vec![9; 32])],
            new_pending_members: vec![pending_member(uuid(11))],
            promote_pending_members: vec![member(uuid(3))],
            new_title: Some(DecryptedString {
                value: "Climbing".into(),
            }),
            new_avatar: Some(DecryptedString {
                value: "avatars/2".into(),
            }),
            new_timer: Some(DecryptedTimer { duration: 3600 }),
            new_attribute_access: AccessRequired::Administrator.into(),
            new_member_access: AccessRequired::Administrator.into(),
            new_invite_link_access: AccessRequired::Any.into(),
            new_requesting_members: vec![requesting_member(uuid(12))],
            promote_requesting_members: vec![approve_member(uuid(4))],
            new_description: Some(DecryptedString {
                value: "Tuesdays".into(),
            }),
            new_is_announcement_group: EnabledState::Enabled.into(),
            new_banned_members: vec![banned_member(uuid(13), 0)],
            delete_banned_members: vec![banned_member(uuid(5), 0)],
            ..change()
        };

        let current = apply(&group, &change).unwrap();
        let resolved = resolve_conflict_decrypted(&current, &change);
        assert!(apply::change_is_empty(&resolved), "{resolved:?}");
    }

    #[test]
    fn outdated_proposal_resolves_to_nothing() {
        // m1 was removed and m2 made admin concurrently. The proposal to remove m1, make m2
        // admin and remove m4, who never was a member, has nothing left to do.
        let before = DecryptedGroup {
            revision: 5,
            members: vec![admin(uuid(1)), member(uuid(2)), member(uuid(3))],
            ..Default::default()
        };
        let applied = DecryptedGroupChange {
            revision: 6,
            delete_members: vec![aci_bytes(uuid(1))],
            modify_member_roles: vec![promote_admin(uuid(2))],
            ..Default::default()
        };
        let current = apply(&before, &applied).unwrap();

        let server = TestServer::new();
        let operations = server.group_operations();
        let mut actions = operations
            .create_remove_members_change(&[uuid(1), uuid(4)], false, &[])
            .unwrap();
        actions.modify_member_roles = operations
            .create_change_member_role(uuid(2), Role::Administrator)
            .unwrap()
            .modify_member_roles;
        let proposal = operations
            .decrypt_change_actions(&actions, Some(ServiceId::Aci(uuid(3))))
            .unwrap();

        let resolved = resolve_conflict(&current, &proposal, &actions);
        assert!(change_is_empty(&resolved));
        assert!(apply::change_is_empty(&resolve_conflict_decrypted(&current, &proposal)));
    }

    #[test]
    fn add_of_invitee_becomes_promotion_with_presentation() {
        let server = TestServer::new();
        let operations = server.group_operations();
        let group = DecryptedGroup {
            members: vec![admin(uuid(1))],
            pending_members: vec![pending_member(uuid(2))],
            ..Default::default()
        };

        let actions = operations
            .create_modify_group_membership_change(
                &[server.candidate(uuid(2)), server.candidate(uuid(3))],
                &HashSet::new(),
                uuid(1),
            )
            .unwrap();
        let proposal = operations
            .decrypt_change_actions(&actions, Some(ServiceId::Aci(uuid(1))))
            .unwrap();

        let resolved = resolve_conflict(&group, &proposal, &actions);
        assert_eq!(resolved.add_members, vec![actions.add_members[1].clone()]);
        assert_eq!(resolved.promote_pending_members.len(), 1);
        assert_eq!(
            resolved.promote_pending_members[0].presentation,
            actions.add_members[0].added.as_ref().unwrap().presentation
        );

        let decrypted = operations
            .decrypt_change_actions(&resolved, Some(ServiceId::Aci(uuid(1))))
            .unwrap();
        assert_eq!(decrypted.promote_pending_members.len(), 1);
        assert_eq!(decrypted.promote_pending_members[0].aci_bytes, aci_bytes(uuid(2)));
        assert_eq!(decrypted.promote_pending_members[0].profile_key, profile_key(uuid(2)));
    }

    #[test]
    fn ban_overflowing_ban_list() {
        let server = TestServer::new();
        let operations = server.group_operations();
        let already_banned: Vec<DecryptedBannedMember> = (0..10)
            .map(|i| banned_member(uuid(100 + i), 100 + i as u64))
            .rev()
            .collect();
        let group = DecryptedGroup {
            banned_members: already_banned.clone(),
            ..Default::default()
        };

        let actions = operations
            .create_ban_service_ids_change(
                &[ServiceId::Aci(uuid(1)), ServiceId::Pni(uuid(2))],
                false,
                &already_banned,
            )
            .unwrap();
        let proposal = operations
            .decrypt_change_actions(&actions, Some(ServiceId::Aci(uuid(3))))
            .unwrap();

        let resolved = resolve_conflict(&group, &proposal, &actions);
        assert_eq!(resolved.add_banned_members.len(), 2);
        assert_eq!(resolved.delete_banned_members.len(), 2);

        let decrypted = operations
            .decrypt_change_actions(&resolved, Some(ServiceId::Aci(uuid(3))))
            .unwrap();
        assert_eq!(
            decrypted.delete_banned_members,
            vec![banned_member(uuid(100), 0), banned_member(uuid(101), 0)]
        );
        assert_eq!(
            decrypted
                .new_banned_members
                .iter()
                .map(|banned| banned.service_id_bytes.clone())
                .collect::<Vec<_>>(),
            vec![aci_bytes(uuid(1)), ServiceId::Pni(uuid(2)).to_service_id_binary()]
        );
    }

    #[test]
    fn join_request_of_invitee_becomes_promotion_with_presentation() {
        let server = TestServer::new();
        let operations = server.group_operations();
        let group = DecryptedGroup {
            pending_members: vec![pending_member(uuid(2))],
            ..Default::default()
        };

        let actions = operations
            .create_group_join_request(&server.credential(uuid(2)))
            .unwrap();
        let proposal = operations
            .decrypt_change_actions(&actions, Some(ServiceId::Aci(uuid(2))))
            .unwrap();

        let resolved = resolve_conflict(&group, &proposal, &actions);
        assert!(resolved.add_requesting_members.is_empty());
        assert_eq!(
            resolved.promote_pending_members[0].presentation,
            actions.add_requesting_members[0].added.as_ref().unwrap().presentation
        );
    }

    #[test]
    fn empty_actions() {
        assert!(change_is_empty(&Actions::default()));
        assert!(change_is_empty(&Actions {
            source_service_id: vec![1; 57],
            revision: 7,
            ..Default::default()
        }));
    }

    #[rstest]
    #[case::add_members(Actions { add_members: vec![AddMemberAction::default()], ..Default::default() })]
    #[case::delete_members(Actions { delete_members: vec![DeleteMemberAction::default()], ..Default::default() })]
    #[case::modify_member_roles(Actions { modify_member_roles: vec![ModifyMemberRoleAction::default()], ..Default::default() })]
    #[case::modify_member_profile_keys(Actions { modify_member_profile_keys: vec![ModifyMemberProfileKeyAction::default()], ..Default::default() })]
    #[case::add_pending_members(Actions { add_pending_members: vec![AddPendingMemberAction::default()], ..Default::default() })]
    #[case::delete_pending_members(Actions { delete_pending_members: vec![DeletePendingMemberAction::default()], ..Default::default() })]
    #[case::promote_pending_members(Actions { promote_pending_members: vec![PromotePendingMemberAction::default()], ..Default::default() })]
    #[case::modify_title(Actions { modify_title: Some(ModifyTitleAction::default()), ..Default::default() })]
    #[case::modify_avatar(Actions { modify_avatar: Some(ModifyAvatarAction::default()), ..Default::default() })]
    #[case::modify_timer(Actions { modify_disappearing_messages_timer: Some(ModifyDisappearingMessagesTimerAction::default()), ..Default::default() })]
    #[case::modify_attributes_access(Actions { modify_attributes_access: Some(ModifyAttributesAccessControlAction::default()), ..Default::default() })]
    #[case::modify_member_access(Actions { modify_member_access: Some(ModifyMembersAccessControlAction::default()), ..Default::default() })]
    #[case::modify_link_access(Actions { modify_add_from_invite_link_access: Some(ModifyAddFromInviteLinkAccessControlAction::default()), ..Default::default() })]
    #[case::add_requesting_members(Actions { add_requesting_members: vec![AddRequestingMemberAction::default()], ..Default::default() })]
    #[case::delete_requesting_members(Actions { delete_requesting_members: vec![DeleteRequestingMemberAction::default()], ..Default::default() })]
    #[case::promote_requesting_members(Actions { promote_requesting_members: vec![PromoteRequestingMemberAction::default()], ..Default::default() })]
    #[case::modify_password(Actions { modify_invite_link_password: Some(ModifyInviteLinkPasswordAction::default()), ..Default::default() })]
    #[case::modify_description(Actions { modify_description: Some(ModifyDescriptionAction::default()), ..Default::default() })]
    #[case::modify_announcements_only(Actions { modify_announcements_only: Some(ModifyAnnouncementsOnlyAction::default()), ..Default::default() })]
    #[case::add_banned_members(Actions { add_banned_members: vec![AddBannedMemberAction::default()], ..Default::default() })]
    #[case::delete_banned_members(Actions { delete_banned_members: vec![DeleteBannedMemberAction::default()], ..Default::default() })]
    #[case::promote_pending_pni_aci_members(Actions { promote_pending_pni_aci_members: vec![PromotePendingPniAciMemberProfileKeyAction::default()], ..Default::default() })]
    fn any_slot_makes_actions_non_empty(#[case] actions: Actions) {
        assert!(!change_is_empty(&actions));
    }

    #[test]
    fn decrypted_promotion_of_requester() {
        let mut member = DecryptedMember::default();
        member.set_role(Role::Default);
        let mut change = change();
        change.new_requesting_members.push(requesting_member(uuid(3)));
        change.move_add_requesting_members_to_promote(0);

        member.aci_bytes = aci_bytes(uuid(3));
        member.profile_key = profile_key(uuid(3));
        member.joined_at_revision = 6;
        assert_eq!(change.promote_pending_members, vec![member]);
        assert!(change.new_requesting_members.is_empty());

        // Positions past the end are ignored.
        change.remove_add_members(3);
        change.move_add_to_promote(3);
    }
}
