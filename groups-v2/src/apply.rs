// SPDX-License-Identifier: MIT OR Apache-2.0

//! Applying decrypted group changes to decrypted group state.
//!
//! Changes are applied slot by slot in field order: members are added before they are removed,
//! pending members are added before they are removed or promoted, and so on. Entries which
//! refer to members the group never had fail the whole change, entries which only try to
//! remove something that is already gone are logged and skipped.
use tracing::warn;
use uuid::Uuid;

use groups_zk::ServiceId;

use crate::error::ApplyChangeError;
use crate::identifiers::parse_service_id;
use crate::proto::{
    AccessControl, AccessRequired, DecryptedApproveMember, DecryptedBannedMember,
    DecryptedGroup, DecryptedGroupChange, DecryptedMember, DecryptedModifyMemberRole,
    DecryptedPendingMember, DecryptedPendingMemberRemoval, DecryptedRequestingMember,
    EnabledState, Role,
};

/// Applies `change` to `group`, regardless of their revisions.
pub fn apply(
    group: &DecryptedGroup,
    change: &DecryptedGroupChange,
) -> Result<DecryptedGroup, ApplyChangeError> {
    let mut result = group.clone();
    result.revision = change.revision;

    apply_add_members(&mut result, &change.new_members);
    apply_delete_members(&mut result, &change.delete_members)?;
    apply_modify_member_roles(&mut result, &change.modify_member_roles)?;
    apply_modify_member_profile_keys(&mut result, &change.modified_profile_keys)?;
    apply_add_pending_members(&mut result, &change.new_pending_members)?;
    apply_delete_pending_members(&mut result, &change.delete_pending_members);
    apply_promote_pending_members(&mut result, &change.promote_pending_members)?;

    if let Some(title) = &change.new_title {
        result.title = title.value.clone();
    }

    if let Some(avatar) = &change.new_avatar {
        result.avatar = avatar.value.clone();
    }

    if let Some(timer) = &change.new_timer {
        result.disappearing_messages_timer = Some(timer.clone());
    }

    if change.new_attribute_access() != AccessRequired::Unknown {
        access_control(&mut result).attributes = change.new_attribute_access;
    }

    if change.new_member_access() != AccessRequired::Unknown {
        access_control(&mut result).members = change.new_member_access;
    }

    if change.new_invite_link_access() != AccessRequired::Unknown {
        access_control(&mut result).add_from_invite_link = change.new_invite_link_access;
    }

    apply_add_requesting_members(&mut result, &change.new_requesting_members);
    apply_delete_requesting_members(&mut result, &change.delete_requesting_members);
    apply_promote_requesting_members(
        &mut result,
        &change.promote_requesting_members,
        change.revision,
    )?;

    if !change.new_invite_link_password.is_empty() {
        result.invite_link_password = change.new_invite_link_password.clone();
    }

    if let Some(description) = &change.new_description {
        result.description = description.value.clone();
    }

    if change.new_is_announcement_group() != EnabledState::Unknown {
        result.is_announcement_group = change.new_is_announcement_group;
    }

    apply_add_banned_members(&mut result, &change.new_banned_members);
    apply_delete_banned_members(&mut result, &change.delete_banned_members);
    apply_promote_pending_pni_aci_members(&mut result, &change.promote_pending_pni_aci_members)?;

    Ok(result)
}

/// Applies `change` only if it moves `group` exactly one revision ahead.
pub fn apply_next(
    group: &DecryptedGroup,
    change: &DecryptedGroupChange,
) -> Result<DecryptedGroup, ApplyChangeError> {
    if group.revision.checked_add(1) != Some(change.revision) {
        return Err(ApplyChangeError::RevisionMismatch {
            group: group.revision,
            change: change.revision,
        });
    }

    apply(group, change)
}

/// Removes `aci` from members, pending and requesting members.
///
/// The revision is only updated when something was removed.
pub fn remove_member(group: &DecryptedGroup, aci: Uuid, revision: u32) -> DecryptedGroup {
    let aci_bytes = ServiceId::Aci(aci).to_service_id_binary();
    let mut result = group.clone();

    result.members.retain(|member| member.aci_bytes != aci_bytes);
    result
        .pending_members
        .retain(|pending| pending.service_id_bytes != aci_bytes);
    result
        .requesting_members
        .retain(|requesting| requesting.aci_bytes != aci_bytes);

    let removed = result.members.len() != group.members.len()
        || result.pending_members.len() != group.pending_members.len()
        || result.requesting_members.len() != group.requesting_members.len();

    if removed {
        result.revision = revision;
        result
    } else {
        group.clone()
    }
}

fn access_control(group: &mut DecryptedGroup) -> &mut AccessControl {
    group.access_control.get_or_insert_with(AccessControl::default)
}

fn display_id(bytes: &[u8]) -> String {
    parse_service_id(bytes)
        .map(|service_id| service_id.to_string())
        .unwrap_or_else(|_| hex::encode(bytes))
}

/// Roles a full member can hold.
fn member_role(role: i32) -> Result<Role, ApplyChangeError> {
    match Role::try_from(role) {
        Ok(role @ (Role::Default | Role::Administrator)) => Ok(role),
        _ => Err(ApplyChangeError::UnknownRole(role)),
    }
}

fn apply_add_members(group: &mut DecryptedGroup, new_members: &[DecryptedMember]) {
    for member in new_members {
        match group
            .members
            .iter_mut()
            .find(|existing| existing.aci_bytes == member.aci_bytes)
        {
            Some(existing) => *existing = member.clone(),
            None => group.members.push(member.clone()),
        }
    }

    // A direct add supersedes any invite or join request of the same account.
    group.pending_members.retain(|pending| {
        !new_members
            .iter()
            .any(|member| member.aci_bytes == pending.service_id_bytes)
    });
    group.requesting_members.retain(|requesting| {
        !new_members
            .iter()
            .any(|member| member.aci_bytes == requesting.aci_bytes)
    });
}

fn apply_delete_members(
    group: &mut DecryptedGroup,
    delete_members: &[Vec<u8>],
) -> Result<(), ApplyChangeError> {
    for aci_bytes in delete_members {
        let index = group
            .members
            .iter()
            .position(|member| &member.aci_bytes == aci_bytes)
            .ok_or_else(|| ApplyChangeError::MemberNotFound(display_id(aci_bytes)))?;
        group.members.remove(index);
    }
    Ok(())
}

fn find_member_mut<'a>(
    group: &'a mut DecryptedGroup,
    aci_bytes: &[u8],
) -> Result<&'a mut DecryptedMember, ApplyChangeError> {
    group
        .members
        .iter_mut()
        .find(|member| member.aci_bytes == aci_bytes)
        .ok_or_else(|| ApplyChangeError::MemberNotFound(display_id(aci_bytes)))
}

fn apply_modify_member_roles(
    group: &mut DecryptedGroup,
    modify_member_roles: &[DecryptedModifyMemberRole],
) -> Result<(), ApplyChangeError> {
    for modify in modify_member_roles {
        let role = member_role(modify.role)?;
        find_member_mut(group, &modify.aci_bytes)?.set_role(role);
    }
    Ok(())
}

fn apply_modify_member_profile_keys(
    group: &mut DecryptedGroup,
    modified_profile_keys: &[DecryptedMember],
) -> Result<(), ApplyChangeError> {
    for modified in modified_profile_keys {
        find_member_mut(group, &modified.aci_bytes)?.profile_key = modified.profile_key.clone();
    }
    Ok(())
}

fn apply_add_pending_members(
    group: &mut DecryptedGroup,
    new_pending_members: &[DecryptedPendingMember],
) -> Result<(), ApplyChangeError> {
    for pending in new_pending_members {
        let is_member = !pending.service_id_bytes.is_empty()
            && group
                .members
                .iter()
                .any(|member| member.aci_bytes == pending.service_id_bytes);
        if is_member {
            return Err(ApplyChangeError::AlreadyMember(display_id(
                &pending.service_id_bytes,
            )));
        }

        let is_pending = group
            .pending_members
            .iter()
            .any(|existing| existing.service_id_cipher_text == pending.service_id_cipher_text);
        if !is_pending {
            group.pending_members.push(pending.clone());
        }
    }
    Ok(())
}

fn apply_delete_pending_members(
    group: &mut DecryptedGroup,
    delete_pending_members: &[DecryptedPendingMemberRemoval],
) {
    for removal in delete_pending_members {
        match group
            .pending_members
            .iter()
            .position(|pending| pending.service_id_cipher_text == removal.service_id_cipher_text)
        {
            Some(index) => {
                group.pending_members.remove(index);
            }
            None => warn!(
                "deleted pending member {} not found in group",
                display_id(&removal.service_id_bytes)
            ),
        }
    }
}

fn apply_promote_pending_members(
    group: &mut DecryptedGroup,
    promote_pending_members: &[DecryptedMember],
) -> Result<(), ApplyChangeError> {
    for member in promote_pending_members {
        let index = group
            .pending_members
            .iter()
            .position(|pending| pending.service_id_bytes == member.aci_bytes)
            .ok_or_else(|| ApplyChangeError::PendingMemberNotFound(display_id(&member.aci_bytes)))?;
        group.pending_members.remove(index);
        group.members.push(member.clone());
    }
    Ok(())
}

/// Invites addressed to a PNI are accepted by the account behind it, matched by the PNI.
fn apply_promote_pending_pni_aci_members(
    group: &mut DecryptedGroup,
    promote_pending_pni_aci_members: &[DecryptedMember],
) -> Result<(), ApplyChangeError> {
    for member in promote_pending_pni_aci_members {
        let index = group
            .pending_members
            .iter()
            .position(|pending| pending.service_id_bytes == member.pni_bytes)
            .ok_or_else(|| ApplyChangeError::PendingMemberNotFound(display_id(&member.pni_bytes)))?;
        group.pending_members.remove(index);
        group.members.push(member.clone());
    }
    Ok(())
}

fn apply_add_requesting_members(
    group: &mut DecryptedGroup,
    new_requesting_members: &[DecryptedRequestingMember],
) {
    group
        .requesting_members
        .extend(new_requesting_members.iter().cloned());
}

fn apply_delete_requesting_members(group: &mut DecryptedGroup, delete_requesting: &[Vec<u8>]) {
    for aci_bytes in delete_requesting {
        match group
            .requesting_members
            .iter()
            .position(|requesting| &requesting.aci_bytes == aci_bytes)
        {
            Some(index) => {
                group.requesting_members.remove(index);
            }
            None => warn!(
                "deleted requesting member {} not found in group",
                display_id(aci_bytes)
            ),
        }
    }
}

fn apply_promote_requesting_members(
    group: &mut DecryptedGroup,
    promote_requesting_members: &[DecryptedApproveMember],
    revision: u32,
) -> Result<(), ApplyChangeError> {
    for approve in promote_requesting_members {
        let role = if approve.role == i32::from(Role::Unknown) {
            Role::Default
        } else {
            member_role(approve.role)?
        };

        let Some(index) = group
            .requesting_members
            .iter()
            .position(|requesting| requesting.aci_bytes == approve.aci_bytes)
        else {
            warn!(
                "approved requesting member {} not found in group",
                display_id(&approve.aci_bytes)
            );
            continue;
        };

        let requesting = group.requesting_members.remove(index);
        let mut member = DecryptedMember {
            aci_bytes: requesting.aci_bytes,
            profile_key: requesting.profile_key,
            joined_at_revision: revision,
            ..Default::default()
        };
        member.set_role(role);
        group.members.push(member);
    }
    Ok(())
}

fn apply_add_banned_members(group: &mut DecryptedGroup, new_banned: &[DecryptedBannedMember]) {
    for banned in new_banned {
        let is_banned = group
            .banned_members
            .iter()
            .any(|existing| existing.service_id_bytes == banned.service_id_bytes);
        if is_banned {
            warn!(
                "banned member {} already on the ban list",
                display_id(&banned.service_id_bytes)
            );
            continue;
        }
        group.banned_members.push(banned.clone());
    }
}

fn apply_delete_banned_members(group: &mut DecryptedGroup, delete_banned: &[DecryptedBannedMember]) {
    for unbanned in delete_banned {
        match group
            .banned_members
            .iter()
            .position(|banned| banned.service_id_bytes == unbanned.service_id_bytes)
        {
            Some(index) => {
                group.banned_members.remove(index);
            }
            None => warn!(
                "unbanned member {} not found on the ban list",
                display_id(&unbanned.service_id_bytes)
            ),
        }
    }
}

/// True when no slot of the change is set. The revision and editor don't count.
pub fn change_is_empty(change: &DecryptedGroupChange) -> bool {
    change.modified_profile_keys.is_empty() && change_is_empty_except_for_profile_key_changes(change)
}

/// True when nothing but profile keys (slot 6) change.
pub fn change_is_empty_except_for_profile_key_changes(change: &DecryptedGroupChange) -> bool {
    change.new_banned_members.is_empty()
        && change.delete_banned_members.is_empty()
        && membership_and_attributes_unchanged(change)
}

/// True when the ban list changes, optionally alongside profile keys, and nothing else.
pub fn change_is_empty_except_for_ban_changes_and_optional_profile_key_changes(
    change: &DecryptedGroupChange,
) -> bool {
    (!change.new_banned_members.is_empty() || !change.delete_banned_members.is_empty())
        && membership_and_attributes_unchanged(change)
}

/// Changes nobody needs to be notified about.
pub fn change_is_silent(change: &DecryptedGroupChange) -> bool {
    change_is_empty_except_for_profile_key_changes(change)
        || change_is_empty_except_for_ban_changes_and_optional_profile_key_changes(change)
}

/// Every slot except profile keys (6) and bans (22, 23).
fn membership_and_attributes_unchanged(change: &DecryptedGroupChange) -> bool {
    change.new_members.is_empty()
        && change.delete_members.is_empty()
        && change.modify_member_roles.is_empty()
        && change.new_pending_members.is_empty()
        && change.delete_pending_members.is_empty()
        && change.promote_pending_members.is_empty()
        && change.new_title.is_none()
        && change.new_avatar.is_none()
        && change.new_timer.is_none()
        && change.new_attribute_access() == AccessRequired::Unknown
        && change.new_member_access() == AccessRequired::Unknown
        && change.new_invite_link_access() == AccessRequired::Unknown
        && change.new_requesting_members.is_empty()
        && change.delete_requesting_members.is_empty()
        && change.promote_requesting_members.is_empty()
        && change.new_invite_link_password.is_empty()
        && change.new_description.is_none()
        && change.new_is_announcement_group() == EnabledState::Unknown
        && change.promote_pending_pni_aci_members.is_empty()
}
