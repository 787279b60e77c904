// SPDX-License-Identifier: MIT OR Apache-2.0

//! Encrypting group change intents and decrypting group state.
//!
//! [`GroupsV2Operations`] holds what is shared by all groups of a client: the server's public
//! parameters, the configuration and a random number generator. [`GroupOperations`] binds it to
//! one group's secret parameters:
//!
//! ```text
//! let operations = GroupsV2Operations::new(server_public_params, GroupsV2Config::default());
//! let group_operations = operations.for_group(&group_secret_params);
//!
//! let actions = group_operations.create_modify_group_title("Climbing")?;
//! // .. submit actions, receive the server's signed change ..
//! let change = group_operations.decrypt_change(&group_change, true)?;
//! ```
//!
//! Builders only encrypt, they don't check the intent against any group state. Identifiers in
//! list fields which can't be decrypted are kept as empty bytes next to their ciphertext, while
//! identifiers tied to a member's profile key must decrypt, otherwise the whole record is
//! rejected with [`GroupOperationsError::InvalidGroupState`].
use std::collections::HashSet;

use prost::Message;
use tracing::warn;
use uuid::Uuid;

use groups_zk::crypto::Rng;
use groups_zk::{
    ClientZkGroupCipher, ClientZkProfileOperations, ExpiringProfileKeyCredential,
    GroupPublicParams, GroupSecretParams, NotarySignature, ProfileKey, ProfileKeyCiphertext,
    ProfileKeyCredentialPresentation, ServerPublicParams, ServiceId, UuidCiphertext,
};

use crate::config::GroupsV2Config;
use crate::error::GroupOperationsError;
use crate::identifiers::parse_service_id;
use crate::proto::group_attribute_blob::Content;
use crate::proto::group_change::Actions;
use crate::proto::group_change::actions::{
    AddBannedMemberAction, AddMemberAction, AddPendingMemberAction, AddRequestingMemberAction,
    DeleteBannedMemberAction, DeleteMemberAction, DeletePendingMemberAction,
    DeleteRequestingMemberAction, ModifyAddFromInviteLinkAccessControlAction,
    ModifyAnnouncementsOnlyAction, ModifyAttributesAccessControlAction, ModifyAvatarAction,
    ModifyDescriptionAction, ModifyDisappearingMessagesTimerAction,
    ModifyInviteLinkPasswordAction, ModifyMemberProfileKeyAction, ModifyMemberRoleAction,
    ModifyMembersAccessControlAction, ModifyTitleAction, PromotePendingMemberAction,
    PromotePendingPniAciMemberProfileKeyAction, PromoteRequestingMemberAction,
};
use crate::proto::{
    AccessControl, AccessRequired, BannedMember, DecryptedApproveMember, DecryptedBannedMember,
    DecryptedGroup, DecryptedGroupChange, DecryptedGroupJoinInfo, DecryptedMember,
    DecryptedModifyMemberRole, DecryptedPendingMember, DecryptedPendingMemberRemoval,
    DecryptedRequestingMember, DecryptedString, DecryptedTimer, EnabledState, Group,
    GroupAttributeBlob, GroupChange, GroupJoinInfo, Member, PendingMember, RequestingMember,
    Role,
};

/// Someone to be added to a group.
///
/// Candidates with a profile key credential can be added as full members, all others are
/// invited.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupCandidate {
    pub service_id: ServiceId,
    pub credential: Option<ExpiringProfileKeyCredential>,
}

impl GroupCandidate {
    pub fn new(service_id: ServiceId) -> Self {
        Self {
            service_id,
            credential: None,
        }
    }

    pub fn with_credential(credential: ExpiringProfileKeyCredential) -> Self {
        Self {
            service_id: ServiceId::Aci(credential.aci()),
            credential: Some(credential),
        }
    }
}

/// A freshly created group, ready to be uploaded.
#[derive(Clone, Debug)]
pub struct NewGroup {
    pub group_secret_params: GroupSecretParams,
    pub group: Group,
}

#[derive(Debug)]
pub struct GroupsV2Operations {
    server_public_params: ServerPublicParams,
    client_zk_profile_operations: ClientZkProfileOperations,
    config: GroupsV2Config,
    rng: Rng,
}

impl GroupsV2Operations {
    pub fn new(server_public_params: ServerPublicParams, config: GroupsV2Config) -> Self {
        Self::new_inner(server_public_params, config, Rng::default())
    }

    #[cfg(any(test, feature = "test_utils"))]
    pub fn new_with_rng(
        server_public_params: ServerPublicParams,
        config: GroupsV2Config,
        rng: Rng,
    ) -> Self {
        Self::new_inner(server_public_params, config, rng)
    }

    fn new_inner(server_public_params: ServerPublicParams, config: GroupsV2Config, rng: Rng) -> Self {
        Self {
            server_public_params,
            client_zk_profile_operations: ClientZkProfileOperations::new(server_public_params),
            config,
            rng,
        }
    }

    pub fn config(&self) -> &GroupsV2Config {
        &self.config
    }

    pub fn for_group(&self, group_secret_params: &GroupSecretParams) -> GroupOperations<'_> {
        GroupOperations {
            operations: self,
            group_secret_params: group_secret_params.clone(),
            group_public_params: group_secret_params.get_public_params(),
            cipher: ClientZkGroupCipher::new(group_secret_params.clone()),
        }
    }

    /// Creates the encrypted state of a new group at revision 0 under fresh secret parameters.
    ///
    /// `self_candidate` becomes the only administrator and needs a credential. Other candidates
    /// with a credential join with `member_role`, the rest are invited by `self_candidate`.
    pub fn create_new_group(
        &self,
        title: &str,
        avatar: Option<&str>,
        disappearing_messages_timer: u32,
        self_candidate: &GroupCandidate,
        members: &[GroupCandidate],
        member_role: Role,
    ) -> Result<NewGroup, GroupOperationsError> {
        let size = members.len() + 1;
        if size > self.config.max_group_size {
            return Err(GroupOperationsError::GroupTooLarge {
                size,
                max: self.config.max_group_size,
            });
        }

        let self_credential = self_candidate.credential.as_ref().ok_or_else(|| {
            GroupOperationsError::MissingCredential(self_candidate.service_id.to_string())
        })?;

        let group_secret_params = GroupSecretParams::generate(&self.rng)?;
        let group_operations = self.for_group(&group_secret_params);
        let added_by = group_operations.encrypt_service_id(self_candidate.service_id)?;

        let mut group = Group {
            public_key: group_secret_params.get_public_params().to_bytes().to_vec(),
            title: group_operations.encrypt_title(title)?,
            avatar: avatar.unwrap_or_default().to_owned(),
            disappearing_messages_timer: group_operations
                .encrypt_timer(disappearing_messages_timer)?,
            access_control: Some(AccessControl {
                attributes: AccessRequired::Member.into(),
                members: AccessRequired::Member.into(),
                add_from_invite_link: AccessRequired::Unsatisfiable.into(),
            }),
            revision: 0,
            ..Default::default()
        };

        group
            .members
            .push(group_operations.member_from_credential(self_credential, Role::Administrator)?);

        for candidate in members {
            match &candidate.credential {
                Some(credential) => group
                    .members
                    .push(group_operations.member_from_credential(credential, member_role)?),
                None => group.pending_members.push(group_operations.pending_member(
                    candidate.service_id,
                    member_role,
                    &added_by,
                )?),
            }
        }

        Ok(NewGroup {
            group_secret_params,
            group,
        })
    }
}

/// Operations on one group, see [`GroupsV2Operations::for_group`].
#[derive(Debug)]
pub struct GroupOperations<'a> {
    operations: &'a GroupsV2Operations,
    group_secret_params: GroupSecretParams,
    group_public_params: GroupPublicParams,
    cipher: ClientZkGroupCipher,
}

impl GroupOperations<'_> {
    pub fn create_modify_group_title(&self, title: &str) -> Result<Actions, GroupOperationsError> {
        Ok(Actions {
            modify_title: Some(ModifyTitleAction {
                title: self.encrypt_title(title)?,
            }),
            ..Default::default()
        })
    }

    pub fn create_modify_group_description(
        &self,
        description: &str,
    ) -> Result<Actions, GroupOperationsError> {
        Ok(Actions {
            modify_description: Some(ModifyDescriptionAction {
                description: self.encrypt_description(description)?,
            }),
            ..Default::default()
        })
    }

    /// `avatar` is the storage key of the encrypted avatar, not the image itself.
    pub fn create_modify_group_avatar(&self, avatar: &str) -> Actions {
        Actions {
            modify_avatar: Some(ModifyAvatarAction {
                avatar: avatar.to_owned(),
            }),
            ..Default::default()
        }
    }

    pub fn create_modify_group_timer_change(
        &self,
        timer_duration_seconds: u32,
    ) -> Result<Actions, GroupOperationsError> {
        Ok(Actions {
            modify_disappearing_messages_timer: Some(ModifyDisappearingMessagesTimerAction {
                timer: self.encrypt_timer(timer_duration_seconds)?,
            }),
            ..Default::default()
        })
    }

    /// Adds candidates with a credential as members and invites the others.
    ///
    /// Banned candidates are unbanned in the same change.
    pub fn create_modify_group_membership_change(
        &self,
        candidates: &[GroupCandidate],
        banned_members: &HashSet<ServiceId>,
        self_aci: Uuid,
    ) -> Result<Actions, GroupOperationsError> {
        let added_by = self.encrypt_service_id(ServiceId::Aci(self_aci))?;
        let mut actions = Actions::default();

        for candidate in candidates {
            let user_id = self.encrypt_service_id(candidate.service_id)?;

            if banned_members.contains(&candidate.service_id) {
                actions.delete_banned_members.push(DeleteBannedMemberAction {
                    deleted_user_id: user_id.to_vec(),
                });
            }

            match &candidate.credential {
                Some(credential) => actions.add_members.push(AddMemberAction {
                    added: Some(self.member_from_credential(credential, Role::Default)?),
                    join_from_invite_link: false,
                }),
                None => actions.add_pending_members.push(AddPendingMemberAction {
                    added: Some(self.pending_member(
                        candidate.service_id,
                        Role::Default,
                        &added_by,
                    )?),
                }),
            }
        }

        Ok(actions)
    }

    /// Asks an administrator to let us in through the invite link.
    pub fn create_group_join_request(
        &self,
        credential: &ExpiringProfileKeyCredential,
    ) -> Result<Actions, GroupOperationsError> {
        let presentation = self.presentation_bytes(credential)?;
        Ok(Actions {
            add_requesting_members: vec![AddRequestingMemberAction {
                added: Some(RequestingMember {
                    presentation,
                    ..Default::default()
                }),
            }],
            ..Default::default()
        })
    }

    /// Joins through an invite link which doesn't need approval.
    pub fn create_group_join_direct(
        &self,
        credential: &ExpiringProfileKeyCredential,
    ) -> Result<Actions, GroupOperationsError> {
        Ok(Actions {
            add_members: vec![AddMemberAction {
                added: Some(self.member_from_credential(credential, Role::Default)?),
                join_from_invite_link: true,
            }],
            ..Default::default()
        })
    }

    pub fn create_refuse_group_join_request(
        &self,
        requesters: &[Uuid],
        also_ban: bool,
        banned_members: &[DecryptedBannedMember],
    ) -> Result<Actions, GroupOperationsError> {
        let mut actions = if also_ban {
            let to_ban: Vec<ServiceId> = requesters.iter().copied().map(ServiceId::Aci).collect();
            self.create_ban_service_ids_change(&to_ban, false, banned_members)?
        } else {
            Actions::default()
        };

        for aci in requesters {
            actions
                .delete_requesting_members
                .push(DeleteRequestingMemberAction {
                    deleted_user_id: self.encrypt_service_id(ServiceId::Aci(*aci))?.to_vec(),
                });
        }

        Ok(actions)
    }

    pub fn create_approve_group_join_request(
        &self,
        requesters: &[Uuid],
    ) -> Result<Actions, GroupOperationsError> {
        let mut actions = Actions::default();
        for aci in requesters {
            actions
                .promote_requesting_members
                .push(PromoteRequestingMemberAction {
                    user_id: self.encrypt_service_id(ServiceId::Aci(*aci))?.to_vec(),
                    role: Role::Default.into(),
                });
        }
        Ok(actions)
    }

    pub fn create_remove_members_change(
        &self,
        members: &[Uuid],
        also_ban: bool,
        banned_members: &[DecryptedBannedMember],
    ) -> Result<Actions, GroupOperationsError> {
        let mut actions = if also_ban {
            let to_ban: Vec<ServiceId> = members.iter().copied().map(ServiceId::Aci).collect();
            self.create_ban_service_ids_change(&to_ban, false, banned_members)?
        } else {
            Actions::default()
        };

        for aci in members {
            actions.delete_members.push(DeleteMemberAction {
                deleted_user_id: self.encrypt_service_id(ServiceId::Aci(*aci))?.to_vec(),
            });
        }

        Ok(actions)
    }

    /// Leaves the group, handing administrator rights to `new_admins` first.
    pub fn create_leave_and_promote_members_to_admin(
        &self,
        self_aci: Uuid,
        new_admins: &[Uuid],
    ) -> Result<Actions, GroupOperationsError> {
        let mut actions = self.create_remove_members_change(&[self_aci], false, &[])?;
        for aci in new_admins {
            actions.modify_member_roles.push(ModifyMemberRoleAction {
                user_id: self.encrypt_service_id(ServiceId::Aci(*aci))?.to_vec(),
                role: Role::Administrator.into(),
            });
        }
        Ok(actions)
    }

    pub fn create_change_member_role(
        &self,
        aci: Uuid,
        role: Role,
    ) -> Result<Actions, GroupOperationsError> {
        Ok(Actions {
            modify_member_roles: vec![ModifyMemberRoleAction {
                user_id: self.encrypt_service_id(ServiceId::Aci(aci))?.to_vec(),
                role: role.into(),
            }],
            ..Default::default()
        })
    }

    pub fn create_update_profile_key_credential_change(
        &self,
        credential: &ExpiringProfileKeyCredential,
    ) -> Result<Actions, GroupOperationsError> {
        Ok(Actions {
            modify_member_profile_keys: vec![ModifyMemberProfileKeyAction {
                presentation: self.presentation_bytes(credential)?,
                ..Default::default()
            }],
            ..Default::default()
        })
    }

    pub fn create_accept_invite_change(
        &self,
        credential: &ExpiringProfileKeyCredential,
    ) -> Result<Actions, GroupOperationsError> {
        Ok(Actions {
            promote_pending_members: vec![PromotePendingMemberAction {
                presentation: self.presentation_bytes(credential)?,
                ..Default::default()
            }],
            ..Default::default()
        })
    }

    /// Accepts an invite sent to our phone number identity, joining with our account identity.
    pub fn create_accept_pni_invite_change(
        &self,
        credential: &ExpiringProfileKeyCredential,
    ) -> Result<Actions, GroupOperationsError> {
        Ok(Actions {
            promote_pending_pni_aci_members: vec![PromotePendingPniAciMemberProfileKeyAction {
                presentation: self.presentation_bytes(credential)?,
                ..Default::default()
            }],
            ..Default::default()
        })
    }

    /// Revokes invites, addressed by their ciphertext as the invitee may not be decryptable.
    pub fn create_remove_invitation_change(&self, invitations: &[UuidCiphertext]) -> Actions {
        Actions {
            delete_pending_members: invitations
                .iter()
                .map(|ciphertext| DeletePendingMemberAction {
                    deleted_user_id: ciphertext.to_vec(),
                })
                .collect(),
            ..Default::default()
        }
    }

    pub fn create_modify_group_link_password_change(&self, password: &[u8]) -> Actions {
        Actions {
            modify_invite_link_password: Some(ModifyInviteLinkPasswordAction {
                invite_link_password: password.to_vec(),
            }),
            ..Default::default()
        }
    }

    pub fn create_modify_group_link_password_and_rights_change(
        &self,
        password: &[u8],
        access: AccessRequired,
    ) -> Actions {
        let mut actions = self.create_modify_group_link_password_change(password);
        actions.modify_add_from_invite_link_access =
            Some(ModifyAddFromInviteLinkAccessControlAction {
                add_from_invite_link_access: access.into(),
            });
        actions
    }

    pub fn create_change_join_by_link_rights(&self, access: AccessRequired) -> Actions {
        Actions {
            modify_add_from_invite_link_access: Some(ModifyAddFromInviteLinkAccessControlAction {
                add_from_invite_link_access: access.into(),
            }),
            ..Default::default()
        }
    }

    pub fn create_change_membership_rights(&self, access: AccessRequired) -> Actions {
        Actions {
            modify_member_access: Some(ModifyMembersAccessControlAction {
                members_access: access.into(),
            }),
            ..Default::default()
        }
    }

    pub fn create_change_attributes_rights(&self, access: AccessRequired) -> Actions {
        Actions {
            modify_attributes_access: Some(ModifyAttributesAccessControlAction {
                attributes_access: access.into(),
            }),
            ..Default::default()
        }
    }

    pub fn create_announcement_group_change(&self, announcements_only: bool) -> Actions {
        Actions {
            modify_announcements_only: Some(ModifyAnnouncementsOnlyAction { announcements_only }),
            ..Default::default()
        }
    }

    /// Bans `to_ban`, evicting the oldest entries of `already_banned` when the ban list would
    /// overflow.
    ///
    /// Evicted entries are picked by ascending timestamp, entries with equal timestamps in the
    /// order they are given. With `reject_join_requests` pending join requests of banned ACIs
    /// are refused in the same change.
    pub fn create_ban_service_ids_change(
        &self,
        to_ban: &[ServiceId],
        reject_join_requests: bool,
        already_banned: &[DecryptedBannedMember],
    ) -> Result<Actions, GroupOperationsError> {
        let mut actions = Actions::default();

        let spaces_to_free = (already_banned.len() + to_ban.len())
            .saturating_sub(self.operations.config.max_banned_members);
        if spaces_to_free > 0 {
            let mut oldest: Vec<&DecryptedBannedMember> = already_banned.iter().collect();
            oldest.sort_by_key(|banned| banned.timestamp);

            // Entries we can't read are left alone, the next oldest ones make room instead.
            let evictable = oldest.into_iter().filter_map(|banned| {
                match parse_service_id(&banned.service_id_bytes) {
                    Ok(service_id) => Some(service_id),
                    Err(err) => {
                        warn!("skipping unreadable entry of the ban list: {err}");
                        None
                    }
                }
            });

            for service_id in evictable.take(spaces_to_free) {
                actions.delete_banned_members.push(DeleteBannedMemberAction {
                    deleted_user_id: self.encrypt_service_id(service_id)?.to_vec(),
                });
            }
        }

        for service_id in to_ban {
            let user_id = self.encrypt_service_id(*service_id)?.to_vec();

            if reject_join_requests && service_id.is_aci() {
                actions
                    .delete_requesting_members
                    .push(DeleteRequestingMemberAction {
                        deleted_user_id: user_id.clone(),
                    });
            }

            actions.add_banned_members.push(AddBannedMemberAction {
                added: Some(BannedMember {
                    user_id,
                    timestamp: 0,
                }),
            });
        }

        Ok(actions)
    }

    pub fn create_unban_service_ids_change(
        &self,
        service_ids: &[ServiceId],
    ) -> Result<Actions, GroupOperationsError> {
        let mut actions = Actions::default();
        for service_id in service_ids {
            actions.delete_banned_members.push(DeleteBannedMemberAction {
                deleted_user_id: self.encrypt_service_id(*service_id)?.to_vec(),
            });
        }
        Ok(actions)
    }

    /// Replaces the member of every add-member action with a fresh presentation of the
    /// candidate at the same position.
    pub fn replace_add_members(
        &self,
        actions: &Actions,
        candidates: &[GroupCandidate],
    ) -> Result<Actions, GroupOperationsError> {
        if actions.add_members.len() != candidates.len() {
            return Err(GroupOperationsError::CandidateMismatch {
                actions: actions.add_members.len(),
                candidates: candidates.len(),
            });
        }

        let mut result = actions.clone();
        for (add_member, candidate) in result.add_members.iter_mut().zip(candidates) {
            let credential = candidate.credential.as_ref().ok_or_else(|| {
                GroupOperationsError::MissingCredential(candidate.service_id.to_string())
            })?;
            let role = add_member
                .added
                .as_ref()
                .map(|member| member.role())
                .unwrap_or(Role::Default);
            add_member.added = Some(self.member_from_credential(credential, role)?);
        }

        Ok(result)
    }

    /// Decrypts the full state of a group.
    pub fn decrypt_group(&self, group: &Group) -> Result<DecryptedGroup, GroupOperationsError> {
        let members = group
            .members
            .iter()
            .map(|member| self.decrypt_member(member, member.joined_at_revision))
            .collect::<Result<Vec<_>, _>>()?;

        let pending_members = group
            .pending_members
            .iter()
            .map(|pending| self.decrypt_pending_member(pending))
            .collect::<Result<Vec<_>, _>>()?;

        let requesting_members = group
            .requesting_members
            .iter()
            .map(|requesting| self.decrypt_requesting_member(requesting))
            .collect::<Result<Vec<_>, _>>()?;

        let banned_members = group
            .banned_members
            .iter()
            .map(|banned| {
                self.decrypt_service_id_or_unknown(&banned.user_id)
                    .map(|service_id_bytes| DecryptedBannedMember {
                        service_id_bytes,
                        timestamp: banned.timestamp,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DecryptedGroup {
            title: self.decrypt_title(&group.title),
            avatar: group.avatar.clone(),
            disappearing_messages_timer: Some(DecryptedTimer {
                duration: self.decrypt_timer(&group.disappearing_messages_timer),
            }),
            access_control: group.access_control.clone(),
            revision: group.revision,
            members,
            pending_members,
            requesting_members,
            invite_link_password: group.invite_link_password.clone(),
            description: self.decrypt_description(&group.description),
            is_announcement_group: announcement_state(group.announcements_only).into(),
            banned_members,
        })
    }

    /// Decrypts a change received from the server.
    ///
    /// Returns `None` for changes of a newer epoch than we understand. With `verify_signature`
    /// the server's signature over the encoded actions is checked before decoding them.
    pub fn decrypt_change(
        &self,
        change: &GroupChange,
        verify_signature: bool,
    ) -> Result<Option<DecryptedGroupChange>, GroupOperationsError> {
        if change.change_epoch > self.operations.config.highest_known_epoch {
            warn!(
                "ignoring group change of epoch {}, highest known epoch is {}",
                change.change_epoch, self.operations.config.highest_known_epoch
            );
            return Ok(None);
        }

        if verify_signature {
            let signature = NotarySignature::try_from(change.server_signature.as_slice())
                .map_err(|err| GroupOperationsError::VerificationFailed(err.into()))?;
            self.operations
                .server_public_params
                .verify_signature(&change.actions, &signature)
                .map_err(GroupOperationsError::VerificationFailed)?;
        }

        let actions = Actions::decode(change.actions.as_slice())?;
        self.decrypt_change_actions(&actions, None).map(Some)
    }

    /// Decrypts change actions, entry by entry in the same order.
    ///
    /// When the editor is already known, pass it as `source` and the encrypted source in the
    /// actions is not looked at.
    pub fn decrypt_change_actions(
        &self,
        actions: &Actions,
        source: Option<ServiceId>,
    ) -> Result<DecryptedGroupChange, GroupOperationsError> {
        let editor = match source {
            Some(service_id) => service_id,
            None => self.decrypt_service_id_strict(&actions.source_service_id, "editor")?,
        };

        let mut change = DecryptedGroupChange {
            editor_service_id_bytes: editor.to_service_id_binary(),
            revision: actions.revision,
            ..Default::default()
        };

        // 3
        for add_member in &actions.add_members {
            let member = add_member
                .added
                .as_ref()
                .ok_or_else(|| GroupOperationsError::invalid("added member", "missing"))?;
            change
                .new_members
                .push(self.decrypt_member(member, actions.revision)?);
        }

        // 4
        for delete_member in &actions.delete_members {
            let aci = self.decrypt_aci_strict(&delete_member.deleted_user_id, "deleted member")?;
            change
                .delete_members
                .push(ServiceId::Aci(aci).to_service_id_binary());
        }

        // 5
        for modify_role in &actions.modify_member_roles {
            let aci = self.decrypt_aci_strict(&modify_role.user_id, "modified member")?;
            change.modify_member_roles.push(DecryptedModifyMemberRole {
                aci_bytes: ServiceId::Aci(aci).to_service_id_binary(),
                role: modify_role.role,
            });
        }

        // 6
        for modify_profile_key in &actions.modify_member_profile_keys {
            let (aci, profile_key) = self.decrypt_identity(
                &modify_profile_key.user_id,
                &modify_profile_key.profile_key,
                &modify_profile_key.presentation,
            )?;
            change.modified_profile_keys.push(DecryptedMember {
                aci_bytes: ServiceId::Aci(aci).to_service_id_binary(),
                profile_key: profile_key.to_bytes().to_vec(),
                ..Default::default()
            });
        }

        // 7
        for add_pending in &actions.add_pending_members {
            let pending = add_pending
                .added
                .as_ref()
                .ok_or_else(|| GroupOperationsError::invalid("added pending member", "missing"))?;
            change
                .new_pending_members
                .push(self.decrypt_pending_member(pending)?);
        }

        // 8
        for delete_pending in &actions.delete_pending_members {
            change
                .delete_pending_members
                .push(DecryptedPendingMemberRemoval {
                    service_id_bytes: self
                        .decrypt_service_id_or_unknown(&delete_pending.deleted_user_id)?,
                    service_id_cipher_text: delete_pending.deleted_user_id.clone(),
                });
        }

        // 9
        for promote_pending in &actions.promote_pending_members {
            let (aci, profile_key) = self.decrypt_identity(
                &promote_pending.user_id,
                &promote_pending.profile_key,
                &promote_pending.presentation,
            )?;
            let mut member = DecryptedMember {
                aci_bytes: ServiceId::Aci(aci).to_service_id_binary(),
                profile_key: profile_key.to_bytes().to_vec(),
                joined_at_revision: actions.revision,
                ..Default::default()
            };
            member.set_role(Role::Default);
            change.promote_pending_members.push(member);
        }

        // 10
        if let Some(modify_title) = &actions.modify_title {
            change.new_title = Some(DecryptedString {
                value: self.decrypt_title(&modify_title.title),
            });
        }

        // 11
        if let Some(modify_avatar) = &actions.modify_avatar {
            change.new_avatar = Some(DecryptedString {
                value: modify_avatar.avatar.clone(),
            });
        }

        // 12
        if let Some(modify_timer) = &actions.modify_disappearing_messages_timer {
            change.new_timer = Some(DecryptedTimer {
                duration: self.decrypt_timer(&modify_timer.timer),
            });
        }

        // 13
        if let Some(modify_access) = &actions.modify_attributes_access {
            change.new_attribute_access = modify_access.attributes_access;
        }

        // 14
        if let Some(modify_access) = &actions.modify_member_access {
            change.new_member_access = modify_access.members_access;
        }

        // 15
        if let Some(modify_access) = &actions.modify_add_from_invite_link_access {
            change.new_invite_link_access = modify_access.add_from_invite_link_access;
        }

        // 16
        for add_requesting in &actions.add_requesting_members {
            let requesting = add_requesting.added.as_ref().ok_or_else(|| {
                GroupOperationsError::invalid("added requesting member", "missing")
            })?;
            change
                .new_requesting_members
                .push(self.decrypt_requesting_member(requesting)?);
        }

        // 17
        for delete_requesting in &actions.delete_requesting_members {
            let aci =
                self.decrypt_aci_strict(&delete_requesting.deleted_user_id, "deleted requester")?;
            change
                .delete_requesting_members
                .push(ServiceId::Aci(aci).to_service_id_binary());
        }

        // 18
        for promote_requesting in &actions.promote_requesting_members {
            let aci = self.decrypt_aci_strict(&promote_requesting.user_id, "approved requester")?;
            change
                .promote_requesting_members
                .push(DecryptedApproveMember {
                    aci_bytes: ServiceId::Aci(aci).to_service_id_binary(),
                    role: promote_requesting.role,
                });
        }

        // 19
        if let Some(modify_password) = &actions.modify_invite_link_password {
            change.new_invite_link_password = modify_password.invite_link_password.clone();
        }

        // 20
        if let Some(modify_description) = &actions.modify_description {
            change.new_description = Some(DecryptedString {
                value: self.decrypt_description(&modify_description.description),
            });
        }

        // 21
        if let Some(modify_announcements) = &actions.modify_announcements_only {
            change.new_is_announcement_group =
                announcement_state(modify_announcements.announcements_only).into();
        }

        // 22
        for add_banned in &actions.add_banned_members {
            let banned = add_banned
                .added
                .as_ref()
                .ok_or_else(|| GroupOperationsError::invalid("added banned member", "missing"))?;
            change.new_banned_members.push(DecryptedBannedMember {
                service_id_bytes: self.decrypt_service_id_or_unknown(&banned.user_id)?,
                timestamp: banned.timestamp,
            });
        }

        // 23
        for delete_banned in &actions.delete_banned_members {
            change.delete_banned_members.push(DecryptedBannedMember {
                service_id_bytes: self.decrypt_service_id_or_unknown(&delete_banned.deleted_user_id)?,
                timestamp: 0,
            });
        }

        // 24
        for promote_pni_aci in &actions.promote_pending_pni_aci_members {
            let (aci, profile_key) = self.decrypt_identity(
                &promote_pni_aci.user_id,
                &promote_pni_aci.profile_key,
                &promote_pni_aci.presentation,
            )?;
            let pni = match self.decrypt_service_id_strict(&promote_pni_aci.pni, "invited PNI")? {
                pni @ ServiceId::Pni(_) => pni,
                ServiceId::Aci(_) => {
                    return Err(GroupOperationsError::invalid("invited PNI", "not a PNI"));
                }
            };

            // The invite was addressed to the PNI, the member who accepted it is the ACI.
            change.editor_service_id_bytes = ServiceId::Aci(aci).to_service_id_binary();

            let mut member = DecryptedMember {
                aci_bytes: ServiceId::Aci(aci).to_service_id_binary(),
                profile_key: profile_key.to_bytes().to_vec(),
                joined_at_revision: actions.revision,
                pni_bytes: pni.to_service_id_binary(),
                ..Default::default()
            };
            member.set_role(Role::Default);
            change.promote_pending_pni_aci_members.push(member);
        }

        Ok(change)
    }

    /// Decrypts what an invite link reveals to someone outside the group.
    pub fn decrypt_group_join_info(&self, join_info: &GroupJoinInfo) -> DecryptedGroupJoinInfo {
        DecryptedGroupJoinInfo {
            title: self.decrypt_title(&join_info.title),
            avatar: join_info.avatar.clone(),
            member_count: join_info.member_count,
            add_from_invite_link: join_info.add_from_invite_link,
            revision: join_info.revision,
            pending_admin_approval: join_info.pending_admin_approval,
            description: self.decrypt_description(&join_info.description),
        }
    }

    /// ACIs of everyone added by `actions`, in order.
    pub fn decrypt_add_members(&self, actions: &Actions) -> Result<Vec<Uuid>, GroupOperationsError> {
        actions
            .add_members
            .iter()
            .map(|add_member| -> Result<Uuid, GroupOperationsError> {
                let member = add_member
                    .added
                    .as_ref()
                    .ok_or_else(|| GroupOperationsError::invalid("added member", "missing"))?;
                let (aci, _) =
                    self.decrypt_identity(&member.user_id, &member.profile_key, &member.presentation)?;
                Ok(aci)
            })
            .collect()
    }

    pub fn encrypt_avatar(&self, avatar: &[u8]) -> Result<Vec<u8>, GroupOperationsError> {
        self.encrypt_attribute(Content::Avatar(avatar.to_vec()))
    }

    /// Decrypts a downloaded avatar, yielding empty bytes when it can't be read.
    pub fn decrypt_avatar(&self, bytes: &[u8]) -> Vec<u8> {
        match self.decrypt_attribute(bytes, "avatar") {
            Some(Content::Avatar(avatar)) => avatar,
            Some(_) => {
                warn!("avatar blob holds another attribute");
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    pub fn encrypt_service_id(
        &self,
        service_id: ServiceId,
    ) -> Result<UuidCiphertext, GroupOperationsError> {
        Ok(self.cipher.encrypt_service_id(service_id)?)
    }

    pub fn decrypt_service_id(
        &self,
        ciphertext: &UuidCiphertext,
    ) -> Result<ServiceId, GroupOperationsError> {
        Ok(self.cipher.decrypt_service_id(ciphertext)?)
    }

    /// Decrypts an identifier into its binary form, or empty bytes if it doesn't decrypt.
    ///
    /// Missing identifiers stay empty. Ciphertexts of the wrong length are never valid and fail
    /// with [`GroupOperationsError::InvalidGroupState`].
    pub fn decrypt_service_id_or_unknown(&self, bytes: &[u8]) -> Result<Vec<u8>, GroupOperationsError> {
        if bytes.is_empty() {
            return Ok(Vec::new());
        }

        let ciphertext = UuidCiphertext::try_from(bytes)
            .map_err(|err| GroupOperationsError::invalid("identifier", err))?;
        match self.cipher.decrypt_service_id(&ciphertext) {
            Ok(service_id) => Ok(service_id.to_service_id_binary()),
            Err(err) => {
                warn!("could not decrypt identifier: {err}");
                Ok(Vec::new())
            }
        }
    }

    fn decrypt_service_id_strict(
        &self,
        bytes: &[u8],
        context: &str,
    ) -> Result<ServiceId, GroupOperationsError> {
        let ciphertext =
            UuidCiphertext::try_from(bytes).map_err(|err| GroupOperationsError::invalid(context, err))?;
        self.cipher
            .decrypt_service_id(&ciphertext)
            .map_err(|err| GroupOperationsError::invalid(context, err))
    }

    fn decrypt_aci_strict(&self, bytes: &[u8], context: &str) -> Result<Uuid, GroupOperationsError> {
        self.decrypt_service_id_strict(bytes, context)?
            .aci()
            .ok_or_else(|| GroupOperationsError::invalid(context, "not an ACI"))
    }

    /// Identity and profile key, from a presentation if there is one or else from the
    /// ciphertexts the server extracted from it.
    fn decrypt_identity(
        &self,
        user_id: &[u8],
        profile_key: &[u8],
        presentation: &[u8],
    ) -> Result<(Uuid, ProfileKey), GroupOperationsError> {
        if !presentation.is_empty() {
            return self.decrypt_presentation(presentation);
        }

        let aci = self.decrypt_aci_strict(user_id, "member")?;
        let ciphertext = ProfileKeyCiphertext::try_from(profile_key)
            .map_err(|err| GroupOperationsError::invalid("profile key", err))?;
        let profile_key = self
            .cipher
            .decrypt_profile_key(&ciphertext, aci)
            .map_err(|err| GroupOperationsError::invalid("profile key", err))?;
        Ok((aci, profile_key))
    }

    fn decrypt_presentation(&self, bytes: &[u8]) -> Result<(Uuid, ProfileKey), GroupOperationsError> {
        let presentation = ProfileKeyCredentialPresentation::try_from(bytes)
            .map_err(|err| GroupOperationsError::invalid("presentation", err))?;
        presentation
            .verify(&self.group_public_params)
            .map_err(|err| GroupOperationsError::invalid("presentation", err))?;

        let aci = self
            .cipher
            .decrypt_service_id(presentation.get_uuid_ciphertext())
            .map_err(|err| GroupOperationsError::invalid("presentation", err))?
            .aci()
            .ok_or_else(|| GroupOperationsError::invalid("presentation", "not an ACI"))?;
        let profile_key = self
            .cipher
            .decrypt_profile_key(presentation.get_profile_key_ciphertext(), aci)
            .map_err(|err| GroupOperationsError::invalid("presentation", err))?;
        Ok((aci, profile_key))
    }

    fn decrypt_member(
        &self,
        member: &Member,
        joined_at_revision: u32,
    ) -> Result<DecryptedMember, GroupOperationsError> {
        let (aci, profile_key) =
            self.decrypt_identity(&member.user_id, &member.profile_key, &member.presentation)?;
        Ok(DecryptedMember {
            aci_bytes: ServiceId::Aci(aci).to_service_id_binary(),
            role: member.role,
            profile_key: profile_key.to_bytes().to_vec(),
            joined_at_revision,
            ..Default::default()
        })
    }

    fn decrypt_pending_member(
        &self,
        pending: &PendingMember,
    ) -> Result<DecryptedPendingMember, GroupOperationsError> {
        let member = pending.member.clone().unwrap_or_default();
        let role = match member.role() {
            Role::Administrator => Role::Administrator,
            _ => Role::Default,
        };

        let mut decrypted = DecryptedPendingMember {
            service_id_bytes: self.decrypt_service_id_or_unknown(&member.user_id)?,
            added_by_aci: self.decrypt_service_id_or_unknown(&pending.added_by_user_id)?,
            timestamp: pending.timestamp,
            service_id_cipher_text: member.user_id,
            ..Default::default()
        };
        decrypted.set_role(role);
        Ok(decrypted)
    }

    fn decrypt_requesting_member(
        &self,
        requesting: &RequestingMember,
    ) -> Result<DecryptedRequestingMember, GroupOperationsError> {
        let (aci, profile_key) = self.decrypt_identity(
            &requesting.user_id,
            &requesting.profile_key,
            &requesting.presentation,
        )?;
        Ok(DecryptedRequestingMember {
            aci_bytes: ServiceId::Aci(aci).to_service_id_binary(),
            profile_key: profile_key.to_bytes().to_vec(),
            timestamp: requesting.timestamp,
        })
    }

    fn presentation(
        &self,
        credential: &ExpiringProfileKeyCredential,
    ) -> Result<ProfileKeyCredentialPresentation, GroupOperationsError> {
        Ok(self
            .operations
            .client_zk_profile_operations
            .create_expiring_profile_key_credential_presentation(
                &self.group_secret_params,
                credential,
            )?)
    }

    fn presentation_bytes(
        &self,
        credential: &ExpiringProfileKeyCredential,
    ) -> Result<Vec<u8>, GroupOperationsError> {
        Ok(self.presentation(credential)?.to_bytes()?)
    }

    fn member_from_credential(
        &self,
        credential: &ExpiringProfileKeyCredential,
        role: Role,
    ) -> Result<Member, GroupOperationsError> {
        let presentation = self.presentation(credential)?;
        let mut member = Member {
            user_id: presentation.get_uuid_ciphertext().to_vec(),
            profile_key: presentation.get_profile_key_ciphertext().as_bytes().to_vec(),
            presentation: presentation.to_bytes()?,
            ..Default::default()
        };
        member.set_role(role);
        Ok(member)
    }

    fn pending_member(
        &self,
        service_id: ServiceId,
        role: Role,
        added_by: &UuidCiphertext,
    ) -> Result<PendingMember, GroupOperationsError> {
        let mut member = Member {
            user_id: self.encrypt_service_id(service_id)?.to_vec(),
            ..Default::default()
        };
        member.set_role(role);
        Ok(PendingMember {
            member: Some(member),
            added_by_user_id: added_by.to_vec(),
            timestamp: 0,
        })
    }

    fn encrypt_title(&self, title: &str) -> Result<Vec<u8>, GroupOperationsError> {
        self.encrypt_attribute(Content::Title(title.to_owned()))
    }

    fn encrypt_description(&self, description: &str) -> Result<Vec<u8>, GroupOperationsError> {
        self.encrypt_attribute(Content::DescriptionText(description.to_owned()))
    }

    fn encrypt_timer(&self, duration: u32) -> Result<Vec<u8>, GroupOperationsError> {
        self.encrypt_attribute(Content::DisappearingMessagesDuration(duration))
    }

    fn encrypt_attribute(&self, content: Content) -> Result<Vec<u8>, GroupOperationsError> {
        let blob = GroupAttributeBlob {
            content: Some(content),
        };
        Ok(self
            .cipher
            .encrypt_blob(&self.operations.rng, &blob.encode_to_vec())?)
    }

    fn decrypt_title(&self, bytes: &[u8]) -> String {
        match self.decrypt_attribute(bytes, "title") {
            Some(Content::Title(title)) => title,
            Some(_) => {
                warn!("title blob holds another attribute");
                String::new()
            }
            None => String::new(),
        }
    }

    fn decrypt_description(&self, bytes: &[u8]) -> String {
        match self.decrypt_attribute(bytes, "description") {
            Some(Content::DescriptionText(description)) => description,
            Some(_) => {
                warn!("description blob holds another attribute");
                String::new()
            }
            None => String::new(),
        }
    }

    fn decrypt_timer(&self, bytes: &[u8]) -> u32 {
        match self.decrypt_attribute(bytes, "timer") {
            Some(Content::DisappearingMessagesDuration(duration)) => duration,
            Some(_) => {
                warn!("timer blob holds another attribute");
                0
            }
            None => 0,
        }
    }

    /// Unset attributes are empty, corrupt ones are logged and treated as unset.
    fn decrypt_attribute(&self, bytes: &[u8], name: &str) -> Option<Content> {
        if bytes.is_empty() {
            return None;
        }

        let plaintext = match self.cipher.decrypt_blob(bytes) {
            Ok(plaintext) => plaintext,
            Err(err) => {
                warn!("could not decrypt {name}: {err}");
                return None;
            }
        };

        match GroupAttributeBlob::decode(plaintext.as_slice()) {
            Ok(blob) => blob.content,
            Err(err) => {
                warn!("could not decode {name}: {err}");
                None
            }
        }
    }
}

fn announcement_state(announcements_only: bool) -> EnabledState {
    if announcements_only {
        EnabledState::Enabled
    } else {
        EnabledState::Disabled
    }
}
