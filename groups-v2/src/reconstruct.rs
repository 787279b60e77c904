// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inferring a group change from two snapshots when the server didn't send one.
//!
//! The result explains how `from` became `to`, it is not the change the server signed and has no
//! editor. Applying it to `from` yields `to` up to the order of members, invites, join requests
//! and bans. [`apply`](crate::apply::apply) appends new entries slot by slot (new members, then
//! promoted invitees, then approved requesters, then invites accepted through a PNI), so the
//! lists only match exactly when `to` orders them the same way.
//!
//! Differences no change can express are left out, for example a member's `joined_at_revision`,
//! a cleared invite link password or a new timestamp on an entry which stays on the ban list.
use std::collections::HashSet;

use crate::proto::{
    AccessControl, DecryptedApproveMember, DecryptedGroup, DecryptedGroupChange,
    DecryptedMember, DecryptedModifyMemberRole, DecryptedPendingMemberRemoval, DecryptedString,
    EnabledState,
};

pub fn reconstruct_group_change(from: &DecryptedGroup, to: &DecryptedGroup) -> DecryptedGroupChange {
    let mut change = DecryptedGroupChange {
        revision: to.revision,
        ..Default::default()
    };

    if from.title != to.title {
        change.new_title = Some(DecryptedString {
            value: to.title.clone(),
        });
    }

    if from.avatar != to.avatar {
        change.new_avatar = Some(DecryptedString {
            value: to.avatar.clone(),
        });
    }

    if from.disappearing_messages_timer != to.disappearing_messages_timer {
        change.new_timer = Some(to.disappearing_messages_timer.clone().unwrap_or_default());
    }

    reconstruct_access_control(from, to, &mut change);
    reconstruct_members(from, to, &mut change);
    reconstruct_pending_members(from, to, &mut change);
    reconstruct_requesting_members(from, to, &mut change);

    if from.invite_link_password != to.invite_link_password {
        change.new_invite_link_password = to.invite_link_password.clone();
    }

    if from.description != to.description {
        change.new_description = Some(DecryptedString {
            value: to.description.clone(),
        });
    }

    if from.is_announcement_group != to.is_announcement_group
        && to.is_announcement_group() != EnabledState::Unknown
    {
        change.new_is_announcement_group = to.is_announcement_group;
    }

    reconstruct_banned_members(from, to, &mut change);

    change
}

fn reconstruct_access_control(
    from: &DecryptedGroup,
    to: &DecryptedGroup,
    change: &mut DecryptedGroupChange,
) {
    let from_access = from.access_control.clone().unwrap_or_default();
    let to_access = to.access_control.clone().unwrap_or_default();
    let unknown = AccessControl::default();

    if from_access.attributes != to_access.attributes && to_access.attributes != unknown.attributes {
        change.new_attribute_access = to_access.attributes;
    }

    if from_access.members != to_access.members && to_access.members != unknown.members {
        change.new_member_access = to_access.members;
    }

    if from_access.add_from_invite_link != to_access.add_from_invite_link
        && to_access.add_from_invite_link != unknown.add_from_invite_link
    {
        change.new_invite_link_access = to_access.add_from_invite_link;
    }
}

fn reconstruct_members(from: &DecryptedGroup, to: &DecryptedGroup, change: &mut DecryptedGroupChange) {
    let to_members: HashSet<&[u8]> = to
        .members
        .iter()
        .map(|member| member.aci_bytes.as_slice())
        .collect();

    for member in &from.members {
        if !to_members.contains(member.aci_bytes.as_slice()) {
            change.delete_members.push(member.aci_bytes.clone());
        }
    }

    for member in &to.members {
        if let Some(previous) = from
            .members
            .iter()
            .find(|previous| previous.aci_bytes == member.aci_bytes)
        {
            if previous.role != member.role {
                change.modify_member_roles.push(DecryptedModifyMemberRole {
                    aci_bytes: member.aci_bytes.clone(),
                    role: member.role,
                });
            }

            if previous.profile_key != member.profile_key {
                change.modified_profile_keys.push(DecryptedMember {
                    aci_bytes: member.aci_bytes.clone(),
                    profile_key: member.profile_key.clone(),
                    ..Default::default()
                });
            }
            continue;
        }

        let was_pending = from
            .pending_members
            .iter()
            .any(|pending| pending.service_id_bytes == member.aci_bytes);
        if was_pending {
            change.promote_pending_members.push(member.clone());
            continue;
        }

        let accepted_pni_invite = !member.pni_bytes.is_empty()
            && from
                .pending_members
                .iter()
                .any(|pending| pending.service_id_bytes == member.pni_bytes);
        if accepted_pni_invite {
            change.promote_pending_pni_aci_members.push(member.clone());
            continue;
        }

        // An approval can only carry the role, everything else has to match what the
        // requester sent.
        let approved = from.requesting_members.iter().any(|requesting| {
            requesting.aci_bytes == member.aci_bytes
                && requesting.profile_key == member.profile_key
                && member.joined_at_revision == to.revision
        });
        if approved {
            change.promote_requesting_members.push(DecryptedApproveMember {
                aci_bytes: member.aci_bytes.clone(),
                role: member.role,
            });
            continue;
        }

        change.new_members.push(member.clone());
    }
}

fn reconstruct_pending_members(
    from: &DecryptedGroup,
    to: &DecryptedGroup,
    change: &mut DecryptedGroupChange,
) {
    for pending in &from.pending_members {
        let still_pending = to
            .pending_members
            .iter()
            .any(|next| next.service_id_cipher_text == pending.service_id_cipher_text);
        let promoted = !pending.service_id_bytes.is_empty()
            && to
                .members
                .iter()
                .any(|member| member.aci_bytes == pending.service_id_bytes);
        let accepted_by_aci = change
            .promote_pending_pni_aci_members
            .iter()
            .any(|member| member.pni_bytes == pending.service_id_bytes);

        if !still_pending && !promoted && !accepted_by_aci {
            change
                .delete_pending_members
                .push(DecryptedPendingMemberRemoval {
                    service_id_bytes: pending.service_id_bytes.clone(),
                    service_id_cipher_text: pending.service_id_cipher_text.clone(),
                });
        }
    }

    // Includes members who were removed and invited again in the same revision.
    for pending in &to.pending_members {
        let was_pending = from
            .pending_members
            .iter()
            .any(|previous| previous.service_id_cipher_text == pending.service_id_cipher_text);
        if !was_pending {
            change.new_pending_members.push(pending.clone());
        }
    }
}

fn reconstruct_requesting_members(
    from: &DecryptedGroup,
    to: &DecryptedGroup,
    change: &mut DecryptedGroupChange,
) {
    for requesting in &to.requesting_members {
        if !from.requesting_members.contains(requesting) {
            change.new_requesting_members.push(requesting.clone());
        }
    }

    for requesting in &from.requesting_members {
        let approved = change
            .promote_requesting_members
            .iter()
            .any(|approve| approve.aci_bytes == requesting.aci_bytes);
        let added = change
            .new_members
            .iter()
            .any(|member| member.aci_bytes == requesting.aci_bytes);

        // Requests which changed are deleted and sent again, apply removes the older one first.
        if !approved && !added && !to.requesting_members.contains(requesting) {
            change
                .delete_requesting_members
                .push(requesting.aci_bytes.clone());
        }
    }
}

fn reconstruct_banned_members(
    from: &DecryptedGroup,
    to: &DecryptedGroup,
    change: &mut DecryptedGroupChange,
) {
    for banned in &to.banned_members {
        let was_banned = from
            .banned_members
            .iter()
            .any(|previous| previous.service_id_bytes == banned.service_id_bytes);
        if !was_banned {
            change.new_banned_members.push(banned.clone());
        }
    }

    for banned in &from.banned_members {
        let still_banned = to
            .banned_members
            .iter()
            .any(|next| next.service_id_bytes == banned.service_id_bytes);
        if !still_banned {
            change.delete_banned_members.push(banned.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::apply::{apply, change_is_empty};
    use crate::proto::{
        AccessControl, AccessRequired, DecryptedGroup, DecryptedMember, DecryptedTimer,
        EnabledState, Role,
    };
    use groups_zk::crypto::Rng;

    use crate::test_utils::{
        admin, aci_bytes, banned_member, max_declared_field_tag, member,
        member_with_profile_key, pending_member, pending_member_removal, pending_pni_member,
        pni_aci_member, requesting_member, uuid,
    };

    use super::reconstruct_group_change;

    /// Snapshot fields compared when reconstructing a change.
    const SNAPSHOT_FIELDS: u32 = 12;

    fn group(revision: u32) -> DecryptedGroup {
        DecryptedGroup {
            title: "Bouldering".into(),
            avatar: "avatars/1".into(),
            disappearing_messages_timer: Some(DecryptedTimer { duration: 60 }),
            access_control: Some(AccessControl {
                attributes: AccessRequired::Member.into(),
                members: AccessRequired::Member.into(),
                add_from_invite_link: AccessRequired::Unsatisfiable.into(),
            }),
            revision,
            members: vec![admin(uuid(1)), member(uuid(2))],
            pending_members: vec![pending_member(uuid(3))],
            requesting_members: vec![requesting_member(uuid(4))],
            banned_members: vec![banned_member(uuid(5), 100)],
            is_announcement_group: EnabledState::Disabled.into(),
            ..Default::default()
        }
    }

    fn joined(mut member: DecryptedMember, revision: u32) -> DecryptedMember {
        member.joined_at_revision = revision;
        member
    }

    #[test]
    fn unchanged_group() {
        let from = group(10);
        let to = group(11);

        let change = reconstruct_group_change(&from, &to);
        assert_eq!(change.revision, 11);
        assert!(change_is_empty(&change));
    }

    #[test]
    fn attributes() {
        let from = group(10);
        let mut to = group(11);
        to.title = "Climbing".into();
        to.avatar = "avatars/2".into();
        to.disappearing_messages_timer = Some(DecryptedTimer { duration: 3600 });
        to.description = "Tuesdays and Thursdays".into();
        to.is_announcement_group = EnabledState::Enabled.into();
        to.invite_link_password = vec![7; 16];

        let change = reconstruct_group_change(&from, &to);
        assert_eq!(change.new_title.as_ref().unwrap().value, "Climbing");
        assert_eq!(change.new_avatar.as_ref().unwrap().value, "avatars/2");
        assert_eq!(change.new_timer.as_ref().unwrap().duration, 3600);
        assert_eq!(change.new_description.as_ref().unwrap().value, "Tuesdays and Thursdays");
        assert_eq!(change.new_is_announcement_group(), EnabledState::Enabled);
        assert_eq!(change.new_invite_link_password, vec![7; 16]);
    }

    #[test]
    fn access_control() {
        let from = group(10);
        let mut to = group(11);
        to.access_control = Some(AccessControl {
            attributes: AccessRequired::Administrator.into(),
            members: AccessRequired::Member.into(),
            add_from_invite_link: AccessRequired::Any.into(),
        });

        let change = reconstruct_group_change(&from, &to);
        assert_eq!(change.new_attribute_access(), AccessRequired::Administrator);
        assert_eq!(change.new_member_access(), AccessRequired::Unknown);
        assert_eq!(change.new_invite_link_access(), AccessRequired::Any);
    }

    #[test]
    fn members() {
        let from = group(10);
        let mut to = group(11);
        to.members = vec![
            member(uuid(1)),
            joined(member(uuid(6)), 11),
        ];

        let change = reconstruct_group_change(&from, &to);
        assert_eq!(change.new_members, vec![joined(member(uuid(6)), 11)]);
        assert_eq!(change.delete_members, vec![aci_bytes(uuid(2))]);
        assert_eq!(change.modify_member_roles.len(), 1);
        assert_eq!(change.modify_member_roles[0].aci_bytes, aci_bytes(uuid(1)));
        assert_eq!(change.modify_member_roles[0].role(), Role::Default);
        assert!(change.modified_profile_keys.is_empty());
    }

    #[test]
    fn profile_key() {
        let from = group(10);
        let mut to = group(11);
        to.members[1] = member_with_profile_key(uuid(2), vec![9; 32]);

        let change = reconstruct_group_change(&from, &to);
        assert_eq!(change.modified_profile_keys.len(), 1);
        assert_eq!(change.modified_profile_keys[0].aci_bytes, aci_bytes(uuid(2)));
        assert_eq!(change.modified_profile_keys[0].profile_key, vec![9; 32]);
        assert!(change.modify_member_roles.is_empty());
    }

    #[test]
    fn accepted_invite_is_a_promotion() {
        let from = group(10);
        let mut to = group(11);
        to.pending_members.clear();
        to.members.push(joined(member(uuid(3)), 11));

        let change = reconstruct_group_change(&from, &to);
        assert_eq!(change.promote_pending_members, vec![joined(member(uuid(3)), 11)]);
        assert!(change.new_members.is_empty());
        assert!(change.delete_pending_members.is_empty());
    }

    #[test]
    fn invites() {
        let from = group(10);
        let mut to = group(11);
        to.pending_members = vec![pending_member(uuid(6))];

        let change = reconstruct_group_change(&from, &to);
        assert_eq!(change.new_pending_members, vec![pending_member(uuid(6))]);
        assert_eq!(change.delete_pending_members, vec![pending_member_removal(uuid(3))]);
    }

    #[test]
    fn join_requests() {
        let from = DecryptedGroup {
            revision: 10,
            requesting_members: vec![
                requesting_member(uuid(1)),
                requesting_member(uuid(2)),
                requesting_member(uuid(3)),
            ],
            ..Default::default()
        };
        let to = DecryptedGroup {
            revision: 11,
            // 1 is approved, 2 is added with a profile key the request didn't have.
            members: vec![
                member_with_profile_key(uuid(2), vec![9; 32]),
                joined(member(uuid(1)), 11),
            ],
            requesting_members: vec![requesting_member(uuid(4))],
            ..Default::default()
        };

        let change = reconstruct_group_change(&from, &to);
        assert_eq!(change.new_members, vec![member_with_profile_key(uuid(2), vec![9; 32])]);
        assert_eq!(change.promote_requesting_members.len(), 1);
        assert_eq!(change.promote_requesting_members[0].aci_bytes, aci_bytes(uuid(1)));
        assert_eq!(change.new_requesting_members, vec![requesting_member(uuid(4))]);
        assert_eq!(change.delete_requesting_members, vec![aci_bytes(uuid(3))]);
    }

    #[test]
    fn bans() {
        let from = group(10);
        let mut to = group(11);
        to.banned_members = vec![banned_member(uuid(6), 200)];

        let change = reconstruct_group_change(&from, &to);
        assert_eq!(change.new_banned_members, vec![banned_member(uuid(6), 200)]);
        assert_eq!(change.delete_banned_members, vec![banned_member(uuid(5), 100)]);
    }

    #[test]
    fn accepted_pni_invite() {
        let mut from = group(10);
        from.pending_members.push(pending_pni_member(uuid(12)));
        let mut to = group(11);
        to.members.push(joined(pni_aci_member(uuid(6), uuid(12)), 11));

        let change = reconstruct_group_change(&from, &to);
        assert_eq!(
            change.promote_pending_pni_aci_members,
            vec![joined(pni_aci_member(uuid(6), uuid(12)), 11)]
        );
        assert!(change.new_members.is_empty());
        assert!(change.delete_pending_members.is_empty());
        assert_eq!(apply(&from, &change).unwrap(), to);
    }

    #[test]
    fn ban_timestamp_is_not_reconstructed() {
        let from = group(10);
        let mut to = group(11);
        to.banned_members = vec![banned_member(uuid(5), 200)];

        let change = reconstruct_group_change(&from, &to);
        assert!(change_is_empty(&change));
        assert_eq!(
            apply(&from, &change).unwrap().banned_members,
            vec![banned_member(uuid(5), 100)]
        );
    }

    /// Sorts every list `apply` appends to, the order of their entries isn't reconstructed.
    fn sorted(mut group: DecryptedGroup) -> DecryptedGroup {
        group.members.sort_by(|a, b| a.aci_bytes.cmp(&b.aci_bytes));
        group
            .pending_members
            .sort_by(|a, b| a.service_id_cipher_text.cmp(&b.service_id_cipher_text));
        group
            .requesting_members
            .sort_by(|a, b| a.aci_bytes.cmp(&b.aci_bytes));
        group
            .banned_members
            .sort_by(|a, b| a.service_id_bytes.cmp(&b.service_id_bytes));
        group
    }

    fn assert_round_trip(from: &DecryptedGroup, to: &DecryptedGroup) {
        let change = reconstruct_group_change(from, to);
        let applied = apply(from, &change).expect("reconstructed change applies");

        // Clearing a timer isn't expressible, it is reset to zero instead.
        let mut expected = to.clone();
        if expected.disappearing_messages_timer.is_none() && from.disappearing_messages_timer.is_some() {
            expected.disappearing_messages_timer = Some(DecryptedTimer::default());
        }
        if expected.access_control.is_none() {
            expected.access_control = applied.access_control.clone();
        }
        if expected.invite_link_password.is_empty() {
            expected.invite_link_password = applied.invite_link_password.clone();
        }
        if expected.is_announcement_group() == EnabledState::Unknown {
            expected.is_announcement_group = applied.is_announcement_group;
        }
        assert_eq!(sorted(applied), sorted(expected));
    }

    fn everything_changed() -> (DecryptedGroup, DecryptedGroup) {
        let from = group(10);
        let mut to = group(11);
        to.title = "Climbing".into();
        to.disappearing_messages_timer = Some(DecryptedTimer { duration: 0 });
        to.description = "Tuesdays".into();
        to.invite_link_password = vec![1; 16];
        to.access_control = Some(AccessControl {
            attributes: AccessRequired::Administrator.into(),
            members: AccessRequired::Administrator.into(),
            add_from_invite_link: AccessRequired::Administrator.into(),
        });
        to.members = vec![
            member_with_profile_key(uuid(2), vec![9; 32]),
            joined(admin(uuid(6)), 11),
            joined(member(uuid(3)), 11),
            joined(member(uuid(4)), 11),
        ];
        to.pending_members = vec![pending_member(uuid(1))];
        to.requesting_members = vec![requesting_member(uuid(7))];
        to.banned_members = vec![banned_member(uuid(5), 100), banned_member(uuid(8), 200)];
        to.is_announcement_group = EnabledState::Enabled.into();
        (from, to)
    }

    #[rstest]
    #[case::unchanged(group(1), group(2))]
    #[case::from_empty(DecryptedGroup::default(), group(1))]
    #[case::to_empty(group(1), DecryptedGroup { revision: 2, ..Default::default() })]
    #[case::everything(everything_changed().0, everything_changed().1)]
    #[case::new_member_listed_last(group(1), members_out_of_apply_order())]
    fn apply_reconstructed_change(#[case] from: DecryptedGroup, #[case] to: DecryptedGroup) {
        assert_round_trip(&from, &to);
    }

    /// An accepted invite listed before a new member, `apply` appends them the other way round.
    fn members_out_of_apply_order() -> DecryptedGroup {
        let mut to = group(2);
        to.pending_members.clear();
        to.members = vec![
            admin(uuid(1)),
            joined(member(uuid(3)), 2),
            joined(member(uuid(6)), 2),
        ];
        to
    }

    /// Where an account stands in a generated snapshot.
    #[derive(Clone, Copy, PartialEq)]
    enum Standing {
        Outside,
        Member,
        Admin,
        Invited,
        InvitedByPni,
        Requesting,
    }

    impl Standing {
        fn from_byte(byte: u8) -> Self {
            match byte % 6 {
                0 => Standing::Outside,
                1 => Standing::Member,
                2 => Standing::Admin,
                3 => Standing::Invited,
                4 => Standing::InvitedByPni,
                _ => Standing::Requesting,
            }
        }
    }

    const ACCOUNTS: usize = 12;

    /// Pni of account `n` when it was invited through its phone number.
    fn pni_of(n: u8) -> uuid::Uuid {
        uuid(100 + u128::from(n))
    }

    fn generated_group(
        revision: u32,
        standings: &[Standing; ACCOUNTS],
        previous: Option<&[Standing; ACCOUNTS]>,
        flags: &[u8; ACCOUNTS],
        bans: u8,
    ) -> DecryptedGroup {
        let mut group = DecryptedGroup {
            title: "Bouldering".into(),
            revision,
            ..Default::default()
        };

        for (i, standing) in standings.iter().enumerate() {
            let n = i as u8 + 1;
            let before = previous.map(|previous| previous[i]);
            let was_member = matches!(before, Some(Standing::Member | Standing::Admin));
            let mut entry = if flags[i] & 1 == 0 {
                member(uuid(u128::from(n)))
            } else {
                member_with_profile_key(uuid(u128::from(n)), vec![n; 32])
            };
            if before == Some(Standing::InvitedByPni) {
                entry.pni_bytes = pni_aci_member(uuid(u128::from(n)), pni_of(n)).pni_bytes;
            }
            if before.is_some() && !was_member {
                entry.joined_at_revision = revision;
            }

            match standing {
                Standing::Outside => {}
                Standing::Member => group.members.push(entry),
                Standing::Admin => {
                    entry.set_role(Role::Administrator);
                    group.members.push(entry);
                }
                Standing::Invited => group.pending_members.push(pending_member(uuid(u128::from(n)))),
                Standing::InvitedByPni => group.pending_members.push(pending_pni_member(pni_of(n))),
                Standing::Requesting => group.requesting_members.push(requesting_member(uuid(u128::from(n)))),
            }
        }

        for n in 0..8u8 {
            if bans & (1 << n) != 0 {
                group
                    .banned_members
                    .push(banned_member(uuid(50 + u128::from(n)), u64::from(n) * 100));
            }
        }

        group
    }

    #[test]
    fn apply_reconstructed_change_between_generated_snapshots() {
        for seed in 0..64u8 {
            let rng = Rng::from_seed([seed; 32]);
            let from_standings: [Standing; ACCOUNTS] =
                rng.random_array::<ACCOUNTS>().unwrap().map(Standing::from_byte);
            let to_standings: [Standing; ACCOUNTS] =
                rng.random_array::<ACCOUNTS>().unwrap().map(Standing::from_byte);
            let from_flags = rng.random_array::<ACCOUNTS>().unwrap();
            let to_flags = rng.random_array::<ACCOUNTS>().unwrap();
            let [from_bans, to_bans] = rng.random_array::<2>().unwrap();

            let from = generated_group(10, &from_standings, None, &from_flags, from_bans);
            let to = generated_group(11, &to_standings, Some(&from_standings), &to_flags, to_bans);

            assert_round_trip(&from, &to);
        }
    }

    #[test]
    fn every_snapshot_field_is_reconstructed() {
        assert_eq!(max_declared_field_tag::<DecryptedGroup>(), SNAPSHOT_FIELDS);
    }
}
