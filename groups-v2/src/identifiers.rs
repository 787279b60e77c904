// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identifier extraction from plaintext group records.
//!
//! Entries whose identifier could not be decrypted are stored with empty identifier bytes.
//! List helpers keep such entries in place as `Err` so one bad entry never hides the others,
//! callers decide per entry whether to skip it.
use std::collections::HashSet;

use groups_zk::{ServiceId, ServiceIdError};
use tracing::warn;
use uuid::Uuid;

use crate::proto::{
    DecryptedBannedMember, DecryptedGroup, DecryptedGroupChange, DecryptedMember,
    DecryptedPendingMember, DecryptedRequestingMember,
};

pub type ServiceIdResult = Result<ServiceId, ServiceIdError>;

pub fn parse_service_id(bytes: &[u8]) -> ServiceIdResult {
    ServiceId::parse_from_service_id_binary(bytes)
}

/// Account identity stored in `bytes`, phone number identities are rejected.
pub fn parse_aci(bytes: &[u8]) -> Result<Uuid, ServiceIdError> {
    match parse_service_id(bytes)? {
        ServiceId::Aci(uuid) => Ok(uuid),
        ServiceId::Pni(_) => Err(ServiceIdError::NotAnAci),
    }
}

pub fn editor_service_id(change: &DecryptedGroupChange) -> ServiceIdResult {
    parse_service_id(&change.editor_service_id_bytes)
}

pub fn to_aci_list(members: &[DecryptedMember]) -> Vec<ServiceIdResult> {
    members
        .iter()
        .map(|member| parse_service_id(&member.aci_bytes))
        .collect()
}

pub fn pending_to_service_id_list(pending: &[DecryptedPendingMember]) -> Vec<ServiceIdResult> {
    pending
        .iter()
        .map(|member| parse_service_id(&member.service_id_bytes))
        .collect()
}

pub fn requesting_to_aci_list(requesting: &[DecryptedRequestingMember]) -> Vec<ServiceIdResult> {
    requesting
        .iter()
        .map(|member| parse_service_id(&member.aci_bytes))
        .collect()
}

pub fn removed_members_service_id_list(change: &DecryptedGroupChange) -> Vec<ServiceIdResult> {
    change
        .delete_members
        .iter()
        .map(|bytes| parse_service_id(bytes))
        .collect()
}

pub fn removed_pending_members_service_id_list(
    change: &DecryptedGroupChange,
) -> Vec<ServiceIdResult> {
    change
        .delete_pending_members
        .iter()
        .map(|removal| parse_service_id(&removal.service_id_bytes))
        .collect()
}

pub fn removed_requesting_members_service_id_list(
    change: &DecryptedGroupChange,
) -> Vec<ServiceIdResult> {
    change
        .delete_requesting_members
        .iter()
        .map(|bytes| parse_service_id(bytes))
        .collect()
}

/// Identities on the ban list. Entries which don't parse are logged and left out.
pub fn banned_members_to_service_id_set(banned: &[DecryptedBannedMember]) -> HashSet<ServiceId> {
    banned
        .iter()
        .filter_map(|member| match parse_service_id(&member.service_id_bytes) {
            Ok(service_id) => Some(service_id),
            Err(err) => {
                warn!("ignoring banned member with invalid identifier: {err}");
                None
            }
        })
        .collect()
}

pub fn find_member_by_aci(members: &[DecryptedMember], aci: Uuid) -> Option<&DecryptedMember> {
    let aci_bytes = ServiceId::Aci(aci).to_service_id_binary();
    members.iter().find(|member| member.aci_bytes == aci_bytes)
}

pub fn find_pending_by_service_id(
    pending: &[DecryptedPendingMember],
    service_id: ServiceId,
) -> Option<&DecryptedPendingMember> {
    let service_id_bytes = service_id.to_service_id_binary();
    pending
        .iter()
        .find(|member| member.service_id_bytes == service_id_bytes)
}

pub fn find_pending_by_uuid_ciphertext<'a>(
    pending: &'a [DecryptedPendingMember],
    ciphertext: &[u8],
) -> Option<&'a DecryptedPendingMember> {
    pending
        .iter()
        .find(|member| member.service_id_cipher_text == ciphertext)
}

pub fn find_requesting_by_aci(
    requesting: &[DecryptedRequestingMember],
    aci: Uuid,
) -> Option<&DecryptedRequestingMember> {
    let aci_bytes = ServiceId::Aci(aci).to_service_id_binary();
    requesting.iter().find(|member| member.aci_bytes == aci_bytes)
}

pub fn is_pending_or_requesting(group: &DecryptedGroup, service_id: ServiceId) -> bool {
    find_pending_by_service_id(&group.pending_members, service_id).is_some()
        || service_id
            .aci()
            .is_some_and(|aci| is_requesting(group, aci))
}

pub fn is_requesting(group: &DecryptedGroup, aci: Uuid) -> bool {
    find_requesting_by_aci(&group.requesting_members, aci).is_some()
}
