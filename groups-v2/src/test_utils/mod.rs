// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixtures for plaintext and encrypted group records.
use prost::Message;
use prost::encoding::{WireType, encode_key, encode_varint};
use uuid::Uuid;

use groups_zk::crypto::Rng;
use groups_zk::{
    ExpiringProfileKeyCredential, GroupSecretParams, ProfileKey, ServerSecretParams, ServiceId,
    UUID_CIPHERTEXT_LEN,
};

use crate::config::GroupsV2Config;
use crate::operations::{GroupCandidate, GroupOperations, GroupsV2Operations};
use crate::proto::{
    DecryptedApproveMember, DecryptedBannedMember, DecryptedMember, DecryptedModifyMemberRole,
    DecryptedPendingMember, DecryptedPendingMemberRemoval, DecryptedRequestingMember, Role,
};

/// Credentials expire one day after the unix epoch in all fixtures.
pub const CREDENTIAL_EXPIRATION: u64 = 86400;

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

/// Highest field tag `M` declares, probing every tag up to 64.
///
/// A tag counts as declared when a message holding nothing but that tag set to 1 decodes to
/// something other than the default message, or doesn't decode at all. Undeclared tags are
/// skipped by the decoder and leave the message at its default.
pub fn max_declared_field_tag<M: Message + Default + PartialEq>() -> u32 {
    (1..=64)
        .filter(|tag| {
            let mut buf = Vec::new();
            encode_key(*tag, WireType::Varint, &mut buf);
            encode_varint(1, &mut buf);
            match M::decode(buf.as_slice()) {
                Ok(message) => message != M::default(),
                Err(_) => true,
            }
        })
        .max()
        .unwrap_or(0)
}

pub fn uuid(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

pub fn aci_bytes(uuid: Uuid) -> Vec<u8> {
    ServiceId::Aci(uuid).to_service_id_binary()
}

pub fn pni_bytes(uuid: Uuid) -> Vec<u8> {
    ServiceId::Pni(uuid).to_service_id_binary()
}

/// Profile key bytes derived from the account, stable across calls.
pub fn profile_key(uuid: Uuid) -> Vec<u8> {
    [uuid.as_bytes().as_slice(), uuid.as_bytes().as_slice()].concat()
}

/// Stand-in for the identifier ciphertext of `uuid`, unique per account.
pub fn fake_ciphertext(uuid: Uuid) -> Vec<u8> {
    let mut ciphertext = vec![0; UUID_CIPHERTEXT_LEN];
    ciphertext[..16].copy_from_slice(uuid.as_bytes());
    ciphertext
}

pub fn member(uuid: Uuid) -> DecryptedMember {
    member_with_profile_key(uuid, profile_key(uuid))
}

pub fn member_with_profile_key(uuid: Uuid, profile_key: Vec<u8>) -> DecryptedMember {
    let mut member = DecryptedMember {
        aci_bytes: aci_bytes(uuid),
        profile_key,
        ..Default::default()
    };
    member.set_role(Role::Default);
    member
}

pub fn admin(uuid: Uuid) -> DecryptedMember {
    let mut member = member(uuid);
    member.set_role(Role::Administrator);
    member
}

pub fn pending_member(uuid: Uuid) -> DecryptedPendingMember {
    let mut pending = DecryptedPendingMember {
        service_id_bytes: aci_bytes(uuid),
        service_id_cipher_text: fake_ciphertext(uuid),
        ..Default::default()
    };
    pending.set_role(Role::Default);
    pending
}

/// An invite addressed to the phone number identity `pni`.
pub fn pending_pni_member(pni: Uuid) -> DecryptedPendingMember {
    DecryptedPendingMember {
        service_id_bytes: pni_bytes(pni),
        ..pending_member(pni)
    }
}

/// The account `aci` after accepting an invite addressed to `pni`.
pub fn pni_aci_member(aci: Uuid, pni: Uuid) -> DecryptedMember {
    DecryptedMember {
        pni_bytes: pni_bytes(pni),
        ..member(aci)
    }
}

pub fn pending_member_removal(uuid: Uuid) -> DecryptedPendingMemberRemoval {
    DecryptedPendingMemberRemoval {
        service_id_bytes: aci_bytes(uuid),
        service_id_cipher_text: fake_ciphertext(uuid),
    }
}

pub fn requesting_member(uuid: Uuid) -> DecryptedRequestingMember {
    DecryptedRequestingMember {
        aci_bytes: aci_bytes(uuid),
        profile_key: profile_key(uuid),
        timestamp: 0,
    }
}

pub fn banned_member(uuid: Uuid, timestamp: u64) -> DecryptedBannedMember {
    DecryptedBannedMember {
        service_id_bytes: aci_bytes(uuid),
        timestamp,
    }
}

pub fn promote_admin(uuid: Uuid) -> DecryptedModifyMemberRole {
    DecryptedModifyMemberRole {
        aci_bytes: aci_bytes(uuid),
        role: Role::Administrator.into(),
    }
}

pub fn demote_admin(uuid: Uuid) -> DecryptedModifyMemberRole {
    DecryptedModifyMemberRole {
        aci_bytes: aci_bytes(uuid),
        role: Role::Default.into(),
    }
}

pub fn approve_member(uuid: Uuid) -> DecryptedApproveMember {
    DecryptedApproveMember {
        aci_bytes: aci_bytes(uuid),
        role: Role::Default.into(),
    }
}

pub fn approve_admin(uuid: Uuid) -> DecryptedApproveMember {
    DecryptedApproveMember {
        aci_bytes: aci_bytes(uuid),
        role: Role::Administrator.into(),
    }
}

/// A group server and one group, all derived from a fixed seed.
pub struct TestServer {
    pub server_secret_params: ServerSecretParams,
    pub operations: GroupsV2Operations,
    pub group_secret_params: GroupSecretParams,
    rng: Rng,
}

impl TestServer {
    pub fn new() -> Self {
        Self::with_config(GroupsV2Config::default())
    }

    pub fn with_config(config: GroupsV2Config) -> Self {
        let rng = Rng::from_seed([1; 32]);
        let server_secret_params =
            ServerSecretParams::generate(&rng).expect("server secret params");
        let group_secret_params = GroupSecretParams::generate(&rng).expect("group secret params");
        let operations = GroupsV2Operations::new_with_rng(
            server_secret_params.get_public_params(),
            config,
            Rng::from_seed([2; 32]),
        );

        Self {
            server_secret_params,
            operations,
            group_secret_params,
            rng,
        }
    }

    pub fn group_operations(&self) -> GroupOperations<'_> {
        self.operations.for_group(&self.group_secret_params)
    }

    /// A credential for `uuid` with the profile key of [`profile_key`].
    pub fn credential(&self, uuid: Uuid) -> ExpiringProfileKeyCredential {
        let bytes: [u8; 32] = profile_key(uuid)
            .try_into()
            .expect("profile key fixture is 32 bytes");
        self.server_secret_params.issue_expiring_profile_key_credential(
            uuid,
            &ProfileKey::from_bytes(bytes),
            CREDENTIAL_EXPIRATION,
        )
    }

    pub fn candidate(&self, uuid: Uuid) -> GroupCandidate {
        GroupCandidate::with_credential(self.credential(uuid))
    }

    /// Signs encoded actions the way the server notarises an accepted change.
    pub fn sign(&self, actions: &[u8]) -> Vec<u8> {
        self.server_secret_params
            .sign(&self.rng, actions)
            .expect("server signature")
            .to_bytes()
            .to_vec()
    }
}

impl Default for TestServer {
    fn default() -> Self {
        Self::new()
    }
}
