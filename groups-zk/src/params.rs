// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-group secret and public parameters.
//!
//! Every key the group needs is derived from a single 32-byte master key which members share
//! out-of-band. The server only ever learns the public parameters: the group identifier and
//! the verifying key used to check presentations.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crypto::schnorr::{SigningKey, VERIFYING_KEY_SIZE, VerifyingKey};
use crate::crypto::{Rng, Secret, XAeadKey, hkdf};
use crate::error::ZkGroupError;

pub const GROUP_MASTER_KEY_LEN: usize = 32;

pub const GROUP_IDENTIFIER_LEN: usize = 32;

pub const GROUP_PUBLIC_PARAMS_LEN: usize = GROUP_IDENTIFIER_LEN + VERIFYING_KEY_SIZE;

const HKDF_SALT: &[u8] = b"groups-zk group secret params";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMasterKey(Secret<GROUP_MASTER_KEY_LEN>);

impl GroupMasterKey {
    pub fn from_bytes(bytes: [u8; GROUP_MASTER_KEY_LEN]) -> Self {
        Self(Secret::from_bytes(bytes))
    }

    pub fn to_bytes(&self) -> [u8; GROUP_MASTER_KEY_LEN] {
        *self.0.as_bytes()
    }
}

/// Public identifier of a group, known to the server.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupIdentifier(#[serde(with = "serde_bytes")] [u8; GROUP_IDENTIFIER_LEN]);

impl GroupIdentifier {
    pub fn as_bytes(&self) -> &[u8; GROUP_IDENTIFIER_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for GroupIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Secret parameters of one group. Never leaves the device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupSecretParams {
    master_key: GroupMasterKey,
    group_identifier: GroupIdentifier,
    uid_enc_key: Secret<32>,
    uid_mac_key: Secret<32>,
    profile_key_enc_key: Secret<32>,
    profile_key_mac_key: Secret<32>,
    blob_key: Secret<32>,
    signing_key: SigningKey,
}

impl GroupSecretParams {
    pub fn generate(rng: &Rng) -> Result<Self, ZkGroupError> {
        Self::derive_from_master_key(GroupMasterKey::from_bytes(rng.random_array()?))
    }

    pub fn derive_from_master_key(master_key: GroupMasterKey) -> Result<Self, ZkGroupError> {
        let ikm = master_key.to_bytes();
        let derive = |label: &[u8]| -> Result<Secret<32>, ZkGroupError> {
            Ok(Secret::from_bytes(hkdf(HKDF_SALT, &ikm, Some(label))?))
        };

        let group_identifier = GroupIdentifier(hkdf(HKDF_SALT, &ikm, Some(b"group identifier"))?);
        let signing_key = SigningKey::from_wide_bytes(&hkdf::<64>(
            HKDF_SALT,
            &ikm,
            Some(b"group signing key"),
        )?);

        Ok(Self {
            group_identifier,
            uid_enc_key: derive(b"uid encryption key")?,
            uid_mac_key: derive(b"uid synthetic iv key")?,
            profile_key_enc_key: derive(b"profile key encryption key")?,
            profile_key_mac_key: derive(b"profile key synthetic iv key")?,
            blob_key: derive(b"attribute blob key")?,
            signing_key,
            master_key,
        })
    }

    pub fn get_master_key(&self) -> &GroupMasterKey {
        &self.master_key
    }

    pub fn get_group_identifier(&self) -> GroupIdentifier {
        self.group_identifier
    }

    pub fn get_public_params(&self) -> GroupPublicParams {
        GroupPublicParams {
            group_identifier: self.group_identifier,
            verifying_key: self.signing_key.verifying_key(),
        }
    }

    pub(crate) fn group_identifier_bytes(&self) -> &[u8; GROUP_IDENTIFIER_LEN] {
        self.group_identifier.as_bytes()
    }

    pub(crate) fn uid_keys(&self) -> (&XAeadKey, &[u8; 32]) {
        (self.uid_enc_key.as_bytes(), self.uid_mac_key.as_bytes())
    }

    pub(crate) fn profile_key_keys(&self) -> (&XAeadKey, &[u8; 32]) {
        (
            self.profile_key_enc_key.as_bytes(),
            self.profile_key_mac_key.as_bytes(),
        )
    }

    pub(crate) fn blob_key(&self) -> &XAeadKey {
        self.blob_key.as_bytes()
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

/// Public parameters of a group, stored on the server as the group's "public key".
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupPublicParams {
    group_identifier: GroupIdentifier,
    verifying_key: VerifyingKey,
}

impl GroupPublicParams {
    pub fn get_group_identifier(&self) -> GroupIdentifier {
        self.group_identifier
    }

    pub(crate) fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    pub fn to_bytes(&self) -> [u8; GROUP_PUBLIC_PARAMS_LEN] {
        let mut bytes = [0u8; GROUP_PUBLIC_PARAMS_LEN];
        bytes[..GROUP_IDENTIFIER_LEN].copy_from_slice(self.group_identifier.as_bytes());
        bytes[GROUP_IDENTIFIER_LEN..].copy_from_slice(self.verifying_key.as_bytes());
        bytes
    }
}

impl TryFrom<&[u8]> for GroupPublicParams {
    type Error = ZkGroupError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        if value.len() != GROUP_PUBLIC_PARAMS_LEN {
            return Err(ZkGroupError::InvalidLength {
                expected: GROUP_PUBLIC_PARAMS_LEN,
                actual: value.len(),
            });
        }

        let mut group_identifier = [0u8; GROUP_IDENTIFIER_LEN];
        group_identifier.copy_from_slice(&value[..GROUP_IDENTIFIER_LEN]);
        let mut verifying_key = [0u8; VERIFYING_KEY_SIZE];
        verifying_key.copy_from_slice(&value[GROUP_IDENTIFIER_LEN..]);

        Ok(Self {
            group_identifier: GroupIdentifier(group_identifier),
            verifying_key: VerifyingKey::from_bytes(verifying_key),
        })
    }
}
