// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};

use crate::crypto::sha2::sha2_256;
use crate::crypto::{Rng, RngError, Secret};
use crate::error::ZkGroupError;

pub const PROFILE_KEY_LEN: usize = 32;

/// Symmetric key a member uses to encrypt their profile, shared with every group they are in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileKey(Secret<PROFILE_KEY_LEN>);

impl ProfileKey {
    pub fn from_bytes(bytes: [u8; PROFILE_KEY_LEN]) -> Self {
        Self(Secret::from_bytes(bytes))
    }

    pub fn generate(rng: &Rng) -> Result<Self, RngError> {
        Ok(Self::from_bytes(rng.random_array()?))
    }

    pub fn to_bytes(&self) -> [u8; PROFILE_KEY_LEN] {
        *self.0.as_bytes()
    }

    pub(crate) fn as_bytes(&self) -> &[u8; PROFILE_KEY_LEN] {
        self.0.as_bytes()
    }

    /// Public commitment to this key, safe to hand to the server.
    pub fn commitment(&self) -> [u8; 32] {
        sha2_256(&[b"groups-zk profile key commitment", self.0.as_bytes()])
    }
}

impl TryFrom<&[u8]> for ProfileKey {
    type Error = ZkGroupError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; PROFILE_KEY_LEN] =
            value
                .try_into()
                .map_err(|_| ZkGroupError::InvalidLength {
                    expected: PROFILE_KEY_LEN,
                    actual: value.len(),
                })?;
        Ok(Self::from_bytes(bytes))
    }
}
