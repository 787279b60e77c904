// SPDX-License-Identifier: MIT OR Apache-2.0

//! Account identifiers of group members.
//!
//! A member is identified either by their account identity ("ACI") or their phone number
//! identity ("PNI"). Both wrap a UUID, the binary form tells them apart: an ACI is the raw 16
//! UUID bytes, a PNI carries an additional one-byte prefix.
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const ACI_BINARY_LEN: usize = 16;

pub const PNI_BINARY_LEN: usize = 17;

const PNI_PREFIX: u8 = 0x01;

const ACI_KIND: u8 = 0x00;

/// Width of the plaintext encrypted into a [`UuidCiphertext`](crate::UuidCiphertext).
pub(crate) const FIXED_WIDTH_LEN: usize = 17;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ServiceId {
    Aci(Uuid),
    Pni(Uuid),
}

impl ServiceId {
    pub fn uuid(&self) -> Uuid {
        match self {
            ServiceId::Aci(uuid) | ServiceId::Pni(uuid) => *uuid,
        }
    }

    pub fn is_aci(&self) -> bool {
        matches!(self, ServiceId::Aci(_))
    }

    pub fn aci(&self) -> Option<Uuid> {
        match self {
            ServiceId::Aci(uuid) => Some(*uuid),
            ServiceId::Pni(_) => None,
        }
    }

    /// Binary form as it is stored in plaintext group records.
    pub fn to_service_id_binary(&self) -> Vec<u8> {
        match self {
            ServiceId::Aci(uuid) => uuid.as_bytes().to_vec(),
            ServiceId::Pni(uuid) => {
                let mut bytes = Vec::with_capacity(PNI_BINARY_LEN);
                bytes.push(PNI_PREFIX);
                bytes.extend_from_slice(uuid.as_bytes());
                bytes
            }
        }
    }

    pub fn parse_from_service_id_binary(bytes: &[u8]) -> Result<Self, ServiceIdError> {
        match bytes.len() {
            0 => Err(ServiceIdError::Empty),
            ACI_BINARY_LEN => Ok(ServiceId::Aci(uuid_from_slice(bytes)?)),
            PNI_BINARY_LEN if bytes[0] == PNI_PREFIX => {
                Ok(ServiceId::Pni(uuid_from_slice(&bytes[1..])?))
            }
            PNI_BINARY_LEN => Err(ServiceIdError::UnknownKind(bytes[0])),
            len => Err(ServiceIdError::InvalidLength(len)),
        }
    }

    pub(crate) fn to_fixed_width_bytes(self) -> [u8; FIXED_WIDTH_LEN] {
        let mut bytes = [0u8; FIXED_WIDTH_LEN];
        bytes[0] = match self {
            ServiceId::Aci(_) => ACI_KIND,
            ServiceId::Pni(_) => PNI_PREFIX,
        };
        bytes[1..].copy_from_slice(self.uuid().as_bytes());
        bytes
    }

    pub(crate) fn from_fixed_width_bytes(
        bytes: &[u8; FIXED_WIDTH_LEN],
    ) -> Result<Self, ServiceIdError> {
        let uuid = uuid_from_slice(&bytes[1..])?;
        match bytes[0] {
            ACI_KIND => Ok(ServiceId::Aci(uuid)),
            PNI_PREFIX => Ok(ServiceId::Pni(uuid)),
            kind => Err(ServiceIdError::UnknownKind(kind)),
        }
    }
}

fn uuid_from_slice(bytes: &[u8]) -> Result<Uuid, ServiceIdError> {
    Uuid::from_slice(bytes).map_err(|_| ServiceIdError::InvalidLength(bytes.len()))
}

impl From<Uuid> for ServiceId {
    fn from(aci: Uuid) -> Self {
        ServiceId::Aci(aci)
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceId::Aci(uuid) => write!(f, "{uuid}"),
            ServiceId::Pni(uuid) => write!(f, "PNI:{uuid}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ServiceIdError {
    #[error("service id is empty")]
    Empty,

    #[error("service id has invalid length {0}")]
    InvalidLength(usize),

    #[error("service id has unknown kind prefix {0:#04x}")]
    UnknownKind(u8),

    #[error("expected an account identity, got a phone number identity")]
    NotAnAci,
}
