// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;

use crate::cbor::{DecodeError, EncodeError};
use crate::crypto::schnorr::SchnorrError;
use crate::crypto::{HkdfError, RngError, XAeadError};
use crate::service_id::ServiceIdError;

#[derive(Debug, Error)]
pub enum ZkGroupError {
    /// Ciphertext, proof or signature does not check out under the given parameters.
    #[error("verification failed")]
    VerificationFailed,

    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error(transparent)]
    ServiceId(#[from] ServiceIdError),

    #[error(transparent)]
    Rng(#[from] RngError),

    #[error(transparent)]
    Hkdf(#[from] HkdfError),

    #[error(transparent)]
    XAead(#[from] XAeadError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl From<SchnorrError> for ZkGroupError {
    fn from(value: SchnorrError) -> Self {
        match value {
            SchnorrError::Rng(err) => ZkGroupError::Rng(err),
            SchnorrError::InvalidArgument | SchnorrError::VerificationFailed => {
                ZkGroupError::VerificationFailed
            }
        }
    }
}
