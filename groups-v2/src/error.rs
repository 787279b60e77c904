// SPDX-License-Identifier: MIT OR Apache-2.0

use groups_zk::ZkGroupError;
use thiserror::Error;

/// Failures while encrypting or decrypting group records.
#[derive(Debug, Error)]
pub enum GroupOperationsError {
    /// A ciphertext or presentation is malformed or does not verify, the decrypted state can't
    /// be trusted.
    #[error("invalid group state: {0}")]
    InvalidGroupState(String),

    /// The server's signature over a group change does not check out.
    #[error("group change signature could not be verified: {0}")]
    VerificationFailed(ZkGroupError),

    #[error("could not decode group change actions: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("group of {size} members exceeds the maximum of {max}")]
    GroupTooLarge { size: usize, max: usize },

    #[error("candidate {0} has no profile key credential")]
    MissingCredential(String),

    #[error("{candidates} candidates given to replace {actions} add member actions")]
    CandidateMismatch { actions: usize, candidates: usize },

    #[error(transparent)]
    ZkGroup(#[from] ZkGroupError),
}

impl GroupOperationsError {
    pub(crate) fn invalid(context: &str, err: impl std::fmt::Display) -> Self {
        Self::InvalidGroupState(format!("{context}: {err}"))
    }
}

/// A change could not be applied to a group.
///
/// Every variant means the change refers to state the local group does not have. The local
/// copy is stale and needs to be fetched again.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ApplyChangeError {
    #[error("change to revision {change} does not follow group revision {group}")]
    RevisionMismatch { group: u32, change: u32 },

    #[error("member {0} is not in the group")]
    MemberNotFound(String),

    #[error("pending member {0} is not in the group")]
    PendingMemberNotFound(String),

    #[error("invited {0} is already a full member")]
    AlreadyMember(String),

    #[error("unknown role {0}")]
    UnknownRole(i32),
}
