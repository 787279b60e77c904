// SPDX-License-Identifier: MIT OR Apache-2.0

//! `groups-zk` holds the cryptographic material of end-to-end encrypted groups whose state is
//! kept by an untrusted server.
//!
//! Each group is described by a 32-byte [`GroupMasterKey`], shared among its members. From it
//! we derive [`GroupSecretParams`] which encrypt member identifiers ([`ServiceId`]) and
//! [`ProfileKey`]s, and [`GroupPublicParams`] which the server stores to check that changes
//! come from someone holding the group secret.
//!
//! Identifier and profile key ciphertexts are deterministic, so the server and other members
//! can compare them for equality without decrypting. Members prove their identity and profile
//! key to the group with a [`ProfileKeyCredentialPresentation`] derived from a server-issued
//! [`ExpiringProfileKeyCredential`].
mod cbor;
mod cipher;
mod credentials;
pub mod crypto;
mod error;
mod params;
mod profile_key;
mod service_id;

pub use cbor::{DecodeError, EncodeError};
pub use cipher::{
    ClientZkGroupCipher, MIN_BLOB_LEN, PROFILE_KEY_CIPHERTEXT_LEN, ProfileKeyCiphertext,
    UUID_CIPHERTEXT_LEN, UuidCiphertext,
};
#[cfg(any(test, feature = "test_utils"))]
pub use credentials::ServerSecretParams;
pub use credentials::{
    ClientZkProfileOperations, ExpiringProfileKeyCredential, NotarySignature,
    ProfileKeyCredentialPresentation, ServerPublicParams,
};
pub use error::ZkGroupError;
pub use params::{
    GROUP_MASTER_KEY_LEN, GROUP_PUBLIC_PARAMS_LEN, GroupIdentifier, GroupMasterKey,
    GroupPublicParams, GroupSecretParams,
};
pub use profile_key::{PROFILE_KEY_LEN, ProfileKey};
pub use service_id::{ACI_BINARY_LEN, PNI_BINARY_LEN, ServiceId, ServiceIdError};
