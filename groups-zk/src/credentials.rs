// SPDX-License-Identifier: MIT OR Apache-2.0

//! Profile key credentials and their presentations.
//!
//! The server issues a member an [`ExpiringProfileKeyCredential`] binding their account
//! identity to their profile key. To join or update a group the member turns it into a
//! [`ProfileKeyCredentialPresentation`] for that group: both values encrypted under the group's
//! secret parameters plus a Schnorr proof, made with the group key, over both ciphertexts.
//! Whoever holds the group's public parameters can check the proof, only group members can
//! decrypt who is behind it.
//!
//! The proof shows knowledge of the group key, not of a credential. The credential is checked
//! against the server's public parameters when the presentation is made, but nothing of it ends
//! up in the presentation, so any holder of the [`GroupSecretParams`] can present an arbitrary
//! identity and profile key to the group. Presentations only tell members apart from outsiders,
//! the server is trusted to check the identity behind an accepted change.
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cbor::{decode_cbor, encode_cbor};
use crate::cipher::{ClientZkGroupCipher, ProfileKeyCiphertext, UuidCiphertext};
use crate::crypto::schnorr::{
    Signature, VERIFYING_KEY_SIZE, VerifyingKey, schnorr_sign_deterministic, schnorr_verify,
};
#[cfg(any(test, feature = "test_utils"))]
use crate::crypto::schnorr::{SigningKey, schnorr_sign};
#[cfg(any(test, feature = "test_utils"))]
use crate::crypto::Rng;
use crate::error::ZkGroupError;
use crate::params::{GroupPublicParams, GroupSecretParams};
use crate::profile_key::ProfileKey;
use crate::service_id::ServiceId;

/// Server signature over an encoded group change.
pub type NotarySignature = Signature;

const CREDENTIAL_PREFIX: &[u8] = b"groups-zk expiring profile key credential";

const PRESENTATION_PREFIX: &[u8] = b"groups-zk profile key credential presentation";

/// Public key of the group server.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerPublicParams {
    verifying_key: VerifyingKey,
}

impl ServerPublicParams {
    pub fn from_bytes(bytes: [u8; VERIFYING_KEY_SIZE]) -> Self {
        Self {
            verifying_key: VerifyingKey::from_bytes(bytes),
        }
    }

    pub fn to_bytes(&self) -> [u8; VERIFYING_KEY_SIZE] {
        *self.verifying_key.as_bytes()
    }

    /// Checks the server's notary signature over `message`.
    pub fn verify_signature(
        &self,
        message: &[u8],
        signature: &NotarySignature,
    ) -> Result<(), ZkGroupError> {
        schnorr_verify(message, &self.verifying_key, signature)?;
        Ok(())
    }

    fn verify_credential(&self, credential: &ExpiringProfileKeyCredential) -> Result<(), ZkGroupError> {
        let message = credential_message(
            credential.aci,
            &credential.profile_key,
            credential.expiration,
        );
        self.verify_signature(&message, &credential.signature)
    }
}

/// Secret key of the group server, used to notarise changes and issue credentials.
#[cfg(any(test, feature = "test_utils"))]
#[derive(Clone, Debug)]
pub struct ServerSecretParams {
    signing_key: SigningKey,
}

#[cfg(any(test, feature = "test_utils"))]
impl ServerSecretParams {
    pub fn generate(rng: &Rng) -> Result<Self, ZkGroupError> {
        Ok(Self {
            signing_key: SigningKey::from_wide_bytes(&rng.random_array()?),
        })
    }

    pub fn get_public_params(&self) -> ServerPublicParams {
        ServerPublicParams {
            verifying_key: self.signing_key.verifying_key(),
        }
    }

    pub fn sign(&self, rng: &Rng, message: &[u8]) -> Result<NotarySignature, ZkGroupError> {
        Ok(schnorr_sign(message, &self.signing_key, rng)?)
    }

    pub fn issue_expiring_profile_key_credential(
        &self,
        aci: Uuid,
        profile_key: &ProfileKey,
        expiration: u64,
    ) -> ExpiringProfileKeyCredential {
        let message = credential_message(aci, profile_key, expiration);
        ExpiringProfileKeyCredential {
            aci,
            profile_key: profile_key.clone(),
            expiration,
            signature: schnorr_sign_deterministic(&message, &self.signing_key),
        }
    }
}

/// Server-issued binding of an account identity to its profile key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiringProfileKeyCredential {
    aci: Uuid,
    profile_key: ProfileKey,
    expiration: u64,
    signature: NotarySignature,
}

impl ExpiringProfileKeyCredential {
    pub fn aci(&self) -> Uuid {
        self.aci
    }

    pub fn profile_key(&self) -> &ProfileKey {
        &self.profile_key
    }

    /// Seconds since the unix epoch after which the credential is no longer accepted.
    pub fn expiration_time(&self) -> u64 {
        self.expiration
    }
}

fn credential_message(aci: Uuid, profile_key: &ProfileKey, expiration: u64) -> Vec<u8> {
    let mut message = CREDENTIAL_PREFIX.to_vec();
    message.extend_from_slice(aci.as_bytes());
    message.extend_from_slice(&profile_key.commitment());
    message.extend_from_slice(&expiration.to_be_bytes());
    message
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileKeyCredentialPresentation {
    uid_ciphertext: UuidCiphertext,
    profile_key_ciphertext: ProfileKeyCiphertext,
    expiration: u64,
    proof: Signature,
}

impl ProfileKeyCredentialPresentation {
    pub fn get_uuid_ciphertext(&self) -> &UuidCiphertext {
        &self.uid_ciphertext
    }

    pub fn get_profile_key_ciphertext(&self) -> &ProfileKeyCiphertext {
        &self.profile_key_ciphertext
    }

    pub fn expiration_time(&self) -> u64 {
        self.expiration
    }

    /// Checks the proof against the public parameters of the group it claims to belong to.
    ///
    /// A valid proof doesn't mean the server issued a credential for the presented identity, see
    /// the module documentation.
    pub fn verify(&self, group_public_params: &GroupPublicParams) -> Result<(), ZkGroupError> {
        let transcript = presentation_transcript(
            group_public_params,
            &self.uid_ciphertext,
            &self.profile_key_ciphertext,
            self.expiration,
        );
        schnorr_verify(&transcript, group_public_params.verifying_key(), &self.proof)?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ZkGroupError> {
        Ok(encode_cbor(self)?)
    }
}

impl TryFrom<&[u8]> for ProfileKeyCredentialPresentation {
    type Error = ZkGroupError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Ok(decode_cbor(value)?)
    }
}

fn presentation_transcript(
    group_public_params: &GroupPublicParams,
    uid_ciphertext: &UuidCiphertext,
    profile_key_ciphertext: &ProfileKeyCiphertext,
    expiration: u64,
) -> Vec<u8> {
    let mut transcript = PRESENTATION_PREFIX.to_vec();
    transcript.extend_from_slice(&group_public_params.to_bytes());
    transcript.extend_from_slice(uid_ciphertext.as_bytes());
    transcript.extend_from_slice(profile_key_ciphertext.as_bytes());
    transcript.extend_from_slice(&expiration.to_be_bytes());
    transcript
}

/// Client-side operations on profile key credentials.
#[derive(Clone, Debug)]
pub struct ClientZkProfileOperations {
    server_public_params: ServerPublicParams,
}

impl ClientZkProfileOperations {
    pub fn new(server_public_params: ServerPublicParams) -> Self {
        Self {
            server_public_params,
        }
    }

    /// Presents a credential to the group described by `group_secret_params`.
    ///
    /// Deterministic: presenting the same credential to the same group twice yields identical
    /// bytes.
    pub fn create_expiring_profile_key_credential_presentation(
        &self,
        group_secret_params: &GroupSecretParams,
        credential: &ExpiringProfileKeyCredential,
    ) -> Result<ProfileKeyCredentialPresentation, ZkGroupError> {
        self.server_public_params.verify_credential(credential)?;

        let cipher = ClientZkGroupCipher::new(group_secret_params.clone());
        let uid_ciphertext = cipher.encrypt_service_id(ServiceId::Aci(credential.aci))?;
        let profile_key_ciphertext =
            cipher.encrypt_profile_key(&credential.profile_key, credential.aci)?;

        let transcript = presentation_transcript(
            &group_secret_params.get_public_params(),
            &uid_ciphertext,
            &profile_key_ciphertext,
            credential.expiration,
        );
        let proof = schnorr_sign_deterministic(&transcript, group_secret_params.signing_key());

        Ok(ProfileKeyCredentialPresentation {
            uid_ciphertext,
            profile_key_ciphertext,
            expiration: credential.expiration,
            proof,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use uuid::Uuid;

    use crate::crypto::Rng;
    use crate::{ClientZkGroupCipher, GroupSecretParams, ProfileKey, ServiceId, ZkGroupError};

    use crate::crypto::schnorr::schnorr_sign_deterministic;

    use super::{
        ClientZkProfileOperations, ProfileKeyCredentialPresentation, ServerSecretParams,
        presentation_transcript,
    };

    #[test]
    fn present_and_verify() {
        let rng = Rng::from_seed([1; 32]);
        let server = ServerSecretParams::generate(&rng).unwrap();
        let group = GroupSecretParams::generate(&rng).unwrap();
        let aci = Uuid::from_bytes([1; 16]);
        let profile_key = ProfileKey::generate(&rng).unwrap();

        let credential = server.issue_expiring_profile_key_credential(aci, &profile_key, 86400);
        let operations = ClientZkProfileOperations::new(server.get_public_params());
        let presentation = operations
            .create_expiring_profile_key_credential_presentation(&group, &credential)
            .unwrap();

        assert!(presentation.verify(&group.get_public_params()).is_ok());

        let cipher = ClientZkGroupCipher::new(group.clone());
        assert_eq!(
            cipher
                .decrypt_service_id(presentation.get_uuid_ciphertext())
                .unwrap(),
            ServiceId::Aci(aci)
        );
        assert_eq!(
            cipher
                .decrypt_profile_key(presentation.get_profile_key_ciphertext(), aci)
                .unwrap(),
            profile_key
        );

        // Presentations are deterministic and survive encoding.
        let again = operations
            .create_expiring_profile_key_credential_presentation(&group, &credential)
            .unwrap();
        assert_eq!(presentation, again);
        let bytes = presentation.to_bytes().unwrap();
        assert_eq!(
            ProfileKeyCredentialPresentation::try_from(&bytes[..]).unwrap(),
            presentation
        );
    }

    #[test]
    fn presentation_for_other_group_fails() {
        let rng = Rng::from_seed([1; 32]);
        let server = ServerSecretParams::generate(&rng).unwrap();
        let group = GroupSecretParams::generate(&rng).unwrap();
        let other_group = GroupSecretParams::generate(&rng).unwrap();
        let profile_key = ProfileKey::generate(&rng).unwrap();

        let credential =
            server.issue_expiring_profile_key_credential(Uuid::from_bytes([1; 16]), &profile_key, 0);
        let presentation = ClientZkProfileOperations::new(server.get_public_params())
            .create_expiring_profile_key_credential_presentation(&group, &credential)
            .unwrap();

        assert_matches!(
            presentation.verify(&other_group.get_public_params()),
            Err(ZkGroupError::VerificationFailed)
        );
    }

    #[test]
    fn group_key_alone_makes_a_valid_presentation() {
        let rng = Rng::from_seed([1; 32]);
        let group = GroupSecretParams::generate(&rng).unwrap();
        let profile_key = ProfileKey::generate(&rng).unwrap();
        let aci = Uuid::from_bytes([7; 16]);

        // No credential was ever issued for `aci`.
        let cipher = ClientZkGroupCipher::new(group.clone());
        let uid_ciphertext = cipher.encrypt_service_id(ServiceId::Aci(aci)).unwrap();
        let profile_key_ciphertext = cipher.encrypt_profile_key(&profile_key, aci).unwrap();
        let transcript = presentation_transcript(
            &group.get_public_params(),
            &uid_ciphertext,
            &profile_key_ciphertext,
            0,
        );
        let presentation = ProfileKeyCredentialPresentation {
            uid_ciphertext,
            profile_key_ciphertext,
            expiration: 0,
            proof: schnorr_sign_deterministic(&transcript, group.signing_key()),
        };

        assert!(presentation.verify(&group.get_public_params()).is_ok());
    }

    #[test]
    fn credential_from_other_server_is_rejected() {
        let rng = Rng::from_seed([1; 32]);
        let server = ServerSecretParams::generate(&rng).unwrap();
        let rogue_server = ServerSecretParams::generate(&rng).unwrap();
        let group = GroupSecretParams::generate(&rng).unwrap();
        let profile_key = ProfileKey::generate(&rng).unwrap();

        let credential = rogue_server.issue_expiring_profile_key_credential(
            Uuid::from_bytes([1; 16]),
            &profile_key,
            0,
        );
        assert_matches!(
            ClientZkProfileOperations::new(server.get_public_params())
                .create_expiring_profile_key_credential_presentation(&group, &credential),
            Err(ZkGroupError::VerificationFailed)
        );
    }

    #[test]
    fn notary_signatures() {
        let rng = Rng::from_seed([1; 32]);
        let server = ServerSecretParams::generate(&rng).unwrap();
        let public_params = server.get_public_params();

        let signature = server.sign(&rng, b"actions").unwrap();
        assert!(public_params.verify_signature(b"actions", &signature).is_ok());
        assert_matches!(
            public_params.verify_signature(b"other actions", &signature),
            Err(ZkGroupError::VerificationFailed)
        );
    }
}
